/// Router Module Index
///
/// Splits the routes by the access level they require. The level is applied
/// per module as an axum layer, so a route cannot end up unprotected by being
/// registered in the wrong place.

/// Routes open to anyone: health, registration and login.
pub mod public;

/// Routes that need any valid bearer token (catalog reads).
pub mod authenticated;

/// Routes that need a valid bearer token carrying the admin flag (catalog writes).
pub mod admin;
