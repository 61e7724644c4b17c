/// Router Module Index
///
/// Routes are split by the access check they need. Authentication is applied
/// as a layer on the `authenticated` and `admin` routers; per-resource checks
/// (email self-match, admin role) happen inside the handlers' extractors.
///
/// Paths shared between routers (e.g. `/users/admin/{user}`) must use the same
/// parameter name, since the routers are merged into one path table.

/// Routes anyone may call.
pub mod public;

/// Routes that need a valid access token.
pub mod authenticated;

/// Routes that need a valid access token held by an admin.
pub mod admin;
