use crate::{AppState, handlers};
use axum::{Router, routing::patch};

/// Admin Router Module
///
/// Role assignment. Layered with `auth_middleware` like the authenticated
/// routes; the handlers' `AdminUser` extractor then rejects non-admins with 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PATCH /users/admin/{user}
        // Promotes the user with id {user} to admin.
        .route("/users/admin/{user}", patch(handlers::make_admin))
        // PATCH /users/instructor/{user}
        // Promotes the user with id {user} to instructor.
        .route("/users/instructor/{user}", patch(handlers::make_instructor))
}
