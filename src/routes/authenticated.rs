use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind `auth_middleware`, so handlers always receive
/// a verified `AuthUser`. Handlers addressed by email additionally require
/// that email to be the caller's own.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/{role}/{user}
        // Boolean role flag for the caller's own email ({user} is the email).
        .route("/users/admin/{user}", get(handlers::check_admin))
        .route("/users/instructor/{user}", get(handlers::check_instructor))
        .route("/users/student/{user}", get(handlers::check_student))
        // GET /selectedClasses?email=...
        // The caller's cart; the email must match the token.
        .route("/selectedClasses", get(handlers::get_selected_classes))
        // POST /classes
        // Instructors publish a new class under their own email.
        .route("/classes", post(handlers::create_class))
}
