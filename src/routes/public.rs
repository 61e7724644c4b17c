use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: token issuance, registration, class
/// listings, cart writes and payment intents.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Liveness banner.
        .route("/", get(|| async { "Summer camp server is running" }))
        // GET /health
        // Load balancer check.
        .route("/health", get(|| async { "ok" }))
        // POST /jwt
        // Issues a one-hour token for the posted identity.
        .route("/jwt", post(handlers::issue_token))
        // GET/POST /users
        // Lists users / registers a user (idempotent on email).
        .route(
            "/users",
            get(handlers::list_users).post(handlers::register_user),
        )
        // GET /classes?email=...
        // Classes for an instructor, newest first.
        .route("/classes", get(handlers::get_classes))
        // GET /Popularclasses
        // Top six classes by enrolled students.
        .route("/Popularclasses", get(handlers::get_popular_classes))
        // POST /selectedClasses
        // Adds a cart item. Listing the cart is an authenticated route.
        .route("/selectedClasses", post(handlers::add_selected_class))
        // GET/DELETE /selectedClasses/{id}
        .route(
            "/selectedClasses/{id}",
            get(handlers::get_selected_class).delete(handlers::delete_selected_class),
        )
        // POST /create-payment-intent
        // Returns the provider's client secret for the given price.
        .route(
            "/create-payment-intent",
            post(handlers::create_payment_intent),
        )
}
