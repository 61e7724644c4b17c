use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod repository;
pub mod roles;
pub mod token;

pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use payments::{MockPaymentProvider, PaymentState, StripeClient};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use token::TokenCodec;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::issue_token, handlers::list_users, handlers::register_user,
        handlers::check_admin, handlers::check_instructor, handlers::check_student,
        handlers::make_admin, handlers::make_instructor, handlers::get_classes,
        handlers::create_class, handlers::get_popular_classes, handlers::get_selected_classes,
        handlers::add_selected_class, handlers::get_selected_class,
        handlers::delete_selected_class, handlers::create_payment_intent
    ),
    components(
        schemas(
            models::Identity, models::Role, models::User, models::Class, models::SelectedClass,
            models::RegisterUserRequest, models::CreateClassRequest, models::NewSelectedClass,
            models::TokenResponse, models::PaymentIntentRequest, models::PaymentIntentResponse,
            models::InsertAck, models::UpdateAck, models::DeleteAck, models::RegisterOutcome,
        )
    ),
    tags(
        (name = "summer-camp", description = "Summer camp enrolment API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, built once in `main` and cloned per request.
/// The store and payment clients are trait objects so tests can inject fakes.
#[derive(Clone)]
pub struct AppState {
    /// Data store (Postgres in production).
    pub repo: RepositoryState,
    /// Payment provider (Stripe in production).
    pub payments: PaymentState,
    /// Signs and verifies access tokens.
    pub tokens: TokenCodec,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the state with a `TokenCodec` keyed from `config.token_secret`.
    pub fn new(repo: RepositoryState, payments: PaymentState, config: AppConfig) -> Self {
        Self {
            repo,
            payments,
            tokens: TokenCodec::new(&config.token_secret),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for PaymentState {
    fn from_ref(app_state: &AppState) -> PaymentState {
        app_state.payments.clone()
    }
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(app_state: &AppState) -> TokenCodec {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// The auth gate for protected routers. Extracting `AuthUser` verifies the
/// bearer token and attaches the identity to the request; a failed extraction
/// short-circuits with 401 before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles public, authenticated and admin routes, then wraps them in the
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with the `x-request-id` set above so every
/// log line of the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
