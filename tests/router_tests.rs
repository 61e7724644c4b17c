use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use summer_camp_api::{
    AppConfig, AppState, InMemoryRepository, MockPaymentProvider, TokenCodec, create_router,
    models::{
        Class, CreateClassRequest, Identity, NewSelectedClass, RegisterUserRequest, Role,
        SelectedClass, UpdateAck, User,
    },
    repository::{Repository, StoreResult},
};
use tower::util::ServiceExt;
use uuid::Uuid;

/// Wraps the in-memory store and counts the reads a 403 must never reach.
struct SpyRepository {
    inner: InMemoryRepository,
    cart_reads: AtomicUsize,
    user_lookups: AtomicUsize,
}

impl SpyRepository {
    fn new(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            cart_reads: AtomicUsize::new(0),
            user_lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Repository for SpyRepository {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.inner.list_users().await
    }
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_user_by_email(email).await
    }
    async fn insert_user(&self, req: RegisterUserRequest) -> StoreResult<Option<Uuid>> {
        self.inner.insert_user(req).await
    }
    async fn set_user_role(&self, id: Uuid, role: Role) -> StoreResult<UpdateAck> {
        self.inner.set_user_role(id, role).await
    }
    async fn list_classes(&self, email: Option<&str>) -> StoreResult<Vec<Class>> {
        self.inner.list_classes(email).await
    }
    async fn insert_class(&self, req: CreateClassRequest, email: &str) -> StoreResult<Uuid> {
        self.inner.insert_class(req, email).await
    }
    async fn popular_classes(&self, limit: i64) -> StoreResult<Vec<Class>> {
        self.inner.popular_classes(limit).await
    }
    async fn list_selected_classes(&self, email: &str) -> StoreResult<Vec<SelectedClass>> {
        self.cart_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_selected_classes(email).await
    }
    async fn insert_selected_class(&self, item: NewSelectedClass) -> StoreResult<Uuid> {
        self.inner.insert_selected_class(item).await
    }
    async fn get_selected_class(&self, id: Uuid) -> StoreResult<Option<SelectedClass>> {
        self.inner.get_selected_class(id).await
    }
    async fn delete_selected_class(&self, id: Uuid) -> StoreResult<u64> {
        self.inner.delete_selected_class(id).await
    }
}

// --- Helpers ---

fn state_with(repo: Arc<dyn Repository>, payments: MockPaymentProvider) -> AppState {
    AppState::new(repo, Arc::new(payments), AppConfig::default())
}

fn token_for(state: &AppState, email: &str) -> String {
    state
        .tokens
        .issue(&Identity {
            email: email.to_string(),
        })
        .unwrap()
}

fn user(email: &str, role: Option<Role>) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: None,
        photo_url: None,
        role,
    }
}

async fn send(state: AppState, request: Request<Body>) -> Response {
    create_router(state).oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn patch(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("PATCH").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// --- Public routes ---

#[tokio::test]
async fn test_root_and_health_are_public() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());

    let response = send(state.clone(), get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(state, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let response = send(state, get("/health", None)).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_jwt_then_protected_route() {
    let repo = InMemoryRepository::new();
    repo.seed_user(user("alice@camp.io", Some(Role::Student))).await;
    let state = state_with(Arc::new(repo), MockPaymentProvider::new());

    let response = send(
        state.clone(),
        post_json("/jwt", json!({ "email": "alice@camp.io" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(state, get("/users/student/alice@camp.io", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "student": true }));
}

#[tokio::test]
async fn test_register_twice_reports_existing_user() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let payload = json!({ "email": "alice@camp.io", "name": "Alice", "role": "admin" });

    let first = body_json(send(state.clone(), post_json("/users", payload.clone())).await).await;
    assert_eq!(first["acknowledged"], json!(true));
    assert!(first["insertedId"].is_string());

    let second = body_json(send(state, post_json("/users", payload)).await).await;
    assert_eq!(second, json!({ "message": "user already exists" }));
}

#[tokio::test]
async fn test_add_selected_class_needs_no_token() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let response = send(
        state,
        post_json(
            "/selectedClasses",
            json!({
                "email": "alice@camp.io",
                "classId": Uuid::new_v4(),
                "name": "Pottery",
                "instructorName": "Coach",
                "price": 19.99
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_selected_class_lookup_with_bad_id_is_bad_request() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let response = send(state, get("/selectedClasses/not-a-uuid", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!(true));
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_malformed_json_body_gets_error_shape() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let request = Request::builder()
        .method("POST")
        .uri("/jwt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = send(state, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!(true));
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_cart_listing_without_email_gets_error_shape() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let token = token_for(&state, "alice@camp.io");

    let response = send(state, get("/selectedClasses", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!(true));
    assert!(
        body["message"].as_str().is_some_and(|m| m.contains("email")),
        "message should name the missing field: {body}"
    );
}

#[tokio::test]
async fn test_sub_cent_price_never_reaches_provider() {
    let payments = Arc::new(MockPaymentProvider::new());
    let state = AppState::new(
        Arc::new(InMemoryRepository::new()),
        payments.clone(),
        AppConfig::default(),
    );

    let response = send(
        state,
        post_json("/create-payment-intent", json!({ "price": 0.004 })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], json!(true));
    assert!(payments.requests().is_empty());
}

#[tokio::test]
async fn test_missing_selected_class_is_null() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let uri = format!("/selectedClasses/{}", Uuid::new_v4());
    let response = send(state, get(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Null);
}

// --- Auth gate ---

#[tokio::test]
async fn test_protected_route_without_token_is_401() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let response = send(state, get("/selectedClasses?email=alice@camp.io", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({ "error": true, "message": "unauthorized access" })
    );
}

#[tokio::test]
async fn test_protected_route_with_garbage_token_is_401() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let response = send(state, get("/users/admin/alice@camp.io", Some("garbage"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cart_of_other_user_is_403_without_store_access() {
    let spy = Arc::new(SpyRepository::new(InMemoryRepository::new()));
    let state = state_with(spy.clone(), MockPaymentProvider::new());
    let token = token_for(&state, "alice@camp.io");

    let response = send(state, get("/selectedClasses?email=bob@camp.io", Some(&token))).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "error": true, "message": "forbidden access" })
    );
    assert_eq!(spy.cart_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_role_check_of_other_user_is_403_without_store_access() {
    let spy = Arc::new(SpyRepository::new(InMemoryRepository::new()));
    spy.inner.seed_user(user("boss@camp.io", Some(Role::Admin))).await;
    let state = state_with(spy.clone(), MockPaymentProvider::new());
    let token = token_for(&state, "alice@camp.io");

    let response = send(state, get("/users/admin/boss@camp.io", Some(&token))).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(spy.user_lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_own_cart_is_listed() {
    let repo = InMemoryRepository::new();
    repo.seed_selected_class(SelectedClass {
        id: Uuid::new_v4(),
        email: "alice@camp.io".to_string(),
        class_id: Uuid::new_v4(),
        name: "Pottery".to_string(),
        image: None,
        instructor_name: "Coach".to_string(),
        price: 19.99,
        created_at: chrono::Utc::now(),
    })
    .await;
    let state = state_with(Arc::new(repo), MockPaymentProvider::new());
    let token = token_for(&state, "alice@camp.io");

    let response = send(state, get("/selectedClasses?email=alice@camp.io", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let items = body_json(response).await;
    assert_eq!(items.as_array().map(Vec::len), Some(1));
    assert_eq!(items[0]["instructorName"], json!("Coach"));
}

#[tokio::test]
async fn test_token_from_other_secret_is_401() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let foreign = TokenCodec::new("not-this-service")
        .issue(&Identity {
            email: "alice@camp.io".to_string(),
        })
        .unwrap();

    let response = send(state, get("/users/admin/alice@camp.io", Some(&foreign))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- Role assignment ---

#[tokio::test]
async fn test_make_admin_requires_token() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let uri = format!("/users/admin/{}", Uuid::new_v4());
    let response = send(state, patch(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_make_admin_rejects_non_admin() {
    let repo = InMemoryRepository::new();
    let target = user("alice@camp.io", None);
    let target_id = target.id;
    repo.seed_user(target).await;
    repo.seed_user(user("kid@camp.io", Some(Role::Student))).await;
    let repo = Arc::new(repo);
    let state = state_with(repo.clone(), MockPaymentProvider::new());
    let token = token_for(&state, "kid@camp.io");

    let response = send(state, patch(&format!("/users/admin/{target_id}"), Some(&token))).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let stored = repo.find_user_by_email("alice@camp.io").await.unwrap().unwrap();
    assert_eq!(stored.role, None);
}

#[tokio::test]
async fn test_admin_promotes_instructor() {
    let repo = InMemoryRepository::new();
    let target = user("alice@camp.io", None);
    let target_id = target.id;
    repo.seed_user(target).await;
    repo.seed_user(user("boss@camp.io", Some(Role::Admin))).await;
    let repo = Arc::new(repo);
    let state = state_with(repo.clone(), MockPaymentProvider::new());
    let token = token_for(&state, "boss@camp.io");

    let response = send(
        state,
        patch(&format!("/users/instructor/{target_id}"), Some(&token)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "acknowledged": true, "matchedCount": 1, "modifiedCount": 1 })
    );
    let stored = repo.find_user_by_email("alice@camp.io").await.unwrap().unwrap();
    assert_eq!(stored.role, Some(Role::Instructor));
}

// --- Classes ---

#[tokio::test]
async fn test_create_class_requires_instructor() {
    let repo = InMemoryRepository::new();
    repo.seed_user(user("kid@camp.io", Some(Role::Student))).await;
    let state = state_with(Arc::new(repo), MockPaymentProvider::new());
    let token = token_for(&state, "kid@camp.io");

    let request = Request::builder()
        .method("POST")
        .uri("/classes")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(
            json!({
                "name": "Archery",
                "instructorName": "Kid",
                "availableSeats": 5,
                "price": 10.0
            })
            .to_string(),
        ))
        .unwrap();

    let response = send(state, request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_class_listing_stays_public() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let response = send(state.clone(), get("/classes?email=coach@camp.io", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));

    let response = send(state, get("/Popularclasses", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Failures ---

#[tokio::test]
async fn test_store_failure_is_redacted_500() {
    let state = state_with(
        Arc::new(InMemoryRepository::new_failing()),
        MockPaymentProvider::new(),
    );
    let response = send(state, get("/users", None)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": true, "message": "internal server error" })
    );
}

#[tokio::test]
async fn test_payment_intent_success_and_failure() {
    let state = state_with(Arc::new(InMemoryRepository::new()), MockPaymentProvider::new());
    let response = send(
        state,
        post_json("/create-payment-intent", json!({ "price": 19.99 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "clientSecret": "pi_mock_1999_secret_mock" })
    );

    let state = state_with(
        Arc::new(InMemoryRepository::new()),
        MockPaymentProvider::new_failing(),
    );
    let response = send(
        state,
        post_json("/create-payment-intent", json!({ "price": 19.99 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], json!(true));
}
