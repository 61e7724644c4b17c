use crate::{
    AppState,
    auth::{AdminUser, AuthUser, InstructorUser},
    error::ApiError,
    models::{
        Class, CreateClassRequest, DeleteAck, Identity, InsertAck, NewSelectedClass,
        PaymentIntentRequest, PaymentIntentResponse, RegisterOutcome, RegisterUserRequest, Role,
        RoleCheck, SelectedClass, TokenResponse, UpdateAck, User,
    },
    payments::{PAYMENT_CURRENCY, to_minor_units},
    repository::POPULAR_CLASS_LIMIT,
    roles,
};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use axum::{Json, extract::State};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// ClassFilter
///
/// Query parameters for `GET /classes`. Without `email` every class is listed.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ClassFilter {
    /// Instructor email owning the classes.
    pub email: Option<String>,
}

/// SelectedClassFilter
///
/// Query parameters for `GET /selectedClasses`. The email is mandatory and must
/// match the caller.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SelectedClassFilter {
    pub email: String,
}

fn require_email(email: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::BadRequest("email is required".to_string()));
    }
    Ok(())
}

// --- Tokens ---

/// issue_token
///
/// [Public Route] Signs a one-hour access token for the posted identity.
#[utoipa::path(
    post,
    path = "/jwt",
    request_body = Identity,
    responses(
        (status = 200, description = "Signed token", body = TokenResponse),
        (status = 400, description = "Missing email")
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    ApiJson(identity): ApiJson<Identity>,
) -> Result<Json<TokenResponse>, ApiError> {
    require_email(&identity.email)?;
    let token = state.tokens.issue(&identity)?;
    Ok(Json(TokenResponse { token }))
}

// --- Users ---

/// list_users
///
/// [Public Route] Lists every registered user.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.repo.list_users().await?))
}

/// register_user
///
/// [Public Route] Creates a user on first sign-in. Registering an email that
/// already exists is not an error: nothing is written and the duplicate is
/// reported instead.
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUserRequest,
    responses((status = 200, description = "Inserted or already present", body = RegisterOutcome))
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterUserRequest>,
) -> Result<Json<RegisterOutcome>, ApiError> {
    require_email(&payload.email)?;

    if state.repo.find_user_by_email(&payload.email).await?.is_some() {
        return Ok(Json(RegisterOutcome::already_exists()));
    }

    // A concurrent registration can still win the race; the store's unique
    // email constraint turns that into `None` here.
    let outcome = match state.repo.insert_user(payload).await? {
        Some(id) => {
            tracing::info!(user_id = %id, "user registered");
            RegisterOutcome::Created(InsertAck::new(id))
        }
        None => RegisterOutcome::already_exists(),
    };
    Ok(Json(outcome))
}

async fn check_role(
    caller: &AuthUser,
    state: &AppState,
    email: &str,
    role: Role,
) -> Result<Json<RoleCheck>, ApiError> {
    roles::ensure_self(caller, email)?;
    let granted = roles::has_role(state.repo.as_ref(), email, role).await?;
    Ok(Json(RoleCheck { role, granted }))
}

/// check_admin
///
/// [Authenticated Route] `{ "admin": bool }` for the caller's own email.
/// Asking about any other email is rejected with 403.
#[utoipa::path(
    get,
    path = "/users/admin/{email}",
    params(("email" = String, Path, description = "Caller's own email")),
    responses(
        (status = 200, description = "Role flag, e.g. {\"admin\": true}"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Email does not match the token")
    )
)]
pub async fn check_admin(
    caller: AuthUser,
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> Result<Json<RoleCheck>, ApiError> {
    check_role(&caller, &state, &email, Role::Admin).await
}

/// check_instructor
///
/// [Authenticated Route] `{ "instructor": bool }` for the caller's own email.
#[utoipa::path(
    get,
    path = "/users/instructor/{email}",
    params(("email" = String, Path, description = "Caller's own email")),
    responses(
        (status = 200, description = "Role flag, e.g. {\"instructor\": true}"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Email does not match the token")
    )
)]
pub async fn check_instructor(
    caller: AuthUser,
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> Result<Json<RoleCheck>, ApiError> {
    check_role(&caller, &state, &email, Role::Instructor).await
}

/// check_student
///
/// [Authenticated Route] `{ "student": bool }` for the caller's own email.
#[utoipa::path(
    get,
    path = "/users/student/{email}",
    params(("email" = String, Path, description = "Caller's own email")),
    responses(
        (status = 200, description = "Role flag, e.g. {\"student\": true}"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Email does not match the token")
    )
)]
pub async fn check_student(
    caller: AuthUser,
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> Result<Json<RoleCheck>, ApiError> {
    check_role(&caller, &state, &email, Role::Student).await
}

async fn assign_role(
    admin: &AuthUser,
    state: &AppState,
    id: Uuid,
    role: Role,
) -> Result<Json<UpdateAck>, ApiError> {
    let ack = state.repo.set_user_role(id, role).await?;
    tracing::info!(
        admin = %admin.email,
        user_id = %id,
        %role,
        matched = ack.matched_count,
        "role assigned"
    );
    Ok(Json(ack))
}

/// make_admin
///
/// [Admin Route] Sets `role = admin` on the user with `id`. An unknown id is a
/// silent no-op (`matchedCount: 0`).
#[utoipa::path(
    patch,
    path = "/users/admin/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Update acknowledgement", body = UpdateAck),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn make_admin(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UpdateAck>, ApiError> {
    assign_role(&admin, &state, id, Role::Admin).await
}

/// make_instructor
///
/// [Admin Route] Sets `role = instructor` on the user with `id`.
#[utoipa::path(
    patch,
    path = "/users/instructor/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Update acknowledgement", body = UpdateAck),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn make_instructor(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UpdateAck>, ApiError> {
    assign_role(&admin, &state, id, Role::Instructor).await
}

// --- Classes ---

/// get_classes
///
/// [Public Route] Classes owned by an instructor email, newest first.
#[utoipa::path(
    get,
    path = "/classes",
    params(ClassFilter),
    responses((status = 200, description = "Classes", body = [Class]))
)]
pub async fn get_classes(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ClassFilter>,
) -> Result<Json<Vec<Class>>, ApiError> {
    Ok(Json(state.repo.list_classes(filter.email.as_deref()).await?))
}

/// create_class
///
/// [Instructor Route] Adds a class owned by the calling instructor.
#[utoipa::path(
    post,
    path = "/classes",
    request_body = CreateClassRequest,
    responses(
        (status = 200, description = "Insert acknowledgement", body = InsertAck),
        (status = 403, description = "Caller is not an instructor")
    )
)]
pub async fn create_class(
    InstructorUser(instructor): InstructorUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateClassRequest>,
) -> Result<Json<InsertAck>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("class name is required".to_string()));
    }
    if payload.available_seats < 0 || !payload.price.is_finite() || payload.price < 0.0 {
        return Err(ApiError::BadRequest(
            "seats and price must not be negative".to_string(),
        ));
    }
    let id = state.repo.insert_class(payload, &instructor.email).await?;
    Ok(Json(InsertAck::new(id)))
}

/// get_popular_classes
///
/// [Public Route] The six classes with the most enrolled students, descending.
#[utoipa::path(
    get,
    path = "/Popularclasses",
    responses((status = 200, description = "Top classes", body = [Class]))
)]
pub async fn get_popular_classes(
    State(state): State<AppState>,
) -> Result<Json<Vec<Class>>, ApiError> {
    Ok(Json(state.repo.popular_classes(POPULAR_CLASS_LIMIT).await?))
}

// --- Selected Classes ---

/// get_selected_classes
///
/// [Authenticated Route] The caller's cart. The `email` query parameter must
/// match the token; otherwise 403 and no query is run.
#[utoipa::path(
    get,
    path = "/selectedClasses",
    params(SelectedClassFilter),
    responses(
        (status = 200, description = "Cart items", body = [SelectedClass]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Email does not match the token")
    )
)]
pub async fn get_selected_classes(
    caller: AuthUser,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SelectedClassFilter>,
) -> Result<Json<Vec<SelectedClass>>, ApiError> {
    roles::ensure_self(&caller, &filter.email)?;
    Ok(Json(state.repo.list_selected_classes(&filter.email).await?))
}

/// add_selected_class
///
/// [Public Route] Adds a class to a cart.
#[utoipa::path(
    post,
    path = "/selectedClasses",
    request_body = NewSelectedClass,
    responses((status = 200, description = "Insert acknowledgement", body = InsertAck))
)]
pub async fn add_selected_class(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewSelectedClass>,
) -> Result<Json<InsertAck>, ApiError> {
    require_email(&payload.email)?;
    let id = state.repo.insert_selected_class(payload).await?;
    Ok(Json(InsertAck::new(id)))
}

/// get_selected_class
///
/// [Public Route] One cart item, or `null` when the id is unknown.
#[utoipa::path(
    get,
    path = "/selectedClasses/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses((status = 200, description = "Cart item, or null when absent", body = SelectedClass))
)]
pub async fn get_selected_class(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Option<SelectedClass>>, ApiError> {
    Ok(Json(state.repo.get_selected_class(id).await?))
}

/// delete_selected_class
///
/// [Public Route] Removes one cart item. Unknown ids report `deletedCount: 0`.
#[utoipa::path(
    delete,
    path = "/selectedClasses/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses((status = 200, description = "Delete acknowledgement", body = DeleteAck))
)]
pub async fn delete_selected_class(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeleteAck>, ApiError> {
    let deleted = state.repo.delete_selected_class(id).await?;
    Ok(Json(DeleteAck::new(deleted)))
}

// --- Payments ---

/// create_payment_intent
///
/// [Public Route] Converts `price` to cents and asks the payment provider for
/// an intent in the fixed currency. Returns only the client secret.
#[utoipa::path(
    post,
    path = "/create-payment-intent",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Client secret", body = PaymentIntentResponse),
        (status = 400, description = "Invalid price"),
        (status = 502, description = "Payment provider failure")
    )
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<PaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let amount = to_minor_units(payload.price)?;
    let client_secret = state
        .payments
        .create_payment_intent(amount, PAYMENT_CURRENCY)
        .await
        .map_err(ApiError::PaymentProvider)?;
    Ok(Json(PaymentIntentResponse { client_secret }))
}
