use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, ser::SerializeMap};
use sqlx::{FromRow, Row, postgres::PgRow};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity & Roles ---

/// Identity
///
/// The email a caller is authenticated as. Posted to `/jwt` to obtain a token
/// and recovered from that token by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    pub email: String,
}

/// Role
///
/// The closed set of roles a user can hold. A user without a role has not been
/// promoted by an admin yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// --- Stored Records ---

/// User
///
/// A registered account, keyed by its unique email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Absent until an admin assigns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

// The role column is free text in the database; anything outside the closed
// set is treated as a decode failure rather than silently dropped.
impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role = row
            .try_get::<Option<String>, _>("role")?
            .map(|raw| raw.parse::<Role>())
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "role".to_string(),
                source: Box::new(e),
            })?;

        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            photo_url: row.try_get("photo_url")?,
            role,
        })
    }
}

/// Class
///
/// A course offered by an instructor. `students` counts enrolments and drives
/// the popular-classes ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub instructor_name: String,
    /// Email of the instructor who owns the class.
    pub email: String,
    pub available_seats: i32,
    pub price: f64,
    pub students: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// SelectedClass
///
/// A cart entry linking a user's email to a class they intend to pay for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SelectedClass {
    pub id: Uuid,
    /// Owner of the cart entry.
    pub email: String,
    pub class_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub instructor_name: String,
    pub price: f64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// RegisterUserRequest
///
/// Body of `POST /users`. Any `role` field sent by the client is ignored; new
/// users always start without a role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// CreateClassRequest
///
/// Body of `POST /classes`. The owning email is taken from the caller's token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateClassRequest {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub instructor_name: String,
    pub available_seats: i32,
    pub price: f64,
}

/// NewSelectedClass
///
/// Body of `POST /selectedClasses`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewSelectedClass {
    pub email: String,
    pub class_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub instructor_name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// PaymentIntentRequest
///
/// `price` is in whole currency units (e.g. 19.99).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PaymentIntentRequest {
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

// --- Store Acknowledgements ---
// Clients consume the store's raw write results, so these keep that shape.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InsertAck {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

impl InsertAck {
    pub fn new(inserted_id: Uuid) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateAck {
    pub acknowledged: bool,
    #[ts(type = "number")]
    pub matched_count: u64,
    #[ts(type = "number")]
    pub modified_count: u64,
}

impl UpdateAck {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteAck {
    pub acknowledged: bool,
    #[ts(type = "number")]
    pub deleted_count: u64,
}

impl DeleteAck {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

/// RegisterOutcome
///
/// Registration never fails on a duplicate email; it reports the duplicate
/// instead of inserting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum RegisterOutcome {
    AlreadyExists { message: String },
    Created(InsertAck),
}

impl RegisterOutcome {
    pub fn already_exists() -> Self {
        RegisterOutcome::AlreadyExists {
            message: "user already exists".to_string(),
        }
    }
}

/// RoleCheck
///
/// Answer of the role-check endpoints, serialized as `{ "<role>": bool }`
/// (e.g. `{ "admin": true }`). Never carries the user record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCheck {
    pub role: Role,
    pub granted: bool,
}

impl Serialize for RoleCheck {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.role.as_str(), &self.granted)?;
        map.end()
    }
}
