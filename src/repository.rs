use crate::models::{
    Class, CreateClassRequest, NewSelectedClass, RegisterUserRequest, Role, SelectedClass, User,
    UpdateAck,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Number of classes returned by the popular-classes listing.
pub const POPULAR_CLASS_LIMIT: i64 = 6;

/// Repository Trait
///
/// Contract for every data store operation the handlers need. Each call is a
/// single-statement operation; the store's own atomicity is all we rely on.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Inserts a user without a role. Returns `None` if the email is taken.
    async fn insert_user(&self, req: RegisterUserRequest) -> StoreResult<Option<Uuid>>;
    /// Unconditional role update. Zero matched rows is not an error.
    async fn set_user_role(&self, id: Uuid, role: Role) -> StoreResult<UpdateAck>;

    // --- Classes ---
    /// Classes owned by `email` (all classes when `None`), newest first.
    async fn list_classes(&self, email: Option<&str>) -> StoreResult<Vec<Class>>;
    async fn insert_class(&self, req: CreateClassRequest, email: &str) -> StoreResult<Uuid>;
    /// Classes ranked by enrolled students, descending.
    async fn popular_classes(&self, limit: i64) -> StoreResult<Vec<Class>>;

    // --- Selected classes (cart) ---
    async fn list_selected_classes(&self, email: &str) -> StoreResult<Vec<SelectedClass>>;
    async fn insert_selected_class(&self, item: NewSelectedClass) -> StoreResult<Uuid>;
    async fn get_selected_class(&self, id: Uuid) -> StoreResult<Option<SelectedClass>>;
    /// Returns the number of deleted rows (0 or 1).
    async fn delete_selected_class(&self, id: Uuid) -> StoreResult<u64>;
}

/// RepositoryState
///
/// Shared handle to the data store used by the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL (schema in `migrations/0001_init.sql`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CLASS_COLUMNS: &str =
    "id, name, image, instructor_name, email, available_seats, price, students, created_at";

const SELECTED_CLASS_COLUMNS: &str =
    "id, email, class_id, name, image, instructor_name, price, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, photo_url, role FROM users ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, photo_url, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// insert_user
    ///
    /// Relies on the unique index on `email`, so two concurrent registrations
    /// of the same address still produce a single row.
    async fn insert_user(&self, req: RegisterUserRequest) -> StoreResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (id, email, name, photo_url, role, created_at)
            VALUES ($1, $2, $3, $4, NULL, NOW())
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.email)
        .bind(req.name)
        .bind(req.photo_url)
        .fetch_optional(&self.pool)
        .await
    }

    /// set_user_role
    ///
    /// Reports matched and modified counts separately; assigning the role a
    /// user already holds matches one row and modifies none.
    async fn set_user_role(&self, id: Uuid, role: Role) -> StoreResult<UpdateAck> {
        let (matched, modified) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (
                SELECT id, role FROM users WHERE id = $1 FOR UPDATE
            ), updated AS (
                UPDATE users u SET role = $2
                FROM target t
                WHERE u.id = t.id AND t.role IS DISTINCT FROM $2
                RETURNING u.id
            )
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM updated)
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(UpdateAck::new(matched as u64, modified as u64))
    }

    async fn list_classes(&self, email: Option<&str>) -> StoreResult<Vec<Class>> {
        let query = format!(
            "SELECT {CLASS_COLUMNS} FROM classes \
             WHERE ($1::text IS NULL OR email = $1) \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Class>(&query)
            .bind(email)
            .fetch_all(&self.pool)
            .await
    }

    async fn insert_class(&self, req: CreateClassRequest, email: &str) -> StoreResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO classes
                (id, name, image, instructor_name, email, available_seats, price, students, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, NOW())
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.image)
        .bind(req.instructor_name)
        .bind(email)
        .bind(req.available_seats)
        .bind(req.price)
        .fetch_one(&self.pool)
        .await
    }

    async fn popular_classes(&self, limit: i64) -> StoreResult<Vec<Class>> {
        let query = format!(
            "SELECT {CLASS_COLUMNS} FROM classes ORDER BY students DESC, created_at DESC LIMIT $1"
        );
        sqlx::query_as::<_, Class>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_selected_classes(&self, email: &str) -> StoreResult<Vec<SelectedClass>> {
        let query = format!(
            "SELECT {SELECTED_CLASS_COLUMNS} FROM selected_classes \
             WHERE email = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, SelectedClass>(&query)
            .bind(email)
            .fetch_all(&self.pool)
            .await
    }

    async fn insert_selected_class(&self, item: NewSelectedClass) -> StoreResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO selected_classes
                (id, email, class_id, name, image, instructor_name, price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(item.email)
        .bind(item.class_id)
        .bind(item.name)
        .bind(item.image)
        .bind(item.instructor_name)
        .bind(item.price)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_selected_class(&self, id: Uuid) -> StoreResult<Option<SelectedClass>> {
        let query = format!("SELECT {SELECTED_CLASS_COLUMNS} FROM selected_classes WHERE id = $1");
        sqlx::query_as::<_, SelectedClass>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_selected_class(&self, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM selected_classes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// rank_by_enrolment
///
/// Orders classes by `students` descending and keeps the first `limit`.
/// Ties keep their incoming order.
pub fn rank_by_enrolment(mut classes: Vec<Class>, limit: usize) -> Vec<Class> {
    classes.sort_by(|a, b| b.students.cmp(&a.students));
    classes.truncate(limit);
    classes
}

// --- In-Memory Implementation (tests and local demos) ---

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    classes: Vec<Class>,
    selected_classes: Vec<SelectedClass>,
}

/// InMemoryRepository
///
/// A `Repository` that keeps everything in process memory. Used to exercise
/// handlers and routers without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    /// When true, every operation fails with a store error.
    pub should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol(
                "in-memory store configured to fail".to_string(),
            ));
        }
        Ok(())
    }

    /// Inserts a user record as-is, role included.
    pub async fn seed_user(&self, user: User) {
        self.tables.write().await.users.push(user);
    }

    pub async fn seed_class(&self, class: Class) {
        self.tables.write().await.classes.push(class);
    }

    pub async fn seed_selected_class(&self, item: SelectedClass) {
        self.tables.write().await.selected_classes.push(item);
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

// Newest first; later insertions win ties so equal timestamps still sort sensibly.
fn newest_first(mut classes: Vec<Class>) -> Vec<Class> {
    classes.reverse();
    classes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    classes
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.check()?;
        Ok(self.tables.read().await.users.clone())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, req: RegisterUserRequest) -> StoreResult<Option<Uuid>> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == req.email) {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        tables.users.push(User {
            id,
            email: req.email,
            name: req.name,
            photo_url: req.photo_url,
            role: None,
        });
        Ok(Some(id))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> StoreResult<UpdateAck> {
        self.check()?;
        let mut tables = self.tables.write().await;
        match tables.users.iter_mut().find(|u| u.id == id) {
            Some(user) if user.role == Some(role) => Ok(UpdateAck::new(1, 0)),
            Some(user) => {
                user.role = Some(role);
                Ok(UpdateAck::new(1, 1))
            }
            None => Ok(UpdateAck::new(0, 0)),
        }
    }

    async fn list_classes(&self, email: Option<&str>) -> StoreResult<Vec<Class>> {
        self.check()?;
        let tables = self.tables.read().await;
        let owned = tables
            .classes
            .iter()
            .filter(|c| email.is_none_or(|e| c.email == e))
            .cloned()
            .collect();
        Ok(newest_first(owned))
    }

    async fn insert_class(&self, req: CreateClassRequest, email: &str) -> StoreResult<Uuid> {
        self.check()?;
        let id = Uuid::new_v4();
        self.tables.write().await.classes.push(Class {
            id,
            name: req.name,
            image: req.image,
            instructor_name: req.instructor_name,
            email: email.to_string(),
            available_seats: req.available_seats,
            price: req.price,
            students: 0,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn popular_classes(&self, limit: i64) -> StoreResult<Vec<Class>> {
        self.check()?;
        let classes = newest_first(self.tables.read().await.classes.clone());
        Ok(rank_by_enrolment(classes, limit.max(0) as usize))
    }

    async fn list_selected_classes(&self, email: &str) -> StoreResult<Vec<SelectedClass>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .selected_classes
            .iter()
            .filter(|s| s.email == email)
            .cloned()
            .collect())
    }

    async fn insert_selected_class(&self, item: NewSelectedClass) -> StoreResult<Uuid> {
        self.check()?;
        let id = Uuid::new_v4();
        self.tables.write().await.selected_classes.push(SelectedClass {
            id,
            email: item.email,
            class_id: item.class_id,
            name: item.name,
            image: item.image,
            instructor_name: item.instructor_name,
            price: item.price,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get_selected_class(&self, id: Uuid) -> StoreResult<Option<SelectedClass>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.selected_classes.iter().find(|s| s.id == id).cloned())
    }

    async fn delete_selected_class(&self, id: Uuid) -> StoreResult<u64> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.selected_classes.len();
        tables.selected_classes.retain(|s| s.id != id);
        Ok((before - tables.selected_classes.len()) as u64)
    }
}
