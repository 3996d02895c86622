//! # Identity Repository
//!
//! Authentication identities: email, argon2 password hash and the stored
//! role the server consults on every authenticated request.
//!
//! ## Resolving an Actor
//! ```text
//! bearer token ──► identity id ──► auth_identities ⟕ employees
//!                                        │
//!                                        ▼
//!                       Actor { id, name, role, full_access }
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use petal_core::validation::{validate_email, validate_employee_input, validate_name};
use petal_core::{Actor, Employee, EmployeeInput, Identity, Role};

use super::employee::insert_employee_in;
use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const IDENTITY_COLUMNS: &str = "id, email, password_hash, role, display_name, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ActorRow {
    id: String,
    display_name: String,
    role: Role,
    full_access: bool,
}

#[derive(Debug, Clone)]
pub struct IdentityRepository {
    ctx: RepoContext,
}

impl IdentityRepository {
    pub fn new(ctx: RepoContext) -> Self {
        IdentityRepository { ctx }
    }

    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
        display_name: &str,
    ) -> DbResult<Identity> {
        let email = validate_email(email)?;
        let display_name = validate_name("display name", display_name)?;
        self.ctx
            .write("create_identity", async {
                let mut conn = self.ctx.pool().acquire().await?;
                let identity =
                    insert_identity_in(&mut conn, &email, password_hash, role, &display_name).await?;
                let event = ChangeEvent::new(Collection::Identities, &identity.id, ChangeKind::Created);
                Ok((identity, vec![event]))
            })
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM auth_identities WHERE id = ?1");
        let identity = sqlx::query_as::<_, Identity>(&sql)
            .bind(id)
            .fetch_optional(self.ctx.pool())
            .await?;
        Ok(identity)
    }

    /// Case-insensitive lookup.
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM auth_identities WHERE email = ?1");
        let identity = sqlx::query_as::<_, Identity>(&sql)
            .bind(email.trim())
            .fetch_optional(self.ctx.pool())
            .await?;
        Ok(identity)
    }

    pub async fn exists_by_email(&self, email: &str) -> DbResult<bool> {
        let mut conn = self.ctx.pool().acquire().await?;
        email_taken_in(&mut conn, email).await
    }

    pub async fn set_role(&self, id: &str, role: Role) -> DbResult<()> {
        self.ctx
            .write("set_role", async {
                let mut conn = self.ctx.pool().acquire().await?;
                set_role_in(&mut conn, id, role).await?;
                Ok(((), vec![ChangeEvent::new(Collection::Identities, id, ChangeKind::Updated)]))
            })
            .await
    }

    /// The acting principal for an identity, or `None` if it no longer exists.
    pub async fn actor(&self, id: &str) -> DbResult<Option<Actor>> {
        let row = sqlx::query_as::<_, ActorRow>(
            r#"
            SELECT i.id, i.display_name, i.role,
                   COALESCE(e.full_access, 0) AS full_access
            FROM auth_identities i
            LEFT JOIN employees e ON e.identity_id = i.id
            WHERE i.id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(self.ctx.pool())
        .await?;

        Ok(row.map(|r| Actor {
            id: r.id,
            name: r.display_name,
            role: r.role,
            full_access: r.full_access,
        }))
    }

    /// Creates a login identity with the employee role and its staff record
    /// in one transaction. Fails with `UniqueViolation` if the email is taken.
    pub async fn create_employee_account(
        &self,
        input: &EmployeeInput,
        password_hash: &str,
    ) -> DbResult<(Identity, Employee)> {
        let input = validate_employee_input(input)?;
        self.ctx
            .write("create_employee_account", async {
                let mut tx = self.ctx.pool().begin().await?;

                if email_taken_in(&mut tx, &input.email).await? {
                    return Err(DbError::duplicate("email", input.email.as_str()));
                }

                let identity =
                    insert_identity_in(&mut tx, &input.email, password_hash, Role::Employee, &input.name)
                        .await?;
                let employee = insert_employee_in(&mut tx, &input, Some(&identity.id)).await?;
                commit(tx).await?;

                let events = vec![
                    ChangeEvent::new(Collection::Identities, &identity.id, ChangeKind::Created),
                    ChangeEvent::new(Collection::Employees, &employee.id, ChangeKind::Created),
                ];
                Ok(((identity, employee), events))
            })
            .await
    }
}

async fn email_taken_in(conn: &mut SqliteConnection, email: &str) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM auth_identities WHERE email = ?1")
        .bind(email.trim())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

async fn insert_identity_in(
    conn: &mut SqliteConnection,
    email: &str,
    password_hash: &str,
    role: Role,
    display_name: &str,
) -> DbResult<Identity> {
    let identity = Identity {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role,
        display_name: display_name.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO auth_identities (id, email, password_hash, role, display_name, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&identity.id)
    .bind(&identity.email)
    .bind(&identity.password_hash)
    .bind(identity.role)
    .bind(&identity.display_name)
    .bind(identity.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: email.to_string(),
        },
        other => other,
    })?;

    info!(id = %identity.id, role = identity.role.as_str(), "Identity created");
    Ok(identity)
}

pub(crate) async fn set_role_in(conn: &mut SqliteConnection, id: &str, role: Role) -> DbResult<()> {
    let result = sqlx::query("UPDATE auth_identities SET role = ?1 WHERE id = ?2")
        .bind(role)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Identity", id));
    }
    info!(id, role = role.as_str(), "Identity role changed");
    Ok(())
}

/// Hashes a password for storage.
pub fn hash_password(password: &str) -> DbResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Checks a password against a stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn employee_input(email: &str) -> EmployeeInput {
        EmployeeInput {
            name: "Hà".into(),
            email: email.into(),
            phone: "0907654321".into(),
            position: "Florist".into(),
            zalo_name: Some("ha.florist".into()),
            full_access: false,
        }
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("hoa-hong-do").unwrap();
        assert!(verify_password("hoa-hong-do", &hash));
        assert!(!verify_password("hoa-hong-xanh", &hash));
        assert!(!verify_password("hoa-hong-do", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_actor_resolution() {
        let db = Database::in_memory().await.unwrap();
        let admin = db
            .identities()
            .create("owner@petal.vn", "x", Role::Admin, "Chủ tiệm")
            .await
            .unwrap();

        let actor = db.identities().actor(&admin.id).await.unwrap().unwrap();
        assert_eq!(actor.role, Role::Admin);
        assert!(!actor.full_access);
        assert!(actor.is_privileged());

        assert!(db.identities().actor("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_employee_account_carries_full_access() {
        let db = Database::in_memory().await.unwrap();
        let mut input = employee_input("manager@petal.vn");
        input.full_access = true;
        let (identity, employee) = db
            .identities()
            .create_employee_account(&input, "hash")
            .await
            .unwrap();

        assert_eq!(identity.role, Role::Employee);
        assert_eq!(employee.identity_id.as_deref(), Some(identity.id.as_str()));

        let actor = db.identities().actor(&identity.id).await.unwrap().unwrap();
        assert!(actor.full_access);
        assert!(actor.is_privileged());
    }

    #[tokio::test]
    async fn test_duplicate_email_creates_nothing() {
        let db = Database::in_memory().await.unwrap();
        db.identities()
            .create_employee_account(&employee_input("ha@petal.vn"), "hash")
            .await
            .unwrap();

        let err = db
            .identities()
            .create_employee_account(&employee_input("HA@petal.vn"), "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(db.employees().list().await.unwrap().len(), 1);
        assert!(db.identities().exists_by_email("Ha@Petal.vn").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_role() {
        let db = Database::in_memory().await.unwrap();
        let id = db
            .identities()
            .create("new@petal.vn", "x", Role::Pending, "Mới")
            .await
            .unwrap();
        db.identities().set_role(&id.id, Role::Customer).await.unwrap();
        let stored = db.identities().find_by_email("NEW@petal.vn").await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Customer);
    }
}
