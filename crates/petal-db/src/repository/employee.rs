//! # Employee Repository
//!
//! Staff records. `full_access` on an employee grants the same privileges as
//! an admin for everything except reviewing access requests and creating
//! accounts.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use petal_core::validation::validate_employee_input;
use petal_core::{Employee, EmployeeInput};

use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const EMPLOYEE_COLUMNS: &str = "id, identity_id, name, email, phone, position, zalo_name, \
     full_access, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    ctx: RepoContext,
}

impl EmployeeRepository {
    pub fn new(ctx: RepoContext) -> Self {
        EmployeeRepository { ctx }
    }

    pub async fn list(&self) -> DbResult<Vec<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY name");
        let employees = sqlx::query_as::<_, Employee>(&sql)
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(employees)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Employee>> {
        let mut conn = self.ctx.pool().acquire().await?;
        fetch_in(&mut conn, id).await
    }

    /// Creates a staff record without a login. Accounts with a login go
    /// through [`IdentityRepository::create_employee_account`](super::IdentityRepository::create_employee_account).
    pub async fn create(&self, input: &EmployeeInput, identity_id: Option<&str>) -> DbResult<Employee> {
        let input = validate_employee_input(input)?;
        self.ctx
            .write("create_employee", async {
                let mut conn = self.ctx.pool().acquire().await?;
                let employee = insert_employee_in(&mut conn, &input, identity_id).await?;
                let event = ChangeEvent::new(Collection::Employees, &employee.id, ChangeKind::Created);
                Ok((employee, vec![event]))
            })
            .await
    }

    pub async fn update(&self, id: &str, input: &EmployeeInput) -> DbResult<Employee> {
        let input = validate_employee_input(input)?;
        self.ctx
            .write("update_employee", async {
                let mut tx = self.ctx.pool().begin().await?;
                let result = sqlx::query(
                    r#"
                    UPDATE employees
                    SET name = ?1, email = ?2, phone = ?3, position = ?4,
                        zalo_name = ?5, full_access = ?6, updated_at = ?7
                    WHERE id = ?8
                    "#,
                )
                .bind(&input.name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.position)
                .bind(&input.zalo_name)
                .bind(input.full_access)
                .bind(Utc::now())
                .bind(id)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Employee", id));
                }

                let employee = fetch_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Employee", id))?;
                commit(tx).await?;

                info!(id, full_access = employee.full_access, "Employee updated");
                Ok((employee, vec![ChangeEvent::new(Collection::Employees, id, ChangeKind::Updated)]))
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        self.ctx
            .write("delete_employee", async {
                let result = sqlx::query("DELETE FROM employees WHERE id = ?1")
                    .bind(id)
                    .execute(self.ctx.pool())
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Employee", id));
                }
                info!(id, "Employee deleted");
                Ok(((), vec![ChangeEvent::new(Collection::Employees, id, ChangeKind::Deleted)]))
            })
            .await
    }
}

async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?1");
    let employee = sqlx::query_as::<_, Employee>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(employee)
}

/// Inserts an already validated employee on the given connection.
pub(crate) async fn insert_employee_in(
    conn: &mut SqliteConnection,
    input: &EmployeeInput,
    identity_id: Option<&str>,
) -> DbResult<Employee> {
    let now = Utc::now();
    let employee = Employee {
        id: Uuid::new_v4().to_string(),
        identity_id: identity_id.map(str::to_string),
        name: input.name.clone(),
        email: input.email.clone(),
        phone: input.phone.clone(),
        position: input.position.clone(),
        zalo_name: input.zalo_name.clone(),
        full_access: input.full_access,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO employees (
            id, identity_id, name, email, phone, position, zalo_name, full_access,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&employee.id)
    .bind(&employee.identity_id)
    .bind(&employee.name)
    .bind(&employee.email)
    .bind(&employee.phone)
    .bind(&employee.position)
    .bind(&employee.zalo_name)
    .bind(employee.full_access)
    .bind(employee.created_at)
    .bind(employee.updated_at)
    .execute(&mut *conn)
    .await?;

    info!(id = %employee.id, position = %employee.position, "Employee created");
    Ok(employee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn input(name: &str) -> EmployeeInput {
        EmployeeInput {
            name: name.into(),
            email: "ha@petal.vn".into(),
            phone: "0907654321".into(),
            position: "Florist".into(),
            zalo_name: None,
            full_access: false,
        }
    }

    #[tokio::test]
    async fn test_employee_crud() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.employees();

        let ha = repo.create(&input("Hà"), None).await.unwrap();
        assert!(!ha.full_access);

        let mut promoted = input("Hà");
        promoted.full_access = true;
        promoted.position = "Manager".into();
        let updated = repo.update(&ha.id, &promoted).await.unwrap();
        assert!(updated.full_access);
        assert_eq!(updated.position, "Manager");

        assert_eq!(repo.list().await.unwrap().len(), 1);
        repo.delete(&ha.id).await.unwrap();
        assert!(repo.get_by_id(&ha.id).await.unwrap().is_none());
        assert!(matches!(repo.delete(&ha.id).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_position_is_required() {
        let db = Database::in_memory().await.unwrap();
        let mut bad = input("Hà");
        bad.position = "  ".into();
        assert!(db.employees().create(&bad, None).await.is_err());
    }
}
