//! # Customer Repository
//!
//! Contact records for customers. A record may be linked to a login identity
//! (created on access-request approval) or stand alone (entered by staff).

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use petal_core::validation::validate_customer_input;
use petal_core::{Customer, CustomerInput};

use super::RepoContext;
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const CUSTOMER_COLUMNS: &str =
    "id, identity_id, name, phone, email, address, zalo_name, image_url, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    ctx: RepoContext,
}

impl CustomerRepository {
    pub fn new(ctx: RepoContext) -> Self {
        CustomerRepository { ctx }
    }

    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(customers)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(self.ctx.pool())
            .await?;
        Ok(customer)
    }

    /// The customer record linked to a login identity, if any.
    pub async fn get_by_identity(&self, identity_id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE identity_id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(identity_id)
            .fetch_optional(self.ctx.pool())
            .await?;
        Ok(customer)
    }

    pub async fn create(&self, input: &CustomerInput, identity_id: Option<&str>) -> DbResult<Customer> {
        let input = validate_customer_input(input)?;
        self.ctx
            .write("create_customer", async {
                let mut conn = self.ctx.pool().acquire().await?;
                let customer = insert_customer_in(&mut conn, &input, identity_id).await?;
                let event = ChangeEvent::new(Collection::Customers, &customer.id, ChangeKind::Created);
                Ok((customer, vec![event]))
            })
            .await
    }

    pub async fn update(&self, id: &str, input: &CustomerInput) -> DbResult<Customer> {
        let input = validate_customer_input(input)?;
        self.ctx
            .write("update_customer", async {
                let now = Utc::now();
                let result = sqlx::query(
                    r#"
                    UPDATE customers
                    SET name = ?1, phone = ?2, email = ?3, address = ?4,
                        zalo_name = ?5, image_url = ?6, updated_at = ?7
                    WHERE id = ?8
                    "#,
                )
                .bind(&input.name)
                .bind(&input.phone)
                .bind(&input.email)
                .bind(&input.address)
                .bind(&input.zalo_name)
                .bind(&input.image_url)
                .bind(now)
                .bind(id)
                .execute(self.ctx.pool())
                .await?;

                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Customer", id));
                }

                let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
                let customer = sqlx::query_as::<_, Customer>(&sql)
                    .bind(id)
                    .fetch_one(self.ctx.pool())
                    .await?;
                Ok((customer, vec![ChangeEvent::new(Collection::Customers, id, ChangeKind::Updated)]))
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        self.ctx
            .write("delete_customer", async {
                let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
                    .bind(id)
                    .execute(self.ctx.pool())
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Customer", id));
                }
                info!(id, "Customer deleted");
                Ok(((), vec![ChangeEvent::new(Collection::Customers, id, ChangeKind::Deleted)]))
            })
            .await
    }
}

/// Inserts an already validated customer on the given connection.
pub(crate) async fn insert_customer_in(
    conn: &mut SqliteConnection,
    input: &CustomerInput,
    identity_id: Option<&str>,
) -> DbResult<Customer> {
    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4().to_string(),
        identity_id: identity_id.map(str::to_string),
        name: input.name.clone(),
        phone: input.phone.clone(),
        email: input.email.clone(),
        address: input.address.clone(),
        zalo_name: input.zalo_name.clone(),
        image_url: input.image_url.clone(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO customers (
            id, identity_id, name, phone, email, address, zalo_name, image_url,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.identity_id)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.email)
    .bind(&customer.address)
    .bind(&customer.zalo_name)
    .bind(&customer.image_url)
    .bind(customer.created_at)
    .bind(customer.updated_at)
    .execute(&mut *conn)
    .await?;

    info!(id = %customer.id, linked = customer.identity_id.is_some(), "Customer created");
    Ok(customer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn input(name: &str) -> CustomerInput {
        CustomerInput {
            name: name.into(),
            phone: "0901234567".into(),
            email: Some("Lan@Example.com".into()),
            address: Some("12 Lê Lợi".into()),
            zalo_name: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_customer_crud() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.customers();

        let lan = repo.create(&input("  Lan "), None).await.unwrap();
        assert_eq!(lan.name, "Lan");
        assert_eq!(lan.email.as_deref(), Some("lan@example.com"));

        let mut changed = input("Lan Nguyễn");
        changed.zalo_name = Some("lan.ng".into());
        let updated = repo.update(&lan.id, &changed).await.unwrap();
        assert_eq!(updated.name, "Lan Nguyễn");
        assert_eq!(updated.zalo_name.as_deref(), Some("lan.ng"));

        assert_eq!(repo.list().await.unwrap().len(), 1);
        repo.delete(&lan.id).await.unwrap();
        assert!(repo.get_by_id(&lan.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_customer() {
        let db = Database::in_memory().await.unwrap();
        assert!(matches!(
            db.customers().update("nope", &input("Lan")).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            db.customers().delete("nope").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_bad_phone() {
        let db = Database::in_memory().await.unwrap();
        let mut bad = input("Lan");
        bad.phone = "12".into();
        assert!(db.customers().create(&bad, None).await.is_err());
        assert!(db.customers().list().await.unwrap().is_empty());
    }
}
