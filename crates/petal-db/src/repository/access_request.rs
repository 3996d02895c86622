//! # Access Request Repository
//!
//! Pending registrations. A row exists only while the request is pending:
//!
//! ```text
//!   submit ──► [pending] ──approve──► Customer | Employee record created,
//!                  │                  identity role set, request deleted
//!                  └──────reject───► request deleted
//! ```
//!
//! Approval runs in one transaction, so either the record exists and the
//! request is gone, or nothing changed.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use petal_core::validation::validate_access_request;
use petal_core::{
    AccessRequest, AccessRequestInput, ApprovedRecord, CustomerInput, EmployeeInput, RequestedRole,
};

use super::customer::insert_customer_in;
use super::employee::insert_employee_in;
use super::identity::set_role_in;
use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const REQUEST_COLUMNS: &str = "id, identity_id, requested_role, name, email, phone, address, \
     position, zalo_name, created_at";

#[derive(Debug, Clone)]
pub struct AccessRequestRepository {
    ctx: RepoContext,
}

impl AccessRequestRepository {
    pub fn new(ctx: RepoContext) -> Self {
        AccessRequestRepository { ctx }
    }

    /// Files a request. `identity_id` links it to the login that asked.
    pub async fn submit(
        &self,
        input: &AccessRequestInput,
        identity_id: Option<String>,
    ) -> DbResult<AccessRequest> {
        let input = validate_access_request(input)?;
        self.ctx
            .write("submit_access_request", async {
                let request = AccessRequest {
                    id: Uuid::new_v4().to_string(),
                    identity_id,
                    requested_role: input.requested_role,
                    name: input.name,
                    email: input.email,
                    phone: input.phone,
                    address: input.address,
                    position: input.position,
                    zalo_name: input.zalo_name,
                    created_at: Utc::now(),
                };

                sqlx::query(
                    r#"
                    INSERT INTO access_requests (
                        id, identity_id, requested_role, name, email, phone,
                        address, position, zalo_name, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                )
                .bind(&request.id)
                .bind(&request.identity_id)
                .bind(request.requested_role)
                .bind(&request.name)
                .bind(&request.email)
                .bind(&request.phone)
                .bind(&request.address)
                .bind(&request.position)
                .bind(&request.zalo_name)
                .bind(request.created_at)
                .execute(self.ctx.pool())
                .await?;

                info!(id = %request.id, role = ?request.requested_role, "Access request submitted");
                let event = ChangeEvent::new(Collection::AccessRequests, &request.id, ChangeKind::Created);
                Ok((request, vec![event]))
            })
            .await
    }

    /// Pending requests, oldest first.
    pub async fn list(&self) -> DbResult<Vec<AccessRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM access_requests ORDER BY created_at");
        let requests = sqlx::query_as::<_, AccessRequest>(&sql)
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(requests)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<AccessRequest>> {
        let mut conn = self.ctx.pool().acquire().await?;
        fetch_in(&mut conn, id).await
    }

    /// Creates the requested record from the request's contact fields and
    /// removes the request.
    pub async fn approve(&self, id: &str) -> DbResult<ApprovedRecord> {
        self.ctx
            .write("approve_access_request", async {
                let mut tx = self.ctx.pool().begin().await?;
                let request = fetch_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("AccessRequest", id))?;
                let identity_id = request.identity_id.as_deref();

                let (record, created) = match request.requested_role {
                    RequestedRole::Customer => {
                        let input = CustomerInput {
                            name: request.name.clone(),
                            phone: request.phone.clone(),
                            email: Some(request.email.clone()),
                            address: request.address.clone(),
                            zalo_name: request.zalo_name.clone(),
                            image_url: None,
                        };
                        let customer = insert_customer_in(&mut tx, &input, identity_id).await?;
                        let event =
                            ChangeEvent::new(Collection::Customers, &customer.id, ChangeKind::Created);
                        (ApprovedRecord::Customer(customer), event)
                    }
                    RequestedRole::Employee => {
                        let input = EmployeeInput {
                            name: request.name.clone(),
                            email: request.email.clone(),
                            phone: request.phone.clone(),
                            position: request.position.clone().unwrap_or_default(),
                            zalo_name: request.zalo_name.clone(),
                            full_access: false,
                        };
                        let employee = insert_employee_in(&mut tx, &input, identity_id).await?;
                        let event =
                            ChangeEvent::new(Collection::Employees, &employee.id, ChangeKind::Created);
                        (ApprovedRecord::Employee(employee), event)
                    }
                };

                let mut events = vec![created];
                if let Some(identity_id) = identity_id {
                    set_role_in(&mut tx, identity_id, request.requested_role.role()).await?;
                    events.push(ChangeEvent::new(
                        Collection::Identities,
                        identity_id,
                        ChangeKind::Updated,
                    ));
                }

                delete_in(&mut tx, id).await?;
                commit(tx).await?;

                info!(id, role = ?request.requested_role, "Access request approved");
                events.push(ChangeEvent::new(Collection::AccessRequests, id, ChangeKind::Deleted));
                Ok((record, events))
            })
            .await
    }

    /// Drops the request without creating anything.
    pub async fn reject(&self, id: &str) -> DbResult<()> {
        self.ctx
            .write("reject_access_request", async {
                let mut conn = self.ctx.pool().acquire().await?;
                delete_in(&mut conn, id).await?;
                info!(id, "Access request rejected");
                Ok(((), vec![ChangeEvent::new(Collection::AccessRequests, id, ChangeKind::Deleted)]))
            })
            .await
    }
}

async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<AccessRequest>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?1");
    let request = sqlx::query_as::<_, AccessRequest>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(request)
}

async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM access_requests WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("AccessRequest", id));
    }
    Ok(())
}
