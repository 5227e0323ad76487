//! # Employee Repository
//!
//! Employee records with generated role codes (`ADM001`, `BIL003`, ...).
//! The code comes from the per-role sequence counter, advanced in its
//! own committed statement before the insert, with the UNIQUE constraint
//! on `employee_code` as the safety net and a bounded retry on collision.
//!
//! Password hashing and token issuance happen outside this workspace;
//! the hash arrives and is stored as an opaque string.

use chrono::Utc;
use kirana_core::{
    sequence, CoreError, CoreResult, Employee, Role, MAX_SEQUENCE_RETRIES,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbError;
use crate::sequence::next_in_namespace;

// ============================================================================
// Input Types
// ============================================================================

/// Input for creating an employee.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub username: String,
    pub mobile: Option<String>,
    /// Opaque hash produced by the external auth capability.
    pub password_hash: String,
    pub role: Role,
}

// ============================================================================
// Employee Repository
// ============================================================================

#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an employee with a generated role code.
    pub async fn create(&self, new: NewEmployee) -> CoreResult<Employee> {
        kirana_core::validate_name("username", &new.username)?;
        if let Some(mobile) = &new.mobile {
            kirana_core::validate_mobile(mobile)?;
        }

        for attempt in 1..=MAX_SEQUENCE_RETRIES {
            match self.try_create(&new).await {
                Ok(employee) => {
                    info!(
                        employee_id = employee.id,
                        employee_code = %employee.employee_code,
                        role = ?employee.role,
                        "employee created"
                    );
                    return Ok(employee);
                }
                Err(CoreError::DuplicateIdentifier(code)) => {
                    warn!(attempt, code = %code, "employee code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::Conflict(
            "employee code generation kept colliding".into(),
        ))
    }

    async fn try_create(&self, new: &NewEmployee) -> CoreResult<Employee> {
        // Counter advance commits on its own connection so a rolled-back
        // insert cannot rewind it; a retry draws a fresh code.
        let seq = {
            let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
            next_in_namespace(&mut conn, &sequence::employee_namespace(new.role)).await?
        };
        let code = sequence::format_employee_code(new.role, seq);
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let inserted = sqlx::query_as::<_, Employee>(
            r#"
            INSERT INTO employees
                (employee_code, username, mobile, password_hash, role,
                 is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
            RETURNING *
            "#,
        )
        .bind(&code)
        .bind(new.username.trim())
        .bind(&new.mobile)
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(employee) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(employee)
            }
            Err(e) => {
                let db_err = DbError::from(e);
                tx.rollback().await.ok();
                if db_err.is_unique_violation() {
                    Err(CoreError::DuplicateIdentifier(code))
                } else {
                    Err(db_err.into())
                }
            }
        }
    }

    pub async fn get_by_id(&self, id: i64) -> CoreResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(employee)
    }

    pub async fn find_by_username(&self, username: &str) -> CoreResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(
            "SELECT * FROM employees WHERE username = ?1 AND is_active = 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(employee)
    }

    pub async fn list(&self) -> CoreResult<Vec<Employee>> {
        let employees =
            sqlx::query_as::<_, Employee>("SELECT * FROM employees ORDER BY employee_code")
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::from)?;

        Ok(employees)
    }

    /// Change an employee's role. The employee code keeps its original
    /// role prefix; codes identify, they do not authorize.
    pub async fn set_role(&self, id: i64, role: Role) -> CoreResult<()> {
        let result = sqlx::query("UPDATE employees SET role = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(role)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!("employee {id} not found")));
        }
        info!(employee_id = id, role = ?role, "employee role changed");
        Ok(())
    }

    /// Deactivate an employee, keeping the row for billing history.
    pub async fn deactivate(&self, id: i64, reason: Option<&str>) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE employees
            SET is_active = 0, inactive_reason = ?2, updated_at = ?3
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!(
                "employee {id} not found or already inactive"
            )));
        }
        info!(employee_id = id, "employee deactivated");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
