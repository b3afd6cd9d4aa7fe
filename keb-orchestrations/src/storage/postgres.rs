use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keb_models::{Credential, HyperscalerType, Instance, Operation, OperationState, OperationType};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{Credentials, Error, Instances, Operations, Result};

const SCHEMA: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS keb",
    r#"
    CREATE TABLE IF NOT EXISTS keb.instances (
        instance_id TEXT PRIMARY KEY,
        service_id TEXT NOT NULL,
        plan_id TEXT NOT NULL,
        global_account_id TEXT NOT NULL,
        sub_account_id TEXT NOT NULL,
        runtime_id TEXT,
        dashboard_url TEXT NOT NULL DEFAULT '',
        provisioning_parameters TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        version INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS keb.operations (
        id TEXT PRIMARY KEY,
        instance_id TEXT NOT NULL,
        type TEXT NOT NULL,
        state TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        provisioner_operation_id TEXT,
        runtime_id TEXT,
        provisioning_parameters TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        version INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_operations_instance ON keb.operations (instance_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_operations_type_state ON keb.operations (type, state)",
    r#"
    CREATE TABLE IF NOT EXISTS keb.hyperscaler_credentials (
        name TEXT PRIMARY KEY,
        hyperscaler_type TEXT NOT NULL,
        tenant_name TEXT,
        assigned_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_credentials_tenant
        ON keb.hyperscaler_credentials (hyperscaler_type, tenant_name)
        WHERE tenant_name IS NOT NULL
    "#,
];

/// Create the `keb` schema and its tables if they do not exist yet.
pub async fn initialize_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| Error::Internal(format!("Failed to initialize schema: {}", e)))?;
    }
    Ok(())
}

const INSTANCE_COLUMNS: &str = "instance_id, service_id, plan_id, global_account_id, sub_account_id, \
     runtime_id, dashboard_url, provisioning_parameters, created_at, updated_at, version";

const OPERATION_COLUMNS: &str = "id, instance_id, type, state, description, provisioner_operation_id, \
     runtime_id, provisioning_parameters, created_at, updated_at, version";

/// Postgres-backed implementation of all three stores.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn operation_exists(&self, operation_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM keb.operations WHERE id = $1")
            .bind(operation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("check operation", e))?;
        Ok(row.is_some())
    }

    async fn instance_exists(&self, instance_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM keb.instances WHERE instance_id = $1")
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("check instance", e))?;
        Ok(row.is_some())
    }
}

fn db_error(action: &str, e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            Error::Conflict(format!("Failed to {}: {}", action, db_err.message()))
        }
        _ => Error::Internal(format!("Failed to {}: {}", action, e)),
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| Error::Internal(format!("Failed to read column {}: {}", name, e)))
}

fn instance_from_row(row: &PgRow) -> Result<Instance> {
    Ok(Instance {
        instance_id: column(row, "instance_id")?,
        service_id: column(row, "service_id")?,
        plan_id: column(row, "plan_id")?,
        global_account_id: column(row, "global_account_id")?,
        sub_account_id: column(row, "sub_account_id")?,
        runtime_id: column(row, "runtime_id")?,
        dashboard_url: column(row, "dashboard_url")?,
        provisioning_parameters: column(row, "provisioning_parameters")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
        version: column(row, "version")?,
    })
}

fn operation_from_row(row: &PgRow) -> Result<Operation> {
    let kind: String = column(row, "type")?;
    let state: String = column(row, "state")?;
    Ok(Operation {
        id: column(row, "id")?,
        instance_id: column(row, "instance_id")?,
        kind: kind.parse().map_err(|e| Error::Internal(format!("{}", e)))?,
        state: state.parse().map_err(|e| Error::Internal(format!("{}", e)))?,
        description: column(row, "description")?,
        provisioner_operation_id: column(row, "provisioner_operation_id")?,
        runtime_id: column(row, "runtime_id")?,
        provisioning_parameters: column(row, "provisioning_parameters")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
        version: column(row, "version")?,
    })
}

fn credential_from_row(row: &PgRow) -> Result<Credential> {
    let hyperscaler_type: String = column(row, "hyperscaler_type")?;
    Ok(Credential {
        name: column(row, "name")?,
        hyperscaler_type: hyperscaler_type
            .parse()
            .map_err(|e| Error::Internal(format!("{}", e)))?,
        tenant_name: column(row, "tenant_name")?,
    })
}

#[async_trait]
impl Instances for PostgresStorage {
    async fn insert(&self, instance: Instance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO keb.instances
            (instance_id, service_id, plan_id, global_account_id, sub_account_id,
             runtime_id, dashboard_url, provisioning_parameters, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&instance.instance_id)
        .bind(&instance.service_id)
        .bind(&instance.plan_id)
        .bind(&instance.global_account_id)
        .bind(&instance.sub_account_id)
        .bind(&instance.runtime_id)
        .bind(&instance.dashboard_url)
        .bind(&instance.provisioning_parameters)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .bind(instance.version)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert instance", e))?;
        Ok(())
    }

    async fn get_by_id(&self, instance_id: &str) -> Result<Instance> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM keb.instances WHERE instance_id = $1",
            INSTANCE_COLUMNS
        ))
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get instance", e))?
        .ok_or_else(|| Error::not_found("instance", instance_id))?;

        instance_from_row(&row)
    }

    async fn update(&self, instance: Instance) -> Result<Instance> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE keb.instances
            SET runtime_id = $2,
                dashboard_url = $3,
                updated_at = NOW(),
                version = version + 1
            WHERE instance_id = $1 AND version = $4
            RETURNING {}
            "#,
            INSTANCE_COLUMNS
        ))
        .bind(&instance.instance_id)
        .bind(&instance.runtime_id)
        .bind(&instance.dashboard_url)
        .bind(instance.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update instance", e))?;

        if let Some(row) = row {
            return instance_from_row(&row);
        }
        if self.instance_exists(&instance.instance_id).await? {
            Err(Error::Conflict(format!(
                "instance '{}' update conflict",
                instance.instance_id
            )))
        } else {
            Err(Error::not_found("instance", instance.instance_id))
        }
    }
}

#[async_trait]
impl Operations for PostgresStorage {
    async fn insert_operation(&self, operation: Operation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO keb.operations
            (id, instance_id, type, state, description, provisioner_operation_id,
             runtime_id, provisioning_parameters, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&operation.id)
        .bind(&operation.instance_id)
        .bind(operation.kind.as_str())
        .bind(operation.state.as_str())
        .bind(&operation.description)
        .bind(&operation.provisioner_operation_id)
        .bind(&operation.runtime_id)
        .bind(&operation.provisioning_parameters)
        .bind(operation.created_at)
        .bind(operation.updated_at)
        .bind(operation.version)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert operation", e))?;
        Ok(())
    }

    async fn get_operation_by_id(&self, operation_id: &str) -> Result<Operation> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM keb.operations WHERE id = $1",
            OPERATION_COLUMNS
        ))
        .bind(operation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get operation", e))?
        .ok_or_else(|| Error::not_found("operation", operation_id))?;

        operation_from_row(&row)
    }

    async fn get_operation_by_instance_id(&self, instance_id: &str) -> Result<Operation> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM keb.operations WHERE instance_id = $1 ORDER BY created_at DESC LIMIT 1",
            OPERATION_COLUMNS
        ))
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get operation by instance", e))?
        .ok_or_else(|| Error::not_found("operation for instance", instance_id))?;

        operation_from_row(&row)
    }

    async fn get_operation_by_type_and_instance_id(
        &self,
        instance_id: &str,
        kind: OperationType,
    ) -> Result<Operation> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM keb.operations
            WHERE instance_id = $1 AND type = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            OPERATION_COLUMNS
        ))
        .bind(instance_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get operation by type and instance", e))?
        .ok_or_else(|| {
            Error::not_found("operation for instance", format!("{} ({})", instance_id, kind))
        })?;

        operation_from_row(&row)
    }

    async fn get_operations_in_state(
        &self,
        kind: OperationType,
        state: OperationState,
    ) -> Result<Vec<Operation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM keb.operations WHERE type = $1 AND state = $2 ORDER BY created_at",
            OPERATION_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list operations", e))?;

        rows.iter().map(operation_from_row).collect()
    }

    async fn update_operation(&self, operation: Operation) -> Result<Operation> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE keb.operations
            SET state = $2,
                description = $3,
                provisioner_operation_id = $4,
                runtime_id = $5,
                updated_at = NOW(),
                version = version + 1
            WHERE id = $1 AND version = $6
            RETURNING {}
            "#,
            OPERATION_COLUMNS
        ))
        .bind(&operation.id)
        .bind(operation.state.as_str())
        .bind(&operation.description)
        .bind(&operation.provisioner_operation_id)
        .bind(&operation.runtime_id)
        .bind(operation.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update operation", e))?;

        if let Some(row) = row {
            return operation_from_row(&row);
        }
        if self.operation_exists(&operation.id).await? {
            Err(Error::Conflict(format!(
                "operation '{}' update conflict",
                operation.id
            )))
        } else {
            Err(Error::not_found("operation", operation.id))
        }
    }
}

#[async_trait]
impl Credentials for PostgresStorage {
    async fn register(&self, credential: Credential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO keb.hyperscaler_credentials (name, hyperscaler_type, tenant_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&credential.name)
        .bind(credential.hyperscaler_type.as_str())
        .bind(&credential.tenant_name)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("register credential", e))?;
        Ok(())
    }

    async fn find_assigned(
        &self,
        hyperscaler_type: HyperscalerType,
        tenant_name: &str,
    ) -> Result<Option<Credential>> {
        let row = sqlx::query(
            r#"
            SELECT name, hyperscaler_type, tenant_name
            FROM keb.hyperscaler_credentials
            WHERE hyperscaler_type = $1 AND tenant_name = $2
            "#,
        )
        .bind(hyperscaler_type.as_str())
        .bind(tenant_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find assigned credential", e))?;

        row.as_ref().map(credential_from_row).transpose()
    }

    async fn find_unassigned(&self, hyperscaler_type: HyperscalerType) -> Result<Option<Credential>> {
        let row = sqlx::query(
            r#"
            SELECT name, hyperscaler_type, tenant_name
            FROM keb.hyperscaler_credentials
            WHERE hyperscaler_type = $1 AND tenant_name IS NULL
            ORDER BY name
            LIMIT 1
            "#,
        )
        .bind(hyperscaler_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find unassigned credential", e))?;

        row.as_ref().map(credential_from_row).transpose()
    }

    async fn bind(&self, credential_name: &str, tenant_name: &str) -> Result<Credential> {
        let row = sqlx::query(
            r#"
            UPDATE keb.hyperscaler_credentials
            SET tenant_name = $2, assigned_at = NOW()
            WHERE name = $1 AND tenant_name IS NULL
            RETURNING name, hyperscaler_type, tenant_name
            "#,
        )
        .bind(credential_name)
        .bind(tenant_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("bind credential", e))?;

        match row {
            Some(row) => credential_from_row(&row),
            None => Err(Error::Conflict(format!(
                "credential '{}' is already assigned",
                credential_name
            ))),
        }
    }
}
