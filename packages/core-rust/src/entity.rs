//! Persisted entity contracts.
//!
//! Whether a table is tenant-scoped is declared on the type through
//! [`Entity::TENANT_COLUMN`], so query scoping and write hooks dispatch on a
//! constant instead of probing rows at runtime. Below the typed layer every
//! entity travels as a [`Row`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{TenantError, TenantResult};
use crate::types::TenantId;

/// Conventional name of the tenant column.
pub const TENANT_ID_FIELD: &str = "tenant_id";

/// A stored record as a JSON object.
pub type Row = serde_json::Map<String, Value>;

/// Storage-assigned primary key.
pub type EntityKey = u64;

/// A type persisted through a [`Session`](crate::traits::Session).
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table the entity is stored in.
    const TABLE: &'static str;

    /// Column holding the owning tenant, or `None` for global tables that
    /// are never tenant-filtered.
    const TENANT_COLUMN: Option<&'static str> = None;

    /// Primary key, `None` until the entity is persisted.
    fn key(&self) -> Option<EntityKey>;

    fn set_key(&mut self, key: EntityKey);
}

/// Capability of entities that belong to exactly one tenant.
///
/// Implementors must also set [`Entity::TENANT_COLUMN`], normally to
/// [`TENANT_ID_FIELD`], and serialize the tenant under that column.
pub trait TenantScoped: Entity {
    fn tenant_id(&self) -> Option<TenantId>;

    fn set_tenant_id(&mut self, tenant_id: TenantId);
}

/// Static description of a table, used below the typed layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMeta {
    pub table: &'static str,
    pub tenant_column: Option<&'static str>,
}

impl TableMeta {
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        Self {
            table: E::TABLE,
            tenant_column: E::TENANT_COLUMN,
        }
    }

    #[must_use]
    pub fn is_tenant_scoped(&self) -> bool {
        self.tenant_column.is_some()
    }

    /// Tenant stored in `row`, if the table is scoped and the column holds
    /// an integer.
    #[must_use]
    pub fn row_tenant(&self, row: &Row) -> Option<TenantId> {
        let column = self.tenant_column?;
        row.get(column).and_then(Value::as_i64).map(TenantId)
    }

    /// Write `tenant_id` into the tenant column. No-op for global tables.
    pub fn stamp(&self, row: &mut Row, tenant_id: TenantId) {
        if let Some(column) = self.tenant_column {
            row.insert(column.to_owned(), Value::from(tenant_id.0));
        }
    }
}

/// Serialize an entity into a row.
///
/// # Errors
///
/// Returns [`TenantError::MalformedRecord`] if the entity does not serialize
/// to a JSON object.
pub fn encode<E: Entity>(entity: &E) -> TenantResult<Row> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(TenantError::MalformedRecord {
            table: E::TABLE,
            source: serde::de::Error::custom(format!("expected an object, got {other}")),
        }),
        Err(source) => Err(TenantError::MalformedRecord {
            table: E::TABLE,
            source,
        }),
    }
}

/// Build an unsaved entity from a row.
///
/// # Errors
///
/// Returns [`TenantError::MalformedRecord`] if the row does not match `E`.
pub fn from_row<E: Entity>(row: Row) -> TenantResult<E> {
    serde_json::from_value(Value::Object(row)).map_err(|source| TenantError::MalformedRecord {
        table: E::TABLE,
        source,
    })
}

/// Deserialize a stored row and attach its key.
///
/// # Errors
///
/// Returns [`TenantError::MalformedRecord`] if the row does not match `E`.
pub fn decode<E: Entity>(key: EntityKey, row: Row) -> TenantResult<E> {
    let mut entity: E = from_row(row)?;
    entity.set_key(key);
    Ok(entity)
}
