//! Tenant-aware helpers available on every [`TenantScoped`] entity.

use crate::database::Database;
use crate::entity::{from_row, EntityKey, Row, TableMeta, TenantScoped};
use crate::error::{TenantError, TenantResult};
use crate::hooks::WriteOptions;
use crate::query::ScopedQuery;
use crate::types::TenantId;

/// Query, construction and persistence helpers scoped to a tenant.
///
/// Wherever a `tenant_id: Option<TenantId>` is accepted, `None` means "the
/// current tenant".
pub trait TenantModel: TenantScoped {
    /// Query pre-filtered to the resolved tenant.
    ///
    /// # Errors
    ///
    /// [`TenantError::NoContext`] if no tenant resolves.
    fn for_tenant(db: &Database, tenant_id: Option<TenantId>) -> TenantResult<ScopedQuery<'_, Self>> {
        let tenant_id = resolve(db, tenant_id, "for_tenant")?;
        Ok(db.query::<Self>().for_tenant(tenant_id))
    }

    /// Construct, without persisting, an entity owned by the resolved
    /// tenant from `fields`. Any tenant in `fields` is overwritten.
    ///
    /// # Errors
    ///
    /// [`TenantError::NoContext`] if no tenant resolves,
    /// [`TenantError::InvalidTenant`] if it is missing or inactive, and
    /// [`TenantError::MalformedRecord`] if `fields` do not form a `Self`.
    fn create_for_tenant(db: &Database, tenant_id: Option<TenantId>, fields: Row) -> TenantResult<Self> {
        let tenant_id = resolve_active(db, tenant_id, "create_for_tenant")?;
        build(tenant_id, fields)
    }

    /// Stamp every record with the resolved tenant and persist them as one
    /// batch. Nothing is written unless every record is accepted.
    ///
    /// # Errors
    ///
    /// As for [`TenantModel::create_for_tenant`], plus hook and storage
    /// failures.
    fn bulk_create_for_tenant(
        db: &Database,
        tenant_id: Option<TenantId>,
        records: Vec<Row>,
    ) -> TenantResult<Vec<Self>> {
        let tenant_id = resolve_active(db, tenant_id, "bulk_create_for_tenant")?;
        let mut entities = records
            .into_iter()
            .map(|fields| build(tenant_id, fields))
            .collect::<TenantResult<Vec<Self>>>()?;
        db.insert_batch(&mut entities, &WriteOptions::acting_as(tenant_id))?;
        Ok(entities)
    }

    /// Whether this entity belongs to the resolved tenant.
    ///
    /// With no tenant at all the configured missing-context rule decides;
    /// by default that only admits an unrestricted principal inside an
    /// explicit cross-tenant scope.
    fn validate_tenant_access(&self, db: &Database, tenant_id: Option<TenantId>) -> bool {
        db.manager().check_access(self.tenant_id(), tenant_id)
    }

    /// # Errors
    ///
    /// [`TenantError::AccessDenied`] when
    /// [`TenantModel::validate_tenant_access`] is false.
    fn ensure_tenant_access(&self, db: &Database, tenant_id: Option<TenantId>) -> TenantResult<()> {
        if self.validate_tenant_access(db, tenant_id) {
            Ok(())
        } else {
            Err(TenantError::denied(
                self.tenant_id(),
                "entity belongs to another tenant",
            ))
        }
    }

    /// Insert or update this entity, back-filling its tenant from context.
    ///
    /// # Errors
    ///
    /// [`TenantError::NoContext`] if neither the entity nor the context has
    /// a tenant, [`TenantError::AccessDenied`] when `validate` is set and
    /// the check fails, plus hook and storage failures.
    fn save(&mut self, db: &Database, validate: bool) -> TenantResult<EntityKey> {
        if validate && self.tenant_id().is_some() {
            self.ensure_tenant_access(db, None)?;
        }
        if self.tenant_id().is_none() {
            let tenant_id = db.manager().require_tenant_id("save")?;
            self.set_tenant_id(tenant_id);
        }

        let options = if validate {
            WriteOptions::checked()
        } else {
            WriteOptions::unchecked()
        };
        match self.key() {
            Some(key) => {
                db.update(self, &options)?;
                Ok(key)
            }
            None => db.insert(self, &options),
        }
    }

    /// Remove this entity.
    ///
    /// # Errors
    ///
    /// [`TenantError::AccessDenied`] when `validate` is set and the check
    /// fails, plus hook and storage failures.
    fn delete(&self, db: &Database, validate: bool) -> TenantResult<()> {
        let options = if validate {
            self.ensure_tenant_access(db, None)?;
            WriteOptions::checked()
        } else {
            WriteOptions::unchecked()
        };
        db.delete(self, &options)
    }
}

impl<E: TenantScoped> TenantModel for E {}

fn resolve(db: &Database, tenant_id: Option<TenantId>, operation: &'static str) -> TenantResult<TenantId> {
    match tenant_id {
        Some(tenant_id) => Ok(tenant_id),
        None => db.manager().require_tenant_id(operation),
    }
}

fn resolve_active(
    db: &Database,
    tenant_id: Option<TenantId>,
    operation: &'static str,
) -> TenantResult<TenantId> {
    let tenant_id = resolve(db, tenant_id, operation)?;
    if db.manager().validate_tenant_id(tenant_id) {
        Ok(tenant_id)
    } else {
        Err(TenantError::InvalidTenant { tenant_id })
    }
}

fn build<E: TenantScoped>(tenant_id: TenantId, mut fields: Row) -> TenantResult<E> {
    TableMeta::of::<E>().stamp(&mut fields, tenant_id);
    let mut entity: E = from_row(fields)?;
    entity.set_tenant_id(tenant_id);
    Ok(entity)
}
