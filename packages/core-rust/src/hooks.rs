//! Write-path interceptors.
//!
//! Every insert, update and delete issued through
//! [`Database`](crate::database::Database) passes through a
//! [`LifecycleHook`] chain before it reaches the session. The
//! [`TenantGuardHook`] installed by default stamps tenants on new rows and
//! rejects writes that cross a tenant boundary, regardless of which code
//! path issued them.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::StampPolicy;
use crate::context::TenantContextManager;
use crate::entity::{Row, TableMeta};
use crate::error::{TenantError, TenantResult};
use crate::types::TenantId;

/// Per-write switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip access checks and the no-context failure. Tenant immutability
    /// is still enforced.
    pub skip_tenant_check: bool,
    /// Tenant to act as instead of the ambient one.
    pub tenant_id: Option<TenantId>,
}

impl WriteOptions {
    #[must_use]
    pub fn checked() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn unchecked() -> Self {
        Self {
            skip_tenant_check: true,
            tenant_id: None,
        }
    }

    #[must_use]
    pub fn acting_as(tenant_id: TenantId) -> Self {
        Self {
            skip_tenant_check: false,
            tenant_id: Some(tenant_id),
        }
    }
}

/// Interceptor invoked before rows are written.
///
/// Hooks may modify the outgoing row. Returning an error aborts the write
/// before anything reaches storage.
///
/// Used as `Arc<dyn LifecycleHook>`.
pub trait LifecycleHook: Send + Sync {
    fn before_insert(
        &self,
        _meta: &TableMeta,
        _row: &mut Row,
        _options: &WriteOptions,
    ) -> TenantResult<()> {
        Ok(())
    }

    /// Called once for the whole batch; an error aborts every row.
    fn before_bulk_insert(
        &self,
        _meta: &TableMeta,
        _rows: &mut [Row],
        _options: &WriteOptions,
    ) -> TenantResult<()> {
        Ok(())
    }

    /// `stored` is the row as currently persisted.
    fn before_update(
        &self,
        _meta: &TableMeta,
        _stored: &Row,
        _row: &mut Row,
        _options: &WriteOptions,
    ) -> TenantResult<()> {
        Ok(())
    }

    fn before_delete(
        &self,
        _meta: &TableMeta,
        _stored: &Row,
        _options: &WriteOptions,
    ) -> TenantResult<()> {
        Ok(())
    }
}

/// Runs hooks in registration order, stopping at the first error.
#[derive(Default, Clone)]
pub struct CompositeHook {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl CompositeHook {
    #[must_use]
    pub fn new(hooks: Vec<Arc<dyn LifecycleHook>>) -> Self {
        Self { hooks }
    }

    pub fn add(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl LifecycleHook for CompositeHook {
    fn before_insert(
        &self,
        meta: &TableMeta,
        row: &mut Row,
        options: &WriteOptions,
    ) -> TenantResult<()> {
        for hook in &self.hooks {
            hook.before_insert(meta, row, options)?;
        }
        Ok(())
    }

    fn before_bulk_insert(
        &self,
        meta: &TableMeta,
        rows: &mut [Row],
        options: &WriteOptions,
    ) -> TenantResult<()> {
        for hook in &self.hooks {
            hook.before_bulk_insert(meta, rows, options)?;
        }
        Ok(())
    }

    fn before_update(
        &self,
        meta: &TableMeta,
        stored: &Row,
        row: &mut Row,
        options: &WriteOptions,
    ) -> TenantResult<()> {
        for hook in &self.hooks {
            hook.before_update(meta, stored, row, options)?;
        }
        Ok(())
    }

    fn before_delete(
        &self,
        meta: &TableMeta,
        stored: &Row,
        options: &WriteOptions,
    ) -> TenantResult<()> {
        for hook in &self.hooks {
            hook.before_delete(meta, stored, options)?;
        }
        Ok(())
    }
}

/// Enforces tenant ownership on every write to a tenant-scoped table.
///
/// - insert: stamps the acting tenant when the row has none, per
///   `insert_stamping`; rows must target an active tenant the context may
///   write to.
/// - bulk insert: same, per `bulk_insert_stamping`, decided for the whole
///   batch before any row is written.
/// - update: the persisted tenant may not change, and the context must own
///   the row.
/// - delete: the context must own the row.
pub struct TenantGuardHook {
    manager: Arc<TenantContextManager>,
}

impl TenantGuardHook {
    #[must_use]
    pub fn new(manager: Arc<TenantContextManager>) -> Self {
        Self { manager }
    }

    fn acting_tenant(&self, options: &WriteOptions) -> Option<TenantId> {
        options
            .tenant_id
            .or_else(|| self.manager.get_current_tenant_id())
    }

    /// Stamp `row` if it has no tenant. Returns the row's tenant afterwards.
    fn stamp(
        &self,
        meta: &TableMeta,
        row: &mut Row,
        acting: Option<TenantId>,
        policy: StampPolicy,
        options: &WriteOptions,
        operation: &'static str,
    ) -> TenantResult<Option<TenantId>> {
        if let Some(existing) = meta.row_tenant(row) {
            return Ok(Some(existing));
        }
        match acting {
            Some(tenant_id) => {
                meta.stamp(row, tenant_id);
                Ok(Some(tenant_id))
            }
            None if options.skip_tenant_check || policy == StampPolicy::BestEffort => {
                debug!(table = meta.table, operation, "row left without a tenant");
                Ok(None)
            }
            None => Err(TenantError::NoContext { operation }),
        }
    }

    /// A new row may only target an active tenant the context may write to.
    fn check_new_row(
        &self,
        tenant_id: Option<TenantId>,
        options: &WriteOptions,
    ) -> TenantResult<()> {
        let Some(tenant_id) = tenant_id else {
            return Ok(());
        };
        if options.skip_tenant_check {
            return Ok(());
        }
        if !self.manager.validate_tenant_id(tenant_id) {
            return Err(TenantError::InvalidTenant { tenant_id });
        }
        if !self.manager.check_access(Some(tenant_id), options.tenant_id) {
            return Err(TenantError::denied(
                Some(tenant_id),
                "row targets a tenant outside the acting context",
            ));
        }
        Ok(())
    }

    fn check_owner(
        &self,
        owner: Option<TenantId>,
        options: &WriteOptions,
        reason: &'static str,
    ) -> TenantResult<()> {
        if options.skip_tenant_check {
            return Ok(());
        }
        if let Some(tenant_id) = owner {
            if !self.manager.validate_tenant_id(tenant_id) {
                return Err(TenantError::InvalidTenant { tenant_id });
            }
        }
        if self.manager.check_access(owner, options.tenant_id) {
            Ok(())
        } else {
            Err(TenantError::denied(owner, reason))
        }
    }
}

impl LifecycleHook for TenantGuardHook {
    fn before_insert(
        &self,
        meta: &TableMeta,
        row: &mut Row,
        options: &WriteOptions,
    ) -> TenantResult<()> {
        if !meta.is_tenant_scoped() {
            return Ok(());
        }
        let acting = self.acting_tenant(options);
        let policy = self.manager.config().insert_stamping;
        let tenant_id = self.stamp(meta, row, acting, policy, options, "insert")?;
        self.check_new_row(tenant_id, options)
    }

    fn before_bulk_insert(
        &self,
        meta: &TableMeta,
        rows: &mut [Row],
        options: &WriteOptions,
    ) -> TenantResult<()> {
        if !meta.is_tenant_scoped() {
            return Ok(());
        }
        let acting = self.acting_tenant(options);
        let policy = self.manager.config().bulk_insert_stamping;

        let mut unstamped = 0usize;
        for row in rows.iter_mut() {
            let tenant_id = self.stamp(meta, row, acting, policy, options, "bulk insert")?;
            if tenant_id.is_none() {
                unstamped += 1;
            }
            self.check_new_row(tenant_id, options)?;
        }
        if unstamped > 0 {
            warn!(table = meta.table, unstamped, "bulk insert left rows without a tenant");
        }
        Ok(())
    }

    fn before_update(
        &self,
        meta: &TableMeta,
        stored: &Row,
        row: &mut Row,
        options: &WriteOptions,
    ) -> TenantResult<()> {
        if !meta.is_tenant_scoped() {
            return Ok(());
        }
        let owner = meta.row_tenant(stored);
        match (owner, meta.row_tenant(row)) {
            (Some(owner), None) => meta.stamp(row, owner),
            (Some(owner), Some(incoming)) if owner != incoming => {
                return Err(TenantError::denied(
                    Some(owner),
                    "the tenant of a persisted row cannot change",
                ));
            }
            _ => {}
        }
        self.check_owner(owner, options, "row belongs to another tenant")
    }

    fn before_delete(
        &self,
        meta: &TableMeta,
        stored: &Row,
        options: &WriteOptions,
    ) -> TenantResult<()> {
        if !meta.is_tenant_scoped() {
            return Ok(());
        }
        self.check_owner(
            meta.row_tenant(stored),
            options,
            "row belongs to another tenant",
        )
    }
}
