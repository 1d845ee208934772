//! Tenant-aware facade over a [`Session`].
//!
//! Reads go through [`ScopedQuery`]; writes go through the hook chain,
//! which always starts with a [`TenantGuardHook`].

use std::sync::Arc;

use crate::context::TenantContextManager;
use crate::entity::{decode, encode, Entity, EntityKey, TableMeta};
use crate::error::{TenantError, TenantResult};
use crate::hooks::{CompositeHook, LifecycleHook, TenantGuardHook, WriteOptions};
use crate::query::ScopedQuery;
use crate::traits::Session;

/// Session, context manager and write hooks bundled for application code.
#[derive(Clone)]
pub struct Database {
    session: Arc<dyn Session>,
    manager: Arc<TenantContextManager>,
    hooks: CompositeHook,
}

impl Database {
    #[must_use]
    pub fn new(session: Arc<dyn Session>, manager: Arc<TenantContextManager>) -> Self {
        let guard: Arc<dyn LifecycleHook> = Arc::new(TenantGuardHook::new(Arc::clone(&manager)));
        Self {
            session,
            manager,
            hooks: CompositeHook::new(vec![guard]),
        }
    }

    /// Append a hook after the tenant guard.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.add(hook);
        self
    }

    #[must_use]
    pub fn manager(&self) -> &TenantContextManager {
        &self.manager
    }

    /// Owned handle to the context manager, for integrations that outlive
    /// a borrow of the database.
    #[must_use]
    pub fn shared_manager(&self) -> Arc<TenantContextManager> {
        Arc::clone(&self.manager)
    }

    #[must_use]
    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    /// Start a tenant-scoped query over `E`.
    #[must_use]
    pub fn query<E: Entity>(&self) -> ScopedQuery<'_, E> {
        ScopedQuery::new(self.session.as_ref(), &self.manager)
    }

    /// Fetch by key within the current tenant.
    ///
    /// # Errors
    ///
    /// Same as [`ScopedQuery::one_or_none`].
    pub fn get<E: Entity>(&self, key: EntityKey) -> TenantResult<Option<E>> {
        self.query::<E>().filter_key(key).one_or_none()
    }

    /// Persist a new entity. On success `entity` carries its key and any
    /// tenant stamped by the hooks.
    ///
    /// # Errors
    ///
    /// Hook rejections, storage and encoding failures.
    pub fn insert<E: Entity>(
        &self,
        entity: &mut E,
        options: &WriteOptions,
    ) -> TenantResult<EntityKey> {
        let meta = TableMeta::of::<E>();
        let mut row = encode(entity)?;
        self.hooks.before_insert(&meta, &mut row, options)?;

        let key = self.session.insert(E::TABLE, row.clone())?;
        *entity = decode(key, row)?;
        Ok(key)
    }

    /// Persist every entity or none of them.
    ///
    /// # Errors
    ///
    /// Hook rejections abort the batch before anything is written.
    pub fn insert_batch<E: Entity>(
        &self,
        entities: &mut [E],
        options: &WriteOptions,
    ) -> TenantResult<Vec<EntityKey>> {
        let meta = TableMeta::of::<E>();
        let mut rows = entities.iter().map(encode).collect::<TenantResult<Vec<_>>>()?;
        self.hooks.before_bulk_insert(&meta, &mut rows, options)?;

        let keys = self.session.insert_batch(E::TABLE, rows.clone())?;
        for ((entity, key), row) in entities.iter_mut().zip(&keys).zip(rows) {
            *entity = decode(*key, row)?;
        }
        Ok(keys)
    }

    /// Write back a persisted entity.
    ///
    /// # Errors
    ///
    /// [`TenantError::NoResult`] if the entity has no key or its row is
    /// gone, otherwise hook rejections and storage failures.
    pub fn update<E: Entity>(&self, entity: &mut E, options: &WriteOptions) -> TenantResult<()> {
        let meta = TableMeta::of::<E>();
        let key = entity.key().ok_or(TenantError::NoResult { table: E::TABLE })?;
        let stored = self
            .session
            .get(E::TABLE, key)?
            .ok_or(TenantError::NoResult { table: E::TABLE })?;

        let mut row = encode(entity)?;
        self.hooks.before_update(&meta, &stored, &mut row, options)?;

        if !self.session.update(E::TABLE, key, row.clone())? {
            return Err(TenantError::NoResult { table: E::TABLE });
        }
        *entity = decode(key, row)?;
        Ok(())
    }

    /// Remove a persisted entity.
    ///
    /// # Errors
    ///
    /// [`TenantError::NoResult`] if the entity has no key or its row is
    /// gone, otherwise hook rejections and storage failures.
    pub fn delete<E: Entity>(&self, entity: &E, options: &WriteOptions) -> TenantResult<()> {
        let meta = TableMeta::of::<E>();
        let key = entity.key().ok_or(TenantError::NoResult { table: E::TABLE })?;
        let stored = self
            .session
            .get(E::TABLE, key)?
            .ok_or(TenantError::NoResult { table: E::TABLE })?;

        self.hooks.before_delete(&meta, &stored, options)?;

        if !self.session.delete(E::TABLE, key)? {
            return Err(TenantError::NoResult { table: E::TABLE });
        }
        Ok(())
    }
}
