//! Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::TenantContextManager;
use crate::database::Database;
use crate::directory::{InMemoryDirectory, PrincipalDirectory, TenantDirectory};
use crate::entity::{Entity, EntityKey, Row, TenantScoped, TENANT_ID_FIELD};
use crate::traits::{QuerySpec, Session};
use crate::types::{Principal, PrincipalId, Role, Tenant, TenantId};

/// Trainer in tenants 1 and 2.
pub const MEMBER_OF_1_2: PrincipalId = PrincipalId(10);
/// Super admin with no explicit memberships.
pub const ADMIN: PrincipalId = PrincipalId(11);
/// Learner with no memberships.
pub const NO_MEMBERSHIPS: PrincipalId = PrincipalId(12);
/// Every lookup of this principal fails.
pub const FAILING_PRINCIPAL: PrincipalId = PrincipalId(13);

/// Tenants 1, 2, 3, 7 active and 4 inactive.
pub struct TestDirectory {
    inner: InMemoryDirectory,
}

impl TenantDirectory for TestDirectory {
    fn get_tenant(&self, id: TenantId) -> anyhow::Result<Option<Tenant>> {
        self.inner.get_tenant(id)
    }

    fn active_tenant_ids(&self) -> anyhow::Result<Vec<TenantId>> {
        self.inner.active_tenant_ids()
    }
}

impl PrincipalDirectory for TestDirectory {
    fn get_principal(&self, id: PrincipalId) -> anyhow::Result<Option<Principal>> {
        if id == FAILING_PRINCIPAL {
            anyhow::bail!("principal store unavailable");
        }
        self.inner.get_principal(id)
    }
}

pub fn directory() -> Arc<TestDirectory> {
    let inner = InMemoryDirectory::new();
    for (id, is_active) in [(1, true), (2, true), (3, true), (4, false), (7, true)] {
        inner.upsert_tenant(Tenant {
            id: TenantId(id),
            name: format!("tenant-{id}"),
            is_active,
        });
    }
    for (id, role, tenants) in [
        (MEMBER_OF_1_2, Role::Trainer, vec![TenantId(1), TenantId(2)]),
        (ADMIN, Role::SuperAdmin, vec![]),
        (NO_MEMBERSHIPS, Role::Learner, vec![]),
    ] {
        inner.upsert_principal(Principal {
            id,
            role,
            tenant_ids: tenants,
        });
    }
    Arc::new(TestDirectory { inner })
}

pub fn manager() -> TenantContextManager {
    let dir = directory();
    TenantContextManager::new(dir.clone(), dir)
}

pub fn database() -> (Database, Arc<VecSession>) {
    let session = Arc::new(VecSession::default());
    let db = Database::new(session.clone(), Arc::new(manager()));
    (db, session)
}

/// Ordered in-memory session.
#[derive(Default)]
pub struct VecSession {
    tables: Mutex<BTreeMap<&'static str, BTreeMap<EntityKey, Row>>>,
    next_key: AtomicU64,
}

impl VecSession {
    pub fn len(&self, table: &'static str) -> usize {
        self.tables.lock().get(table).map_or(0, BTreeMap::len)
    }

    fn allocate(&self) -> EntityKey {
        self.next_key.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Session for VecSession {
    fn select(&self, spec: &QuerySpec) -> anyhow::Result<Vec<(EntityKey, Row)>> {
        let tables = self.tables.lock();
        let Some(rows) = tables.get(spec.table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|(key, row)| spec.matches(**key, row))
            .skip(spec.offset)
            .take(spec.limit.unwrap_or(usize::MAX))
            .map(|(key, row)| (*key, row.clone()))
            .collect())
    }

    fn count(&self, spec: &QuerySpec) -> anyhow::Result<usize> {
        let tables = self.tables.lock();
        Ok(tables.get(spec.table).map_or(0, |rows| {
            rows.iter().filter(|(key, row)| spec.matches(**key, row)).count()
        }))
    }

    fn get(&self, table: &'static str, key: EntityKey) -> anyhow::Result<Option<Row>> {
        Ok(self
            .tables
            .lock()
            .get(table)
            .and_then(|rows| rows.get(&key).cloned()))
    }

    fn insert(&self, table: &'static str, row: Row) -> anyhow::Result<EntityKey> {
        let key = self.allocate();
        self.tables.lock().entry(table).or_default().insert(key, row);
        Ok(key)
    }

    fn insert_batch(&self, table: &'static str, rows: Vec<Row>) -> anyhow::Result<Vec<EntityKey>> {
        let mut tables = self.tables.lock();
        let target = tables.entry(table).or_default();
        Ok(rows
            .into_iter()
            .map(|row| {
                let key = self.allocate();
                target.insert(key, row);
                key
            })
            .collect())
    }

    fn update(&self, table: &'static str, key: EntityKey, row: Row) -> anyhow::Result<bool> {
        let mut tables = self.tables.lock();
        match tables.get_mut(table).and_then(|rows| rows.get_mut(&key)) {
            Some(existing) => {
                *existing = row;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, table: &'static str, key: EntityKey) -> anyhow::Result<bool> {
        Ok(self
            .tables
            .lock()
            .get_mut(table)
            .is_some_and(|rows| rows.remove(&key).is_some()))
    }
}

/// Tenant-scoped test entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(skip)]
    pub id: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    pub title: String,
}

impl Note {
    pub fn new(title: &str) -> Self {
        Self {
            id: None,
            tenant_id: None,
            title: title.to_owned(),
        }
    }

    pub fn in_tenant(title: &str, tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::new(title)
        }
    }
}

impl Entity for Note {
    const TABLE: &'static str = "notes";
    const TENANT_COLUMN: Option<&'static str> = Some(TENANT_ID_FIELD);

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }
}

impl TenantScoped for Note {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }
}

/// Global test entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locale {
    #[serde(skip)]
    pub id: Option<EntityKey>,
    pub code: String,
}

impl Locale {
    pub fn row(code: &str) -> Row {
        let mut row = Row::new();
        row.insert("code".into(), json!(code));
        row
    }
}

impl Entity for Locale {
    const TABLE: &'static str = "locales";

    fn key(&self) -> Option<EntityKey> {
        self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = Some(key);
    }
}

/// Seeds a1, a2 (tenant 1), b1, b2 (tenant 2) and c1 (tenant 7), returning
/// their keys in that order.
pub fn seed_notes(session: &VecSession) -> Vec<EntityKey> {
    [("a1", 1), ("a2", 1), ("b1", 2), ("b2", 2), ("c1", 7)]
        .into_iter()
        .map(|(title, tenant)| {
            let mut row = Row::new();
            row.insert("title".into(), json!(title));
            row.insert(TENANT_ID_FIELD.into(), json!(tenant));
            session.insert(Note::TABLE, row).unwrap()
        })
        .collect()
}
