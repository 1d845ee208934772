//! Demo directory and documents for local runs of the server.

use tenantscope_core::{
    Database, InMemoryDirectory, Principal, PrincipalId, Role, Tenant, TenantId, TenantModel,
    TenantResult,
};
use tracing::info;

use crate::domain::Document;

/// Trainer in tenants 1 and 2.
pub const DEMO_MEMBER: PrincipalId = PrincipalId(10);
/// Super admin; member of every active tenant.
pub const DEMO_ADMIN: PrincipalId = PrincipalId(11);
/// Learner in tenant 3 only.
pub const DEMO_LEARNER: PrincipalId = PrincipalId(12);

/// Tenants 1 to 3 active, tenant 4 suspended, and the demo principals.
pub fn seed_directory(directory: &InMemoryDirectory) {
    for (id, name, is_active) in [
        (1, "acme", true),
        (2, "globex", true),
        (3, "initech", true),
        (4, "umbrella", false),
    ] {
        directory.upsert_tenant(Tenant {
            id: TenantId(id),
            name: name.to_string(),
            is_active,
        });
    }

    for (id, role, tenant_ids) in [
        (DEMO_MEMBER, Role::Trainer, vec![TenantId(1), TenantId(2)]),
        (DEMO_ADMIN, Role::SuperAdmin, Vec::new()),
        (DEMO_LEARNER, Role::Learner, vec![TenantId(3)]),
    ] {
        directory.upsert_principal(Principal {
            id,
            role,
            tenant_ids,
        });
    }
}

/// Two documents in each active tenant, written with explicit tenants so
/// the ambient context is irrelevant.
///
/// # Errors
///
/// Propagates write failures.
pub fn seed_documents(db: &Database) -> TenantResult<usize> {
    let mut written = 0;
    for tenant in 1..=3 {
        let tenant_id = TenantId(tenant);
        let fields = (1..=2)
            .map(|n| Document::fields(&format!("doc {n} of tenant {tenant}"), "demo"))
            .collect();
        written += Document::bulk_create_for_tenant(db, Some(tenant_id), fields)?.len();
    }
    info!(documents = written, "seeded demo documents");
    Ok(written)
}
