//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use tenantscope_core::{
    CredentialClaims, Database, InMemoryDirectory, PrincipalId, TenantContextManager, TenantId,
};

use crate::demo::{seed_directory, DEMO_ADMIN, DEMO_MEMBER};
use crate::storage::MemorySession;

pub const SECRET: &str = "test-secret";
pub const MEMBER: PrincipalId = DEMO_MEMBER;
pub const ADMIN: PrincipalId = DEMO_ADMIN;

pub fn manager() -> TenantContextManager {
    let directory = Arc::new(InMemoryDirectory::new());
    seed_directory(&directory);
    TenantContextManager::new(directory.clone(), directory)
}

pub fn database() -> Database {
    Database::new(Arc::new(MemorySession::new()), Arc::new(manager()))
}

/// HS256 token for `sub` expiring `ttl_secs` from now (negative for an
/// already expired token).
pub fn token_for(sub: &str, secret: &str, ttl_secs: i64, tenant_id: Option<TenantId>) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = CredentialClaims {
        sub: sub.to_string(),
        tenant_id,
        exp: now.checked_add_signed(ttl_secs).unwrap(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
