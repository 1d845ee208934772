use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of an isolated customer organization.
///
/// Opaque and stable; the integer form matches the tenant column stored on
/// every tenant-scoped row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Identifier of an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub i64);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrincipalId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Principal roles, ordered from least to most privileged.
///
/// `SuperAdmin` is the only unrestricted role: it is exempt from tenant
/// scoping and implicitly a member of every active tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Learner,
    Trainer,
    Coordinator,
    TenantAdmin,
    SuperAdmin,
}

impl Role {
    /// Whether this role bypasses tenant membership checks.
    #[must_use]
    pub fn is_unrestricted(self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

/// An isolated organization. Read-only to the isolation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Inactive tenants keep their rows but never receive new writes.
    pub is_active: bool,
}

/// Authenticated actor with a role and explicit tenant memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
    /// Explicit memberships, in the order they were granted.
    pub tenant_ids: Vec<TenantId>,
}

impl Principal {
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.role.is_unrestricted()
    }
}

/// Claims carried by the caller's signed credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Subject; the principal id in decimal form.
    pub sub: String,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    pub exp: u64,
}

impl CredentialClaims {
    /// Principal id encoded in `sub`, if it parses.
    #[must_use]
    pub fn principal_id(&self) -> Option<PrincipalId> {
        self.sub.parse().ok()
    }
}
