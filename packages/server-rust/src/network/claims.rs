//! Caller identity from `Authorization: Bearer` tokens.
//!
//! Tokens are HS256 JWTs whose `sub` is the principal id. A missing, expired
//! or otherwise invalid token never fails the request: the caller is simply
//! anonymous, and anonymous callers cannot adopt a tenant.

use http::header::AUTHORIZATION;
use http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tenantscope_core::{CredentialClaims, RequestIdentity};
use tracing::debug;

/// Verifies bearer tokens against a shared secret.
#[derive(Clone)]
pub struct JwtIdentityResolver {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl std::fmt::Debug for JwtIdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityResolver")
            .field("enabled", &self.key.is_some())
            .finish_non_exhaustive()
    }
}

impl JwtIdentityResolver {
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Resolver that treats every caller as anonymous.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Verify a raw token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns the verification error when the signature, expiry or shape
    /// of the token is wrong.
    pub fn verify(
        &self,
        token: &str,
    ) -> Result<Option<CredentialClaims>, jsonwebtoken::errors::Error> {
        let Some(key) = &self.key else {
            return Ok(None);
        };
        decode::<CredentialClaims>(token, key, &self.validation).map(|data| Some(data.claims))
    }

    /// Identity of the caller that sent `headers`.
    #[must_use]
    pub fn resolve(&self, headers: &HeaderMap) -> RequestIdentity {
        let Some(token) = bearer_token(headers) else {
            return RequestIdentity::anonymous();
        };

        match self.verify(token) {
            Ok(Some(claims)) => match claims.principal_id() {
                Some(principal_id) => RequestIdentity::principal(principal_id).with_claims(claims),
                None => {
                    debug!(sub = %claims.sub, "token subject is not a principal id");
                    RequestIdentity::anonymous()
                }
            },
            Ok(None) => RequestIdentity::anonymous(),
            Err(error) => {
                debug!(%error, "rejected bearer token");
                RequestIdentity::anonymous()
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
