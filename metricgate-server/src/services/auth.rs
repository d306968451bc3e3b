//! Authentication boundary of the gateway.
//!
//! Credential verification itself is delegated to an [`AuthPlugin`]. The gateway only consumes its
//! result: a [`Caller`] carrying the tenant and whether the caller holds administrative privilege.

use std::collections::BTreeMap;
use std::fmt;

use metricgate_config::Config;
use metricgate_metrics::OrgId;

/// An authenticated identity attached to an ingestion request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Caller {
    /// The tenant of the caller.
    pub org_id: OrgId,
    /// Administrative callers may submit records for any tenant.
    pub is_admin: bool,
}

impl Caller {
    /// The administrative caller, acting as tenant `1`.
    pub const ADMIN: Self = Self {
        org_id: OrgId::ADMIN,
        is_admin: true,
    };

    /// Creates a caller confined to the given tenant.
    pub fn tenant(org_id: OrgId) -> Self {
        Self {
            org_id,
            is_admin: false,
        }
    }
}

/// Errors returned by an [`AuthPlugin`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// The credentials do not belong to any known caller.
    #[error("invalid authentication credentials")]
    InvalidCredentials,
}

/// Validates credentials and resolves them to a [`Caller`].
pub trait AuthPlugin: Send + Sync {
    /// Authenticates a username and key pair.
    ///
    /// Bearer tokens are passed with the username `api_key`.
    fn authenticate(&self, username: &str, key: &str) -> Result<Caller, AuthError>;
}

/// An [`AuthPlugin`] backed by a fixed table of keys from the configuration.
#[derive(Default)]
pub struct StaticAuth {
    admin_key: Option<String>,
    keys: BTreeMap<String, OrgId>,
}

impl StaticAuth {
    /// Creates an empty key table, which rejects every caller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the key table from the `auth` section of the config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            admin_key: config.admin_key().map(str::to_owned),
            keys: config.tenant_keys().clone(),
        }
    }

    /// Sets the key of the administrative caller.
    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_key = Some(key.into());
        self
    }

    /// Adds a key authenticating callers of the given tenant.
    pub fn with_tenant_key(mut self, key: impl Into<String>, org_id: OrgId) -> Self {
        self.keys.insert(key.into(), org_id);
        self
    }
}

impl fmt::Debug for StaticAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticAuth")
            .field("admin_key", &self.admin_key.as_ref().map(|_| "***"))
            .field("tenants", &self.keys.len())
            .finish()
    }
}

impl AuthPlugin for StaticAuth {
    fn authenticate(&self, _username: &str, key: &str) -> Result<Caller, AuthError> {
        if key.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        if self.admin_key.as_deref() == Some(key) {
            return Ok(Caller::ADMIN);
        }

        self.keys
            .get(key)
            .map(|org_id| Caller::tenant(*org_id))
            .ok_or(AuthError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> StaticAuth {
        StaticAuth::new()
            .with_admin_key("admin-secret")
            .with_tenant_key("tenant-five", OrgId::new(5))
    }

    #[test]
    fn test_admin_key() {
        let caller = auth().authenticate("api_key", "admin-secret").unwrap();
        assert_eq!(caller, Caller::ADMIN);
        assert_eq!(caller.org_id.value(), 1);
        assert!(caller.is_admin);
    }

    #[test]
    fn test_tenant_key() {
        let caller = auth().authenticate("api_key", "tenant-five").unwrap();
        assert_eq!(caller, Caller::tenant(OrgId::new(5)));
        assert!(!caller.is_admin);
    }

    #[test]
    fn test_unknown_key() {
        let err = auth().authenticate("api_key", "nope").unwrap_err();
        assert_eq!(err.to_string(), "invalid authentication credentials");
    }

    #[test]
    fn test_empty_key_never_matches() {
        let auth = StaticAuth::new();
        assert!(auth.authenticate("api_key", "").is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let debug = format!("{:?}", auth());
        assert!(!debug.contains("admin-secret"));
        assert!(!debug.contains("tenant-five"));
    }
}
