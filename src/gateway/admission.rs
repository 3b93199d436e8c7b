//! The two-stage admission decision: authenticate, then rate check.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::rejection::Rejection;
use crate::config::AppEnv;
use crate::identity::{CredentialDirectory, Identity};
use crate::ratelimit::{LimiterRegistry, Quota};

/// Decides whether a request may reach business logic.
///
/// The gateway owns no global state: the limiter registry is injected so
/// that every gateway (and every test) can have its own.
pub struct AdmissionGateway {
    directory: Arc<dyn CredentialDirectory>,
    registry: Arc<LimiterRegistry>,
    quota: Quota,
    app_env: AppEnv,
}

impl AdmissionGateway {
    /// Create a new gateway.
    pub fn new(
        directory: Arc<dyn CredentialDirectory>,
        registry: Arc<LimiterRegistry>,
        quota: Quota,
        app_env: AppEnv,
    ) -> Self {
        Self {
            directory,
            registry,
            quota,
            app_env,
        }
    }

    /// Stage A: resolve the caller identity.
    ///
    /// In development mode credential checks are skipped entirely and every
    /// caller is the sentinel development identity.
    pub fn authenticate(&self, credential: Option<&str>) -> Result<Identity, Rejection> {
        if self.app_env.is_development() {
            debug!("Skipping API key check in development mode");
            return Ok(Identity::dev());
        }

        let credential = match credential {
            Some(c) if !c.is_empty() => c,
            _ => {
                warn!("Missing API key");
                return Err(Rejection::MissingCredential);
            }
        };

        match self.directory.resolve(credential) {
            Some(identity) => {
                info!(identity = %identity, "User authenticated");
                Ok(identity)
            }
            None => {
                warn!("Invalid API key");
                Err(Rejection::InvalidCredential)
            }
        }
    }

    /// Stage B: spend one token from the caller's bucket.
    ///
    /// A missing identity is let through without a rate check.
    pub fn check_rate(&self, identity: Option<&Identity>) -> Result<(), Rejection> {
        let Some(identity) = identity else {
            warn!("Identity not found in request context for rate limiting");
            return Ok(());
        };

        let limiter = self.registry.get_or_create(identity, self.quota);
        if self.registry.allow(&limiter) {
            Ok(())
        } else {
            warn!(identity = %identity, "Rate limit exceeded");
            Err(Rejection::RateExceeded)
        }
    }

    /// Run both stages in order.
    pub fn admit(&self, credential: Option<&str>) -> Result<Identity, Rejection> {
        let identity = self.authenticate(credential)?;
        self.check_rate(Some(&identity))?;
        Ok(identity)
    }

    pub fn registry(&self) -> &Arc<LimiterRegistry> {
        &self.registry
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub fn app_env(&self) -> AppEnv {
        self.app_env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticKeyDirectory;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn gateway(app_env: AppEnv, rps: u32) -> AdmissionGateway {
        let keys = HashMap::from([
            ("alice".to_string(), "alice-key".to_string()),
            ("bob".to_string(), "bob-key".to_string()),
        ]);
        AdmissionGateway::new(
            Arc::new(StaticKeyDirectory::new(keys).unwrap()),
            Arc::new(LimiterRegistry::new()),
            Quota::per_second(rps),
            app_env,
        )
    }

    #[test]
    fn test_missing_credential() {
        let gateway = gateway(AppEnv::Production, 5);

        assert_eq!(gateway.authenticate(None), Err(Rejection::MissingCredential));
        assert_eq!(gateway.authenticate(Some("")), Err(Rejection::MissingCredential));
    }

    #[test]
    fn test_invalid_credential() {
        let gateway = gateway(AppEnv::Production, 5);

        assert_eq!(
            gateway.authenticate(Some("bad-value")),
            Err(Rejection::InvalidCredential)
        );
    }

    #[test]
    fn test_valid_credential() {
        let gateway = gateway(AppEnv::Production, 5);
        let identity = assert_ok!(gateway.authenticate(Some("bob-key")));

        assert_eq!(identity, Identity::new("bob"));
    }

    #[test]
    fn test_development_bypass() {
        let gateway = gateway(AppEnv::Development, 5);

        assert_eq!(gateway.authenticate(None), Ok(Identity::dev()));
        assert_eq!(gateway.authenticate(Some("bad-value")), Ok(Identity::dev()));
        assert_eq!(gateway.authenticate(Some("alice-key")), Ok(Identity::dev()));
    }

    #[test]
    fn test_rate_exceeded_after_burst() {
        let gateway = gateway(AppEnv::Production, 2);

        assert_ok!(gateway.admit(Some("alice-key")));
        assert_ok!(gateway.admit(Some("alice-key")));
        assert_eq!(gateway.admit(Some("alice-key")), Err(Rejection::RateExceeded));

        // Bob has a separate bucket
        assert_ok!(gateway.admit(Some("bob-key")));
    }

    #[test]
    fn test_rejected_auth_consumes_no_tokens() {
        let gateway = gateway(AppEnv::Production, 1);

        assert_err!(gateway.admit(Some("bad-value")));
        assert_err!(gateway.admit(None));
        assert!(gateway.registry().is_empty());
    }

    #[test]
    fn test_missing_identity_fails_open() {
        let gateway = gateway(AppEnv::Production, 1);

        for _ in 0..10 {
            assert_ok!(gateway.check_rate(None));
        }
        assert!(gateway.registry().is_empty());
    }

    #[test]
    fn test_dev_identity_is_rate_limited() {
        let gateway = gateway(AppEnv::Development, 1);

        assert_eq!(gateway.admit(None), Ok(Identity::dev()));
        assert_eq!(gateway.admit(None), Err(Rejection::RateExceeded));
        assert!(gateway.registry().get(&Identity::dev()).is_some());
    }
}
