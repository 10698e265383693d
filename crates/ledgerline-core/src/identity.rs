//! Caller identity used for audit attribution.

/// User id and email recorded on every durable log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier.
    pub user_id: String,
    /// Best-effort email for display; falls back to the anonymous marker.
    pub user_email: String,
}

/// Attribution value used when no authenticated caller is present.
pub const ANONYMOUS: &str = "Anonymous";

impl Identity {
    /// Create an identity for an authenticated user.
    pub fn new(user_id: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_email: user_email.into(),
        }
    }

    /// The identity recorded for unauthenticated units of work.
    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS.to_string(),
            user_email: ANONYMOUS.to_string(),
        }
    }

    /// Whether this identity is the anonymous fallback.
    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANONYMOUS
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Supplies the identity of the caller owning the current unit of work.
///
/// The surrounding request pipeline implements this against its session
/// or token state; the pipeline only ever reads it at commit time.
pub trait IdentityProvider: Send + Sync {
    /// Resolve the current identity, or the anonymous fallback.
    fn current_identity(&self) -> Identity;
}

/// Provider that always reports the anonymous identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    fn current_identity(&self) -> Identity {
        Identity::anonymous()
    }
}

/// Provider pinned to one identity, for tests and background jobs.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Identity);

impl StaticIdentity {
    /// Create a provider for the given user.
    pub fn new(user_id: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self(Identity::new(user_id, user_email))
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Identity {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_fallback() {
        let id = Identity::anonymous();
        assert!(id.is_anonymous());
        assert_eq!(id.user_email, "Anonymous");
    }

    #[test]
    fn static_provider_returns_pinned_identity() {
        let provider = StaticIdentity::new("u-1", "admin@example.com");
        let id = provider.current_identity();
        assert_eq!(id.user_id, "u-1");
        assert!(!id.is_anonymous());
    }
}
