//! The request authentication context.
//!
//! Every request carries exactly one `AuthContext`, attached by the
//! authentication middleware after it has checked the session's identity
//! against the registry. Handlers read it; only log-in and log-out change
//! the state behind it.

use recipes_core::ExternalId;

/// Who made the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthContext {
    /// No session identity, or one whose record no longer exists.
    #[default]
    Anonymous,
    /// The session is bound to an identity with a local record.
    Authenticated(ExternalId),
}

impl AuthContext {
    /// Returns true if the request is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns the authenticated identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&ExternalId> {
        match self {
            Self::Authenticated(id) => Some(id),
            Self::Anonymous => None,
        }
    }
}

impl From<Option<ExternalId>> for AuthContext {
    fn from(id: Option<ExternalId>) -> Self {
        match id {
            Some(id) if !id.is_empty() => Self::Authenticated(id),
            _ => Self::Anonymous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_anonymous() {
        let ctx = AuthContext::default();
        assert!(!ctx.is_authenticated());
        assert!(ctx.identity().is_none());
    }

    #[test]
    fn missing_identity_is_anonymous() {
        assert_eq!(AuthContext::from(None), AuthContext::Anonymous);
    }

    #[test]
    fn empty_identity_is_anonymous() {
        let ctx = AuthContext::from(Some(ExternalId::new("")));
        assert_eq!(ctx, AuthContext::Anonymous);
    }

    #[test]
    fn present_identity_is_authenticated() {
        let ctx = AuthContext::from(Some(ExternalId::new("user-id")));
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.identity().map(ExternalId::as_str), Some("user-id"));
    }
}
