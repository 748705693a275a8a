//! User domain type and registration details.
//!
//! A user is identified by the subject the identity provider issued for them.
//! The only profile detail held locally is a display name; a user without one
//! has not finished registration.

use chrono::{DateTime, Utc};
use recipes_core::ExternalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of characters allowed in a display name.
pub const MAX_NAME_LENGTH: usize = 50;

/// Represents a user who has logged in at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Subject identifier from the identity provider.
    id: ExternalId,
    /// Display name chosen during registration. Empty until then.
    name: String,
    /// When the user record was created.
    created_at: DateTime<Utc>,
    /// When the user record was last updated.
    updated_at: DateTime<Utc>,
    /// When the user last completed a log-in.
    last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Creates a user record for a first log-in.
    #[must_use]
    pub fn new(id: ExternalId) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: String::new(),
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    pub fn with_all_fields(
        id: ExternalId,
        name: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        last_login: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name,
            created_at,
            updated_at,
            last_login,
        }
    }

    /// Returns the user's external ID.
    #[must_use]
    pub fn id(&self) -> &ExternalId {
        &self.id
    }

    /// Returns the display name. Empty if registration is incomplete.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns when the user was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the user was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns when the user last logged in.
    #[must_use]
    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    /// Returns true if the user has not yet chosen a display name.
    #[must_use]
    pub fn needs_registration(&self) -> bool {
        self.name.is_empty()
    }

    /// Stamps a completed log-in.
    pub fn record_login(&mut self) {
        self.last_login = Some(Utc::now());
    }

    /// Applies validated registration details.
    pub fn apply_details(&mut self, details: &UserDetails) {
        self.name = details.name.clone();
        self.updated_at = Utc::now();
    }
}

/// Profile details submitted on the registration-completion form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    /// The user's chosen display name.
    #[serde(default)]
    pub name: String,
}

impl UserDetails {
    /// Validates the details, returning a map of field name to problem.
    ///
    /// An empty map means the details are acceptable.
    #[must_use]
    pub fn validate(&self) -> BTreeMap<&'static str, String> {
        let mut problems = BTreeMap::new();

        if self.name.trim().is_empty() {
            problems.insert("name", "This field is required.".to_string());
        }

        if self.name.chars().count() > MAX_NAME_LENGTH {
            problems.insert(
                "name",
                format!("Your name cannot be more than {MAX_NAME_LENGTH} characters."),
            );
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_needs_registration() {
        let user = User::new(ExternalId::new("108234"));

        assert_eq!(user.id().as_str(), "108234");
        assert_eq!(user.name(), "");
        assert!(user.needs_registration());
        assert!(user.last_login().is_none());
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn record_login_stamps_time() {
        let mut user = User::new(ExternalId::new("108234"));
        let before = Utc::now();

        user.record_login();

        let last_login = user.last_login().expect("login recorded");
        assert!(last_login >= before);
    }

    #[test]
    fn apply_details_completes_registration() {
        let mut user = User::new(ExternalId::new("108234"));
        let original_updated_at = user.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(1));

        user.apply_details(&UserDetails {
            name: "Alice".to_string(),
        });

        assert_eq!(user.name(), "Alice");
        assert!(!user.needs_registration());
        assert!(user.updated_at() > original_updated_at);
    }

    #[test]
    fn with_all_fields_preserves_values() {
        let created = Utc::now() - chrono::Duration::days(30);
        let updated = Utc::now() - chrono::Duration::days(1);
        let login = Utc::now() - chrono::Duration::hours(2);

        let user = User::with_all_fields(
            ExternalId::new("42"),
            "Bob".to_string(),
            created,
            updated,
            Some(login),
        );

        assert_eq!(user.id().as_str(), "42");
        assert_eq!(user.name(), "Bob");
        assert_eq!(user.created_at(), created);
        assert_eq!(user.updated_at(), updated);
        assert_eq!(user.last_login(), Some(login));
    }

    #[test]
    fn valid_details_have_no_problems() {
        let details = UserDetails {
            name: "Alice".to_string(),
        };
        assert!(details.validate().is_empty());
    }

    #[test]
    fn blank_name_is_required() {
        for name in ["", "   ", "\t\n"] {
            let details = UserDetails {
                name: name.to_string(),
            };
            let problems = details.validate();
            assert_eq!(
                problems.get("name").map(String::as_str),
                Some("This field is required.")
            );
        }
    }

    #[test]
    fn long_name_is_rejected() {
        let details = UserDetails {
            name: "a".repeat(MAX_NAME_LENGTH + 1),
        };
        let problems = details.validate();
        assert!(problems["name"].contains("50 characters"));

        let details = UserDetails {
            name: "a".repeat(MAX_NAME_LENGTH),
        };
        assert!(details.validate().is_empty());
    }
}
