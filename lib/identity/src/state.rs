//! The opaque `state` parameter carried through the identity provider.
//!
//! The provider echoes `state` back verbatim on the callback. It is encoded
//! as a form-urlencoded pair list holding the login nonce and the path the
//! user asked for before being sent to log in.

use url::form_urlencoded;

const NEXT_KEY: &str = "next";
const NONCE_KEY: &str = "nonce";

/// Path used when no return target was recorded.
pub const DEFAULT_DESTINATION: &str = "/";

/// Login nonce plus return target, as round-tripped through the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
    nonce: String,
    next: String,
}

impl LoginState {
    /// Creates the state for a new login attempt.
    #[must_use]
    pub fn new(nonce: String, next: Option<&str>) -> Self {
        Self {
            nonce,
            next: next.unwrap_or_default().to_string(),
        }
    }

    /// Encodes the state for use as the OAuth `state` parameter.
    #[must_use]
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair(NEXT_KEY, &self.next)
            .append_pair(NONCE_KEY, &self.nonce)
            .finish()
    }

    /// Decodes a `state` value echoed back by the provider.
    ///
    /// Decoding is lenient: absent fields decode as empty strings, and an
    /// empty nonce never matches an issued one.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        let mut state = Self {
            nonce: String::new(),
            next: String::new(),
        };

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                NONCE_KEY if state.nonce.is_empty() => state.nonce = value.into_owned(),
                NEXT_KEY if state.next.is_empty() => state.next = value.into_owned(),
                _ => {}
            }
        }

        state
    }

    /// Returns the nonce embedded in the state.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Returns the recorded return target, falling back to the site root.
    ///
    /// Anything that is not a path (empty, or not starting with `/`) is
    /// unparsable and falls back too. Paths are not checked further; a
    /// scheme-relative `//host` target is followed as recorded.
    #[must_use]
    pub fn destination(&self) -> &str {
        if self.next.starts_with('/') {
            &self.next
        } else {
            DEFAULT_DESTINATION
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_next_before_nonce() {
        let state = LoginState::new("abc".to_string(), Some("/recipes"));
        assert_eq!(state.encode(), "next=%2Frecipes&nonce=abc");
    }

    #[test]
    fn encodes_missing_next_as_empty() {
        let state = LoginState::new("abc".to_string(), None);
        assert_eq!(state.encode(), "next=&nonce=abc");
    }

    #[test]
    fn decodes_encoded_state() {
        let state = LoginState::new("n-1_x".to_string(), Some("/recipes/7?tab=notes"));
        let decoded = LoginState::decode(&state.encode());
        assert_eq!(decoded, state);
        assert_eq!(decoded.destination(), "/recipes/7?tab=notes");
    }

    #[test]
    fn missing_fields_decode_empty() {
        let decoded = LoginState::decode("garbage");
        assert_eq!(decoded.nonce(), "");
        assert_eq!(decoded.destination(), DEFAULT_DESTINATION);
    }

    #[test]
    fn empty_next_defaults_to_root() {
        let decoded = LoginState::decode("next=&nonce=abc");
        assert_eq!(decoded.nonce(), "abc");
        assert_eq!(decoded.destination(), "/");
    }

    #[test]
    fn non_path_next_defaults_to_root() {
        for next in ["https://evil.example/", "recipes", "javascript:alert(1)"] {
            let state = LoginState::new("abc".to_string(), Some(next));
            assert_eq!(state.destination(), DEFAULT_DESTINATION, "next = {next}");
        }
    }

    #[test]
    fn first_value_wins_for_repeated_keys() {
        let decoded = LoginState::decode("nonce=first&nonce=second");
        assert_eq!(decoded.nonce(), "first");
    }
}
