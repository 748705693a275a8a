//! Error types for the identity crate.
//!
//! Storage implementations return these wrapped in a rootcause `Report`:
//! - `RegistryError`: failures recording or querying user identities
//! - `SessionStoreError`: failures persisting or loading sessions

use std::fmt;

/// Errors from identity registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The backing database rejected or failed the query.
    Database { details: String },
    /// The identity has no local record.
    UnknownIdentity { id: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => {
                write!(f, "identity registry database error: {details}")
            }
            Self::UnknownIdentity { id } => {
                write!(f, "no local record for identity: {id}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The backing database rejected or failed the query.
    Database { details: String },
    /// A stored session could not be decoded.
    Corrupt { details: String },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => {
                write!(f, "session store database error: {details}")
            }
            Self::Corrupt { details } => {
                write!(f, "corrupt session record: {details}")
            }
        }
    }
}

impl std::error::Error for SessionStoreError {}
