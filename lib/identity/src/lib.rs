//! Identity and session primitives for the recipes application.
//!
//! This crate provides:
//! - User records keyed by the identity provider's subject (`User`, `UserDetails`)
//! - Server-side session records (`Session`) and their storage contract (`SessionStore`)
//! - The identity registry contract (`IdentityRegistry`) used to record log-ins
//! - The request authentication context (`AuthContext`)
//! - The opaque OAuth `state` payload (`LoginState`)
//!
//! In-memory implementations of both storage contracts live in [`memory`].
//!
//! # Example
//!
//! ```
//! use recipes_identity::{AuthContext, LoginState};
//! use recipes_core::ExternalId;
//!
//! let state = LoginState::new("n0nce".to_string(), Some("/recipes"));
//! let echoed = LoginState::decode(&state.encode());
//! assert_eq!(echoed.nonce(), "n0nce");
//! assert_eq!(echoed.destination(), "/recipes");
//!
//! let ctx = AuthContext::from(Some(ExternalId::new("108234")));
//! assert!(ctx.is_authenticated());
//! ```

pub mod auth;
pub mod error;
pub mod memory;
pub mod registry;
pub mod session;
pub mod state;
pub mod user;

// Re-export main types at crate root
pub use auth::AuthContext;
pub use error::{RegistryError, SessionStoreError};
pub use memory::{MemoryIdentityRegistry, MemorySessionStore};
pub use registry::IdentityRegistry;
pub use session::{Session, SessionStore};
pub use state::LoginState;
pub use user::{User, UserDetails};
