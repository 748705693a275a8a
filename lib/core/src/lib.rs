//! Core types and utilities for the recipes application.
//!
//! This crate provides the identifier types shared by the authentication
//! subsystem and the `Result` alias used at storage boundaries.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ExternalId, SessionToken, random_token};
