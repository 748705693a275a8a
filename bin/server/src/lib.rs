//! Recipes web server.
//!
//! Hosts the OAuth login flow, session handling and authentication
//! middleware for the recipes application.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod pages;
