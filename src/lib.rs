//! Client library for the Farewatch flight-deal service.
//!
//! Wraps the backend's auth, search, and price-watch APIs behind typed
//! state machines so the CLI (or any other front end) only deals with
//! filters, result pages, and watch lists.

pub mod airports;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod search;
pub mod session;
pub mod sort;
pub mod watches;
