//! # isf-auth
//!
//! Client-side authentication for the ISF-SUS administrative backend:
//! login, token persistence, profile fetch and logout.
//!
//! DESIGN
//! ======
//! A single owned [`session::Session`] is the source of truth for "is the
//! user logged in". It talks to the backend through the [`service::AuthApi`]
//! seam and persists tokens through the [`store::TokenStore`] seam, so both
//! can be swapped for in-memory doubles. Authorized calls go through an
//! [`client::AuthorizedClient`] built fresh for each token and dropped on
//! logout.
//!
//! The [`login`] module holds the headless login form: validation,
//! submission and the notification a UI should show for the result.

pub mod client;
pub mod config;
pub mod endpoints;
pub mod login;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
