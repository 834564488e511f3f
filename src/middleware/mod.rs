//! Middleware components for HTTP request processing.
//!
//! - `auth`: bearer-token check for every route and the admin-token guard for
//!   privileged routes.
//! - `actor`: extractor for the user/session pair that mutating routes must carry.

pub mod actor;
pub mod auth;
