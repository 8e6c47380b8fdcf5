//! Refresh-token rotation service.
//!
//! A client exchanges a refresh token for a fresh access/refresh token pair;
//! the presented refresh token is consumed and can never be used again.

pub mod auth;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod routes;
pub mod session;
pub mod startup;
pub mod telemetry;
