//! Network module.
//!
//! This module turns issued certificates into rustls mTLS configurations.

pub mod config;
