//! Certificate generation module.
//!
//! This module issues X.509 certificates following a two-level hierarchy:
//! one self-signed root, one server leaf and any number of client leaves.

pub mod builder;
pub mod ca;
pub mod pem;
pub mod policy;
pub mod raw;
pub mod role;
pub mod verify;
