//! Certificate storage module.
//!
//! This module writes issued certificate/key pairs to disk and reads a
//! persisted CA back.

pub mod output;
