//! Cryptographic primitives module.
//!
//! This module provides the two randomness consumers of certificate issuance:
//!
//! - P-256 key pair generation ([`keypair`])
//! - 128-bit certificate serial allocation ([`serial`])
//!
//! Neither keeps hidden state. Both draw from a caller-supplied
//! cryptographically secure RNG, so production code passes `OsRng` and
//! tests can pass a seeded generator.
//!
//! # Example
//!
//! ```rust
//! use rand::rngs::OsRng;
//! use tlspark::crypto::keypair::generate_key_pair;
//! use tlspark::crypto::serial::next_serial;
//!
//! # fn example() -> tlspark::error::Result<()> {
//! let key_pair = generate_key_pair(&mut OsRng)?;
//! let serial = next_serial(&mut OsRng)?;
//! assert_eq!(key_pair.public_key_bytes().len(), 65);
//! println!("serial {:032x}", serial);
//! # Ok(())
//! # }
//! ```

pub mod keypair;
pub mod serial;
