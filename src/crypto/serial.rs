//! Certificate serial number allocation.

use crate::error::{Result, TlsParkError};
use rand::{CryptoRng, RngCore};

/// Draw a uniformly distributed 128-bit serial number from `rng`.
///
/// There is no counter and no ledger of issued serials. Two draws collide
/// with probability around `n^2 / 2^129` for `n` draws, which is not checked.
pub fn next_serial<R: RngCore + CryptoRng>(rng: &mut R) -> Result<u128> {
    let mut bytes = [0u8; 16];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| TlsParkError::RandomSourceError(format!("Failed to draw serial: {}", e)))?;

    Ok(u128::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testing::DrainingRng;
    use rand::rngs::{OsRng, StdRng};
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_serials_are_distinct() {
        let serials: HashSet<u128> = (0..1000).map(|_| next_serial(&mut OsRng).unwrap()).collect();
        assert_eq!(serials.len(), 1000);
    }

    #[test]
    fn test_serials_use_full_width() {
        // At least one of 64 draws should set a bit in the top 64 bits.
        let wide = (0..64)
            .map(|_| next_serial(&mut OsRng).unwrap())
            .any(|serial| serial >> 64 != 0);
        assert!(wide);
    }

    #[test]
    fn test_seeded_serial_is_deterministic() {
        let first = next_serial(&mut StdRng::seed_from_u64(9)).unwrap();
        let second = next_serial(&mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exhausted_entropy_fails() {
        let result = next_serial(&mut DrainingRng::new(0));
        assert!(matches!(result, Err(TlsParkError::RandomSourceError(_))));
    }
}
