//! Stable hashing over canonical JSON encodings.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::RexError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal hash for the provided serializable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, RexError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_across_calls() {
        let payload = ("grid", vec![1u64, 2, 3]);
        let a = stable_hash_string(&payload).expect("hash");
        let b = stable_hash_string(&payload).expect("hash");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
