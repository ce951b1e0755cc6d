//! Ethereum address derivation for secp256k1 public keys.

use k256::ecdsa::VerifyingKey;

pub fn bytes_to_lowerhex(bytes: &[u8]) -> String {
    "0x".to_string()
        + &bytes
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<String>()
}

/// The Ethereum address of a public key: the last 20 bytes of the
/// Keccak-256 hash of the uncompressed point coordinates.
pub fn public_key_address(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let point_bytes = point.as_bytes();
    // skip the 0x04 uncompressed-point tag
    let hash = keccak_hash::keccak(&point_bytes[1..]);
    bytes_to_lowerhex(&hash.as_bytes()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_public_key() {
        let x = base64::decode_config(
            "_dV63sPUOOojf-RrM-4eAW7aa1hcPifqZmhsLqU1hHk",
            base64::URL_SAFE_NO_PAD,
        )
        .unwrap();
        let y = base64::decode_config(
            "Rjk_gUUlLupor-Z-KHs-2bMWhbpsOwAGCnO5sSQtaPc",
            base64::URL_SAFE_NO_PAD,
        )
        .unwrap();
        let mut sec1 = vec![0x04];
        sec1.extend_from_slice(&x);
        sec1.extend_from_slice(&y);
        let key = VerifyingKey::from_sec1_bytes(&sec1).unwrap();
        assert_eq!(
            public_key_address(&key),
            "0xf3beac30c498d9e26865f34fcaa57dbb935b0d74"
        );
    }

    #[test]
    fn lowerhex_prefixes_and_pads() {
        assert_eq!(bytes_to_lowerhex(&[0x00, 0x0f, 0xab]), "0x000fab");
        assert_eq!(bytes_to_lowerhex(&[]), "0x");
    }
}
