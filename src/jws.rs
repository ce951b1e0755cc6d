//! JOSE-encoded secp256k1 signature checking.
//!
//! Both JWT algorithms hash the signing input with SHA-256. `ES256K`
//! verifies the signature directly against key material from the issuer's
//! document; `ES256K-R` recovers the signing key from the signature and
//! matches its Ethereum address against the document entries.

use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::did::PublicKeyEntry;
use crate::error::Error;
use crate::keccak_hash::public_key_address;

/// Length of a plain `r || s` signature.
pub const SIGNATURE_SIZE: usize = 64;
/// Length of a recoverable `r || s || v` signature.
pub const RECOVERABLE_SIGNATURE_SIZE: usize = 65;

fn recovery_id_from_byte(byte: u8) -> Result<RecoveryId, Error> {
    // Ethereum tooling encodes the recovery id as 27/28
    let normalized = if byte >= 27 { byte - 27 } else { byte };
    RecoveryId::from_byte(normalized).ok_or(Error::InvalidRecoveryId(byte))
}

fn signature_from_jose(signature: &[u8]) -> Result<(Signature, Option<RecoveryId>), Error> {
    match signature.len() {
        SIGNATURE_SIZE => {
            let parsed = Signature::from_slice(signature)?;
            // tokens in the wild carry high-S signatures
            let parsed = parsed.normalize_s().unwrap_or(parsed);
            Ok((parsed, None))
        }
        RECOVERABLE_SIGNATURE_SIZE => {
            let parsed = Signature::from_slice(&signature[..SIGNATURE_SIZE])?;
            let recovery_id = recovery_id_from_byte(signature[SIGNATURE_SIZE])?;
            // normalizing S flips the parity the recovery id encodes
            match parsed.normalize_s() {
                Some(normalized) => {
                    let flipped = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
                        .ok_or(Error::InvalidRecoveryId(signature[SIGNATURE_SIZE]))?;
                    Ok((normalized, Some(flipped)))
                }
                None => Ok((parsed, Some(recovery_id))),
            }
        }
        other => Err(Error::InvalidSignatureLength(other)),
    }
}

fn verifying_key_from_bytes(bytes: &[u8]) -> Option<VerifyingKey> {
    match bytes.len() {
        33 | 65 => VerifyingKey::from_sec1_bytes(bytes).ok(),
        64 => {
            // raw x || y coordinates, missing the uncompressed-point tag
            let mut sec1 = Vec::with_capacity(65);
            sec1.push(0x04);
            sec1.extend_from_slice(bytes);
            VerifyingKey::from_sec1_bytes(&sec1).ok()
        }
        _ => None,
    }
}

/// The verifying key held in a document entry's key material, if any.
pub(crate) fn entry_verifying_key(entry: &PublicKeyEntry) -> Option<VerifyingKey> {
    let bytes = if let Some(material) = &entry.public_key_hex {
        hex::decode(material.trim_start_matches("0x")).ok()?
    } else if let Some(material) = &entry.public_key_base64 {
        base64::decode(material).ok()?
    } else if let Some(material) = &entry.public_key_base58 {
        bs58::decode(material).into_vec().ok()?
    } else {
        return None;
    };
    verifying_key_from_bytes(&bytes)
}

/// The lowercase, unprefixed Ethereum address a document entry answers to:
/// the explicit `ethereumAddress` field, or the address of its key material.
fn entry_address(entry: &PublicKeyEntry) -> Option<String> {
    if let Some(address) = &entry.ethereum_address {
        return Some(address.trim_start_matches("0x").to_lowercase());
    }
    entry_verifying_key(entry)
        .map(|key| public_key_address(&key).trim_start_matches("0x").to_string())
}

/// Verifies an `ES256K` signature over `signing_input` against the candidate
/// keys.
///
/// Entries whose key material cannot be decoded are skipped. When nothing
/// matched but some candidate carries only an Ethereum address, the check
/// falls through to [`verify_es256k_r`], since an address alone cannot back
/// a direct verification.
pub fn verify_es256k(
    public_keys: &[PublicKeyEntry],
    signature: &[u8],
    signing_input: &[u8],
) -> Result<bool, Error> {
    let (parsed, _) = signature_from_jose(signature)?;
    let matched = public_keys
        .iter()
        .filter_map(entry_verifying_key)
        .any(|key| key.verify(signing_input, &parsed).is_ok());
    if !matched
        && public_keys
            .iter()
            .any(|entry| entry.ethereum_address.is_some())
    {
        return verify_es256k_r(public_keys, signature, signing_input);
    }
    Ok(matched)
}

/// Verifies an `ES256K-R` signature by recovering the signing key and
/// matching its address against the candidates.
///
/// A 65-byte signature carries its recovery id; a 64-byte signature is
/// tried with both recovery ids.
pub fn verify_es256k_r(
    public_keys: &[PublicKeyEntry],
    signature: &[u8],
    signing_input: &[u8],
) -> Result<bool, Error> {
    let mut candidates = Vec::with_capacity(2);
    match signature.len() {
        RECOVERABLE_SIGNATURE_SIZE => {
            let (parsed, recovery_id) = signature_from_jose(signature)?;
            if let Some(recovery_id) = recovery_id {
                candidates.push((parsed, recovery_id));
            }
        }
        SIGNATURE_SIZE => {
            let (parsed, _) = signature_from_jose(signature)?;
            for byte in 0..=1u8 {
                if let Some(recovery_id) = RecoveryId::from_byte(byte) {
                    candidates.push((parsed, recovery_id));
                }
            }
        }
        other => return Err(Error::InvalidSignatureLength(other)),
    }

    let recovered: Vec<String> = candidates
        .iter()
        .filter_map(|(parsed, recovery_id)| {
            VerifyingKey::recover_from_msg(signing_input, parsed, *recovery_id).ok()
        })
        .map(|key| {
            public_key_address(&key)
                .trim_start_matches("0x")
                .to_string()
        })
        .collect();

    Ok(public_keys
        .iter()
        .filter_map(entry_address)
        .any(|address| recovered.contains(&address)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::SECP256K1_VERIFICATION_KEY_2018;
    use crate::signer::{KeyPairSigner, Signer};

    const SECRET: &str = "278a5de700e29faae8e40e366ec5012b5ec63d36ec77e8a2417154cc1d25383f";

    fn hex_key_entry(signer: &KeyPairSigner) -> PublicKeyEntry {
        let point = signer.verifying_key().to_encoded_point(false);
        PublicKeyEntry {
            id: "did:example:123#keys-1".to_string(),
            type_: SECP256K1_VERIFICATION_KEY_2018.to_string(),
            public_key_hex: Some(hex::encode(point.as_bytes())),
            ..Default::default()
        }
    }

    fn address_entry(signer: &KeyPairSigner) -> PublicKeyEntry {
        PublicKeyEntry {
            id: "did:example:123#owner".to_string(),
            type_: SECP256K1_VERIFICATION_KEY_2018.to_string(),
            ethereum_address: Some(public_key_address(&signer.verifying_key())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn plain_verification_with_key_material() {
        let signer = KeyPairSigner::from_secret_hex(SECRET).unwrap();
        let data = b"header.payload";
        let signature = signer.sign_jwt(data).await.unwrap().to_jose(false);

        let keys = vec![hex_key_entry(&signer)];
        assert!(verify_es256k(&keys, &signature, data).unwrap());
        assert!(!verify_es256k(&keys, &signature, b"header.tampered").unwrap());
    }

    #[tokio::test]
    async fn plain_verification_falls_back_to_recovery_for_address_keys() {
        let signer = KeyPairSigner::from_secret_hex(SECRET).unwrap();
        let data = b"header.payload";
        let signature = signer.sign_jwt(data).await.unwrap().to_jose(false);

        let keys = vec![address_entry(&signer)];
        assert!(verify_es256k(&keys, &signature, data).unwrap());
    }

    #[tokio::test]
    async fn recoverable_verification_with_recovery_byte() {
        let signer = KeyPairSigner::from_secret_hex(SECRET).unwrap();
        let data = b"header.payload";
        let signature = signer.sign_jwt(data).await.unwrap().to_jose(true);

        assert!(verify_es256k_r(&[address_entry(&signer)], &signature, data).unwrap());
        assert!(verify_es256k_r(&[hex_key_entry(&signer)], &signature, data).unwrap());
        assert!(!verify_es256k_r(&[address_entry(&signer)], &signature, b"other").unwrap());
    }

    #[tokio::test]
    async fn recoverable_verification_tries_both_ids_for_compact_signatures() {
        let signer = KeyPairSigner::from_secret_hex(SECRET).unwrap();
        let data = b"header.payload";
        let signature = signer.sign_jwt(data).await.unwrap().to_jose(false);

        assert!(verify_es256k_r(&[address_entry(&signer)], &signature, data).unwrap());
    }

    #[tokio::test]
    async fn recoverable_verification_accepts_ethereum_style_v() {
        let signer = KeyPairSigner::from_secret_hex(SECRET).unwrap();
        let data = b"header.payload";
        let mut signature = signer.sign_jwt(data).await.unwrap().to_jose(true);
        signature[64] += 27;

        assert!(verify_es256k_r(&[address_entry(&signer)], &signature, data).unwrap());
    }

    #[test]
    fn rejects_bad_signature_lengths() {
        let keys: Vec<PublicKeyEntry> = vec![];
        match verify_es256k(&keys, &[0u8; 63], b"data") {
            Err(Error::InvalidSignatureLength(63)) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(verify_es256k_r(&keys, &[0u8; 66], b"data").is_err());
    }

    #[tokio::test]
    async fn undecodable_key_material_is_skipped() {
        let signer = KeyPairSigner::from_secret_hex(SECRET).unwrap();
        let data = b"header.payload";
        let signature = signer.sign_jwt(data).await.unwrap().to_jose(false);

        let garbage = PublicKeyEntry {
            id: "did:example:123#junk".to_string(),
            type_: SECP256K1_VERIFICATION_KEY_2018.to_string(),
            public_key_hex: Some("zzzz".to_string()),
            ..Default::default()
        };
        let keys = vec![garbage, hex_key_entry(&signer)];
        assert!(verify_es256k(&keys, &signature, data).unwrap());
    }
}
