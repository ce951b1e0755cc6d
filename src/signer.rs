//! Signer abstraction for token creation.

use async_trait::async_trait;
use k256::ecdsa::{SigningKey, VerifyingKey};

use crate::error::Error;

/// An ECDSA signature split into its curve components, with the recovery id
/// normalized to 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureData {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl SignatureData {
    /// Compact JOSE encoding: `r || s`, plus the recovery byte when
    /// `recoverable` is set (ES256K-R).
    pub fn to_jose(&self, recoverable: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&self.r);
        out.extend_from_slice(&self.s);
        if recoverable {
            out.push(self.v);
        }
        out
    }
}

/// Produces signatures over JWT signing inputs.
///
/// The signature is expected to be a secp256k1 ECDSA signature over the
/// SHA-256 hash of the input, which is what both supported JWT algorithms
/// consume.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign_jwt(&self, data: &[u8]) -> Result<SignatureData, Error>;
}

/// In-process signer backed by a raw secp256k1 secret key.
///
/// Signatures are deterministic (RFC 6979). Useful for tests and for
/// services that hold their issuer key in memory; hardware or remote keys
/// implement [`Signer`] directly.
pub struct KeyPairSigner {
    signing_key: SigningKey,
}

impl KeyPairSigner {
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(KeyPairSigner {
            signing_key: SigningKey::from_slice(bytes)?,
        })
    }

    pub fn from_secret_hex(hex_key: &str) -> Result<Self, Error> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }
}

#[async_trait]
impl Signer for KeyPairSigner {
    async fn sign_jwt(&self, data: &[u8]) -> Result<SignatureData, Error> {
        let (signature, recovery_id) = self.signing_key.sign_recoverable(data)?;
        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(SignatureData {
            r,
            s,
            v: recovery_id.to_byte(),
        })
    }
}
