//! Create, decode and verify JSON Web Tokens whose issuers are identified by
//! Decentralized Identifiers (DIDs) instead of a central key registry.
//!
//! The crate provides the DID document model, the resolver abstraction with a
//! composite dispatcher, the compact JWT codec, and secp256k1 signature
//! checking for the `ES256K` and `ES256K-R` algorithms. Method-specific
//! resolvers (`did:ethr`, `did:web`) live in their own crates and plug in
//! through the [`did_resolve::DIDResolver`] trait.

pub mod did;
pub mod did_resolve;
pub mod error;
pub mod jws;
pub mod jwt;
pub mod keccak_hash;
pub mod signer;
pub mod time;

pub use error::Error;
