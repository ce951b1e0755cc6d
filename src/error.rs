//! Error type for DID resolution and JWT verification.

use thiserror::Error;

/// Error type for `did-jwt` and the DID method crates built on it.
///
/// Variants fall into four families: malformed-input errors (token
/// structure, JSON, base64), invalid-token errors (time window, audience,
/// signature), resolution errors (no resolver or network for a DID, RPC and
/// HTTP transport failures), and configuration errors (missing or blank
/// registry settings). All of them are terminal for the call that produced
/// them; only the transport variants may succeed on retry.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Token must have 3 parts: Header, Payload, and Signature")]
    TokenParts,
    #[error("Header cannot be empty")]
    EmptyHeader,
    #[error("Payload cannot be empty")]
    EmptyPayload,
    #[error("JWT algorithm '{0}' not supported")]
    UnsupportedAlgorithm(String),
    #[error("JWT payload has no iss claim")]
    MissingIssuer,
    #[error("Jwt not valid before nbf: {0}")]
    NotValidYet(i64),
    #[error("Jwt not valid yet (issued in the future) iat: {0}")]
    IssuedInFuture(i64),
    #[error("JWT has expired: exp: {0}")]
    Expired(i64),
    #[error("JWT audience is required but no verifier audience has been configured")]
    AudienceRequired,
    #[error("JWT audience does not match: aud: {aud} != yours: {audience}")]
    AudienceMismatch { aud: String, audience: String },
    #[error("DID document for {0} does not have public keys suitable for authenticating user")]
    NoAuthenticationKeys(String),
    #[error("DID document for {issuer} does not have public keys for {algorithm}")]
    NoMatchingKeyTypes { issuer: String, algorithm: String },
    #[error("Signature invalid for JWT. DID document for {0} does not have any matching public keys")]
    InvalidSignature(String),
    #[error("Invalid JOSE signature length: {0}")]
    InvalidSignatureLength(usize),
    #[error("Invalid signature recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("The DID `{did}` could not be resolved by any of the {count} registered resolvers")]
    UnresolvableDid { did: String, count: usize },
    #[error("The DID `{0}` cannot be resolved by this resolver")]
    UnsupportedDidMethod(String),
    #[error("No profile document found for `{0}`")]
    BlankDocument(String),
    #[error("The DID `{0}` is not a valid ethr DID")]
    InvalidDid(String),
    #[error("Missing registry configuration for `{0}`")]
    MissingRegistryConfiguration(String),
    #[error("No known configuration for the `{0}` ethereum network")]
    UnknownNetwork(String),
    #[error("The registry address configured for network `{0}` is blank")]
    BlankRegistryAddress(String),
    #[error("Unable to evaluate when or if {0} was last changed because the RPC endpoint responded with an error")]
    LastChangedLookup(String),
    #[error("Numeric value does not fit in 64 bits")]
    NumericOverflow,
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    #[error(transparent)]
    Base58(#[from] bs58::decode::Error),
    #[error(transparent)]
    Secp256k1(#[from] k256::ecdsa::Error),
}
