//! DID document data model.
//!
//! Field names follow the W3C DID document convention used on the wire; they
//! are part of the serialization contract and must not be renamed.

use serde::{Deserialize, Serialize};

/// JSON-LD context for documents produced by the resolvers in this workspace.
pub const DEFAULT_CONTEXT: &str = "https://w3id.org/did/v1";

pub const SECP256K1_VERIFICATION_KEY_2018: &str = "Secp256k1VerificationKey2018";
pub const SECP256K1_SIGNATURE_AUTHENTICATION_2018: &str = "Secp256k1SignatureAuthentication2018";
pub const SECP256K1_SIGNATURE_VERIFICATION_KEY_2018: &str = "Secp256k1SignatureVerificationKey2018";
pub const ECDSA_PUBLIC_KEY_SECP256K1: &str = "EcdsaPublicKeySecp256k1";
/// Short form used by registry attributes for authentication delegates.
pub const ATTRIBUTE_TYPE_SIG_AUTH: &str = "sigAuth";
/// Short form used by registry attributes for verification-key delegates.
pub const ATTRIBUTE_TYPE_VERI_KEY: &str = "veriKey";

/// Key types whose signatures can be checked with secp256k1 ECDSA.
pub const SUPPORTED_KEY_TYPES: [&str; 3] = [
    SECP256K1_VERIFICATION_KEY_2018,
    SECP256K1_SIGNATURE_VERIFICATION_KEY_2018,
    ECDSA_PUBLIC_KEY_SECP256K1,
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DIDDocument {
    #[serde(rename = "@context", default = "default_context")]
    pub context: String,
    pub id: String,
    #[serde(rename = "publicKey", default)]
    pub public_key: Vec<PublicKeyEntry>,
    #[serde(default)]
    pub authentication: Vec<AuthenticationEntry>,
    #[serde(default)]
    pub service: Vec<ServiceEntry>,
}

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

/// One entry of a document's `publicKey` list. At most one of the
/// key-material fields is populated; delegate keys may carry only an
/// `ethereumAddress`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethereum_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_base58: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthenticationEntry {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceEntry {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER_DOC: &str = r#"{
      "@context": "https://w3id.org/did/v1",
      "id": "did:ethr:0xb9c5714089478a327f09197987f16f9e5d936e8a",
      "publicKey": [{
        "id": "did:ethr:0xb9c5714089478a327f09197987f16f9e5d936e8a#owner",
        "type": "Secp256k1VerificationKey2018",
        "owner": "did:ethr:0xb9c5714089478a327f09197987f16f9e5d936e8a",
        "ethereumAddress": "0xb9c5714089478a327f09197987f16f9e5d936e8a"
      }],
      "authentication": [{
        "type": "Secp256k1SignatureAuthentication2018",
        "publicKey": "did:ethr:0xb9c5714089478a327f09197987f16f9e5d936e8a#owner"
      }]
    }"#;

    #[test]
    fn document_from_json() {
        let doc: DIDDocument = serde_json::from_str(OWNER_DOC).unwrap();
        assert_eq!(doc.context, DEFAULT_CONTEXT);
        assert_eq!(doc.public_key.len(), 1);
        assert_eq!(doc.public_key[0].type_, SECP256K1_VERIFICATION_KEY_2018);
        assert_eq!(
            doc.public_key[0].ethereum_address.as_deref(),
            Some("0xb9c5714089478a327f09197987f16f9e5d936e8a")
        );
        assert_eq!(doc.authentication[0].public_key, doc.public_key[0].id);
        assert!(doc.service.is_empty());
    }

    #[test]
    fn key_entry_wire_fields() {
        let entry = PublicKeyEntry {
            id: "did:example:123#keys-1".to_string(),
            type_: SECP256K1_VERIFICATION_KEY_2018.to_string(),
            owner: Some("did:example:123".to_string()),
            public_key_hex: Some("0x04deadbeef".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "Secp256k1VerificationKey2018");
        assert_eq!(json["publicKeyHex"], "0x04deadbeef");
        assert!(json.get("ethereumAddress").is_none());
        assert!(json.get("publicKeyBase58").is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        // documents in the wild carry `controller` and extra profile data
        let json = r#"{
          "id": "did:uport:2oeXufHGDpU51bfKBsZDdu7Je9weJ3r7sVG",
          "publicKey": [{
            "id": "did:uport:2oeXufHGDpU51bfKBsZDdu7Je9weJ3r7sVG#keys-1",
            "type": "Secp256k1VerificationKey2018",
            "controller": "did:uport:2oeXufHGDpU51bfKBsZDdu7Je9weJ3r7sVG",
            "publicKeyHex": "04deadbeef"
          }],
          "uportProfile": {"@type": "App"}
        }"#;
        let doc: DIDDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.context, DEFAULT_CONTEXT);
        assert_eq!(doc.public_key[0].owner, None);
        assert_eq!(doc.public_key[0].public_key_hex.as_deref(), Some("04deadbeef"));
    }
}
