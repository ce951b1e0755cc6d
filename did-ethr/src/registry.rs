//! Call encoding and event decoding for the ERC-1056 registry contract.
//!
//! Only the read side is covered: the `identityOwner` and `changed` view
//! calls and the three event shapes the registry emits. Values are encoded
//! as standard 32-byte ABI words.

use did_jwt::Error;

/// Registry deployment shared by the popular public networks.
pub const DEFAULT_REGISTRY_ADDRESS: &str = "0xdca7ef03e98e0dc2b855be647c39abe984fcf21b";

/// Selector for `identityOwner(address)`.
pub const IDENTITY_OWNER_SELECTOR: &str = "8733d4e8";
/// Selector for `changed(address)`.
pub const CHANGED_SELECTOR: &str = "f96d0f9f";

/// Topic hash of `DIDOwnerChanged(address,address,uint256)`.
pub const DID_OWNER_CHANGED_TOPIC: &str =
    "0x38a5a6e68f30ed1ab45860a4afb34bcb2fc00f22ca462d249b8a8d40cda6f7a3";
/// Topic hash of `DIDDelegateChanged(address,bytes32,address,uint256,uint256)`.
pub const DID_DELEGATE_CHANGED_TOPIC: &str =
    "0x5a5084339536bcab65f20799fcc58724588145ca054bd2be626174b27ba156f7";
/// Topic hash of `DIDAttributeChanged(address,bytes32,bytes,uint256,uint256)`.
pub const DID_ATTRIBUTE_CHANGED_TOPIC: &str =
    "0x18ab6b2ae3d64306c00ce663125f2bd680e441a098de1635bd7ad8b0d44965e4";

const WORD: usize = 32;

/// Encodes the `identityOwner(address)` call for `eth_call`.
pub fn encode_identity_owner_call(identity: &str) -> String {
    encode_address_call(IDENTITY_OWNER_SELECTOR, identity)
}

/// Encodes the `changed(address)` call for `eth_call`.
pub fn encode_changed_call(identity: &str) -> String {
    encode_address_call(CHANGED_SELECTOR, identity)
}

fn encode_address_call(selector: &str, identity: &str) -> String {
    format!(
        "0x{}{:0>64}",
        selector,
        identity.trim_start_matches("0x").to_lowercase()
    )
}

/// The identity address padded to the 32-byte topic used to filter logs.
pub fn identity_topic(identity: &str) -> String {
    format!("0x{:0>64}", identity.trim_start_matches("0x").to_lowercase())
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnerChanged {
    pub identity: String,
    pub owner: String,
    pub previous_change: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegateChanged {
    pub identity: String,
    pub delegate_type: String,
    pub delegate: String,
    pub valid_to: u64,
    pub previous_change: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChanged {
    pub identity: String,
    pub name: String,
    pub value: Vec<u8>,
    pub valid_to: u64,
    pub previous_change: u64,
}

/// One decoded registry event.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Owner(OwnerChanged),
    Delegate(DelegateChanged),
    Attribute(AttributeChanged),
}

impl RegistryEvent {
    /// Block number of the previous change for the same identity, or zero
    /// when this was the first.
    pub fn previous_change(&self) -> u64 {
        match self {
            RegistryEvent::Owner(event) => event.previous_change,
            RegistryEvent::Delegate(event) => event.previous_change,
            RegistryEvent::Attribute(event) => event.previous_change,
        }
    }
}

/// Decodes one log entry against the three known event shapes, dispatching
/// on the first topic.
///
/// Logs that match none of the shapes, or whose data is too short or not
/// valid hex, decode to `None` rather than an error; a numeric field that
/// does not fit a 64-bit value is an error.
pub fn decode_event(topics: &[String], data: &str) -> Result<Option<RegistryEvent>, Error> {
    if topics.len() < 2 {
        return Ok(None);
    }
    let identity = match decode_topic_address(&topics[1]) {
        Some(identity) => identity,
        None => return Ok(None),
    };
    let words = match hex::decode(data.trim_start_matches("0x")) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(None),
    };

    if topics[0].eq_ignore_ascii_case(DID_OWNER_CHANGED_TOPIC) {
        if words.len() < 2 * WORD {
            return Ok(None);
        }
        Ok(Some(RegistryEvent::Owner(OwnerChanged {
            identity,
            owner: word_address(&words[..WORD]),
            previous_change: word_u64(&words[WORD..2 * WORD])?,
        })))
    } else if topics[0].eq_ignore_ascii_case(DID_DELEGATE_CHANGED_TOPIC) {
        if words.len() < 4 * WORD {
            return Ok(None);
        }
        Ok(Some(RegistryEvent::Delegate(DelegateChanged {
            identity,
            delegate_type: bytes32_to_string(&words[..WORD]),
            delegate: word_address(&words[WORD..2 * WORD]),
            valid_to: word_u64(&words[2 * WORD..3 * WORD])?,
            previous_change: word_u64(&words[3 * WORD..4 * WORD])?,
        })))
    } else if topics[0].eq_ignore_ascii_case(DID_ATTRIBUTE_CHANGED_TOPIC) {
        if words.len() < 4 * WORD {
            return Ok(None);
        }
        let value = match dynamic_bytes(&words, &words[WORD..2 * WORD])? {
            Some(value) => value,
            None => return Ok(None),
        };
        Ok(Some(RegistryEvent::Attribute(AttributeChanged {
            identity,
            name: bytes32_to_string(&words[..WORD]),
            value,
            valid_to: word_u64(&words[2 * WORD..3 * WORD])?,
            previous_change: word_u64(&words[3 * WORD..4 * WORD])?,
        })))
    } else {
        Ok(None)
    }
}

fn decode_topic_address(topic: &str) -> Option<String> {
    let bytes = hex::decode(topic.trim_start_matches("0x")).ok()?;
    if bytes.len() != WORD {
        return None;
    }
    Some(format!("0x{}", hex::encode(&bytes[12..])))
}

fn word_address(word: &[u8]) -> String {
    format!("0x{}", hex::encode(&word[12..]))
}

/// Narrows a big-endian 256-bit word to a block number / unix timestamp.
/// Values of 2^63 and above do not fit the timestamp arithmetic downstream.
fn word_u64(word: &[u8]) -> Result<u64, Error> {
    if word[..24].iter().any(|byte| *byte != 0) || word[24] >= 0x80 {
        return Err(Error::NumericOverflow);
    }
    let mut out = [0u8; 8];
    out.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(out))
}

fn bytes32_to_string(word: &[u8]) -> String {
    String::from_utf8_lossy(word).replace('\u{0}', "")
}

/// Reads a dynamic `bytes` field: the offset word points at a length word
/// followed by the padded payload. Out-of-bounds offsets yield `None`.
fn dynamic_bytes(data: &[u8], offset_word: &[u8]) -> Result<Option<Vec<u8>>, Error> {
    let offset = word_u64(offset_word)? as usize;
    if offset + WORD > data.len() {
        return Ok(None);
    }
    let length = word_u64(&data[offset..offset + WORD])? as usize;
    let start = offset + WORD;
    if start + length > data.len() {
        return Ok(None);
    }
    Ok(Some(data[start..start + length].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_TOPIC: &str =
        "0x000000000000000000000000f3beac30c498d9e26865f34fcaa57dbb935b0d74";

    #[test]
    fn encodes_view_calls() {
        assert_eq!(
            encode_changed_call("0xf3beac30c498d9e26865f34fcaa57dbb935b0d74"),
            "0xf96d0f9f000000000000000000000000f3beac30c498d9e26865f34fcaa57dbb935b0d74"
        );
        assert_eq!(
            encode_identity_owner_call("0x62d283fe6939c01fc88f02c6d2c9a547cc3e2656"),
            "0x8733d4e800000000000000000000000062d283fe6939c01fc88f02c6d2c9a547cc3e2656"
        );
        assert_eq!(
            identity_topic("0xF3beAC30C498D9E26865F34fCAa57dBB935b0D74"),
            IDENTITY_TOPIC
        );
    }

    #[test]
    fn decodes_delegate_changed() {
        let topics = vec![
            DID_DELEGATE_CHANGED_TOPIC.to_string(),
            IDENTITY_TOPIC.to_string(),
        ];
        let data = "0x536563703235366b31566572696669636174696f6e4b6579323031380000000000000000000000000000000045c4ebd7ffb86891ba6f9f68452f9f0815aacd8b0000000000000000000000000000000000000000000000000000000117656a2f00000000000000000000000000000000000000000000000000000000002a7b24";

        let event = decode_event(&topics, data).unwrap().unwrap();
        match event {
            RegistryEvent::Delegate(event) => {
                assert_eq!(event.identity, "0xf3beac30c498d9e26865f34fcaa57dbb935b0d74");
                assert_eq!(event.delegate_type, "Secp256k1VerificationKey2018");
                assert_eq!(event.delegate, "0x45c4ebd7ffb86891ba6f9f68452f9f0815aacd8b");
                assert_eq!(event.valid_to, 0x0001_1765_6a2f);
                assert_eq!(event.previous_change, 0x2a7b24);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn decodes_owner_changed() {
        let topics = vec![
            DID_OWNER_CHANGED_TOPIC.to_string(),
            IDENTITY_TOPIC.to_string(),
        ];
        let data = "0x000000000000000000000000f3beac30c498d9e26865f34fcaa57dbb935b0d74000000000000000000000000000000000000000000000000000000000029db37";

        let event = decode_event(&topics, data).unwrap().unwrap();
        match event {
            RegistryEvent::Owner(event) => {
                assert_eq!(event.owner, "0xf3beac30c498d9e26865f34fcaa57dbb935b0d74");
                assert_eq!(event.previous_change, 0x29db37);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn decodes_attribute_changed() {
        let name = "did/svc/HubService";
        let endpoint = b"https://hubs.uport.me";
        let mut name_word = [0u8; 32];
        name_word[..name.len()].copy_from_slice(name.as_bytes());
        let mut padded_value = endpoint.to_vec();
        padded_value.resize((endpoint.len() + 31) / 32 * 32, 0);
        let data = format!(
            "0x{}{:0>64x}{:0>64x}{:0>64x}{:0>64x}{}",
            hex::encode(name_word),
            128, // offset of the dynamic field
            0x117656a2fu64,
            0x2a7b24,
            endpoint.len(),
            hex::encode(&padded_value),
        );
        let topics = vec![
            DID_ATTRIBUTE_CHANGED_TOPIC.to_string(),
            IDENTITY_TOPIC.to_string(),
        ];

        let event = decode_event(&topics, &data).unwrap().unwrap();
        match event {
            RegistryEvent::Attribute(event) => {
                assert_eq!(event.name, name);
                assert_eq!(event.value, endpoint);
                assert_eq!(event.valid_to, 0x0001_1765_6a2f);
                assert_eq!(event.previous_change, 0x2a7b24);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_topics_and_short_data_are_skipped() {
        let topics = vec![
            "0x0000000000000000000000000000000000000000000000000000000000000000".to_string(),
            IDENTITY_TOPIC.to_string(),
        ];
        assert_eq!(decode_event(&topics, "0x00").unwrap(), None);

        let topics = vec![
            DID_OWNER_CHANGED_TOPIC.to_string(),
            IDENTITY_TOPIC.to_string(),
        ];
        assert_eq!(decode_event(&topics, "0x0011").unwrap(), None);
        assert_eq!(decode_event(&topics, "0xzzzz").unwrap(), None);
        assert_eq!(decode_event(&[], "0x00").unwrap(), None);
    }

    #[test]
    fn oversize_numeric_fields_are_rejected() {
        let topics = vec![
            DID_OWNER_CHANGED_TOPIC.to_string(),
            IDENTITY_TOPIC.to_string(),
        ];
        // previousChange = 2^63, one past the largest representable value
        let data = "0x000000000000000000000000f3beac30c498d9e26865f34fcaa57dbb935b0d740000000000000000000000000000000000000000000000008000000000000000";
        assert!(matches!(
            decode_event(&topics, data),
            Err(Error::NumericOverflow)
        ));

        // 2^63 - 1 still fits
        let data = "0x000000000000000000000000f3beac30c498d9e26865f34fcaa57dbb935b0d740000000000000000000000000000000000000000000000007fffffffffffffff";
        let event = decode_event(&topics, data).unwrap().unwrap();
        assert_eq!(event.previous_change(), i64::MAX as u64);
    }
}
