//! Resolver for the `ethr` DID method.
//!
//! An ethr DID wraps an ethereum address; its document is not stored
//! anywhere but derived by replaying the identity's change history from the
//! ERC-1056 registry contract. The registry keeps one `changed` block
//! pointer per identity and every event carries the previous pointer, so
//! the full history is reachable by walking log entries backward from the
//! most recent change.
//!
//! Example: `did:ethr:0xb9c5714089478a327f09197987f16f9e5d936e8a`.

pub mod network;
pub mod registry;
pub mod rpc;

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use async_trait::async_trait;

use did_jwt::did::{
    AuthenticationEntry, DIDDocument, PublicKeyEntry, ServiceEntry, ATTRIBUTE_TYPE_SIG_AUTH,
    ATTRIBUTE_TYPE_VERI_KEY, DEFAULT_CONTEXT, SECP256K1_SIGNATURE_AUTHENTICATION_2018,
    SECP256K1_VERIFICATION_KEY_2018,
};
use did_jwt::did_resolve::DIDResolver;
use did_jwt::keccak_hash::bytes_to_lowerhex;
use did_jwt::time::{SystemTimeProvider, TimeProvider};
use did_jwt::Error;

use network::{EthrDIDNetwork, RegistryMap};
use registry::RegistryEvent;

pub use registry::DEFAULT_REGISTRY_ADDRESS;

const DEFAULT_NETWORK_NAME: &str = "";

fn is_hex_address(candidate: &str) -> bool {
    candidate.len() == 42
        && candidate.starts_with("0x")
        && candidate[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Rewrites an ethr DID or bare ethereum address into canonical form:
/// `did:ethr:<network:>0x<lowercase-hex>`, with a `mainnet`-equivalent
/// network segment collapsed away and any fragment discarded. Returns
/// `None` for identifiers that belong to another method or don't carry a
/// valid address.
pub fn normalize_did(did: &str) -> Option<String> {
    let without_fragment = did.split('#').next().unwrap_or(did);
    let segments: Vec<&str> = without_fragment.split(':').collect();
    let (network, address) = match segments.as_slice() {
        [address] => ("", *address),
        ["did", address] => ("", *address),
        ["did", "ethr", address] => ("", *address),
        ["did", "ethr", network, address] => (*network, *address),
        _ => return None,
    };
    if !is_hex_address(address) {
        return None;
    }
    let address = format!("0x{}", address[2..].to_lowercase());
    match network {
        "" | "mainnet" | "0x1" | "0x01" => Some(format!("did:ethr:{}", address)),
        network => Some(format!("did:ethr:{}:{}", network, address)),
    }
}

/// The network segment of an ethr DID, or the empty string when there is
/// none (or the identifier is not an ethr DID at all).
fn extract_network(did: &str) -> &str {
    let rest = match did.strip_prefix("did:ethr:") {
        Some(rest) => rest,
        None => return "",
    };
    let rest = rest.split('#').next().unwrap_or(rest);
    match rest.find(':') {
        Some(index) if is_hex_address(&rest[index + 1..]) => &rest[..index],
        _ => "",
    }
}

/// The identity address of a normalized ethr DID.
fn extract_address(normalized_did: &str) -> &str {
    &normalized_did[normalized_did.len() - 42..]
}

/// Ordered entry list with map-keyed deduplication: inserting an existing
/// key replaces the value in place, keeping the original position.
struct KeyedEntries<T> {
    entries: Vec<(String, T)>,
}

impl<T> KeyedEntries<T> {
    fn new() -> Self {
        KeyedEntries {
            entries: Vec::new(),
        }
    }

    fn put(&mut self, key: String, value: T) {
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| *existing == key)
        {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    fn into_values(self) -> Vec<T> {
        self.entries.into_iter().map(|(_, value)| value).collect()
    }
}

/// Resolves ethr DIDs across one or more configured ethereum networks.
pub struct EthrDIDResolver {
    registry_map: RegistryMap,
    time_provider: Box<dyn TimeProvider>,
}

impl EthrDIDResolver {
    pub fn builder() -> EthrDIDResolverBuilder {
        EthrDIDResolverBuilder::default()
    }

    /// Current owner of the identity, read from the registry contract.
    async fn lookup_owner(
        &self,
        identity: &str,
        config: &EthrDIDNetwork,
    ) -> Result<String, Error> {
        let raw = config
            .rpc
            .eth_call(
                &config.registry_address,
                &registry::encode_identity_owner_call(identity),
            )
            .await?;
        if raw.len() < 40 {
            return Err(Error::Rpc(format!(
                "unexpected identityOwner response: {}",
                raw
            )));
        }
        Ok(format!("0x{}", raw[raw.len() - 40..].to_lowercase()))
    }

    /// Block number of the identity's most recent change, or zero when it
    /// was never changed.
    async fn last_changed(&self, identity: &str, config: &EthrDIDNetwork) -> Result<u64, Error> {
        let raw = config
            .rpc
            .eth_call(
                &config.registry_address,
                &registry::encode_changed_call(identity),
            )
            .await
            .map_err(|_| Error::LastChangedLookup(identity.to_string()))?;
        parse_hex_quantity(&raw)
    }

    /// Replays the identity's change history by walking `previousChange`
    /// pointers backward from the last changed block.
    ///
    /// Blocks are visited smallest-first from a priority queue; the zero
    /// sentinel stops the walk. Pointers are only followed when they point
    /// strictly backward, so a corrupted event cannot loop the walk.
    async fn get_history(
        &self,
        identity: &str,
        config: &EthrDIDNetwork,
    ) -> Result<Vec<RegistryEvent>, Error> {
        let mut queue = BinaryHeap::new();
        let mut events = Vec::new();
        queue.push(Reverse(self.last_changed(identity, config).await?));
        while let Some(Reverse(block)) = queue.pop() {
            if block == 0 {
                break;
            }
            let logs = config
                .rpc
                .get_logs(
                    &config.registry_address,
                    vec![None, Some(registry::identity_topic(identity))],
                    block,
                    block,
                )
                .await?;
            for log in logs {
                if let Some(event) = registry::decode_event(&log.topics, &log.data)? {
                    let previous = event.previous_change();
                    if previous < block {
                        queue.push(Reverse(previous));
                    }
                    events.push(event);
                }
            }
        }
        Ok(events)
    }

    /// Builds the DID document for an owner and its replayed history.
    ///
    /// The owner key and authentication entry are always present. Delegates
    /// and attributes only contribute entries while their `validTo` is in
    /// the future; expired ones are simply absent. Repeated events for the
    /// same logical entry collapse onto the first occurrence in replay
    /// order, which is the newest state since the history runs newest-first.
    fn wrap_did_document(
        &self,
        did: &str,
        owner_address: &str,
        history: &[RegistryEvent],
    ) -> Result<DIDDocument, Error> {
        let owner_key_id = format!("{}#owner", did);
        let mut pk_entries = KeyedEntries::new();
        let mut auth_entries = KeyedEntries::new();
        let mut service_entries: KeyedEntries<ServiceEntry> = KeyedEntries::new();

        pk_entries.put(
            "owner".to_string(),
            PublicKeyEntry {
                id: owner_key_id.clone(),
                type_: SECP256K1_VERIFICATION_KEY_2018.to_string(),
                owner: Some(did.to_string()),
                ethereum_address: Some(owner_address.to_string()),
                ..Default::default()
            },
        );
        auth_entries.put(
            "owner".to_string(),
            AuthenticationEntry {
                type_: SECP256K1_SIGNATURE_AUTHENTICATION_2018.to_string(),
                public_key: owner_key_id,
            },
        );

        let now = self.time_provider.now_ms() / 1000;
        let mut delegate_count: u64 = 0;

        for event in history {
            match event {
                RegistryEvent::Delegate(event) => {
                    if (event.valid_to as i64) < now {
                        continue;
                    }
                    let key = format!(
                        "DIDDelegateChanged-{}-{}",
                        event.delegate_type, event.delegate
                    );
                    match event.delegate_type.as_str() {
                        SECP256K1_SIGNATURE_AUTHENTICATION_2018 | ATTRIBUTE_TYPE_SIG_AUTH => {
                            // authentication delegates take an index but do
                            // not advance the shared counter
                            auth_entries.put(
                                key,
                                AuthenticationEntry {
                                    type_: SECP256K1_SIGNATURE_AUTHENTICATION_2018.to_string(),
                                    public_key: format!("{}#delegate-{}", did, delegate_count + 1),
                                },
                            );
                        }
                        SECP256K1_VERIFICATION_KEY_2018 | ATTRIBUTE_TYPE_VERI_KEY => {
                            delegate_count += 1;
                            pk_entries.put(
                                key,
                                PublicKeyEntry {
                                    id: format!("{}#delegate-{}", did, delegate_count),
                                    type_: SECP256K1_VERIFICATION_KEY_2018.to_string(),
                                    owner: Some(did.to_string()),
                                    ethereum_address: Some(event.delegate.clone()),
                                    ..Default::default()
                                },
                            );
                        }
                        _ => {}
                    }
                }
                RegistryEvent::Attribute(event) => {
                    if (event.valid_to as i64) < now {
                        continue;
                    }
                    let parsed = match parse_attribute_name(&event.name) {
                        Some(parsed) => parsed,
                        None => continue,
                    };
                    let key = format!(
                        "DIDAttributeChanged-{}-{}",
                        event.name,
                        bytes_to_lowerhex(&event.value)
                    );
                    match parsed.section {
                        "pub" | "auth" => {
                            delegate_count += 1;
                            let mut entry = PublicKeyEntry {
                                id: format!("{}#delegate-{}", did, delegate_count),
                                type_: parse_attribute_type(parsed.algorithm, parsed.raw_type),
                                owner: Some(did.to_string()),
                                ..Default::default()
                            };
                            match parsed.encoding {
                                "" | "null" | "hex" => {
                                    entry.public_key_hex = Some(bytes_to_lowerhex(&event.value));
                                }
                                "base64" => {
                                    entry.public_key_base64 = Some(base64::encode(&event.value));
                                }
                                "base58" => {
                                    let raw = hex::decode(
                                        String::from_utf8_lossy(&event.value)
                                            .trim_start_matches("0x"),
                                    )?;
                                    entry.public_key_base58 =
                                        Some(bs58::encode(raw).into_string());
                                }
                                _ => {
                                    entry.value = Some(bytes_to_lowerhex(&event.value));
                                }
                            }
                            pk_entries.put(key, entry);
                        }
                        "svc" => {
                            service_entries.put(
                                key,
                                ServiceEntry {
                                    type_: parsed.algorithm.to_string(),
                                    service_endpoint: String::from_utf8_lossy(&event.value)
                                        .to_string(),
                                },
                            );
                        }
                        _ => {}
                    }
                }
                RegistryEvent::Owner(_) => {}
            }
        }

        Ok(DIDDocument {
            context: DEFAULT_CONTEXT.to_string(),
            id: did.to_string(),
            public_key: pk_entries.into_values(),
            authentication: auth_entries.into_values(),
            service: service_entries.into_values(),
        })
    }
}

#[async_trait]
impl DIDResolver for EthrDIDResolver {
    fn method(&self) -> &str {
        "ethr"
    }

    fn can_resolve(&self, did: &str) -> bool {
        match normalize_did(did) {
            Some(normalized) => self
                .registry_map
                .get_or_null(extract_network(&normalized))
                .is_some(),
            None => false,
        }
    }

    async fn resolve(&self, did: &str) -> Result<DIDDocument, Error> {
        let network_id = match extract_network(did) {
            "" => DEFAULT_NETWORK_NAME,
            network => network,
        };
        let config = self
            .registry_map
            .get(network_id)
            .map_err(|_| Error::MissingRegistryConfiguration(network_id.to_string()))?;
        if config.registry_address.trim().is_empty() {
            return Err(Error::BlankRegistryAddress(network_id.to_string()));
        }

        let normalized = normalize_did(did).ok_or_else(|| Error::InvalidDid(did.to_string()))?;
        let identity = extract_address(&normalized);
        let owner = self.lookup_owner(identity, config).await?;
        let history = self.get_history(identity, config).await?;
        self.wrap_did_document(&normalized, &owner, &history)
    }
}

/// Configures an [`EthrDIDResolver`] with its networks and clock.
#[derive(Default)]
pub struct EthrDIDResolverBuilder {
    networks: Vec<EthrDIDNetwork>,
    time_provider: Option<Box<dyn TimeProvider>>,
}

impl EthrDIDResolverBuilder {
    /// Adds a network whose ERC-1056 registry this resolver can query.
    pub fn add_network(mut self, network: EthrDIDNetwork) -> Self {
        self.networks.push(network);
        self
    }

    /// Replaces the system clock, for "was valid at" queries and
    /// deterministic tests.
    pub fn time_provider(mut self, time_provider: Box<dyn TimeProvider>) -> Self {
        self.time_provider = Some(time_provider);
        self
    }

    pub fn build(self) -> EthrDIDResolver {
        EthrDIDResolver {
            registry_map: RegistryMap::from_networks(self.networks),
            time_provider: self
                .time_provider
                .unwrap_or_else(|| Box::new(SystemTimeProvider)),
        }
    }
}

fn parse_hex_quantity(raw: &str) -> Result<u64, Error> {
    let digits = raw.trim_start_matches("0x").trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|_| Error::NumericOverflow)
}

struct AttributeName<'a> {
    section: &'a str,
    algorithm: &'a str,
    raw_type: &'a str,
    encoding: &'a str,
}

/// Parses a registry attribute name of the shape
/// `did/(pub|auth|svc)/<algorithm>(/<type>)?(/<encoding>)?`.
fn parse_attribute_name(name: &str) -> Option<AttributeName<'_>> {
    fn is_word(segment: &str) -> bool {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    let rest = name.strip_prefix("did/")?;
    let segments: Vec<&str> = rest.split('/').collect();
    let (section, algorithm, raw_type, encoding) = match segments.as_slice() {
        [section, algorithm] if is_word(algorithm) => (*section, *algorithm, "", ""),
        [section, algorithm, raw_type] if is_word(algorithm) && is_word(raw_type) => {
            (*section, *algorithm, *raw_type, "")
        }
        [section, algorithm, raw_type, encoding]
            if is_word(algorithm) && is_word(raw_type) && is_word(encoding) =>
        {
            (*section, *algorithm, *raw_type, *encoding)
        }
        _ => return None,
    };
    if !matches!(section, "pub" | "auth" | "svc") {
        return None;
    }
    Some(AttributeName {
        section,
        algorithm,
        raw_type,
        encoding,
    })
}

/// Combines an attribute's algorithm and type segments into a document key
/// type, expanding the registry's short forms.
fn parse_attribute_type(algorithm: &str, raw_type: &str) -> String {
    let suffix = if raw_type.is_empty() {
        ATTRIBUTE_TYPE_VERI_KEY
    } else {
        raw_type
    };
    let suffix = match suffix {
        ATTRIBUTE_TYPE_SIG_AUTH => "SignatureAuthentication2018",
        ATTRIBUTE_TYPE_VERI_KEY => "VerificationKey2018",
        other => other,
    };
    format!("{}{}", algorithm, suffix)
}
