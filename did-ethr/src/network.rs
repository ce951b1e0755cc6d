//! Per-network configuration for ERC-1056 registries.

use std::collections::HashMap;
use std::sync::Arc;

use did_jwt::Error;

use crate::rpc::JsonRpcClient;

/// Everything needed to resolve an ethr DID anchored in one ethereum
/// network: where the registry contract lives and how to reach a node.
///
/// Example DID for a non-default network: `did:ethr:rinkeby:0xcf03...`.
#[derive(Clone)]
pub struct EthrDIDNetwork {
    /// Network name as it appears in the DID, e.g. `mainnet` or `rinkeby`.
    pub name: String,
    /// Address of the ERC-1056 contract on this network.
    pub registry_address: String,
    /// Node access for contract reads and log queries.
    pub rpc: Arc<dyn JsonRpcClient>,
    /// EIP-155 chain id as a hex quantity, when known.
    pub chain_id: Option<String>,
}

impl EthrDIDNetwork {
    pub fn new(
        name: &str,
        registry_address: &str,
        rpc: Arc<dyn JsonRpcClient>,
        chain_id: Option<&str>,
    ) -> Self {
        EthrDIDNetwork {
            name: name.to_string(),
            registry_address: registry_address.to_string(),
            rpc,
            chain_id: chain_id.map(str::to_string),
        }
    }
}

/// Maps network names and chain ids to their [`EthrDIDNetwork`] configs.
pub struct RegistryMap {
    networks: HashMap<String, EthrDIDNetwork>,
}

/// Collapses equivalent hex quantities to one key: strip the `0x` prefix,
/// trim leading zeros, prepend `0x` again. `0x01` and `0x1` collide.
fn normalize_quantity(id: &str) -> String {
    format!("0x{}", id.trim_start_matches("0x").trim_start_matches('0'))
}

impl RegistryMap {
    pub fn new() -> Self {
        RegistryMap {
            networks: HashMap::new(),
        }
    }

    /// Registers a network under its name, and under its normalized chain
    /// id when one is configured.
    pub fn register(&mut self, config: EthrDIDNetwork) {
        if let Some(chain_id) = config.chain_id.clone() {
            self.networks
                .insert(normalize_quantity(&chain_id), config.clone());
        }
        self.networks.insert(config.name.clone(), config);
    }

    /// Looks up a network by chain id (normalized first) or plain name.
    pub fn get(&self, query: &str) -> Result<&EthrDIDNetwork, Error> {
        self.networks
            .get(&normalize_quantity(query))
            .or_else(|| self.networks.get(query))
            .ok_or_else(|| Error::UnknownNetwork(query.to_string()))
    }

    pub fn get_or_null(&self, query: &str) -> Option<&EthrDIDNetwork> {
        self.get(query).ok()
    }

    /// Builds a map from a list of configs. When none of them registers the
    /// empty default key, the mainnet-like entry (by name or chain id) is
    /// cloned into it so un-networked DIDs still resolve.
    pub fn from_networks(configs: Vec<EthrDIDNetwork>) -> Self {
        let mut map = RegistryMap::new();
        for config in configs {
            map.register(config);
        }
        let default = map
            .get_or_null("")
            .or_else(|| map.get_or_null("mainnet"))
            .or_else(|| map.get_or_null("0x1"))
            .cloned();
        if let Some(default) = default {
            map.register(EthrDIDNetwork {
                name: String::new(),
                ..default
            });
        }
        map
    }
}

impl Default for RegistryMap {
    fn default() -> Self {
        RegistryMap::new()
    }
}
