//! Minimal JSON-RPC access to an ethereum node.
//!
//! Resolution only needs two read-only operations, so the client is a small
//! trait rather than a full web3 binding. Mock it to resolve against canned
//! chain state.

use async_trait::async_trait;
use did_jwt::Error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One log entry returned by `eth_getLogs`, in wire field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

/// Read-only ethereum node operations used during resolution.
#[async_trait]
pub trait JsonRpcClient: Send + Sync {
    /// `eth_call` against the latest block, returning the raw hex result.
    async fn eth_call(&self, to: &str, data: &str) -> Result<String, Error>;

    /// `eth_getLogs` for one address over a block range. A `None` topic
    /// matches anything at that position.
    async fn get_logs(
        &self,
        address: &str,
        topics: Vec<Option<String>>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, Error>;
}

/// JSON-RPC 2.0 over HTTP.
pub struct HttpJsonRpcClient {
    url: String,
    client: reqwest::Client,
}

impl HttpJsonRpcClient {
    pub fn new(url: &str) -> Self {
        HttpJsonRpcClient {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, Error> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(Error::Rpc(format!("{} (code {})", error.message, error.code)));
        }
        response
            .result
            .ok_or_else(|| Error::Rpc(format!("empty result for {}", method)))
    }
}

#[async_trait]
impl JsonRpcClient for HttpJsonRpcClient {
    async fn eth_call(&self, to: &str, data: &str) -> Result<String, Error> {
        self.request("eth_call", json!([{"to": to, "data": data}, "latest"]))
            .await
    }

    async fn get_logs(
        &self,
        address: &str,
        topics: Vec<Option<String>>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, Error> {
        self.request(
            "eth_getLogs",
            json!([{
                "address": address,
                "topics": topics,
                "fromBlock": format!("0x{:x}", from_block),
                "toBlock": format!("0x{:x}", to_block),
            }]),
        )
        .await
    }
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_from_wire_json() {
        let json = r#"{
          "address": "0xdca7ef03e98e0dc2b855be647c39abe984fcf21b",
          "topics": [
            "0x5a5084339536bcab65f20799fcc58724588145ca054bd2be626174b27ba156f7",
            "0x00000000000000000000000062d283fe6939c01fc88f02c6d2c9a547cc3e2656"
          ],
          "data": "0x00",
          "blockNumber": "0x476a76",
          "transactionHash": "0x5b1749dd1eb4cee09f114e5b12d82d68c9099ba38482d602f2d939f9082f71e3",
          "transactionIndex": "0x0",
          "blockHash": "0x4f1acf82e4b2578cb5a5c0fe1c3806dc89d5b28ca4946219cf1a0f04ad654fb8",
          "logIndex": "0x0",
          "removed": false
        }"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.topics.len(), 2);
        assert_eq!(entry.block_number.as_deref(), Some("0x476a76"));
        assert!(!entry.removed);
    }

    #[test]
    fn rpc_error_shape() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid argument"}}"#;
        let response: JsonRpcResponse<String> = serde_json::from_str(body).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.message, "invalid argument");
    }
}
