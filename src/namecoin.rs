//! JSON-RPC client for the blockchain daemon.
//!
//! Speaks the bitcoin-style JSON-RPC dialect: `name_show` to fetch one
//! name, `name_scan` for zone dumps, `getblockcount` for the status
//! console. The wallet error code `-4` ("name not found") maps to
//! [`Error::NoSuchDomain`]; every other upstream failure is surfaced as
//! [`Error::Upstream`].

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use crate::backend::NameSource;
use crate::config::Config;
use crate::error::Error;

/// Upstream code for "name not found" (a wallet error in the daemon).
const RPC_WALLET_ERROR: i64 = -4;

/// A connection to the daemon's JSON-RPC interface.
pub struct Client {
    http: reqwest::Client,
    url: String,
    username: String,
    password: String,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Json,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Json>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct NameShowReply {
    value: String,
}

#[derive(Deserialize)]
struct NameScanEntry {
    name: String,
    #[serde(default)]
    value: String,
}

impl Client {
    /// Builds a client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `rpc_address` is unset.
    pub fn from_config(cfg: &Config) -> Result<Self, Error> {
        let url = cfg
            .rpc_address
            .clone()
            .ok_or_else(|| Error::Config("rpc_address is not configured".to_owned()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            url,
            username: cfg.rpc_username.clone(),
            password: cfg.rpc_password.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Json) -> Result<Json, Error> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let response = self
            .http
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|err| Error::Upstream(err.to_string()))?;
        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| Error::Upstream(err.to_string()))?;

        if let Some(rpc_error) = body.error {
            if rpc_error.code == RPC_WALLET_ERROR {
                return Err(Error::NoSuchDomain);
            }
            return Err(Error::Upstream(format!(
                "rpc error {}: {}",
                rpc_error.code, rpc_error.message
            )));
        }
        body.result
            .ok_or_else(|| Error::Upstream("rpc returned no result".to_owned()))
    }

    /// Current block height, for the status console.
    pub async fn cur_height(&self) -> Result<i64, Error> {
        let result = self.call("getblockcount", json!([])).await?;
        result
            .as_i64()
            .ok_or_else(|| Error::Upstream("bad getblockcount reply".to_owned()))
    }
}

#[async_trait]
impl NameSource for Client {
    // Isolation tags partition upstream transports that support them
    // (e.g. per-circuit proxying); plain JSON-RPC has nothing to
    // partition, so the tag is not forwarded.
    async fn name_show(&self, key: &str, _isolation: &str) -> Result<String, Error> {
        let result = self.call("name_show", json!([key])).await?;
        let reply: NameShowReply = serde_json::from_value(result)
            .map_err(|err| Error::Upstream(format!("bad name_show reply: {err}")))?;
        Ok(reply.value)
    }

    async fn name_scan(&self, start: &str, count: u32) -> Result<Vec<(String, String)>, Error> {
        let result = self.call("name_scan", json!([start, count])).await?;
        let entries: Vec<NameScanEntry> = serde_json::from_value(result)
            .map_err(|err| Error::Upstream(format!("bad name_scan reply: {err}")))?;
        Ok(entries.into_iter().map(|e| (e.name, e.value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_an_rpc_address() {
        let cfg: Config = serde_json::from_value(json!({
            "dns_udp_bind_addr": "127.0.0.1:5353",
            "dns_tcp_bind_addr": "127.0.0.1:5353",
        }))
        .unwrap();
        assert!(matches!(Client::from_config(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn scan_entries_deserialize() {
        let entries: Vec<NameScanEntry> = serde_json::from_value(json!([
            {"name": "d/a", "value": "{}"},
            {"name": "d/b"},
        ]))
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "d/a");
        assert_eq!(entries[1].value, "");
    }
}
