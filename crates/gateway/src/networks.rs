// RpcGate - JSON-RPC gateway for OpenAPI-described node APIs
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Named upstream networks and specification download

use eyre::{Result, WrapErr};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Network served when none is selected
pub const DEFAULT_NETWORK: &str = "devnet";

/// Built-in networks, in listing order
pub const DEFAULT_NETWORKS: &[(&str, &str)] = &[
    ("mainnet", "https://fullnode.mainnet.aptoslabs.com/v1"),
    ("testnet", "https://fullnode.testnet.aptoslabs.com/v1"),
    ("devnet", "https://fullnode.devnet.aptoslabs.com/v1"),
];

/// File name of the OpenAPI document under a network's base URL
pub const SPEC_FILE_NAME: &str = "spec.json";

/// Requested network is not in the registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network `{name}`, expected one of: {known}")]
pub struct UnknownNetwork {
    /// Requested name
    pub name: String,
    /// Comma separated list of configured names
    pub known: String,
}

/// A `name=url` override could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid network override `{0}`, expected NAME=URL")]
pub struct InvalidNetworkOverride(pub String);

/// Ordered map of network name to REST base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkRegistry {
    networks: IndexMap<String, String>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        let networks = DEFAULT_NETWORKS
            .iter()
            .map(|(name, url)| (name.to_string(), url.to_string()))
            .collect();
        Self { networks }
    }
}

impl NetworkRegistry {
    /// Registry without any network
    pub fn empty() -> Self {
        Self { networks: IndexMap::new() }
    }

    /// Adds or replaces a network, returning the previous URL
    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) -> Option<String> {
        self.networks.insert(name.into(), url.into())
    }

    /// Adds every entry of `other`, replacing networks with the same name
    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, String)>) {
        self.networks.extend(other);
    }

    /// Configured network names, in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    /// First configured network
    pub fn first(&self) -> Option<&str> {
        self.names().next()
    }

    /// REST base URL of `name`
    pub fn base_url(&self, name: &str) -> Result<&str, UnknownNetwork> {
        self.networks.get(name).map(String::as_str).ok_or_else(|| UnknownNetwork {
            name: name.to_string(),
            known: self.names().collect::<Vec<_>>().join(", "),
        })
    }

    /// Location of the OpenAPI document published by `name`
    pub fn spec_url(&self, name: &str) -> Result<String, UnknownNetwork> {
        let base = self.base_url(name)?;
        Ok(format!("{}/{SPEC_FILE_NAME}", base.trim_end_matches('/')))
    }

    /// Parses a `name=url` override
    pub fn parse_override(raw: &str) -> Result<(String, String), InvalidNetworkOverride> {
        match raw.split_once('=') {
            Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
                Ok((name.trim().to_string(), url.trim().to_string()))
            }
            _ => Err(InvalidNetworkOverride(raw.to_string())),
        }
    }
}

/// Downloads the OpenAPI document at `url`
pub async fn fetch_spec(client: &reqwest::Client, url: &str) -> Result<Value> {
    info!("Fetching specification from {url}");
    let response = client
        .get(url)
        .send()
        .await
        .wrap_err_with(|| format!("failed to request {url}"))?
        .error_for_status()
        .wrap_err_with(|| format!("failed to download {url}"))?;

    response.json().await.wrap_err_with(|| format!("{url} did not return a JSON document"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_networks() {
        let registry = NetworkRegistry::default();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["mainnet", "testnet", "devnet"]);
        assert_eq!(registry.first(), Some("mainnet"));
        assert_eq!(
            registry.base_url(DEFAULT_NETWORK).unwrap(),
            "https://fullnode.devnet.aptoslabs.com/v1"
        );
        assert_eq!(
            registry.spec_url("mainnet").unwrap(),
            "https://fullnode.mainnet.aptoslabs.com/v1/spec.json"
        );
    }

    #[test]
    fn test_unknown_network_lists_known_names() {
        let err = NetworkRegistry::default().base_url("localnet").unwrap_err();
        assert_eq!(err.known, "mainnet, testnet, devnet");
        assert_eq!(
            err.to_string(),
            "unknown network `localnet`, expected one of: mainnet, testnet, devnet"
        );
    }

    #[test]
    fn test_overrides() {
        let mut registry = NetworkRegistry::default();
        let (name, url) = NetworkRegistry::parse_override("localnet=http://127.0.0.1:8080/v1/").unwrap();
        registry.insert(name, url);
        assert_eq!(
            registry.insert("devnet", "http://devnet.local/v1").as_deref(),
            Some("https://fullnode.devnet.aptoslabs.com/v1")
        );

        assert_eq!(registry.spec_url("localnet").unwrap(), "http://127.0.0.1:8080/v1/spec.json");
        assert_eq!(registry.base_url("devnet").unwrap(), "http://devnet.local/v1");
        assert_eq!(registry.names().last(), Some("localnet"));

        for raw in ["localnet", "=http://x", "localnet=", ""] {
            assert!(NetworkRegistry::parse_override(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_registry_from_toml() {
        let registry: NetworkRegistry =
            toml::from_str("local = \"http://127.0.0.1:8080/v1\"\nmainnet = \"https://m/v1\"").unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["local", "mainnet"]);
    }

    #[tokio::test]
    async fn test_fetch_spec() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/spec.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"openapi": "3.0.0", "paths": {}})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut registry = NetworkRegistry::empty();
        registry.insert("local", format!("{}/v1", mock_server.uri()));
        let url = registry.spec_url("local").unwrap();

        let document = fetch_spec(&reqwest::Client::new(), &url).await.unwrap();
        assert_eq!(document["openapi"], "3.0.0");
    }

    #[tokio::test]
    async fn test_fetch_spec_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/spec.json", mock_server.uri());
        assert!(fetch_spec(&reqwest::Client::new(), &url).await.is_err());
    }
}
