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

//! TOML configuration file
//!
//! Every field is optional; command-line flags take precedence over the file.
//!
//! ```toml
//! spec = "spec.json"
//! network = "local"
//! port = 8080
//!
//! [networks]
//! local = "http://127.0.0.1:8080/v1"
//! ```

use crate::networks::NetworkRegistry;
use eyre::{Result, WrapErr};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Gateway settings read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Path of the OpenAPI document
    pub spec: Option<PathBuf>,
    /// Selected network
    pub network: Option<String>,
    /// Explicit upstream base URL, bypassing the network registry
    pub upstream_url: Option<String>,
    /// Additional or replacement networks
    pub networks: IndexMap<String, String>,
    /// Prefix accepted before camel-cased method names
    pub alias_prefix: Option<String>,
    /// Prefix of upstream headers copied into responses
    pub vendor_header_prefix: Option<String>,
    /// Listen address
    pub host: Option<String>,
    /// Listen port
    pub port: Option<u16>,
}

impl GatewayConfig {
    /// Reads and parses the configuration at `path`
    ///
    /// A relative `spec` path is resolved against the directory of the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse config file as TOML: {}", path.display()))?;

        if let (Some(spec), Some(dir)) = (&config.spec, path.parent()) {
            if spec.is_relative() {
                config.spec = Some(dir.join(spec));
            }
        }

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Built-in networks extended with the ones from this file
    pub fn network_registry(&self) -> NetworkRegistry {
        let mut registry = NetworkRegistry::default();
        registry.extend(self.networks.clone());
        registry
    }
}
