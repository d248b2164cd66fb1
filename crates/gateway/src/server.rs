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

//! HTTP front end of the gateway

use crate::{
    config::GatewayConfig,
    networks::{NetworkRegistry, DEFAULT_NETWORK},
    resolver::{MethodResolver, DEFAULT_ALIAS_PREFIX},
    rpc::{RpcHandler, DEFAULT_VENDOR_HEADER_PREFIX},
    spec::SpecDocument,
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::any,
    Router,
};
use eyre::{eyre, Result, WrapErr};
use std::{future::Future, net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Builder for configuring [`GatewayServer`] with fluent API and sensible defaults
#[derive(Debug, Clone)]
pub struct GatewayServerBuilder {
    spec: Option<Arc<SpecDocument>>,
    spec_path: Option<PathBuf>,
    networks: NetworkRegistry,
    network: String,
    upstream_url: Option<String>,
    alias_prefix: String,
    vendor_header_prefix: String,
}

impl Default for GatewayServerBuilder {
    fn default() -> Self {
        Self {
            spec: None,
            spec_path: None,
            networks: NetworkRegistry::default(),
            network: DEFAULT_NETWORK.to_string(),
            upstream_url: None,
            alias_prefix: DEFAULT_ALIAS_PREFIX.to_string(),
            vendor_header_prefix: DEFAULT_VENDOR_HEADER_PREFIX.to_string(),
        }
    }
}

impl GatewayServerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every setting present in `config`
    pub fn config(mut self, config: &GatewayConfig) -> Self {
        self.networks.extend(config.networks.clone());
        if let Some(spec) = &config.spec {
            self = self.spec_path(spec);
        }
        if let Some(network) = &config.network {
            self.network = network.clone();
        }
        if let Some(url) = &config.upstream_url {
            self.upstream_url = Some(url.clone());
        }
        if let Some(prefix) = &config.alias_prefix {
            self.alias_prefix = prefix.clone();
        }
        if let Some(prefix) = &config.vendor_header_prefix {
            self.vendor_header_prefix = prefix.clone();
        }
        self
    }

    /// Use an already loaded specification
    pub fn spec(mut self, spec: SpecDocument) -> Self {
        self.spec = Some(Arc::new(spec));
        self.spec_path = None;
        self
    }

    /// Load the specification from a JSON file
    pub fn spec_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.spec_path = Some(path.into());
        self.spec = None;
        self
    }

    /// Replace the network registry
    pub fn networks(mut self, networks: NetworkRegistry) -> Self {
        self.networks = networks;
        self
    }

    /// Add or replace one network
    pub fn network_url(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.networks.insert(name, url);
        self
    }

    /// Select the upstream network by name
    pub fn network(mut self, name: impl Into<String>) -> Self {
        self.network = name.into();
        self
    }

    /// Dispatch to `url` regardless of the selected network
    pub fn upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = Some(url.into());
        self
    }

    /// Prefix accepted before camel-cased method names
    pub fn alias_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.alias_prefix = prefix.into();
        self
    }

    /// Prefix of upstream headers copied into responses
    pub fn vendor_header_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.vendor_header_prefix = prefix.into();
        self
    }

    /// Build the GatewayServer, loading the specification if needed
    pub fn build(self) -> Result<GatewayServer> {
        let spec = match (self.spec, self.spec_path) {
            (Some(spec), _) => spec,
            (None, Some(path)) => Arc::new(
                SpecDocument::load(&path)
                    .wrap_err_with(|| format!("Failed to load specification {}", path.display()))?,
            ),
            (None, None) => return Err(eyre!("no specification document configured")),
        };

        let upstream_url = match self.upstream_url {
            Some(url) => url,
            None => self.networks.base_url(&self.network)?.to_string(),
        };

        let rpc_handler = RpcHandler::new(spec, upstream_url)?
            .with_resolver(MethodResolver::new(self.alias_prefix))
            .with_vendor_header_prefix(self.vendor_header_prefix);

        Ok(GatewayServer::new(rpc_handler))
    }
}

/// JSON-RPC gateway server
///
/// Answers `POST /` with a JSON-RPC envelope. Any other method or path gets
/// an empty 404.
///
/// ```no_run
/// # use rpcgate_gateway::server::GatewayServerBuilder;
/// # async fn example() -> eyre::Result<()> {
/// let gateway = GatewayServerBuilder::new()
///     .spec_path("spec.json")
///     .network("testnet")
///     .build()?;
/// gateway.serve("127.0.0.1:8080".parse()?).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GatewayServer {
    /// JSON-RPC request handler
    pub rpc_handler: Arc<RpcHandler>,
}

#[derive(Clone)]
struct AppState {
    rpc_handler: Arc<RpcHandler>,
}

impl GatewayServer {
    /// Wraps a configured handler
    pub fn new(rpc_handler: RpcHandler) -> Self {
        Self { rpc_handler: Arc::new(rpc_handler) }
    }

    /// Axum router serving the gateway
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", any(handle_rpc))
            .fallback(not_found)
            // Oversized calls still get an envelope
            .layer(DefaultBodyLimit::disable())
            .layer(TraceLayer::new_for_http())
            .with_state(AppState { rpc_handler: self.rpc_handler.clone() })
    }

    /// Starts the gateway listening on the specified address
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serves on `listener` until `shutdown` completes
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            "RpcGate listening on {}, forwarding {} operations to {}",
            listener.local_addr()?,
            self.rpc_handler.spec().operation_count(),
            self.rpc_handler.upstream_url()
        );

        axum::serve(listener, self.router()).with_graceful_shutdown(shutdown).await?;

        info!("RpcGate stopped");
        Ok(())
    }
}

async fn handle_rpc(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return StatusCode::NOT_FOUND.into_response();
    }

    debug!("Received RPC request ({} bytes)", body.len());
    Json(state.rpc_handler.handle_request(&body).await).into_response()
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
