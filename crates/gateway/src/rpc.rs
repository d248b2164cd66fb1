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

//! JSON-RPC request handling and upstream dispatch
//!
//! Every call goes through four stages: parse the envelope, resolve the
//! method to an operation, map the positional parameters to a REST request,
//! and dispatch that request upstream. The first failing stage decides the
//! error code of the response.

use crate::casing::lower_camel_case;
use crate::mapper::{map_params, RestRequest};
use crate::resolver::MethodResolver;
use crate::spec::SpecDocument;
use crate::types::{RpcError, RpcRequest, RpcResponse};
use eyre::Result;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix of upstream response headers copied into the envelope
pub const DEFAULT_VENDOR_HEADER_PREFIX: &str = "x-aptos-";

/// Failure to obtain a usable upstream response
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Connection, TLS or protocol failure
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The upstream body is not JSON
    #[error("upstream returned a non-JSON body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Upstream reply with its body already parsed
#[derive(Debug)]
struct UpstreamResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

/// JSON-RPC request handler backed by a REST node
///
/// Holds the loaded specification and forwards each call to `upstream_url`.
/// Upstream requests carry no timeout of their own.
pub struct RpcHandler {
    upstream_client: reqwest::Client,
    spec: Arc<SpecDocument>,
    resolver: MethodResolver,
    upstream_url: String,
    vendor_header_prefix: String,
}

impl RpcHandler {
    /// Creates a handler for `spec` dispatching to `upstream_url`
    ///
    /// # Arguments
    /// * `spec` - Loaded OpenAPI document
    /// * `upstream_url` - Base URL the operation paths are appended to
    pub fn new(spec: Arc<SpecDocument>, upstream_url: impl Into<String>) -> Result<Self> {
        let upstream_client = reqwest::Client::builder()
            .user_agent(concat!("rpcgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            upstream_client,
            spec,
            resolver: MethodResolver::default(),
            upstream_url: upstream_url.into(),
            vendor_header_prefix: DEFAULT_VENDOR_HEADER_PREFIX.to_string(),
        })
    }

    /// Replaces the method resolver
    pub fn with_resolver(mut self, resolver: MethodResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Sets the response header prefix whose headers are copied into the envelope
    pub fn with_vendor_header_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.vendor_header_prefix = prefix.as_ref().to_ascii_lowercase();
        self
    }

    /// Returns the loaded specification
    pub fn spec(&self) -> &Arc<SpecDocument> {
        &self.spec
    }

    /// Returns the upstream base URL
    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    /// Returns the method resolver
    pub fn resolver(&self) -> &MethodResolver {
        &self.resolver
    }

    /// Handles one raw JSON-RPC request body
    ///
    /// Always produces an envelope; failures are reported through its `error` member.
    pub async fn handle_request(&self, body: &[u8]) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                debug!("Rejecting unparseable request: {e}");
                return RpcResponse::error(Value::Null, RpcError::parse_error());
            }
        };
        if request.method.is_empty() {
            debug!("Rejecting request with an empty method");
            return RpcResponse::error(Value::Null, RpcError::parse_error());
        }

        let id = request.id.unwrap_or(Value::Null);
        let params = match request.params {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(params)) => params,
            Some(_) => {
                return RpcResponse::error(id, RpcError::invalid_params("params must be an array"))
            }
        };

        let endpoint = match self.resolver.resolve(&self.spec, &request.method) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                debug!("{e}");
                return RpcResponse::error(id, RpcError::invalid_request());
            }
        };

        let rest_request = match map_params(&endpoint, &params, &self.upstream_url) {
            Ok(rest_request) => rest_request,
            Err(e) => {
                debug!(method = %request.method, "Parameter mapping failed: {e}");
                return RpcResponse::error(id, RpcError::invalid_params(e.to_string()));
            }
        };

        debug!(
            method = %request.method,
            verb = %rest_request.method,
            url = %rest_request.url,
            "Dispatching upstream"
        );

        match self.forward(rest_request).await {
            Ok(upstream) => self.translate(upstream, id),
            Err(e) => {
                warn!(method = %request.method, "{e}");
                RpcResponse::error(id, RpcError::internal_error())
            }
        }
    }

    async fn forward(&self, request: RestRequest) -> Result<UpstreamResponse, DispatchError> {
        let mut builder = self
            .upstream_client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body.into_bytes());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes)?;

        Ok(UpstreamResponse { status, headers, body })
    }

    fn translate(&self, upstream: UpstreamResponse, id: Value) -> RpcResponse {
        let UpstreamResponse { status, headers, body } = upstream;

        if status.is_success() {
            let mut response = RpcResponse::success(id, body);
            self.merge_vendor_headers(&headers, &mut response);
            response
        } else if status.is_client_error() || status.is_server_error() {
            debug!("Upstream answered {status}, relaying error body");
            RpcResponse::upstream_error(id, body)
        } else {
            warn!("Unexpected upstream status {status}");
            RpcResponse::error(id, RpcError::server_error())
        }
    }

    fn merge_vendor_headers(&self, headers: &HeaderMap, response: &mut RpcResponse) {
        for (name, value) in headers {
            let Some(suffix) = name.as_str().strip_prefix(self.vendor_header_prefix.as_str())
            else {
                continue;
            };
            let Ok(value) = value.to_str() else {
                debug!("Skipping non-text header {name}");
                continue;
            };

            let key = lower_camel_case(suffix);
            if key.is_empty() {
                continue;
            }
            if !response.insert_extension(key, Value::String(value.to_string())) {
                debug!("Header {name} would overwrite a reserved envelope field");
            }
        }
    }
}
