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

//! Positional JSON-RPC parameters to REST request mapping
//!
//! Positional arguments are bound in a fixed order:
//! 1. every path parameter, in declared order;
//! 2. the request body, if the operation declares one;
//! 3. the query parameters other than `ledger_version`: the bare value when a
//!    single one is declared, otherwise an object keyed by parameter name;
//! 4. `ledger_version`, always optional and always the last query key.
//!
//! Operations accepting more than one body content type also take a hex
//! string (optionally `0x` prefixed), which is sent as raw bytes with the
//! second declared content type.

use crate::spec::{Endpoint, Parameter, JSON_CONTENT_TYPE, LEDGER_VERSION};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Method,
};
use serde_json::Value;
use url::form_urlencoded;

/// Name reported for a missing request body argument
const BODY_ARGUMENT: &str = "body";

/// Why a parameter list could not be mapped onto an operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    /// A required argument is absent or `null`
    #[error("missing value for required argument {index} {name}")]
    MissingArgument {
        /// Position in the parameter list
        index: usize,
        /// Declared parameter name (`body` for request bodies)
        name: String,
    },
    /// A binary body argument is not valid hex
    #[error("invalid hex value for argument {index}: {source}")]
    InvalidHex {
        /// Position in the parameter list
        index: usize,
        /// Decoder failure
        #[source]
        source: hex::FromHexError,
    },
    /// Several query parameters are declared but the argument is not an object
    #[error("argument {index} must be an object keyed by query parameter name")]
    ExpectedObject {
        /// Position in the parameter list
        index: usize,
    },
    /// The specification declares a content type that is not a valid header value
    #[error("content type `{0}` is not a valid header value")]
    InvalidContentType(String),
}

/// Request body ready to be sent upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPayload {
    /// JSON text, with integer literals preserved exactly
    Json(String),
    /// Raw bytes decoded from a hex argument
    Binary(Vec<u8>),
}

impl RequestPayload {
    /// Consumes the payload into the bytes sent on the wire
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Json(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// Fully formed REST request derived from one JSON-RPC call
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// HTTP verb of the operation
    pub method: Method,
    /// Absolute URL including any query string
    pub url: String,
    /// Request headers (content type when a body is present)
    pub headers: HeaderMap,
    /// Request body
    pub body: Option<RequestPayload>,
}

/// Ordered `application/x-www-form-urlencoded` query string builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    /// Returns the builder with `key=value` appended
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Whether no pair has been appended
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(key, _)| key.as_str())
    }

    /// Encodes the pairs, without a leading `?`
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new()).extend_pairs(&self.pairs).finish()
    }
}

/// Maps positional `params` onto `endpoint`, producing a request against `base_url`
pub fn map_params(
    endpoint: &Endpoint<'_>,
    params: &[Value],
    base_url: &str,
) -> Result<RestRequest, MappingError> {
    let operation = endpoint.operation;

    // Path parameters
    let mut path = endpoint.path.to_string();
    let mut cursor = 0;
    for (index, param) in operation.path_parameters().enumerate() {
        let value = present(params, index).ok_or_else(|| missing(index, &param.name))?;
        path = path.replacen(&format!("{{{}}}", param.name), &scalar(value), 1);
        cursor += 1;
    }

    // Request body
    let mut headers = HeaderMap::new();
    let mut body = None;
    if let Some(declared) = &operation.request_body {
        match (present(params, cursor), declared.binary_content_type()) {
            (None, _) if declared.required => return Err(missing(cursor, BODY_ARGUMENT)),
            (None, _) => {}
            (Some(Value::String(hex_text)), Some(content_type)) => {
                let bytes = hex::decode(hex_text.strip_prefix("0x").unwrap_or(hex_text.as_str()))
                    .map_err(|source| MappingError::InvalidHex { index: cursor, source })?;
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_str(content_type)
                        .map_err(|_| MappingError::InvalidContentType(content_type.to_string()))?,
                );
                body = Some(RequestPayload::Binary(bytes));
            }
            (Some(value), _) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                body = Some(RequestPayload::Json(value.to_string()));
            }
        }
        cursor += 1;
    }

    // Query parameters other than ledger_version
    let mut query = QueryString::default();
    let declared: Vec<&Parameter> = operation.query_parameters().collect();
    if !declared.is_empty() {
        match present(params, cursor) {
            Some(value) => {
                query = bind_query(query, &declared, value, cursor)?;
                cursor += 1;
            }
            None => {
                if let Some(required) = declared.iter().find(|p| p.required) {
                    return Err(missing(cursor, &required.name));
                }
            }
        }
    }

    // ledger_version always goes last
    if operation.ledger_version_parameter().is_some() {
        if let Some(version) = present(params, cursor) {
            query = query.with(LEDGER_VERSION, scalar(version));
        }
    }

    let mut url = format!("{}{}", base_url.trim_end_matches('/'), path);
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.encode());
    }

    Ok(RestRequest { method: endpoint.method.clone(), url, headers, body })
}

fn bind_query(
    query: QueryString,
    declared: &[&Parameter],
    value: &Value,
    index: usize,
) -> Result<QueryString, MappingError> {
    if let [single] = declared {
        return Ok(query.with(single.name.as_str(), scalar(value)));
    }

    let object = value.as_object().ok_or(MappingError::ExpectedObject { index })?;
    declared.iter().try_fold(query, |query, param| {
        match object.get(&param.name).filter(|v| !v.is_null()) {
            Some(v) => Ok(query.with(param.name.as_str(), scalar(v))),
            None if param.required => Err(missing(index, &param.name)),
            None => Ok(query),
        }
    })
}

/// The argument at `index`, treating `null` as absent
fn present(params: &[Value], index: usize) -> Option<&Value> {
    params.get(index).filter(|value| !value.is_null())
}

/// Text form used in paths and query strings: strings verbatim, everything else as JSON
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn missing(index: usize, name: &str) -> MappingError {
    MappingError::MissingArgument { index, name: name.to_string() }
}
