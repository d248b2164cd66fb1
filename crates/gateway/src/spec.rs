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

//! Typed, read-only index over an OpenAPI specification document
//!
//! The gateway only needs a thin slice of OpenAPI: the ordered `paths` map,
//! each operation's `operationId`, its `parameters` (name, location,
//! required) and the content types of its `requestBody`. Everything else in
//! the document is ignored.
//!
//! Path and verb order are preserved exactly as they appear in the document,
//! because method resolution returns the first operation that matches.

use crate::casing::lower_camel_case;
use indexmap::IndexMap;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Query parameter that is always bound last and always optional
pub const LEDGER_VERSION: &str = "ledger_version";

/// Content type used for JSON request bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

const PARAMETER_REF_PREFIX: &str = "#/components/parameters/";
const REQUEST_BODY_REF_PREFIX: &str = "#/components/requestBodies/";

/// Errors raised while loading a specification document
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// The document could not be read from disk
    #[error("failed to read specification {}: {source}", path.display())]
    Io {
        /// Location of the document
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid JSON or does not have the OpenAPI shape
    #[error("malformed specification document: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A `$ref` points outside the supported component sections or at nothing
    #[error("unresolvable reference `{0}`")]
    UnresolvedRef(String),
}

/// Where a parameter is carried in the REST request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Substituted into the path template
    Path,
    /// Appended to the query string
    Query,
    /// Sent as a request header (never bound from positional arguments)
    Header,
    /// Sent as a cookie (never bound from positional arguments)
    Cookie,
}

/// A declared operation parameter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Parameter {
    /// Parameter name as declared
    pub name: String,
    /// Parameter location
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    /// Whether the parameter must be supplied
    #[serde(default)]
    pub required: bool,
}

impl Parameter {
    /// Whether this is the reserved trailing `ledger_version` query parameter
    pub fn is_ledger_version(&self) -> bool {
        self.location == ParameterLocation::Query && self.name == LEDGER_VERSION
    }
}

/// A declared request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    /// Accepted content types, in declaration order
    pub content_types: Vec<String>,
    /// Whether a body must be supplied
    pub required: bool,
}

impl RequestBody {
    /// The alternate (binary) content type, when more than one is declared
    pub fn binary_content_type(&self) -> Option<&str> {
        if self.content_types.len() > 1 {
            self.content_types.get(1).map(String::as_str)
        } else {
            None
        }
    }
}

/// A single REST operation (path + verb) of the specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Canonical identifier, if the document declares one
    pub operation_id: Option<String>,
    /// `operation_id` in lowerCamelCase, computed once at load time
    pub camel_case_id: Option<String>,
    /// Declared parameters, in binding order
    pub parameters: Vec<Parameter>,
    /// Declared request body
    pub request_body: Option<RequestBody>,
}

impl Operation {
    /// Creates an operation, deriving its camel-case alias
    pub fn new(
        operation_id: Option<String>,
        parameters: Vec<Parameter>,
        request_body: Option<RequestBody>,
    ) -> Self {
        let camel_case_id = operation_id.as_deref().map(lower_camel_case);
        Self { operation_id, camel_case_id, parameters, request_body }
    }

    /// Path parameters in declared order
    pub fn path_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.location == ParameterLocation::Path)
    }

    /// Query parameters in declared order, excluding `ledger_version`
    pub fn query_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Query && !p.is_ledger_version())
    }

    /// The reserved `ledger_version` query parameter, if declared
    pub fn ledger_version_parameter(&self) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.is_ledger_version())
    }
}

/// Borrowed view of one operation together with where it lives
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    /// Path template, e.g. `/accounts/{address}`
    pub path: &'a str,
    /// HTTP verb
    pub method: &'a Method,
    /// The operation itself
    pub operation: &'a Operation,
}

/// Immutable, ordered index of every operation in a specification document
#[derive(Debug, Clone, Default)]
pub struct SpecDocument {
    paths: IndexMap<String, IndexMap<Method, Operation>>,
}

impl SpecDocument {
    /// Reads and indexes a JSON specification document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|source| SpecError::Io { path: path.to_path_buf(), source })?;
        Self::from_slice(&bytes)
    }

    /// Indexes a JSON specification document held in memory
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SpecError> {
        let raw: RawDocument = serde_json::from_slice(bytes)?;
        raw.into_document()
    }

    /// Indexes an already parsed JSON specification document
    pub fn from_json(value: Value) -> Result<Self, SpecError> {
        let raw: RawDocument = serde_json::from_value(value)?;
        raw.into_document()
    }

    /// Builds a document directly from typed operations, keeping insertion order
    pub fn from_operations<'a>(
        operations: impl IntoIterator<Item = (&'a str, Method, Operation)>,
    ) -> Self {
        let mut paths: IndexMap<String, IndexMap<Method, Operation>> = IndexMap::new();
        for (path, method, operation) in operations {
            paths.entry(path.to_string()).or_default().insert(method, operation);
        }
        Self { paths }
    }

    /// Iterates every operation, paths in document order then verbs in document order
    pub fn endpoints(&self) -> impl Iterator<Item = Endpoint<'_>> {
        self.paths.iter().flat_map(|(path, verbs)| {
            verbs.iter().map(move |(method, operation)| Endpoint {
                path: path.as_str(),
                method,
                operation,
            })
        })
    }

    /// Looks up the operation declared for `path` and `method`
    pub fn operation(&self, path: &str, method: &Method) -> Option<&Operation> {
        self.paths.get(path).and_then(|verbs| verbs.get(method))
    }

    /// Total number of operations
    pub fn operation_count(&self) -> usize {
        self.paths.values().map(IndexMap::len).sum()
    }

    /// Whether the document declares no operations at all
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Raw OpenAPI shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    paths: IndexMap<String, IndexMap<String, Value>>,
    #[serde(default)]
    components: RawComponents,
}

#[derive(Default, Deserialize)]
struct RawComponents {
    #[serde(default)]
    parameters: IndexMap<String, Parameter>,
    #[serde(default, rename = "requestBodies")]
    request_bodies: IndexMap<String, RawRequestBody>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeRef<T> {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Inline(T),
}

#[derive(Clone, Deserialize)]
struct RawRequestBody {
    #[serde(default)]
    content: IndexMap<String, Value>,
    #[serde(default)]
    required: bool,
}

#[derive(Deserialize)]
struct RawOperation {
    #[serde(rename = "operationId")]
    operation_id: Option<String>,
    #[serde(default)]
    parameters: Vec<MaybeRef<Parameter>>,
    #[serde(rename = "requestBody")]
    request_body: Option<MaybeRef<RawRequestBody>>,
}

impl RawDocument {
    fn into_document(self) -> Result<SpecDocument, SpecError> {
        let mut paths = IndexMap::with_capacity(self.paths.len());

        for (path, item) in self.paths {
            let shared = match item.get("parameters") {
                Some(value) => self.components.resolve_parameters(
                    serde_json::from_value::<Vec<MaybeRef<Parameter>>>(value.clone())?,
                )?,
                None => Vec::new(),
            };

            let mut verbs = IndexMap::new();
            for (key, value) in item {
                // Path items also carry `summary`, `parameters`, `servers`, ...
                let Some(method) = verb_method(&key) else { continue };
                let raw: RawOperation = serde_json::from_value(value)?;
                verbs.insert(method, self.components.resolve_operation(raw, &shared)?);
            }

            paths.insert(path, verbs);
        }

        Ok(SpecDocument { paths })
    }
}

fn verb_method(key: &str) -> Option<Method> {
    Some(match key {
        "get" => Method::GET,
        "put" => Method::PUT,
        "post" => Method::POST,
        "delete" => Method::DELETE,
        "options" => Method::OPTIONS,
        "head" => Method::HEAD,
        "patch" => Method::PATCH,
        "trace" => Method::TRACE,
        _ => return None,
    })
}

impl RawComponents {
    fn resolve_operation(
        &self,
        raw: RawOperation,
        shared: &[Parameter],
    ) -> Result<Operation, SpecError> {
        let own = self.resolve_parameters(raw.parameters)?;

        // Path-item parameters come first unless the operation redeclares them
        let mut parameters: Vec<Parameter> = shared
            .iter()
            .filter(|p| !own.iter().any(|o| o.name == p.name && o.location == p.location))
            .cloned()
            .collect();
        parameters.extend(own);

        let request_body = match raw.request_body {
            None => None,
            Some(MaybeRef::Inline(body)) => Some(body),
            Some(MaybeRef::Ref { reference }) => Some(
                reference
                    .strip_prefix(REQUEST_BODY_REF_PREFIX)
                    .and_then(|name| self.request_bodies.get(name))
                    .cloned()
                    .ok_or(SpecError::UnresolvedRef(reference))?,
            ),
        }
        .map(|body| RequestBody {
            content_types: body.content.into_keys().collect(),
            required: body.required,
        });

        Ok(Operation::new(raw.operation_id, parameters, request_body))
    }

    fn resolve_parameters(
        &self,
        raw: Vec<MaybeRef<Parameter>>,
    ) -> Result<Vec<Parameter>, SpecError> {
        raw.into_iter()
            .map(|param| match param {
                MaybeRef::Inline(param) => Ok(param),
                MaybeRef::Ref { reference } => reference
                    .strip_prefix(PARAMETER_REF_PREFIX)
                    .and_then(|name| self.parameters.get(name))
                    .cloned()
                    .ok_or(SpecError::UnresolvedRef(reference)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_spec() -> SpecDocument {
        SpecDocument::from_slice(include_bytes!("../testdata/node_spec.json")).unwrap()
    }

    #[test]
    fn test_preserves_document_order() {
        let spec = node_spec();
        let ids: Vec<_> =
            spec.endpoints().filter_map(|e| e.operation.operation_id.as_deref()).collect();

        assert_eq!(ids.first(), Some(&"get_ledger_info"));
        let get_txns = ids.iter().position(|id| *id == "get_transactions").unwrap();
        let submit = ids.iter().position(|id| *id == "submit_transaction").unwrap();
        assert_eq!(submit, get_txns + 1, "verbs keep their order within a path");
        assert_eq!(spec.operation_count(), ids.len());
    }

    #[test]
    fn test_operation_shape() {
        let spec = node_spec();
        let op = spec.operation("/accounts/{address}/resources", &Method::GET).unwrap();

        assert_eq!(op.operation_id.as_deref(), Some("get_account_resources"));
        assert_eq!(op.camel_case_id.as_deref(), Some("getAccountResources"));
        assert_eq!(op.path_parameters().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["address"]);
        assert_eq!(
            op.query_parameters().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["start", "limit"]
        );
        assert!(op.ledger_version_parameter().is_some());
        assert!(op.request_body.is_none());

        let submit = spec.operation("/transactions", &Method::POST).unwrap();
        let body = submit.request_body.as_ref().unwrap();
        assert!(body.required);
        assert_eq!(body.content_types[0], JSON_CONTENT_TYPE);
        assert_eq!(body.binary_content_type(), Some("application/x.aptos.signed_transaction+bcs"));

        let table = spec.operation("/tables/{table_handle}/item", &Method::POST).unwrap();
        assert_eq!(table.request_body.as_ref().unwrap().binary_content_type(), None);
    }

    #[test]
    fn test_ignores_non_verb_keys_and_merges_path_parameters() {
        let spec = SpecDocument::from_json(json!({
            "paths": {
                "/items/{id}": {
                    "summary": "Item",
                    "parameters": [
                        { "name": "id", "in": "path", "required": true },
                        { "name": "verbose", "in": "query" }
                    ],
                    "get": {
                        "operationId": "get_item",
                        "parameters": [{ "name": "verbose", "in": "query", "required": true }]
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(spec.operation_count(), 1);
        let op = spec.operation("/items/{id}", &Method::GET).unwrap();
        assert_eq!(
            op.parameters,
            vec![
                Parameter { name: "id".into(), location: ParameterLocation::Path, required: true },
                Parameter {
                    name: "verbose".into(),
                    location: ParameterLocation::Query,
                    required: true
                },
            ]
        );
    }

    #[test]
    fn test_resolves_component_references() {
        let spec = SpecDocument::from_json(json!({
            "paths": {
                "/items": {
                    "post": {
                        "operationId": "create_item",
                        "parameters": [{ "$ref": "#/components/parameters/Dry" }],
                        "requestBody": { "$ref": "#/components/requestBodies/Item" }
                    }
                }
            },
            "components": {
                "parameters": { "Dry": { "name": "dry_run", "in": "query" } },
                "requestBodies": {
                    "Item": { "content": { "application/json": {} }, "required": true }
                }
            }
        }))
        .unwrap();

        let op = spec.operation("/items", &Method::POST).unwrap();
        assert_eq!(op.parameters[0].name, "dry_run");
        assert!(!op.parameters[0].required);
        assert_eq!(
            op.request_body,
            Some(RequestBody { content_types: vec![JSON_CONTENT_TYPE.into()], required: true })
        );
    }

    #[test]
    fn test_unresolvable_reference_is_an_error() {
        let err = SpecDocument::from_json(json!({
            "paths": {
                "/items": {
                    "get": { "parameters": [{ "$ref": "#/components/parameters/Missing" }] }
                }
            }
        }))
        .unwrap_err();

        assert!(matches!(err, SpecError::UnresolvedRef(ref r) if r.ends_with("Missing")));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = SpecDocument::load("/definitely/not/here/spec.json").unwrap_err();
        assert!(matches!(err, SpecError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here/spec.json"));
    }

    #[test]
    fn test_operation_without_id_has_no_alias() {
        let spec = SpecDocument::from_json(json!({ "paths": { "/x": { "get": {} } } })).unwrap();
        let op = spec.operation("/x", &Method::GET).unwrap();
        assert!(op.operation_id.is_none());
        assert!(op.camel_case_id.is_none());
        assert!(!spec.is_empty());
    }
}
