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

//! JSON-RPC method name to REST operation resolution
//!
//! A method name selects an operation when any of these hold:
//! 1. it equals the operation's `operationId`;
//! 2. it equals the `operationId` in lowerCamelCase;
//! 3. with the alias prefix (`apt_` by default) stripped, it equals the
//!    `operationId` in lowerCamelCase.
//!
//! So `get_ledger_info`, `getLedgerInfo` and `apt_getLedgerInfo` all select the
//! operation declared as `get_ledger_info`. Ambiguous documents resolve to the
//! first match in document order.

use crate::spec::{Endpoint, Operation, SpecDocument};

/// Prefix accepted in front of camel-cased method names
pub const DEFAULT_ALIAS_PREFIX: &str = "apt_";

/// No operation of the specification answers to the requested method
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no operation matches method `{0}`")]
pub struct InvalidMethod(pub String);

/// Resolves method names against a [`SpecDocument`]
#[derive(Debug, Clone)]
pub struct MethodResolver {
    alias_prefix: String,
}

impl Default for MethodResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ALIAS_PREFIX)
    }
}

impl MethodResolver {
    /// Creates a resolver accepting `alias_prefix` before camel-cased names
    pub fn new(alias_prefix: impl Into<String>) -> Self {
        Self { alias_prefix: alias_prefix.into() }
    }

    /// The configured alias prefix
    pub fn alias_prefix(&self) -> &str {
        &self.alias_prefix
    }

    /// Whether `method` is an accepted spelling of `operation`'s identifier
    pub fn matches(&self, operation: &Operation, method: &str) -> bool {
        if operation.operation_id.as_deref() == Some(method) {
            return true;
        }

        let Some(camel) = operation.camel_case_id.as_deref() else {
            return false;
        };

        camel == method || method.strip_prefix(self.alias_prefix.as_str()) == Some(camel)
    }

    /// Returns the first operation, in document order, that answers to `method`
    pub fn resolve<'a>(
        &self,
        spec: &'a SpecDocument,
        method: &str,
    ) -> Result<Endpoint<'a>, InvalidMethod> {
        spec.endpoints()
            .find(|endpoint| self.matches(endpoint.operation, method))
            .ok_or_else(|| InvalidMethod(method.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    fn node_spec() -> SpecDocument {
        SpecDocument::from_slice(include_bytes!("../testdata/node_spec.json")).unwrap()
    }

    fn op(id: &str) -> Operation {
        Operation::new(Some(id.to_string()), Vec::new(), None)
    }

    #[test]
    fn test_all_spellings_resolve_to_same_endpoint() {
        let spec = node_spec();
        let resolver = MethodResolver::default();

        for name in ["get_ledger_info", "getLedgerInfo", "apt_getLedgerInfo"] {
            let endpoint = resolver.resolve(&spec, name).unwrap();
            assert_eq!(endpoint.path, "/", "{name}");
            assert_eq!(endpoint.method, &Method::GET, "{name}");
        }

        for name in ["get_account", "getAccount", "apt_getAccount"] {
            let endpoint = resolver.resolve(&spec, name).unwrap();
            assert_eq!(endpoint.path, "/accounts/{address}", "{name}");
        }
    }

    #[test]
    fn test_camel_case_operation_id() {
        let spec = SpecDocument::from_operations([("/accounts/{address}", Method::GET, op("getAccount"))]);
        let resolver = MethodResolver::default();

        for name in ["getAccount", "apt_getAccount"] {
            assert_eq!(resolver.resolve(&spec, name).unwrap().path, "/accounts/{address}");
        }
        // Only the operation id is camel-cased, never the requested name
        assert!(resolver.resolve(&spec, "get_account").is_err());
    }

    #[test]
    fn test_prefix_only_applies_to_camel_case() {
        let spec = node_spec();
        let resolver = MethodResolver::default();

        assert!(resolver.resolve(&spec, "apt_get_account").is_err());
        assert!(resolver.resolve(&spec, "xapt_getAccount").is_err());
        assert!(resolver.resolve(&spec, "GetAccount").is_err());
    }

    #[test]
    fn test_unknown_method() {
        let spec = node_spec();
        let err = MethodResolver::default().resolve(&spec, "unknown_method").unwrap_err();
        assert_eq!(err, InvalidMethod("unknown_method".into()));
    }

    #[test]
    fn test_first_match_wins_on_ambiguity() {
        let spec = SpecDocument::from_operations([
            ("/a", Method::GET, op("get_thing")),
            ("/b", Method::GET, op("getThing")),
            ("/b", Method::POST, op("get_thing")),
        ]);
        let resolver = MethodResolver::default();

        assert_eq!(resolver.resolve(&spec, "getThing").unwrap().path, "/a");
        assert_eq!(resolver.resolve(&spec, "get_thing").unwrap().path, "/a");
    }

    #[test]
    fn test_verb_order_within_path() {
        let spec = SpecDocument::from_operations([
            ("/items", Method::POST, op("items")),
            ("/items", Method::GET, op("items")),
        ]);
        let endpoint = MethodResolver::default().resolve(&spec, "items").unwrap();
        assert_eq!(endpoint.method, &Method::POST);
    }

    #[test]
    fn test_custom_alias_prefix() {
        let spec = node_spec();
        let resolver = MethodResolver::new("node_");

        assert_eq!(resolver.alias_prefix(), "node_");
        assert_eq!(resolver.resolve(&spec, "node_getAccount").unwrap().path, "/accounts/{address}");
        assert!(resolver.resolve(&spec, "apt_getAccount").is_err());
    }

    #[test]
    fn test_operations_without_id_never_match() {
        let spec = SpecDocument::from_operations([(
            "/x",
            Method::GET,
            Operation::new(None, Vec::new(), None),
        )]);
        assert!(MethodResolver::default().resolve(&spec, "").is_err());
    }
}
