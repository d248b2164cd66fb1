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

//! RpcGate Gateway Library
//!
//! Serves a JSON-RPC 2.0 endpoint in front of a REST node API described by an
//! OpenAPI document. Each method name resolves to one operation of the document,
//! positional parameters are mapped onto its path, body and query, and the
//! upstream reply is wrapped back into a JSON-RPC envelope.

pub mod casing;
pub mod config;
pub mod mapper;
pub mod networks;
pub mod resolver;
pub mod rpc;
pub mod server;
pub mod spec;
pub mod types;

pub use config::GatewayConfig;
pub use mapper::{map_params, MappingError, RestRequest};
pub use networks::NetworkRegistry;
pub use resolver::{InvalidMethod, MethodResolver};
pub use rpc::{DispatchError, RpcHandler};
pub use server::{GatewayServer, GatewayServerBuilder};
pub use spec::{Endpoint, Operation, SpecDocument, SpecError};
pub use types::{RpcError, RpcRequest, RpcResponse};
