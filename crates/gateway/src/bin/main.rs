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

//! RpcGate command line
//!
//! Serves the JSON-RPC gateway, downloads a network's OpenAPI document, or
//! lists the methods a document exposes.

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use rpcgate_common::{init_logging, init_simple_logging};
use rpcgate_gateway::{
    networks::{fetch_spec, NetworkRegistry},
    GatewayConfig, GatewayServerBuilder, SpecDocument,
};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    str::FromStr,
};
use tokio::net::TcpListener;
use tracing::{info, Level};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// JSON-RPC gateway for OpenAPI-described node APIs
#[derive(Parser, Debug)]
#[command(name = "rpcgate")]
#[command(about = "JSON-RPC gateway for OpenAPI-described node APIs")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (repeat for more: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the JSON-RPC gateway
    Serve(ServeArgs),
    /// Download the OpenAPI document of a network
    FetchSpec(FetchSpecArgs),
    /// List the JSON-RPC methods of an OpenAPI document
    ListMethods(ListMethodsArgs),
}

/// Serve mode arguments
#[derive(Parser, Debug)]
struct ServeArgs {
    /// OpenAPI document describing the upstream API
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Address to bind to
    /// Example: --host 0.0.0.0
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Upstream network (mainnet, testnet, devnet or one added with --network-url)
    #[arg(long)]
    network: Option<String>,

    /// Add or replace a network
    /// Example: --network-url local=http://127.0.0.1:8080/v1
    #[arg(long = "network-url", value_parser = parse_network)]
    network_urls: Vec<(String, String)>,

    /// Upstream base URL, overrides --network
    #[arg(long)]
    upstream_url: Option<String>,

    /// Prefix accepted before camel-cased method names
    #[arg(long)]
    alias_prefix: Option<String>,

    /// Prefix of upstream headers copied into responses
    #[arg(long)]
    vendor_header_prefix: Option<String>,

    /// Also write logs to a daily file under the temp directory
    #[arg(long)]
    log_file: bool,
}

/// Fetch-spec mode arguments
#[derive(Parser, Debug)]
struct FetchSpecArgs {
    /// Network to download from (defaults to the first configured network)
    #[arg(long)]
    network: Option<String>,

    /// Add or replace a network
    #[arg(long = "network-url", value_parser = parse_network)]
    network_urls: Vec<(String, String)>,

    /// Output file
    #[arg(long, default_value = "spec.json")]
    output: PathBuf,
}

/// List-methods mode arguments
#[derive(Parser, Debug)]
struct ListMethodsArgs {
    /// OpenAPI document to inspect
    #[arg(long)]
    spec: Option<PathBuf>,
}

fn parse_network(raw: &str) -> Result<(String, String), String> {
    NetworkRegistry::parse_override(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set RUST_LOG based on verbosity
    if std::env::var("RUST_LOG").is_err() {
        let level = match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    let config = match &args.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };

    match args.command {
        Commands::Serve(serve_args) => run_server(serve_args, config).await,
        Commands::FetchSpec(fetch_args) => run_fetch_spec(fetch_args, config).await,
        Commands::ListMethods(list_args) => run_list_methods(list_args, config),
    }
}

/// Run the JSON-RPC gateway
async fn run_server(args: ServeArgs, config: GatewayConfig) -> Result<()> {
    init_logging("rpcgate", args.log_file)?;

    let mut builder = GatewayServerBuilder::new().config(&config);
    if let Some(spec) = args.spec {
        builder = builder.spec_path(spec);
    }
    for (name, url) in args.network_urls {
        builder = builder.network_url(name, url);
    }
    if let Some(network) = args.network {
        builder = builder.network(network);
    }
    if let Some(url) = args.upstream_url {
        builder = builder.upstream_url(url);
    }
    if let Some(prefix) = args.alias_prefix {
        builder = builder.alias_prefix(prefix);
    }
    if let Some(prefix) = args.vendor_header_prefix {
        builder = builder.vendor_header_prefix(prefix);
    }

    let gateway = builder.build()?;

    let host = args.host.or(config.host).unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let ip = IpAddr::from_str(&host).wrap_err_with(|| format!("invalid host address {host}"))?;
    let addr = SocketAddr::from((ip, port));

    info!("Starting RpcGate on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    // Set up shutdown signal handling
    gateway
        .serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await
}

/// Download the OpenAPI document of a network
async fn run_fetch_spec(args: FetchSpecArgs, config: GatewayConfig) -> Result<()> {
    init_simple_logging(Level::INFO)?;

    let mut registry = config.network_registry();
    registry.extend(args.network_urls);

    let network = match args.network.or(config.network) {
        Some(network) => network,
        None => registry
            .first()
            .map(str::to_string)
            .ok_or_else(|| eyre::eyre!("no network configured"))?,
    };
    let url = registry.spec_url(&network)?;

    let document = fetch_spec(&reqwest::Client::new(), &url).await?;
    let spec = SpecDocument::from_json(document.clone())
        .wrap_err_with(|| format!("{url} is not a usable OpenAPI document"))?;

    std::fs::write(&args.output, serde_json::to_vec_pretty(&document)?)
        .wrap_err_with(|| format!("failed to write {}", args.output.display()))?;

    info!(
        "Saved {} specification ({} operations) to {}",
        network,
        spec.operation_count(),
        args.output.display()
    );
    Ok(())
}

/// Print every JSON-RPC method the document exposes
fn run_list_methods(args: ListMethodsArgs, config: GatewayConfig) -> Result<()> {
    init_simple_logging(Level::WARN)?;

    let path = args
        .spec
        .or(config.spec)
        .ok_or_else(|| eyre::eyre!("no specification document given, use --spec"))?;
    let spec = SpecDocument::load(&path)
        .wrap_err_with(|| format!("Failed to load specification {}", path.display()))?;

    for endpoint in spec.endpoints() {
        let Some(name) = endpoint.operation.camel_case_id.as_deref() else { continue };
        println!("{name}  {} {}", endpoint.method, endpoint.path);
    }
    Ok(())
}
