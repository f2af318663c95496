mod cli;
mod server;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{bail, eyre, WrapErr};

use minscan_core::provider::{ChainProvider, HttpProvider, HttpProviderConfig};
use minscan_core::{Resolver, ViewController};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    if args.timeout_secs == 0 {
        bail!("--timeout-secs must be at least 1");
    }
    let timeout = Duration::from_secs(args.timeout_secs);

    // Generate a random API token for this server session.
    let api_token = {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().r#gen();
        hex_encode(bytes)
    };

    let mut config = HttpProviderConfig::new(&args.rpc_url);
    config.api_key = args.api_key.clone();
    config.requests_per_second = args.requests_per_second;
    config.request_timeout = timeout;
    let provider = Arc::new(HttpProvider::new(&config).context("configure JSON-RPC provider")?);
    let endpoint = provider.endpoint();

    // Verify the endpoint answers before serving anything.
    let head = tokio::time::timeout(timeout, provider.get_head_block_number())
        .await
        .map_err(|_| eyre!("no answer within {}s", args.timeout_secs))
        .and_then(|res| res.map_err(|err| eyre!(err)))
        .map_err(|err| {
            let message = format_rpc_connect_error(&endpoint, &err.to_string());
            eyre!(message).wrap_err("while attempting to connect to the Ethereum JSON-RPC endpoint")
        })?;
    tracing::info!(endpoint = %endpoint, head = %head, "connected to JSON-RPC endpoint");

    let controller = Arc::new(ViewController::new(
        Resolver::new(provider).with_timeout(timeout),
    ));

    // Initial view: the chain head block.
    let initial = controller.load_latest().await;
    if initial.error_occurred {
        tracing::warn!("initial latest-block load failed; serving blank view");
    }

    let state = server::AppState {
        controller,
        api_token: api_token.clone(),
    };

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = format!("http://{}:{}", args.bind, args.port);
    let router = server::build_router(state, &origin)?;

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and is accessible from the network");
    }

    println!();
    println!("  Minscan is running:");
    println!("    URL:       http://{bind_addr}");
    println!("    API token: {api_token}");
    println!();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("run HTTP server")?;

    Ok(())
}

/// Tiny hex-encoding helper to avoid adding a `hex` crate dependency.
fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn format_rpc_connect_error(endpoint: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not connect to RPC endpoint `{endpoint}`"),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("Could not resolve host") || source_error.contains("dns error") {
        lines.push(
            "hint: hostname resolution failed; verify the endpoint hostname and your DNS/network"
                .into(),
        );
    } else if source_error.contains("tls")
        || source_error.contains("certificate")
        || source_error.contains("SSL")
    {
        lines.push(
            "hint: TLS handshake failed; verify certificate trust and that the endpoint uses HTTPS"
                .into(),
        );
    } else if source_error.contains("401")
        || source_error.contains("403")
        || source_error.contains("Must be authenticated")
    {
        lines.push("hint: authentication failed; verify --api-key / MINSCAN_API_KEY".into());
    } else if source_error.contains("404") {
        lines.push(
            "hint: endpoint path is invalid; verify the RPC URL path (the API key is appended to it)"
                .into(),
        );
    } else if source_error.contains("no answer within") {
        lines.push("hint: the endpoint is reachable but slow; raise --timeout-secs".into());
    } else if source_error.contains("error sending request for url") {
        lines.push("hint: request could not be sent; verify URL format, network access, and endpoint reachability".into());
    }

    lines.join("\n")
}
