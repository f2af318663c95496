use clap::Parser;

/// Minscan: minimal Ethereum block explorer with a local JSON API.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Ethereum JSON-RPC endpoint. The API key, if any, is appended as the
    /// final path segment.
    #[arg(
        long,
        default_value = "https://eth-mainnet.g.alchemy.com/v2",
        env = "MINSCAN_RPC_URL"
    )]
    pub rpc_url: String,

    /// Provider API key (optional for keyless endpoints).
    #[arg(long, env = "MINSCAN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Upper bound in seconds on each provider call.
    #[arg(long, default_value = "30", env = "MINSCAN_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// Client-side cap on outbound JSON-RPC requests per second.
    #[arg(long, env = "MINSCAN_REQUESTS_PER_SECOND")]
    pub requests_per_second: Option<u32>,

    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3080")]
    pub port: u16,
}
