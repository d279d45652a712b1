use clap::Parser;

fn parse_nonzero_u64(s: &str) -> Result<u64, String> {
    let n: u64 = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 {
        return Err("value must be at least 1".to_string());
    }
    Ok(n)
}

fn parse_network(s: &str) -> Result<bitcoin::Network, String> {
    s.parse().map_err(|e| format!("{e}"))
}

/// infinod — infinity-node registry daemon with a deterministic reward
/// scheduler and an HTTP status API.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Chain daemon JSON-RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:8332", env = "INFINOD_RPC_URL")]
    pub rpc_url: String,

    /// RPC username.
    #[arg(long, env = "INFINOD_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password.
    #[arg(long, env = "INFINOD_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Address to bind the HTTP API to.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090")]
    pub port: u16,

    /// Network the sink and payee addresses are encoded for.
    #[arg(long, default_value = "bitcoin", value_parser = parse_network)]
    pub network: bitcoin::Network,

    /// The well-known sink address burns are sent to.
    #[arg(long, env = "INFINOD_SINK_ADDRESS")]
    pub sink_address: String,

    /// First height at which burn transactions are recognised.
    #[arg(long, default_value = "165000")]
    pub begin_height: u32,

    /// Start of the reward-statement axis.
    #[arg(long, default_value = "250000")]
    pub genesis_statement_height: u32,

    /// Population cap for LIL nodes.
    #[arg(long, default_value = "750")]
    pub limit_lil: u32,

    /// Population cap for MID nodes.
    #[arg(long, default_value = "375")]
    pub limit_mid: u32,

    /// Population cap for BIG nodes.
    #[arg(long, default_value = "375")]
    pub limit_big: u32,

    /// Per-block LIL node payment, in whole coins.
    #[arg(long, default_value = "560", value_parser = parse_nonzero_u64)]
    pub reward_lil: u64,

    /// Per-block MID node payment, in whole coins.
    #[arg(long, default_value = "2800", value_parser = parse_nonzero_u64)]
    pub reward_mid: u64,

    /// Per-block BIG node payment, in whole coins.
    #[arg(long, default_value = "5600", value_parser = parse_nonzero_u64)]
    pub reward_big: u64,

    /// File to persist registry snapshots to. Loaded on startup and written
    /// after every completed scan. Without this flag the registry is
    /// rebuilt from the chain on every start.
    #[arg(long)]
    pub snapshot_path: Option<std::path::PathBuf>,

    /// Seconds between background tip checks.
    #[arg(long, default_value = "30", value_parser = parse_nonzero_u64)]
    pub scan_interval_secs: u64,
}
