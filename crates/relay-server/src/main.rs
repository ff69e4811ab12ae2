use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use relay_events::LabelRuleSet;
use relay_server::relay_server::{run_relay_server, RelayServerConfig};

/// HTTP relay between autonomous development agents and the code forge.
#[derive(Debug, Parser)]
#[command(name = "relay-server", version)]
struct Cli {
    #[arg(
        long = "bind",
        env = "RELAY_BIND",
        default_value = "127.0.0.1:8787",
        help = "Socket address the relay listens on"
    )]
    bind: String,

    #[arg(
        long = "state-dir",
        env = "RELAY_STATE_DIR",
        default_value = ".relay",
        help = "Directory for the event database, evidence objects, and runtime log"
    )]
    state_dir: PathBuf,

    #[arg(
        long = "relay-key",
        env = "RELAY_SHARED_KEY",
        hide_env_values = true,
        help = "Shared secret required in the X-Relay-Key header on every v2 request"
    )]
    relay_key: String,

    #[arg(
        long = "forge-app-id",
        env = "FORGE_APP_ID",
        help = "App identity used as the JWT issuer"
    )]
    forge_app_id: String,

    #[arg(
        long = "forge-installation-id",
        env = "FORGE_INSTALLATION_ID",
        help = "Installation whose access tokens are minted per request"
    )]
    forge_installation_id: String,

    #[arg(
        long = "forge-private-key-pem",
        env = "FORGE_PRIVATE_KEY_PEM",
        hide_env_values = true,
        help = "RSA private key PEM (PKCS#8 or PKCS#1) for app JWT signing"
    )]
    forge_private_key_pem: String,

    #[arg(
        long = "forge-api-base",
        env = "FORGE_API_BASE",
        default_value = "https://api.github.com",
        help = "Forge REST API base URL override"
    )]
    forge_api_base: String,

    #[arg(
        long = "forge-timeout-ms",
        env = "FORGE_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Per-request timeout for forge calls"
    )]
    forge_timeout_ms: u64,

    #[arg(
        long = "label-rules-json",
        env = "RELAY_LABEL_RULES_JSON",
        help = "Declarative label transition rules; invalid JSON disables transitions"
    )]
    label_rules_json: Option<String>,

    #[arg(
        long = "max-evidence-bytes",
        env = "RELAY_MAX_EVIDENCE_BYTES",
        default_value_t = 25 * 1024 * 1024,
        help = "Upper bound for one evidence upload"
    )]
    max_evidence_bytes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let label_rules = match cli
        .label_rules_json
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
    {
        Some(raw) => match LabelRuleSet::parse(raw) {
            Ok(rules) => rules,
            Err(error) => {
                eprintln!(
                    "failed to parse label rules json: {error} (label transitions disabled)"
                );
                LabelRuleSet::default()
            }
        },
        None => LabelRuleSet::default(),
    };

    run_relay_server(RelayServerConfig {
        bind: cli.bind,
        state_dir: cli.state_dir,
        relay_key: cli.relay_key,
        forge_api_base: cli.forge_api_base,
        forge_app_id: cli.forge_app_id,
        forge_installation_id: cli.forge_installation_id,
        forge_private_key_pem: cli.forge_private_key_pem,
        forge_timeout_ms: cli.forge_timeout_ms,
        label_rules,
        max_evidence_bytes: cli.max_evidence_bytes,
    })
    .await
}
