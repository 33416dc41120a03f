use clearlend::core::config::ConfigError;
use clearlend::{ClearNodeClient, ClearNodeConfig, ClearNodeRpc, LendingService};
use tracing::{info, warn};

// Well-known throwaway key used when YELLOW_PRIV_KEY is unset. Never fund it.
const DEMO_PRIVATE_KEY: &str =
    "0x59c6995e998f97a5a0044966f094538b292f2f3c5a1e0769f0f4f2159f2c2aa1";

fn load_config() -> anyhow::Result<ClearNodeConfig> {
    #[cfg(feature = "env-file")]
    let loaded = ClearNodeConfig::from_env_file();
    #[cfg(not(feature = "env-file"))]
    let loaded = ClearNodeConfig::from_env();

    match loaded {
        Ok(config) => Ok(config),
        Err(ConfigError::MissingEnvironmentVariable(var)) => {
            warn!("{} not set, using the demo key", var);
            Ok(ClearNodeConfig::new(DEMO_PRIVATE_KEY.to_string()).apply_env()?)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = load_config()?;
    info!("Connecting to {}", config.ws_url);
    let client = ClearNodeClient::new(config)?;
    info!("Signing as {}", client.signer_address());

    println!(">> Ping");
    match client.ping().await {
        Ok(response) => println!("<< {}", serde_json::to_string_pretty(&response.envelope)?),
        Err(e) => println!("Ping failed: {}", e),
    }

    println!(">> GetConfig");
    match client.get_config().await {
        Ok(response) => println!("<< {}", serde_json::to_string_pretty(&response.envelope)?),
        Err(e) => println!("GetConfig failed: {}", e),
    }

    client.close().await?;

    // Lending walkthrough against the in-memory ledger
    let mut lending = LendingService::new();
    lending.supply("alice", "USDC", 100u64)?;
    lending.borrow("alice", "USDC", 100u64)?;
    if let Err(e) = lending.borrow("alice", "USDC", 1u64) {
        println!("Second borrow rejected: {}", e);
    }
    let repay = lending.repay("alice", "USDC", 150u64)?;
    println!("Repaid {} of 150", repay.repaid);
    lending.redeem("alice", "USDC", 100u64)?;

    println!("{}", serde_json::to_string_pretty(&lending.state())?);
    Ok(())
}
