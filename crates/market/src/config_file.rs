use std::path::Path;

use ticket_market_proto::SimulationConfig;
use tokio::fs;
use tracing::info;

use crate::errors::MarketError;

/// Read a previously saved configuration. The loaded values are validated.
pub async fn load(path: &Path) -> Result<SimulationConfig, MarketError> {
    let raw = fs::read_to_string(path).await?;
    let config: SimulationConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    info!("loaded configuration from {}", path.display());
    Ok(config)
}

/// Write `config` as pretty-printed JSON, replacing any existing file.
pub async fn save(path: &Path, config: &SimulationConfig) -> Result<(), MarketError> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).await?;
    info!("saved configuration to {}", path.display());
    Ok(())
}
