//! `forgegate serve`: start the protected HTTP gateway.

use forgegate_config::AppConfig;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("ForgeGate Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   SSOT:      {}", config.ssot_path.display());
    match &config.audit.log_path {
        Some(path) => println!("   Audit log: {}", path.display()),
        None => println!("   Audit log: tracing only"),
    }

    forgegate_gateway::start(config).await?;

    Ok(())
}
