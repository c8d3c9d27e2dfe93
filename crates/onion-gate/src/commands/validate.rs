use anyhow::{Context, Result};
use gate_config::parser;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating {}...", config_path.display());

    // Parsing substitutes environment variables and validates every field
    let prefs = parser::parse_file(config_path).context("Failed to parse configuration")?;
    let config = prefs.to_service_config();

    println!("✓ Configuration valid");
    println!("  Version: {}", prefs.version);
    println!("  Data directory: {}", config.data_dir.display());
    println!("  SOCKS port: {}", config.socks_port);
    println!(
        "  Forwarding: {} -> {}:{}",
        config.virtual_port, config.target_addr, config.target_port
    );
    println!("  Tor binary: {}", config.resolved_tor_binary().display());
    println!(
        "  Bootstrap: {} x {:?} (budget {:?})",
        config.bootstrap.max_attempts,
        config.bootstrap.poll_interval,
        config.bootstrap.budget()
    );
    println!("  Eager start: {}", prefs.eager_start);

    Ok(())
}
