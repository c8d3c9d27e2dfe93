use anyhow::{Context, Result};
use gate_config::parser;
use onion_supervisor::render_torrc;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    let prefs = parser::parse_file(config_path).context("Failed to parse configuration")?;
    print!("{}", render_torrc(&prefs.to_service_config()));
    Ok(())
}
