//! CLI command modules.

use std::io::Read;

use anyhow::{Context, Result};

use flicker_core::config::FlickerConfig;

pub mod chunk;
pub mod codec;
pub mod receive;
pub mod transmit;

/// Read a command argument: `-` means stdin, anything else is used as-is.
pub fn read_arg(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.trim().to_string());
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read stdin")?;
    Ok(text.trim().to_string())
}

pub fn cmd_config(config: &FlickerConfig, init: bool) -> Result<()> {
    if init {
        let path = FlickerConfig::write_default_if_missing()?;
        eprintln!("config file: {}", path.display());
    } else {
        eprintln!("config file: {}", FlickerConfig::file_path().display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
