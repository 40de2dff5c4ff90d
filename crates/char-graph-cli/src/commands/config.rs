//! Config command implementation.
//!
//! `set` and `reset` only touch the config file; environment overrides are
//! left out of what gets written.

use anyhow::Result;

use crate::config::Config;

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("Char-Graph CLI Configuration");
    println!("{:-<40}", "");

    println!(
        "API Key:             {}",
        config
            .api_key
            .as_ref()
            .map(|k| format!("{}...", &k[..k.char_indices().nth(6).map_or(k.len(), |(i, _)| i)]))
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("API URL:             {}", config.api_url);
    println!("Model:               {}", config.model);
    println!("Output Directory:    {}", config.output_dir.display());
    println!("Max Retries:         {}", config.max_retries);

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value in the config file.
pub fn set(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load_file()?;

    match key {
        "api-url" | "url" => {
            config.api_url = value.to_string();
            println!("Set api-url to: {}", value);
        }
        "model" => {
            config.model = value.to_string();
            println!("Set model to: {}", value);
        }
        "output-dir" | "out-dir" => {
            config.output_dir = value.into();
            println!("Set output-dir to: {}", value);
        }
        "max-retries" => {
            config.max_retries = value.parse()?;
            println!("Set max-retries to: {}", value);
        }
        _ => {
            anyhow::bail!(
                "Unknown config key: {}. Valid keys: api-url, model, output-dir, max-retries",
                key
            );
        }
    }

    config.save()?;
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults");
    Ok(())
}
