//! `urbanroute config`: Configuration management commands.

use std::path::Path;
use urbanroute_config::AppConfig;

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path.display());
    Ok(())
}

/// Write the default configuration to `config_path` unless a file is
/// already there. Returns whether a file was written.
fn write_default(config_path: &Path) -> std::io::Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(config_path, AppConfig::default_toml())?;
    Ok(true)
}

pub fn init(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if write_default(config_path)? {
        println!("Created {}", config_path.display());
        println!();
        println!("Next steps:");
        println!("  1. Point `checkpoint` at your trained classifier directory");
        println!("  2. Set OPENAI_API_KEY and GOOGLE_MAPS_API_KEY (or edit the file)");
        println!("  3. Run: urbanroute doctor");
    } else {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run `urbanroute config init`.");
    }
    Ok(())
}
