use crate::config::generate::generate_starter_config;
use crate::config::{default_user_config_path, system_config_path};
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = choose_config_path();
    write_config(&config_content, &config_path)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// Prefers the per-user location, falling back to /etc when it can't be created.
fn choose_config_path() -> PathBuf {
    if let Some(user_config) = default_user_config_path() {
        if let Some(parent) = user_config.parent() {
            match fs::create_dir_all(parent) {
                Ok(()) => return user_config,
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to {}", system_config_path().display());
                }
            }
        }
    }
    system_config_path()
}

/// Writes a config file, refusing to replace an existing one.
pub fn write_config(config_content: &str, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() {
        return Err(format!(
            "Config file already exists at {}. Remove it first or use --stdout to print the config",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(config_path, config_content)?;
    Ok(())
}
