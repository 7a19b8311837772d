use crate::config::parse::load_config;
use crate::retrieval::window::format_epoch;
use crate::storage::checkpoint::{CheckpointStore, FileCheckpointStore};
use std::path::PathBuf;

fn open_store(config_path: Option<PathBuf>) -> Result<FileCheckpointStore, Box<dyn std::error::Error>> {
    let config_path = config_path.ok_or("config not found; use --config <path>")?;
    let config = load_config(&config_path)?;
    Ok(FileCheckpointStore::new(&config.checkpoint.path))
}

pub fn show(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config_path)?;
    match store.load()? {
        Some(timestamp) => println!("{} ({} UTC)", timestamp, format_epoch(timestamp)),
        None => println!("none"),
    }
    Ok(())
}

pub fn set(config_path: Option<PathBuf>, timestamp: i64) -> Result<(), Box<dyn std::error::Error>> {
    if timestamp < 0 {
        return Err("checkpoint must not be negative".into());
    }
    let now = chrono::Utc::now().timestamp();
    if timestamp > now {
        return Err(format!("checkpoint {} is in the future (now is {})", timestamp, now).into());
    }

    let store = open_store(config_path)?;
    store.commit(timestamp)?;
    println!(
        "Checkpoint set to {} ({} UTC) in {}",
        timestamp,
        format_epoch(timestamp),
        store.path().display()
    );
    Ok(())
}
