mod network_constants;
mod node_config;
mod toml;

pub use network_constants::NetworkConstants;
pub use node_config::NodeConfig;
pub use toml::*;

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub fn get_node_toml_config_path(data_path: impl Into<PathBuf>) -> PathBuf {
    let mut node_toml = data_path.into();
    node_toml.push("config-node.toml");
    node_toml
}

pub fn read_toml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let toml_str = std::fs::read_to_string(path)?;
    ::toml::from_str(&toml_str).map_err(|e| e.into())
}

/// Reads `config-node.toml` from the data path and applies it on top of the defaults.
/// A missing file yields the default config.
pub fn load_node_config(
    data_path: impl Into<PathBuf>,
    network: &NetworkConstants,
) -> anyhow::Result<NodeConfig> {
    let path = get_node_toml_config_path(data_path);
    let mut config = NodeConfig::new(network);
    if path.exists() {
        let toml: NodeToml = read_toml_file(&path)?;
        config.merge_toml(&toml);
    }
    Ok(config)
}
