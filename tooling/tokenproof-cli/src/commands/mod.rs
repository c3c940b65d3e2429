use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use clap::ValueEnum;
use tokenproof_core::{TokenproofConfig, CONFIG_FILE};

pub mod check;
pub mod fuzz;
pub mod init;
pub mod tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        *self == OutputFormat::Json
    }
}

/// Read the configuration from `path`, or from `.tokenproof.toml` in the
/// current directory when it exists, or fall back to the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<TokenproofConfig> {
    let config = match path {
        Some(path) => read_config(path)?,
        None => {
            let local = Path::new(CONFIG_FILE);
            if local.exists() {
                read_config(local)?
            } else {
                TokenproofConfig::default()
            }
        }
    };

    let problems = config.validate();
    if !problems.is_empty() {
        bail!("invalid configuration:\n  {}", problems.join("\n  "));
    }
    Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<TokenproofConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}
