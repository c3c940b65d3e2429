use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tokenproof_core::{TokenproofConfig, CONFIG_FILE};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force overwrite existing configuration file
    #[arg(short, long)]
    pub force: bool,
}

pub struct ConfigGenerator;

impl ConfigGenerator {
    pub fn generate_default_config() -> TokenproofConfig {
        TokenproofConfig::default()
    }
}

pub struct FileWriter;

impl FileWriter {
    pub fn config_exists(path: &Path) -> bool {
        path.join(CONFIG_FILE).exists()
    }

    pub fn write_config(config: &TokenproofConfig, path: &Path) -> anyhow::Result<PathBuf> {
        let config_path = path.join(CONFIG_FILE);
        let toml_string = toml::to_string_pretty(config)?;
        fs::write(&config_path, toml_string)?;
        Ok(config_path)
    }
}

pub struct OutputFormatter;

impl OutputFormatter {
    pub fn display_success(config_path: &Path) {
        println!("{} Configuration file created successfully!", "✓".green());
        println!("   Location: {}", config_path.display());
    }

    pub fn display_existing_file_warning() {
        eprintln!(
            "{} Configuration file already exists: {}",
            "⚠".yellow(),
            CONFIG_FILE
        );
        eprintln!("   Use --force to overwrite the existing configuration");
    }

    pub fn display_error(error: &anyhow::Error) {
        eprintln!("{} Failed to create configuration file", "✗".red());
        eprintln!("   Error: {}", error);
    }
}

pub fn exec(args: InitArgs) -> anyhow::Result<()> {
    let current_dir = std::env::current_dir()?;

    if FileWriter::config_exists(&current_dir) && !args.force {
        OutputFormatter::display_existing_file_warning();
        std::process::exit(1);
    }

    let config = ConfigGenerator::generate_default_config();

    match FileWriter::write_config(&config, &current_dir) {
        Ok(config_path) => {
            OutputFormatter::display_success(&config_path);
            Ok(())
        }
        Err(e) => {
            OutputFormatter::display_error(&e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_default_config() {
        let config = ConfigGenerator::generate_default_config();

        assert_eq!(config.accounts, 20);
        assert_eq!(config.workers, 1);
        assert_eq!(config.campaign.sequences, 10);
        assert_eq!(config.campaign.flows, 50);
        assert_eq!(config.campaign.mint_amount, 300);
        assert_eq!(config.campaign.decimals, 18);
        assert!(config.scenarios.static_max_allowance);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_config_exists_returns_false_when_no_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!FileWriter::config_exists(temp_dir.path()));
    }

    #[test]
    fn test_config_exists_returns_true_when_file_exists() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "test content").unwrap();

        assert!(FileWriter::config_exists(temp_dir.path()));
    }

    #[test]
    fn test_written_config_reads_back() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigGenerator::generate_default_config();

        let config_path = FileWriter::write_config(&config, temp_dir.path()).unwrap();
        assert!(config_path.ends_with(CONFIG_FILE));

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("accounts = 20"));
        assert!(content.contains("[campaign]"));

        let parsed: TokenproofConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_write_config_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "old content").unwrap();

        let config = ConfigGenerator::generate_default_config();
        FileWriter::write_config(&config, temp_dir.path()).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(!content.contains("old content"));
    }
}
