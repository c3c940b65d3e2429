use serde::{Deserialize, Serialize};

use crate::campaign::CampaignConfig;
use crate::scenarios::Level;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = ".tokenproof.toml";

/// Top-level configuration, as read from [`CONFIG_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenproofConfig {
    /// Accounts created on the in-memory chain.
    #[serde(default = "default_accounts")]
    pub accounts: usize,
    /// Worker threads for fuzz campaigns. 1 runs sequentially.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub scenarios: ScenarioConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_levels")]
    pub levels: Vec<Level>,
    /// Infinite-allowance behaviour assumed by the scenario model. Scenarios
    /// that pin it ignore this.
    #[serde(default = "default_static_max_allowance")]
    pub static_max_allowance: bool,
}

fn default_accounts() -> usize {
    20
}

fn default_workers() -> usize {
    1
}

fn default_levels() -> Vec<Level> {
    Level::ALL.to_vec()
}

fn default_static_max_allowance() -> bool {
    true
}

impl Default for TokenproofConfig {
    fn default() -> Self {
        Self {
            accounts: default_accounts(),
            workers: default_workers(),
            campaign: CampaignConfig::default(),
            scenarios: ScenarioConfig::default(),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            static_max_allowance: default_static_max_allowance(),
        }
    }
}

impl TokenproofConfig {
    /// Problems that would make every run pointless, as messages.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.accounts < crate::scenarios::MIN_ACCOUNTS {
            problems.push(format!(
                "accounts must be at least {}, got {}",
                crate::scenarios::MIN_ACCOUNTS,
                self.accounts
            ));
        }
        if self.workers == 0 {
            problems.push("workers must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.campaign.null_probability) {
            problems.push(format!(
                "campaign.null_probability must be within [0, 1], got {}",
                self.campaign.null_probability
            ));
        }
        if self.scenarios.levels.is_empty() {
            problems.push("scenarios.levels must name at least one level".to_string());
        }
        problems
    }
}
