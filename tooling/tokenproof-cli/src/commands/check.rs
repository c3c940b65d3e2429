use clap::Args;
use colored::*;
use regex::Regex;
use tokenproof_core::scenarios::{run_scenarios, Level, Scenario, ScenarioReport, ScenarioStatus, SCENARIOS};
use tokenproof_core::TokenproofConfig;

use super::tokens::{deploy, lookup};
use super::OutputFormat;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Bundled token to test (see `tokenproof tokens`)
    #[arg(default_value = "openzeppelin")]
    pub token: String,

    /// Only run these levels (repeatable); defaults to the configured levels
    #[arg(short, long)]
    pub level: Vec<Level>,

    /// Only run scenarios whose name matches this regular expression
    #[arg(long)]
    pub filter: Option<String>,

    /// Treat a MAX allowance as never spent (defaults to the token's behaviour)
    #[arg(long)]
    pub static_max_allowance: Option<bool>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

pub fn select(levels: &[Level], filter: Option<&Regex>) -> Vec<&'static Scenario> {
    SCENARIOS
        .iter()
        .filter(|s| levels.contains(&s.level))
        .filter(|s| filter.map_or(true, |re| re.is_match(s.name)))
        .collect()
}

/// Returns whether no scenario failed.
pub fn exec(args: CheckArgs, config: TokenproofConfig) -> anyhow::Result<bool> {
    let spec = lookup(&args.token)?;
    let filter = args.filter.as_deref().map(Regex::new).transpose()?;
    let levels = if args.level.is_empty() {
        config.scenarios.levels.clone()
    } else {
        args.level.clone()
    };
    let static_max_allowance = args
        .static_max_allowance
        .unwrap_or(spec.static_max_allowance && config.scenarios.static_max_allowance);

    let selected = select(&levels, filter.as_ref());
    if selected.is_empty() {
        anyhow::bail!("no scenario matches the given levels and filter");
    }

    let (mut chain, token) = deploy(&spec.name, config.accounts)?;
    let report = run_scenarios(&mut chain, token, selected, static_max_allowance)?;

    if args.format.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&spec.name, &report);
    }
    Ok(report.is_clean())
}

fn print_report(token: &str, report: &ScenarioReport) {
    println!("{} Checking {}", "🔍".blue(), token.bold());

    let mut current = None;
    for result in &report.results {
        if current != Some(result.level) {
            current = Some(result.level);
            println!("\n{}", result.level.to_string().to_uppercase().bold());
        }
        let (mark, detail) = match &result.status {
            ScenarioStatus::Passed => ("PASS".green(), None),
            ScenarioStatus::XPassed => ("XPASS".cyan(), None),
            ScenarioStatus::XFailed(reason) => ("XFAIL".yellow(), Some(reason)),
            ScenarioStatus::Failed(reason) => ("FAIL".red().bold(), Some(reason)),
        };
        println!("  {:<6} {}", mark, result.name);
        if let Some(detail) = detail {
            println!("         {}", detail.dimmed());
        }
        for warning in &result.warnings {
            println!("         {} {}", "⚠".yellow(), warning);
        }
    }

    let count = |f: fn(&ScenarioStatus) -> bool| report.count(f);
    println!(
        "\n{} passed, {} failed, {} expected failures, {} unexpected passes",
        count(|s| matches!(s, ScenarioStatus::Passed)),
        count(|s| matches!(s, ScenarioStatus::Failed(_))),
        count(|s| matches!(s, ScenarioStatus::XFailed(_))),
        count(|s| matches!(s, ScenarioStatus::XPassed)),
    );
    if report.is_clean() {
        println!("{} No conformance violations found.", "✅".green());
    } else {
        println!("{} Found conformance violations!", "❌".red());
    }
}
