use clap::Args;
use colored::*;
use tokenproof_core::{Campaign, CampaignError, CampaignReport, TokenproofConfig};

use super::tokens::{deploy, lookup};
use super::OutputFormat;

#[derive(Args, Debug)]
pub struct FuzzArgs {
    /// Bundled token to test (see `tokenproof tokens`)
    #[arg(default_value = "openzeppelin")]
    pub token: String,

    /// Number of independent sequences
    #[arg(short, long)]
    pub sequences: Option<usize>,

    /// Flows per sequence
    #[arg(long)]
    pub flows: Option<usize>,

    /// Campaign seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Chance of drawing the null account for an address
    #[arg(long)]
    pub null_probability: Option<f64>,

    /// Treat a MAX allowance as never spent (defaults to the token's behaviour)
    #[arg(long)]
    pub static_max_allowance: Option<bool>,

    /// Keep running after the first failing sequence
    #[arg(long)]
    pub keep_going: bool,

    /// Report failures without minimizing them
    #[arg(long)]
    pub no_shrink: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

fn apply_overrides(args: &FuzzArgs, config: &mut TokenproofConfig, token_static: bool) {
    let campaign = &mut config.campaign;
    if let Some(sequences) = args.sequences {
        campaign.sequences = sequences;
    }
    if let Some(flows) = args.flows {
        campaign.flows = flows;
    }
    if let Some(seed) = args.seed {
        campaign.seed = seed;
    }
    if let Some(p) = args.null_probability {
        campaign.null_probability = p;
    }
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }
    config.campaign.model.static_max_allowance = args.static_max_allowance.unwrap_or(token_static);
    if args.keep_going {
        config.campaign.stop_on_failure = false;
    }
    if args.no_shrink {
        config.campaign.shrink = false;
    }
}

/// Returns whether the campaign came back clean.
pub fn exec(args: FuzzArgs, mut config: TokenproofConfig) -> anyhow::Result<bool> {
    let spec = lookup(&args.token)?;
    apply_overrides(&args, &mut config, spec.static_max_allowance);

    let campaign = Campaign::new(config.campaign.clone())?;
    if !args.format.is_json() {
        println!(
            "{} Fuzzing {} with {} sequences of {} flows (seed {})",
            "🔍".blue(),
            spec.name.bold(),
            config.campaign.sequences,
            config.campaign.flows,
            config.campaign.seed
        );
    }

    let report = if config.workers > 1 {
        let accounts = config.accounts;
        let name = spec.name.as_str();
        campaign.run_parallel(config.workers, || {
            deploy(name, accounts).map_err(|e| CampaignError::InvalidConfig(e.to_string()))
        })?
    } else {
        let (mut chain, token) = deploy(&spec.name, config.accounts)?;
        campaign.run(&mut chain, token)?
    };

    if args.format.is_json() {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }
    Ok(report.is_clean())
}

fn print_report(report: &CampaignReport) {
    println!(
        "\n{} {} sequences, {} flows",
        "📊".blue(),
        report.sequences_run,
        report.flows_run
    );

    if !report.warnings.is_empty() {
        println!("\n{} Warnings:", "⚠️".yellow());
        for (kind, tally) in &report.warnings.by_kind {
            println!("   {} {} x{}", "->".yellow(), kind.to_string().bold(), tally.count);
            println!("      e.g. {}", tally.example);
        }
    }

    if report.is_clean() {
        println!("\n{} No conformance violations found.", "✅".green());
        return;
    }

    for failure in &report.failures {
        println!(
            "\n{} Sequence {} (seed {}) failed at flow {}",
            "❌".red(),
            failure.sequence,
            failure.seed,
            failure.flow_index
        );
        println!("   {}", failure.message);
        match &failure.shrink {
            Some(stats) => println!(
                "   Minimal reproducer ({} of {} flows, {} replays):",
                failure.reproducer.len(),
                failure.original_len,
                stats.evaluations
            ),
            None => println!("   Reproducer ({} flows):", failure.reproducer.len()),
        }
        for (i, flow) in failure.reproducer.iter().enumerate() {
            println!("     {:>3}. {}", i, flow);
        }
    }
}
