use anyhow::anyhow;
use clap::Args;
use colored::*;
use reference_token::{StandardToken, PRESETS};
use serde::Serialize;
use token_with_bugs::{Bug, BuggyToken};
use tokenproof_core::chain::TokenLogic;
use tokenproof_core::{Address, MemoryChain};

use super::OutputFormat;

#[derive(Args, Debug)]
pub struct TokensArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Reference,
    Buggy,
}

/// A bundled token the CLI can deploy by name.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSpec {
    pub name: String,
    pub kind: TokenKind,
    /// Whether a `MAX` allowance is never spent by this token.
    pub static_max_allowance: bool,
}

pub fn registry() -> Vec<TokenSpec> {
    let reference = PRESETS.iter().map(|(name, behaviour)| TokenSpec {
        name: name.to_string(),
        kind: TokenKind::Reference,
        static_max_allowance: behaviour.infinite_allowance,
    });
    let buggy = Bug::ALL.into_iter().map(|bug| TokenSpec {
        name: bug.name().to_string(),
        kind: TokenKind::Buggy,
        static_max_allowance: true,
    });
    reference.chain(buggy).collect()
}

pub fn lookup(name: &str) -> anyhow::Result<TokenSpec> {
    registry()
        .into_iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| anyhow!("unknown token '{name}' (see `tokenproof tokens`)"))
}

fn logic(name: &str) -> anyhow::Result<Box<dyn TokenLogic>> {
    if let Some(behaviour) = reference_token::preset(name) {
        return Ok(Box::new(StandardToken::new(name, behaviour)));
    }
    Bug::from_name(name)
        .map(|bug| Box::new(BuggyToken::new(bug)) as Box<dyn TokenLogic>)
        .ok_or_else(|| anyhow!("unknown token '{name}' (see `tokenproof tokens`)"))
}

/// A fresh chain with `accounts` accounts and the named token deployed.
pub fn deploy(name: &str, accounts: usize) -> anyhow::Result<(MemoryChain, Address)> {
    let mut chain = MemoryChain::new(accounts);
    let token = chain.deploy(logic(name)?);
    Ok((chain, token))
}

pub fn exec(args: TokensArgs) -> anyhow::Result<()> {
    let tokens = registry();
    if args.format.is_json() {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
        return Ok(());
    }

    for spec in tokens {
        let kind = match spec.kind {
            TokenKind::Reference => "reference".green(),
            TokenKind::Buggy => "buggy".red(),
        };
        let allowance = if spec.static_max_allowance {
            "infinite allowance"
        } else {
            "finite allowance"
        };
        println!("{:<30} {:<10} {}", spec.name.bold(), kind, allowance.dimmed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokenproof_core::Substrate;

    #[test]
    fn test_registry_names_are_unique() {
        let tokens = registry();
        let names: HashSet<_> = tokens.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), tokens.len());
        assert!(names.contains("openzeppelin"));
        assert!(names.contains("fee-on-transfer"));
    }

    #[test]
    fn test_every_registered_token_deploys() {
        for spec in registry() {
            let (chain, token) = deploy(&spec.name, 4).unwrap();
            assert_eq!(chain.token_name(token), Some(spec.name.as_str()));
            assert_eq!(chain.accounts().len(), 4);
        }
    }

    #[test]
    fn test_unknown_token() {
        assert!(lookup("nonexistent").is_err());
        assert!(deploy("nonexistent", 4).is_err());
    }
}
