//! Sequence driver: randomized fuzz campaigns over the oracle.
//!
//! A campaign runs `sequences` independent sequences of `flows` operations.
//! Every sequence starts from the same substrate state (it runs inside a
//! snapshot) with a fresh reference model, pre-mints to the first account and
//! then routes each flow through the oracle. Flows are generated up front from
//! a per-sequence seed so a failing sequence can be replayed and shrunk.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use alloy_primitives::{Address, U256};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{CampaignError, OracleError};
use crate::model::{ModelConfig, ReferenceModel};
use crate::oracle::DifferentialOracle;
use crate::shrink::{minimize, ShrinkConfig, ShrinkStats};
use crate::substrate::{with_snapshot, Substrate};
use crate::verdict::{Verdict, Warning, WarningStats};

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    #[serde(default = "default_sequences")]
    pub sequences: usize,
    #[serde(default = "default_flows")]
    pub flows: usize,
    #[serde(default)]
    pub seed: u64,
    /// Chance of substituting the null account for a randomly drawn address.
    #[serde(default = "default_null_probability")]
    pub null_probability: f64,
    /// Whole tokens minted to the first account before each sequence.
    #[serde(default = "default_mint_amount")]
    pub mint_amount: u64,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Run the full balance/allowance/supply checks after every sequence.
    #[serde(default = "default_true")]
    pub check_invariants: bool,
    #[serde(default = "default_true")]
    pub stop_on_failure: bool,
    #[serde(default = "default_true")]
    pub shrink: bool,
    #[serde(default = "default_max_shrink_evaluations")]
    pub max_shrink_evaluations: usize,
    #[serde(default)]
    pub model: ModelConfig,
}

fn default_sequences() -> usize {
    10
}

fn default_flows() -> usize {
    50
}

fn default_null_probability() -> f64 {
    0.01
}

fn default_mint_amount() -> u64 {
    300
}

fn default_decimals() -> u8 {
    18
}

fn default_true() -> bool {
    true
}

fn default_max_shrink_evaluations() -> usize {
    256
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            sequences: default_sequences(),
            flows: default_flows(),
            seed: 0,
            null_probability: default_null_probability(),
            mint_amount: default_mint_amount(),
            decimals: default_decimals(),
            check_invariants: true,
            stop_on_failure: true,
            shrink: true,
            max_shrink_evaluations: default_max_shrink_evaluations(),
            model: ModelConfig::default(),
        }
    }
}

// ── Flows ─────────────────────────────────────────────────────────────────────

/// One randomly parameterized operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum Flow {
    Approve {
        owner: Address,
        spender: Address,
        amount: U256,
    },
    Transfer {
        owner: Address,
        receiver: Address,
        amount: U256,
    },
    TransferFrom {
        owner: Address,
        spender: Address,
        receiver: Address,
        amount: U256,
    },
}

impl Flow {
    pub fn apply<S: Substrate>(&self, oracle: &mut DifferentialOracle<S>) -> Verdict {
        match *self {
            Flow::Approve {
                owner,
                spender,
                amount,
            } => oracle.assert_approve(owner, spender, amount, false),
            Flow::Transfer {
                owner,
                receiver,
                amount,
            } => oracle.assert_transfer(owner, receiver, amount),
            Flow::TransferFrom {
                owner,
                spender,
                receiver,
                amount,
            } => oracle.assert_transfer_from(owner, spender, receiver, amount),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Approve {
                owner,
                spender,
                amount,
            } => write!(f, "approve(owner={owner}, spender={spender}, amount={amount})"),
            Flow::Transfer {
                owner,
                receiver,
                amount,
            } => write!(f, "transfer(owner={owner}, receiver={receiver}, amount={amount})"),
            Flow::TransferFrom {
                owner,
                spender,
                receiver,
                amount,
            } => write!(
                f,
                "transferFrom(owner={owner}, spender={spender}, receiver={receiver}, amount={amount})"
            ),
        }
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// The first failure of one replayed flow list.
#[derive(Debug)]
pub struct ReplayFailure {
    /// Index of the failing flow; `flows.len()` for a boundary invariant check.
    pub index: usize,
    pub error: OracleError,
}

#[derive(Debug, Default)]
pub struct Replay {
    pub flows_run: usize,
    pub warnings: Vec<Warning>,
    pub failure: Option<ReplayFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceFailure {
    pub sequence: usize,
    pub seed: u64,
    pub flow_index: usize,
    pub signature: String,
    pub message: String,
    /// Minimal flow list that still fails with the same signature.
    pub reproducer: Vec<Flow>,
    pub original_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shrink: Option<ShrinkStats>,
}

#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    pub index: usize,
    pub flows_run: usize,
    pub warnings: Vec<Warning>,
    pub failure: Option<SequenceFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CampaignReport {
    pub sequences_run: usize,
    pub flows_run: usize,
    pub warnings: WarningStats,
    pub failures: Vec<SequenceFailure>,
}

impl CampaignReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Campaign {
    config: CampaignConfig,
    pre_mint: U256,
}

impl Campaign {
    pub fn new(config: CampaignConfig) -> Result<Self, CampaignError> {
        if !(0.0..=1.0).contains(&config.null_probability) {
            return Err(CampaignError::InvalidConfig(format!(
                "null_probability must be within [0, 1], got {}",
                config.null_probability
            )));
        }
        let pre_mint = U256::from(10u64)
            .checked_pow(U256::from(config.decimals))
            .and_then(|unit| unit.checked_mul(U256::from(config.mint_amount)))
            .ok_or_else(|| {
                CampaignError::InvalidConfig(format!(
                    "mint_amount {} with {} decimals overflows 256 bits",
                    config.mint_amount, config.decimals
                ))
            })?;
        // Rejects an inconsistent model config before any sequence runs.
        ReferenceModel::new(config.model.clone())?;

        Ok(Self { config, pre_mint })
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    /// Base units minted to the first account before each sequence.
    pub fn pre_mint(&self) -> U256 {
        self.pre_mint
    }

    /// Seed of sequence `index`; independent of the order sequences run in.
    pub fn sequence_seed(&self, index: usize) -> u64 {
        splitmix64(self.config.seed ^ splitmix64(index as u64))
    }

    pub fn generate_flows(&self, accounts: &[Address], seed: u64) -> Vec<Flow> {
        if accounts.is_empty() {
            return Vec::new();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let p = self.config.null_probability;

        let account = |rng: &mut StdRng| accounts[rng.gen_range(0..accounts.len())];
        let address = |rng: &mut StdRng| {
            let candidate = accounts[rng.gen_range(0..accounts.len())];
            if rng.gen_bool(p) {
                Address::ZERO
            } else {
                candidate
            }
        };

        (0..self.config.flows)
            .map(|_| match rng.gen_range(0..3u8) {
                0 => Flow::Approve {
                    owner: account(&mut rng),
                    spender: address(&mut rng),
                    amount: random_amount(&mut rng, self.pre_mint),
                },
                1 => Flow::Transfer {
                    owner: account(&mut rng),
                    receiver: address(&mut rng),
                    amount: random_amount(&mut rng, self.pre_mint),
                },
                _ => Flow::TransferFrom {
                    owner: address(&mut rng),
                    spender: account(&mut rng),
                    receiver: address(&mut rng),
                    amount: random_amount(&mut rng, self.pre_mint),
                },
            })
            .collect()
    }

    /// Run `flows` from the substrate's current state and roll everything
    /// back afterwards. Stops at the first failure.
    pub fn replay<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        token: Address,
        flows: &[Flow],
    ) -> Result<Replay, CampaignError> {
        with_snapshot(substrate, |s: &mut S| -> Result<Replay, CampaignError> {
            let accounts = s.accounts();
            let Some(&first) = accounts.first() else {
                return Err(CampaignError::InvalidConfig(
                    "substrate exposes no accounts".to_string(),
                ));
            };

            let model = ReferenceModel::new(self.config.model.clone())?;
            let mut oracle = DifferentialOracle::new(&mut *s, token, model);
            oracle
                .mint(first, self.pre_mint)
                .map_err(CampaignError::Setup)?;

            let mut replay = Replay::default();
            for (index, flow) in flows.iter().enumerate() {
                replay.flows_run += 1;
                let verdict = flow.apply(&mut oracle);
                tracing::trace!(index, %flow, ?verdict, "flow");
                match verdict.into_result() {
                    Ok(warnings) => replay.warnings.extend(warnings),
                    Err(error) => {
                        replay.failure = Some(ReplayFailure { index, error });
                        return Ok(replay);
                    }
                }
            }

            if self.config.check_invariants {
                match oracle.assert_invariants().into_result() {
                    Ok(warnings) => replay.warnings.extend(warnings),
                    Err(error) => {
                        replay.failure = Some(ReplayFailure {
                            index: flows.len(),
                            error,
                        })
                    }
                }
            }
            Ok(replay)
        })
    }

    pub fn run_sequence<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        token: Address,
        index: usize,
    ) -> Result<SequenceOutcome, CampaignError> {
        let seed = self.sequence_seed(index);
        let span = tracing::info_span!("sequence", index, seed);
        let _entered = span.enter();

        let accounts = substrate.accounts();
        let flows = self.generate_flows(&accounts, seed);
        let replay = self.replay(substrate, token, &flows)?;

        let failure = match replay.failure {
            None => None,
            Some(failure) => {
                tracing::warn!(flow = failure.index, error = %failure.error, "sequence failed");
                Some(self.shrink_failure(substrate, token, index, seed, &flows, failure)?)
            }
        };
        tracing::debug!(
            flows = replay.flows_run,
            warnings = replay.warnings.len(),
            "sequence finished"
        );

        Ok(SequenceOutcome {
            index,
            flows_run: replay.flows_run,
            warnings: replay.warnings,
            failure,
        })
    }

    fn shrink_failure<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        token: Address,
        sequence: usize,
        seed: u64,
        flows: &[Flow],
        failure: ReplayFailure,
    ) -> Result<SequenceFailure, CampaignError> {
        let signature = failure.error.signature();
        let prefix = &flows[..flows.len().min(failure.index + 1)];

        let (reproducer, shrink) = if self.config.shrink && prefix.len() > 1 {
            let config = ShrinkConfig {
                max_evaluations: self.config.max_shrink_evaluations,
            };
            let shrunk = minimize(
                prefix,
                &config,
                |candidate: &[Flow]| -> Result<bool, CampaignError> {
                    let replay = self.replay(&mut *substrate, token, candidate)?;
                    Ok(replay
                        .failure
                        .is_some_and(|f| f.error.signature() == signature))
                },
            )?;
            (shrunk.items, Some(shrunk.stats))
        } else {
            (prefix.to_vec(), None)
        };

        Ok(SequenceFailure {
            sequence,
            seed,
            flow_index: failure.index,
            signature,
            message: failure.error.to_string(),
            reproducer,
            original_len: flows.len(),
            shrink,
        })
    }

    /// Run every sequence on one substrate, one after another.
    pub fn run<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        token: Address,
    ) -> Result<CampaignReport, CampaignError> {
        let mut outcomes = Vec::with_capacity(self.config.sequences);
        for index in 0..self.config.sequences {
            let outcome = self.run_sequence(substrate, token, index)?;
            let failed = outcome.failure.is_some();
            outcomes.push(outcome);
            if failed && self.config.stop_on_failure {
                break;
            }
        }
        Ok(self.assemble(outcomes))
    }

    /// Run sequences on `workers` threads. Each worker builds its own
    /// substrate and token through `factory`; nothing mutable is shared.
    /// The report is identical to [`Campaign::run`] for the same config.
    pub fn run_parallel<S, F>(&self, workers: usize, factory: F) -> Result<CampaignReport, CampaignError>
    where
        S: Substrate,
        F: Fn() -> Result<(S, Address), CampaignError> + Sync,
    {
        let workers = workers.clamp(1, self.config.sequences.max(1));
        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let (factory, next, stop) = (&factory, &next, &stop);

        let results: Vec<Result<Vec<SequenceOutcome>, CampaignError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || -> Result<Vec<SequenceOutcome>, CampaignError> {
                        let (mut substrate, token) = factory()?;
                        let mut outcomes = Vec::new();
                        // A claimed index is always run, so the finished set is
                        // a contiguous prefix of the sequence range.
                        while !stop.load(Ordering::Acquire) {
                            let index = next.fetch_add(1, Ordering::AcqRel);
                            if index >= self.config.sequences {
                                break;
                            }
                            let outcome = self.run_sequence(&mut substrate, token, index)?;
                            if outcome.failure.is_some() && self.config.stop_on_failure {
                                stop.store(true, Ordering::Release);
                            }
                            outcomes.push(outcome);
                        }
                        Ok(outcomes)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });

        let mut outcomes = Vec::new();
        for result in results {
            outcomes.extend(result?);
        }
        outcomes.sort_by_key(|outcome| outcome.index);
        if self.config.stop_on_failure {
            if let Some(first) = outcomes.iter().position(|o| o.failure.is_some()) {
                outcomes.truncate(first + 1);
            }
        }
        Ok(self.assemble(outcomes))
    }

    fn assemble(&self, outcomes: Vec<SequenceOutcome>) -> CampaignReport {
        let mut report = CampaignReport::default();
        for outcome in outcomes {
            report.sequences_run += 1;
            report.flows_run += outcome.flows_run;
            report.warnings.extend(&outcome.warnings);
            report.failures.extend(outcome.failure);
        }
        tracing::info!(
            sequences = report.sequences_run,
            flows = report.flows_run,
            warnings = report.warnings.total(),
            failures = report.failures.len(),
            "campaign finished"
        );
        report
    }
}

/// 10% zero, 5% `MAX`, 5% any 256-bit value, otherwise `[0, pre_mint]`.
fn random_amount(rng: &mut StdRng, pre_mint: U256) -> U256 {
    match rng.gen_range(0..100u32) {
        0..=9 => U256::ZERO,
        10..=14 => U256::MAX,
        15..=19 => random_word(rng),
        _ => match pre_mint.checked_add(U256::from(1u64)) {
            Some(bound) => random_word(rng) % bound,
            None => random_word(rng),
        },
    }
}

fn random_word(rng: &mut StdRng) -> U256 {
    U256::from_be_bytes(rng.gen::<[u8; 32]>())
}

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
