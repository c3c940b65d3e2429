use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::OracleError;

// ── Tolerated deviations ──────────────────────────────────────────────────────

/// Behavior the token interface leaves open or merely discourages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A transfer or approval involving the null account took effect.
    NullAccountAccepted,
    /// The call succeeded but returned `false` or no return data.
    FalsyReturnOnSuccess,
    /// The call failed by returning `false` instead of reverting.
    ReturnFalseInsteadOfRevert,
    /// `balanceOf(null)` is non-zero.
    NullAccountHoldsBalance,
    /// The model and the snapshot probe disagree on a null-recipient transfer.
    ProbeDisagreement,
    /// A self-spend through `transferFrom` left the allowance untouched.
    SelfSpendKeepsAllowance,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WarningKind::NullAccountAccepted => "null account accepted",
            WarningKind::FalsyReturnOnSuccess => "falsy return on success",
            WarningKind::ReturnFalseInsteadOfRevert => "return false instead of revert",
            WarningKind::NullAccountHoldsBalance => "null account holds balance",
            WarningKind::ProbeDisagreement => "probe disagreement",
            WarningKind::SelfSpendKeepsAllowance => "self-spend keeps allowance",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

// ── Conformance violations ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnexpectedRevert,
    MissingNotification,
    UnexpectedNotification,
    NeitherRevertedNorFalse,
    NullSpenderApproved,
    BalanceMismatch,
    AllowanceMismatch,
    TotalSupplyMismatch,
    /// A scenario-level property check did not hold.
    PropertyNotHeld,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ViolationKind::UnexpectedRevert => "unexpected revert",
            ViolationKind::MissingNotification => "missing notification",
            ViolationKind::UnexpectedNotification => "unexpected notification",
            ViolationKind::NeitherRevertedNorFalse => "neither reverted nor returned false",
            ViolationKind::NullSpenderApproved => "null spender approved",
            ViolationKind::BalanceMismatch => "balance mismatch",
            ViolationKind::AllowanceMismatch => "allowance mismatch",
            ViolationKind::TotalSupplyMismatch => "total supply mismatch",
            ViolationKind::PropertyNotHeld => "property not held",
        };
        f.write_str(label)
    }
}

/// The token under test diverged from required semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind}: {message}")]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ── Verdict ───────────────────────────────────────────────────────────────────

/// Outcome of one oracle assertion.
#[derive(Debug)]
pub enum Verdict {
    Pass,
    Warn(Vec<Warning>),
    Fail(OracleError),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Verdict::Fail(_))
    }

    pub fn warnings(&self) -> &[Warning] {
        match self {
            Verdict::Warn(warnings) => warnings,
            _ => &[],
        }
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Verdict::Fail(err) => err.as_violation(),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Vec<Warning>, OracleError> {
        match self {
            Verdict::Pass => Ok(Vec::new()),
            Verdict::Warn(warnings) => Ok(warnings),
            Verdict::Fail(err) => Err(err),
        }
    }
}

impl From<Result<Vec<Warning>, OracleError>> for Verdict {
    fn from(result: Result<Vec<Warning>, OracleError>) -> Self {
        match result {
            Ok(warnings) if warnings.is_empty() => Verdict::Pass,
            Ok(warnings) => Verdict::Warn(warnings),
            Err(err) => Verdict::Fail(err),
        }
    }
}

// ── Aggregation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarningTally {
    pub count: usize,
    /// First message seen for this kind.
    pub example: String,
}

/// Per-kind warning counts collected over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarningStats {
    pub by_kind: BTreeMap<WarningKind, WarningTally>,
}

impl WarningStats {
    pub fn record(&mut self, warning: &Warning) {
        let tally = self.by_kind.entry(warning.kind).or_default();
        if tally.count == 0 {
            tally.example = warning.message.clone();
        }
        tally.count += 1;
    }

    pub fn extend<'a>(&mut self, warnings: impl IntoIterator<Item = &'a Warning>) {
        for warning in warnings {
            self.record(warning);
        }
    }

    pub fn merge(&mut self, other: &WarningStats) {
        for (kind, tally) in &other.by_kind {
            let entry = self.by_kind.entry(*kind).or_default();
            if entry.count == 0 {
                entry.example = tally.example.clone();
            }
            entry.count += tally.count;
        }
    }

    pub fn total(&self) -> usize {
        self.by_kind.values().map(|t| t.count).sum()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.by_kind.get(&kind).map_or(0, |t| t.count)
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}
