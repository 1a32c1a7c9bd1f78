use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::oracle::OracleError;

/// Role a variable plays inside a premise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VariableRole {
    /// The claim manipulates this quantity.
    Independent,
    /// This quantity responds to the independent ones.
    Dependent,
}

impl VariableRole {
    /// Short human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Independent => "independent",
            Self::Dependent => "dependent",
        }
    }
}

/// One named quantity extracted from the input claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variable {
    /// Normalized name, unique within a `PremiseSet`.
    pub name: String,
    /// Role within the premise.
    pub role: VariableRole,
}

impl Variable {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: impl Into<String>, role: VariableRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// Output of Phase I: the claim decomposed into goal, variables, and
/// unstated preconditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PremiseSet {
    /// Extracted variables in extraction order, unique by normalized name.
    pub variables: Vec<Variable>,
    /// The explicit objective of the claim. Non-empty past Phase I.
    pub stated_goal: String,
    /// Unstated preconditions the goal depends on. May be empty.
    pub hidden_assumptions: Vec<String>,
}

impl PremiseSet {
    /// Names of independent variables, in extraction order.
    #[must_use]
    pub fn independent_names(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| v.role == VariableRole::Independent)
            .map(|v| v.name.clone())
            .collect()
    }
}

/// The three stress transformations applied to a premise. Closed set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TriggerType {
    /// Push the load-bearing variable toward zero and toward infinity.
    Extremification,
    /// Enforce the logical negation of the stated goal's premise.
    Inversion,
    /// Apply the same rule for many iterations and watch the trend.
    TimeScaling,
}

impl TriggerType {
    /// Canonical ordering used for branch sequences and classification.
    pub const ALL: [Self; 3] = [Self::Extremification, Self::Inversion, Self::TimeScaling];

    /// Lowercase label used in telemetry and error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Extremification => "extremification",
            Self::Inversion => "inversion",
            Self::TimeScaling => "time_scaling",
        }
    }

    /// Section heading used when rendering reports.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Extremification => "Extremification",
            Self::Inversion => "Inversion",
            Self::TimeScaling => "Time Scaling",
        }
    }
}

/// Direction of an extremification probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtremeDirection {
    /// Variable driven toward zero.
    TowardZero,
    /// Variable driven toward infinity.
    TowardInfinity,
}

impl ExtremeDirection {
    /// Short human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TowardZero => "toward zero",
            Self::TowardInfinity => "toward infinity",
        }
    }
}

/// Long-run trend of a time-scaling branch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StabilityHint {
    /// System converges under repetition.
    Stabilizes,
    /// System diverges or breaks under repetition.
    Collapses,
    /// Trend could not be read from the oracle's wording.
    Unresolved,
}

impl StabilityHint {
    /// Short human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stabilizes => "stabilizes",
            Self::Collapses => "collapses",
            Self::Unresolved => "unresolved",
        }
    }
}

/// One hypothetical outcome of applying a trigger to a premise.
/// Immutable once produced; it records an outcome, not a judgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
    /// Trigger that produced the branch.
    pub trigger: TriggerType,
    /// Populated only on the extremification branch, and only when one
    /// limit was decisive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<ExtremeDirection>,
    /// Oracle's predicted outcome.
    pub outcome_description: String,
    /// Populated only on the time-scaling branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability_hint: Option<StabilityHint>,
}

/// Contradiction classes, plus the no-contradiction case. Closed set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Classification {
    /// Achieving the goal logically necessitates the goal's own negation.
    Antinomy,
    /// An apparently valid result rests on a false hidden assumption.
    Falsidical,
    /// Counterintuitive but logically and factually consistent.
    Veridical,
    /// No contradiction under the tested branches.
    NoneFound,
}

impl Classification {
    /// Short human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Antinomy => "Antinomy",
            Self::Falsidical => "Falsidical",
            Self::Veridical => "Veridical",
            Self::NoneFound => "None",
        }
    }
}

/// Phase III verdict over the premise and its three branches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnosis {
    /// Contradiction class.
    pub classification: Classification,
    /// Trigger of the branch that produced the conflict. Absent iff
    /// `NoneFound` (branches are unique per trigger by construction).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggering_branch: Option<TriggerType>,
    /// Why the classification holds. Non-empty unless `NoneFound`.
    pub reasoning: String,
}

impl Diagnosis {
    /// The no-contradiction diagnosis.
    #[must_use]
    pub const fn none_found() -> Self {
        Self {
            classification: Classification::NoneFound,
            triggering_branch: None,
            reasoning: String::new(),
        }
    }
}

/// The pipeline's sole output artifact. Immutable and terminal; it
/// exclusively owns its premise and branches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    /// Content-derived identifier: stable across runs for the same input
    /// text and extracted premise, regardless of oracle phrasing.
    pub id: String,
    /// Phase I output.
    pub premise: PremiseSet,
    /// Exactly three branches in canonical trigger order.
    pub branches: [Branch; 3],
    /// Phase III verdict.
    pub diagnosis: Diagnosis,
    /// Suggested adjustment. Non-empty iff a contradiction was found.
    pub mitigation: String,
    /// Assembly time (UTC). Not part of the identifier.
    pub generated_at: DateTime<Utc>,
}

/// Pipeline stage, used to attribute failures and telemetry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Stage {
    /// Phase I: premise extraction.
    Extraction,
    /// Phase II: branch expansion.
    Expansion,
    /// Phase III: contradiction classification.
    Classification,
    /// Report assembly.
    Reporting,
}

impl Stage {
    /// Short human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Expansion => "expansion",
            Self::Classification => "classification",
            Self::Reporting => "reporting",
        }
    }
}

/// Failures surfaced by `analyze`. No stage swallows one of these and
/// substitutes a default; a failed invocation yields no report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input was empty or whitespace-only. Rejected before any oracle call.
    #[error("input text is empty or whitespace-only")]
    InvalidInput,
    /// The oracle could not identify a stated goal in non-empty input.
    #[error("premise extraction failed: {0}")]
    ExtractionFailure(String),
    /// A stage exhausted the oracle retry budget.
    #[error("oracle failure during {}: {source}", .stage.label())]
    Oracle {
        /// Stage whose oracle calls failed.
        stage: Stage,
        /// Terminal oracle error.
        #[source]
        source: OracleError,
    },
    /// The invocation was cancelled at a stage boundary.
    #[error("pipeline cancelled before {}", .stage.label())]
    Cancelled {
        /// Stage that was about to start.
        stage: Stage,
    },
}

/// Collapses whitespace runs to single spaces and trims the ends.
/// Used for variable names and for the report-identifier input text.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
