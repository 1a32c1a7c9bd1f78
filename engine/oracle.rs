use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::module::{ExtremeDirection, PremiseSet, TriggerType, VariableRole};

/// Raw variable as reported by the oracle, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDraft {
    /// Name as phrased by the oracle.
    pub name: String,
    /// Role within the premise.
    pub role: VariableRole,
}

/// Raw extraction answer. `stated_goal` may be empty when the oracle found
/// no explicit objective; the extractor turns that into a failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PremiseDraft {
    /// Explicit objective, or empty when none was found.
    #[serde(default)]
    pub stated_goal: String,
    /// Variables in the order the oracle listed them.
    #[serde(default)]
    pub variables: Vec<VariableDraft>,
    /// Unstated preconditions.
    #[serde(default)]
    pub hidden_assumptions: Vec<String>,
}

/// Confidence grade the oracle attaches to a retrieved knowledge item.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Well-established fact.
    High,
    /// Plausible but not certain.
    #[default]
    Medium,
    /// Speculative.
    Low,
}

impl Confidence {
    /// Short human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// One fact retrieved from the oracle's internal knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// The fact itself, atomic and reusable.
    pub item: String,
    /// Why the fact bears on the statement.
    #[serde(default)]
    pub relevance: String,
    /// How certain the oracle is of the fact.
    #[serde(default)]
    pub confidence: Confidence,
}

/// Background retrieved before extraction: mechanisms, constraints, and
/// trade-offs bearing on the statement, plus the gaps the oracle admits to.
/// An empty draft is valid; retrieval found nothing load-bearing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeDraft {
    /// Retrieved facts.
    #[serde(default)]
    pub items: Vec<KnowledgeItem>,
    /// Named blind spots the downstream phases should not paper over.
    #[serde(default)]
    pub gaps: Vec<String>,
}

/// Outcome-vs-goal comparison for one branch, as judged by the oracle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictFinding {
    /// The outcome directly negates the stated goal.
    #[serde(default)]
    pub negates_goal: bool,
    /// The outcome contradicts this hidden assumption rather than the goal.
    #[serde(default)]
    pub contradicted_assumption: Option<String>,
    /// Surprising but internally consistent.
    #[serde(default)]
    pub counterintuitive: bool,
    /// Free-text justification.
    #[serde(default)]
    pub rationale: String,
}

/// Bounded query issued to the reasoning oracle. Each variant carries a
/// self-contained copy of its context, so concurrent queries share nothing.
#[derive(Debug, Clone)]
pub enum OracleQuestion {
    /// Retrieve internal domain knowledge bearing on the claim, before any
    /// premise is extracted.
    RetrieveKnowledge {
        /// The claim under analysis.
        input_text: String,
    },
    /// Extract variables, goal, and unstated preconditions from raw text,
    /// trusting the previously retrieved background.
    ExtractPremise {
        /// The claim under analysis.
        input_text: String,
        /// Knowledge retrieved for this claim. May be empty.
        background: KnowledgeDraft,
    },
    /// Predict outcomes of driving the most load-bearing independent
    /// variable toward zero and toward infinity. `candidates` holds the
    /// independent variable names in extraction order; empty means the
    /// whole premise is extremified.
    PredictExtremes {
        /// Premise under stress.
        premise: PremiseSet,
        /// Independent variable names, extraction order.
        candidates: Vec<String>,
    },
    /// Predict the outcome of enforcing the negation of the stated goal's
    /// premise.
    PredictInversion {
        /// Premise under stress.
        premise: PremiseSet,
    },
    /// Predict the trend after applying the same rule for `iterations`
    /// cycles.
    PredictTimeScale {
        /// Premise under stress.
        premise: PremiseSet,
        /// Representative iteration count.
        iterations: u64,
    },
    /// Judge one branch outcome against the goal and assumptions.
    CompareOutcome {
        /// Premise the branch was derived from.
        premise: PremiseSet,
        /// Trigger that produced the outcome.
        trigger: TriggerType,
        /// The outcome under judgment.
        outcome_description: String,
    },
    /// Name one adjustment to the goal or an assumption that resolves the
    /// diagnosed contradiction.
    SuggestMitigation {
        /// Premise the contradiction lives in.
        premise: PremiseSet,
        /// Diagnosis reasoning to resolve.
        reasoning: String,
    },
}

impl OracleQuestion {
    /// Label used in telemetry and scripted-answer lookup.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RetrieveKnowledge { .. } => "retrieve_knowledge",
            Self::ExtractPremise { .. } => "extract_premise",
            Self::PredictExtremes { .. } => "predict_extremes",
            Self::PredictInversion { .. } => "predict_inversion",
            Self::PredictTimeScale { .. } => "predict_time_scale",
            Self::CompareOutcome { .. } => "compare_outcome",
            Self::SuggestMitigation { .. } => "suggest_mitigation",
        }
    }
}

/// Structured or free-text oracle answer.
#[derive(Debug, Clone)]
pub enum OracleAnswer {
    /// Answer to `RetrieveKnowledge`.
    Knowledge(KnowledgeDraft),
    /// Answer to `ExtractPremise`.
    Premise(PremiseDraft),
    /// Answer to `PredictExtremes`.
    Extremes {
        /// Outcome with the chosen variable driven toward zero.
        toward_zero: String,
        /// Outcome with the chosen variable driven toward infinity.
        toward_infinity: String,
        /// The limit the oracle singled out as decisive, if any.
        decisive: Option<ExtremeDirection>,
        /// The variable the oracle judged most load-bearing, if any.
        variable: Option<String>,
    },
    /// Answer to `PredictInversion` and `PredictTimeScale`.
    Outcome {
        /// Predicted outcome wording.
        description: String,
    },
    /// Answer to `CompareOutcome`.
    Conflict(ConflictFinding),
    /// Answer to `SuggestMitigation`.
    Text(String),
}

/// Failures surfaced by oracle implementations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    /// The query ran past its deadline.
    #[error("oracle query timed out")]
    Timeout,
    /// The backend could not be reached or rejected the request.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    /// The backend answered in a shape the pipeline cannot use.
    #[error("oracle answer malformed: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Whether the retry budget applies. Malformed answers are terminal.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable(_))
    }
}

/// The external reasoning capability. Stateless and reentrant; owned by the
/// pipeline invocation, never by a report.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Answers one bounded query.
    async fn query(&self, question: OracleQuestion) -> Result<OracleAnswer, OracleError>;
}

/// Issues `question`, retrying once on a transient failure. A second
/// failure is terminal for the owning stage.
pub async fn query_with_retry(
    oracle: &dyn ReasoningOracle,
    question: OracleQuestion,
) -> Result<OracleAnswer, OracleError> {
    match oracle.query(question.clone()).await {
        Ok(answer) => Ok(answer),
        Err(err) if err.is_transient() => oracle.query(question).await,
        Err(err) => Err(err),
    }
}

/// Deterministic canned-answer oracle for tests and offline simulation.
/// Counts every query it receives and can be primed with failures that are
/// consumed before any scripted answer.
#[derive(Default)]
pub struct ScriptedOracle {
    knowledge: Option<KnowledgeDraft>,
    premise: Option<PremiseDraft>,
    extremes: Option<(String, String, Option<ExtremeDirection>, Option<String>)>,
    inversion: Option<String>,
    time_scale: Option<String>,
    conflicts: HashMap<TriggerType, ConflictFinding>,
    mitigation: Option<String>,
    pending_failures: Mutex<Vec<OracleError>>,
    queries: AtomicUsize,
}

impl ScriptedOracle {
    /// Creates an oracle that answers every question benignly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the knowledge-retrieval answer.
    #[must_use]
    pub fn with_knowledge(mut self, draft: KnowledgeDraft) -> Self {
        self.knowledge = Some(draft);
        self
    }

    /// Scripts the extraction answer.
    #[must_use]
    pub fn with_premise(mut self, draft: PremiseDraft) -> Self {
        self.premise = Some(draft);
        self
    }

    /// Scripts the extremification answer.
    #[must_use]
    pub fn with_extremes(
        mut self,
        toward_zero: impl Into<String>,
        toward_infinity: impl Into<String>,
        decisive: Option<ExtremeDirection>,
        variable: Option<String>,
    ) -> Self {
        self.extremes = Some((toward_zero.into(), toward_infinity.into(), decisive, variable));
        self
    }

    /// Scripts the inversion answer.
    #[must_use]
    pub fn with_inversion(mut self, description: impl Into<String>) -> Self {
        self.inversion = Some(description.into());
        self
    }

    /// Scripts the time-scaling answer.
    #[must_use]
    pub fn with_time_scale(mut self, description: impl Into<String>) -> Self {
        self.time_scale = Some(description.into());
        self
    }

    /// Scripts the conflict finding for one branch.
    #[must_use]
    pub fn with_conflict(mut self, trigger: TriggerType, finding: ConflictFinding) -> Self {
        self.conflicts.insert(trigger, finding);
        self
    }

    /// Scripts the mitigation answer.
    #[must_use]
    pub fn with_mitigation(mut self, text: impl Into<String>) -> Self {
        self.mitigation = Some(text.into());
        self
    }

    /// Queues an error returned (and consumed) before any scripted answer.
    #[must_use]
    pub fn fail_next(self, err: OracleError) -> Self {
        self.pending_failures.lock().push(err);
        self
    }

    /// Number of queries received so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn query(&self, question: OracleQuestion) -> Result<OracleAnswer, OracleError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.pending_failures.lock();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }
        let answer = match question {
            OracleQuestion::RetrieveKnowledge { .. } => {
                OracleAnswer::Knowledge(self.knowledge.clone().unwrap_or_default())
            }
            OracleQuestion::ExtractPremise { .. } => {
                OracleAnswer::Premise(self.premise.clone().unwrap_or_default())
            }
            OracleQuestion::PredictExtremes { .. } => {
                let (toward_zero, toward_infinity, decisive, variable) =
                    self.extremes.clone().unwrap_or_else(|| {
                        (
                            "no notable change".into(),
                            "no notable change".into(),
                            None,
                            None,
                        )
                    });
                OracleAnswer::Extremes {
                    toward_zero,
                    toward_infinity,
                    decisive,
                    variable,
                }
            }
            OracleQuestion::PredictInversion { .. } => OracleAnswer::Outcome {
                description: self
                    .inversion
                    .clone()
                    .unwrap_or_else(|| "no notable change".into()),
            },
            OracleQuestion::PredictTimeScale { .. } => OracleAnswer::Outcome {
                description: self
                    .time_scale
                    .clone()
                    .unwrap_or_else(|| "trend unclear".into()),
            },
            OracleQuestion::CompareOutcome { trigger, .. } => OracleAnswer::Conflict(
                self.conflicts.get(&trigger).cloned().unwrap_or_default(),
            ),
            OracleQuestion::SuggestMitigation { .. } => OracleAnswer::Text(
                self.mitigation
                    .clone()
                    .unwrap_or_else(|| "restate the goal with explicit bounds".into()),
            ),
        };
        Ok(answer)
    }
}
