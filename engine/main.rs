use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    classify::ParadoxClassifier,
    expand::BranchExpander,
    extract::PremiseExtractor,
    module::{PipelineError, Report, Stage},
    oracle::ReasoningOracle,
    report::ReportBuilder,
    telemetry::PipelineTelemetry,
};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Representative iteration count for the time-scaling probe. The
    /// source protocol leaves N open; it stays a configurable input here.
    pub time_scale_iterations: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_scale_iterations: 1000,
        }
    }
}

/// Cooperative cancellation flag checked at stage boundaries. Cancelling
/// never interrupts an in-flight oracle call; it only prevents the next
/// stage from starting.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates an un-cancelled handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The full three-phase analysis pipeline: extraction, expansion,
/// classification, then report assembly. Strictly sequential apart from
/// the three concurrent branch queries inside expansion; holds no state
/// across invocations.
pub struct ParadoxPipeline {
    oracle: Arc<dyn ReasoningOracle>,
    config: PipelineConfig,
    telemetry: Option<PipelineTelemetry>,
    cancel: CancelHandle,
}

impl ParadoxPipeline {
    /// Creates a pipeline around an oracle.
    #[must_use]
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        config: PipelineConfig,
        telemetry: Option<PipelineTelemetry>,
    ) -> Self {
        Self {
            oracle,
            config,
            telemetry,
            cancel: CancelHandle::new(),
        }
    }

    /// Handle for cancelling this pipeline between stages.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs the whole pipeline. Either a complete report comes back or a
    /// typed failure naming the failing stage; partial results never leak.
    pub async fn analyze(&self, input_text: &str) -> Result<Report, PipelineError> {
        let premise = PremiseExtractor::new(Arc::clone(&self.oracle))
            .extract(input_text)
            .await?;
        self.emit(
            "paradox.premise.extracted",
            json!({
                "variables": premise.variables.len(),
                "assumptions": premise.hidden_assumptions.len(),
            }),
        );
        self.checkpoint(Stage::Expansion)?;

        let branches = BranchExpander::new(
            Arc::clone(&self.oracle),
            self.config.time_scale_iterations,
        )
        .expand(&premise)
        .await?;
        self.emit(
            "paradox.branches.expanded",
            json!({ "branches": branches.len() }),
        );
        self.checkpoint(Stage::Classification)?;

        let diagnosis = ParadoxClassifier::new(Arc::clone(&self.oracle))
            .classify(&premise, &branches)
            .await?;
        self.emit(
            "paradox.diagnosis.classified",
            json!({ "classification": diagnosis.classification.label() }),
        );
        self.checkpoint(Stage::Reporting)?;

        let report = ReportBuilder::new(Arc::clone(&self.oracle))
            .build(input_text, premise, branches, diagnosis)
            .await?;
        self.emit("paradox.report.built", json!({ "id": report.id }));
        Ok(report)
    }

    fn checkpoint(&self, next: Stage) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            if let Some(tel) = &self.telemetry {
                let _ = tel.log(
                    LogLevel::Warn,
                    "paradox.pipeline.cancelled",
                    json!({ "before_stage": next.label() }),
                );
            }
            return Err(PipelineError::Cancelled { stage: next });
        }
        Ok(())
    }

    fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(LogLevel::Info, event_type, payload.clone());
            tel.event(event_type, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        module::{Classification, TriggerType},
        oracle::{ConflictFinding, PremiseDraft, ScriptedOracle, VariableDraft},
    };
    use crate::module::VariableRole;

    fn liar_oracle() -> ScriptedOracle {
        ScriptedOracle::new()
            .with_premise(PremiseDraft {
                stated_goal: "the sentence is false".into(),
                variables: vec![],
                hidden_assumptions: vec![],
            })
            .with_inversion("the sentence is true")
            .with_time_scale("the truth value keeps flipping, never stable either way")
            .with_conflict(
                TriggerType::Inversion,
                ConflictFinding {
                    negates_goal: true,
                    rationale: "asserting the goal forces its own negation".into(),
                    ..ConflictFinding::default()
                },
            )
            .with_mitigation("reject self-referential truth claims")
    }

    #[tokio::test]
    async fn liar_sentence_is_an_antinomy() {
        let pipeline = ParadoxPipeline::new(
            Arc::new(liar_oracle()),
            PipelineConfig::default(),
            None,
        );
        let report = pipeline.analyze("This sentence is false").await.unwrap();
        assert_eq!(report.diagnosis.classification, Classification::Antinomy);
        assert_eq!(
            report.diagnosis.triggering_branch,
            Some(TriggerType::Inversion)
        );
        assert!(report.premise.variables.is_empty());
        assert!(!report.mitigation.is_empty());
        let triggers: Vec<_> = report.branches.iter().map(|b| b.trigger).collect();
        assert_eq!(triggers, TriggerType::ALL.to_vec());
    }

    #[tokio::test]
    async fn monty_hall_is_veridical() {
        let oracle = ScriptedOracle::new()
            .with_premise(PremiseDraft {
                stated_goal: "switching doors improves the odds".into(),
                variables: vec![VariableDraft {
                    name: "number of doors".into(),
                    role: VariableRole::Independent,
                }],
                hidden_assumptions: vec!["the host always reveals a goat".into()],
            })
            .with_extremes(
                "with no extra doors the advantage vanishes",
                "with many doors switching wins almost surely",
                None,
                Some("number of doors".into()),
            )
            .with_inversion("staying keeps the original one-third chance")
            .with_time_scale("repeated play converges to a two-thirds win rate")
            .with_conflict(
                TriggerType::TimeScaling,
                ConflictFinding {
                    counterintuitive: true,
                    rationale: "surprising but correct: switching wins two thirds of the time"
                        .into(),
                    ..ConflictFinding::default()
                },
            )
            .with_mitigation("none needed; accept the counterintuitive result");
        let pipeline =
            ParadoxPipeline::new(Arc::new(oracle), PipelineConfig::default(), None);
        let report = pipeline
            .analyze("Choosing to switch doors after the host reveals a goat improves your odds")
            .await
            .unwrap();
        assert_eq!(report.diagnosis.classification, Classification::Veridical);
        assert!(!report.mitigation.is_empty());
    }

    #[tokio::test]
    async fn clean_claim_yields_none_found_without_mitigation() {
        let oracle = ScriptedOracle::new().with_premise(PremiseDraft {
            stated_goal: "cache hit rate improves with a larger cache".into(),
            variables: vec![],
            hidden_assumptions: vec![],
        });
        let pipeline =
            ParadoxPipeline::new(Arc::new(oracle), PipelineConfig::default(), None);
        let report = pipeline
            .analyze("A larger cache improves the hit rate")
            .await
            .unwrap();
        assert_eq!(report.diagnosis.classification, Classification::NoneFound);
        assert!(report.diagnosis.triggering_branch.is_none());
        assert!(report.diagnosis.reasoning.is_empty());
        assert!(report.mitigation.is_empty());
    }

    #[tokio::test]
    async fn empty_input_fails_with_zero_oracle_queries() {
        let oracle = Arc::new(ScriptedOracle::new());
        let pipeline = ParadoxPipeline::new(
            oracle.clone(),
            PipelineConfig::default(),
            None,
        );
        let err = pipeline.analyze("   ").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput));
        assert_eq!(oracle.query_count(), 0);
    }

    #[tokio::test]
    async fn deterministic_id_and_premise_across_runs() {
        let input = "This sentence is false";
        let first = {
            let pipeline = ParadoxPipeline::new(
                Arc::new(liar_oracle()),
                PipelineConfig::default(),
                None,
            );
            pipeline.analyze(input).await.unwrap()
        };
        let second = {
            let pipeline = ParadoxPipeline::new(
                Arc::new(liar_oracle()),
                PipelineConfig::default(),
                None,
            );
            pipeline.analyze(input).await.unwrap()
        };
        assert_eq!(first.id, second.id);
        assert_eq!(first.premise, second.premise);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_stage() {
        let oracle = Arc::new(liar_oracle());
        let pipeline = ParadoxPipeline::new(
            oracle.clone(),
            PipelineConfig::default(),
            None,
        );
        pipeline.cancel_handle().cancel();
        let err = pipeline.analyze("This sentence is false").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Cancelled {
                stage: Stage::Expansion
            }
        ));
        // Extraction ran (retrieval + premise); nothing after it did.
        assert_eq!(oracle.query_count(), 2);
    }
}
