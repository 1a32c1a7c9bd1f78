use std::sync::Arc;

use futures::future::join_all;

use crate::{
    module::{Branch, PipelineError, PremiseSet, StabilityHint, Stage, TriggerType},
    oracle::{query_with_retry, OracleAnswer, OracleError, OracleQuestion, ReasoningOracle},
};

const STABILIZE_KEYWORDS: [&str; 3] = ["converge", "stable", "stabil"];
const COLLAPSE_KEYWORDS: [&str; 4] = ["diverge", "break", "fail", "collaps"];

/// Phase II: produces exactly one branch per trigger type by querying the
/// oracle with each trigger's transformation. The three queries run
/// concurrently and join before anything is returned; expansion is
/// all-or-nothing.
pub struct BranchExpander {
    oracle: Arc<dyn ReasoningOracle>,
    time_scale_iterations: u64,
}

impl BranchExpander {
    /// Creates an expander. `time_scale_iterations` is the representative
    /// cycle count handed to the oracle for the time-scaling probe.
    #[must_use]
    pub fn new(oracle: Arc<dyn ReasoningOracle>, time_scale_iterations: u64) -> Self {
        Self {
            oracle,
            time_scale_iterations,
        }
    }

    /// Expands a premise into the canonical branch triple
    /// { Extremification, Inversion, TimeScaling }, regardless of the
    /// completion order of the underlying queries.
    pub async fn expand(&self, premise: &PremiseSet) -> Result<[Branch; 3], PipelineError> {
        let probes = TriggerType::ALL
            .iter()
            .map(|trigger| self.probe(premise, *trigger))
            .collect::<Vec<_>>();
        let mut produced = join_all(probes)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        // Re-order into the canonical sequence before handing off.
        let mut ordered = Vec::with_capacity(3);
        for trigger in TriggerType::ALL {
            let position = produced
                .iter()
                .position(|branch| branch.trigger == trigger)
                .ok_or(PipelineError::Oracle {
                    stage: Stage::Expansion,
                    source: OracleError::Malformed(format!(
                        "missing {} branch after join",
                        trigger.label()
                    )),
                })?;
            ordered.push(produced.swap_remove(position));
        }
        let [a, b, c] = <[Branch; 3]>::try_from(ordered).map_err(|_| PipelineError::Oracle {
            stage: Stage::Expansion,
            source: OracleError::Malformed("expansion did not yield three branches".into()),
        })?;
        Ok([a, b, c])
    }

    async fn probe(
        &self,
        premise: &PremiseSet,
        trigger: TriggerType,
    ) -> Result<Branch, PipelineError> {
        let question = match trigger {
            TriggerType::Extremification => OracleQuestion::PredictExtremes {
                premise: premise.clone(),
                candidates: premise.independent_names(),
            },
            TriggerType::Inversion => OracleQuestion::PredictInversion {
                premise: premise.clone(),
            },
            TriggerType::TimeScaling => OracleQuestion::PredictTimeScale {
                premise: premise.clone(),
                iterations: self.time_scale_iterations,
            },
        };
        let answer = query_with_retry(self.oracle.as_ref(), question)
            .await
            .map_err(|source| PipelineError::Oracle {
                stage: Stage::Expansion,
                source,
            })?;
        self.branch_from_answer(premise, trigger, answer)
    }

    fn branch_from_answer(
        &self,
        premise: &PremiseSet,
        trigger: TriggerType,
        answer: OracleAnswer,
    ) -> Result<Branch, PipelineError> {
        let branch = match (trigger, answer) {
            (
                TriggerType::Extremification,
                OracleAnswer::Extremes {
                    toward_zero,
                    toward_infinity,
                    decisive,
                    variable,
                },
            ) => {
                let subject = choose_subject(premise, variable.as_deref());
                let outcome_description = match subject {
                    Some(name) => format!(
                        "{name} toward zero: {toward_zero}; {name} toward infinity: {toward_infinity}"
                    ),
                    None => {
                        format!("toward zero: {toward_zero}; toward infinity: {toward_infinity}")
                    }
                };
                Branch {
                    trigger,
                    parameter: decisive,
                    outcome_description,
                    stability_hint: None,
                }
            }
            (TriggerType::Inversion, OracleAnswer::Outcome { description }) => Branch {
                trigger,
                parameter: None,
                outcome_description: description,
                stability_hint: None,
            },
            (TriggerType::TimeScaling, OracleAnswer::Outcome { description }) => {
                let hint = classify_stability(&description);
                Branch {
                    trigger,
                    parameter: None,
                    outcome_description: description,
                    stability_hint: Some(hint),
                }
            }
            (trigger, _) => {
                return Err(PipelineError::Oracle {
                    stage: Stage::Expansion,
                    source: OracleError::Malformed(format!(
                        "unexpected answer shape for {} probe",
                        trigger.label()
                    )),
                })
            }
        };
        Ok(branch)
    }
}

/// Picks the extremified variable: the oracle's load-bearing choice when it
/// names a known independent variable, otherwise the first extracted one.
fn choose_subject(premise: &PremiseSet, oracle_choice: Option<&str>) -> Option<String> {
    let candidates = premise.independent_names();
    if let Some(choice) = oracle_choice {
        let wanted = choice.trim().to_lowercase();
        if let Some(name) = candidates.iter().find(|c| c.to_lowercase() == wanted) {
            return Some(name.clone());
        }
    }
    candidates.into_iter().next()
}

/// Maps oracle wording onto a stability hint. Stabilizing keywords are
/// checked first, then collapsing ones; anything else is unresolved.
#[must_use]
pub fn classify_stability(wording: &str) -> StabilityHint {
    let lowered = wording.to_lowercase();
    if STABILIZE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return StabilityHint::Stabilizes;
    }
    if COLLAPSE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return StabilityHint::Collapses;
    }
    StabilityHint::Unresolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        module::{ExtremeDirection, Variable, VariableRole},
        oracle::ScriptedOracle,
    };

    fn premise() -> PremiseSet {
        PremiseSet {
            variables: vec![
                Variable::new("network delay", VariableRole::Independent),
                Variable::new("cache size", VariableRole::Independent),
                Variable::new("latency", VariableRole::Dependent),
            ],
            stated_goal: "ship with zero latency overhead".into(),
            hidden_assumptions: vec!["network RTT is negligible".into()],
        }
    }

    #[tokio::test]
    async fn expands_into_canonical_order() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_extremes("fine", "latency explodes", Some(ExtremeDirection::TowardInfinity), None)
                .with_inversion("the feature ships with measurable overhead")
                .with_time_scale("overhead accumulates and the budget breaks"),
        );
        let expander = BranchExpander::new(oracle, 1000);
        let branches = expander.expand(&premise()).await.unwrap();
        let triggers: Vec<_> = branches.iter().map(|b| b.trigger).collect();
        assert_eq!(triggers, TriggerType::ALL.to_vec());
        assert_eq!(branches[0].parameter, Some(ExtremeDirection::TowardInfinity));
        assert_eq!(branches[1].parameter, None);
        assert_eq!(branches[2].stability_hint, Some(StabilityHint::Collapses));
    }

    #[tokio::test]
    async fn oracle_choice_of_variable_is_validated() {
        let oracle = Arc::new(ScriptedOracle::new().with_extremes(
            "zero outcome",
            "infinity outcome",
            None,
            Some(" Cache Size ".into()),
        ));
        let expander = BranchExpander::new(oracle, 10);
        let branches = expander.expand(&premise()).await.unwrap();
        assert!(branches[0].outcome_description.starts_with("cache size toward zero:"));
    }

    #[tokio::test]
    async fn unknown_oracle_choice_falls_back_to_first_extracted() {
        let oracle = Arc::new(ScriptedOracle::new().with_extremes(
            "zero outcome",
            "infinity outcome",
            None,
            Some("throughput".into()),
        ));
        let expander = BranchExpander::new(oracle, 10);
        let branches = expander.expand(&premise()).await.unwrap();
        assert!(branches[0]
            .outcome_description
            .starts_with("network delay toward zero:"));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_whole_expansion() {
        // Enough queued failures that every probe exhausts its retry.
        let mut oracle = ScriptedOracle::new();
        for _ in 0..6 {
            oracle = oracle.fail_next(OracleError::Timeout);
        }
        let expander = BranchExpander::new(Arc::new(oracle), 10);
        let err = expander.expand(&premise()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Oracle {
                stage: Stage::Expansion,
                ..
            }
        ));
    }

    #[test]
    fn stability_keywords_map_deterministically() {
        assert_eq!(classify_stability("the loop converges quickly"), StabilityHint::Stabilizes);
        assert_eq!(classify_stability("remains Stable throughout"), StabilityHint::Stabilizes);
        assert_eq!(classify_stability("queues diverge without bound"), StabilityHint::Collapses);
        assert_eq!(classify_stability("the invariant breaks"), StabilityHint::Collapses);
        assert_eq!(classify_stability("hard to say"), StabilityHint::Unresolved);
    }
}
