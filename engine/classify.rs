use std::sync::Arc;

use crate::{
    module::{
        Branch, Classification, Diagnosis, PipelineError, PremiseSet, Stage, TriggerType,
    },
    oracle::{
        query_with_retry, ConflictFinding, OracleAnswer, OracleError, OracleQuestion,
        ReasoningOracle,
    },
};

/// Phase III: decides whether a contradiction exists and classifies it.
///
/// The oracle is consulted once per branch for the outcome-vs-goal
/// comparison; the verdict itself is a pure function of the three findings,
/// evaluated in strict precedence order (first match wins):
/// Antinomy, then Falsidical, then Veridical, then NoneFound. The order
/// encodes severity: a self-contradiction is reported even when a weaker
/// reading is also plausible.
pub struct ParadoxClassifier {
    oracle: Arc<dyn ReasoningOracle>,
}

impl ParadoxClassifier {
    /// Creates a classifier bound to an oracle.
    #[must_use]
    pub fn new(oracle: Arc<dyn ReasoningOracle>) -> Self {
        Self { oracle }
    }

    /// Classifies the branch triple against the premise.
    pub async fn classify(
        &self,
        premise: &PremiseSet,
        branches: &[Branch; 3],
    ) -> Result<Diagnosis, PipelineError> {
        let mut findings: Vec<(TriggerType, ConflictFinding)> = Vec::with_capacity(3);
        for branch in branches {
            let answer = query_with_retry(
                self.oracle.as_ref(),
                OracleQuestion::CompareOutcome {
                    premise: premise.clone(),
                    trigger: branch.trigger,
                    outcome_description: branch.outcome_description.clone(),
                },
            )
            .await
            .map_err(|source| PipelineError::Oracle {
                stage: Stage::Classification,
                source,
            })?;
            let OracleAnswer::Conflict(finding) = answer else {
                return Err(PipelineError::Oracle {
                    stage: Stage::Classification,
                    source: OracleError::Malformed("expected a conflict finding".into()),
                });
            };
            findings.push((branch.trigger, finding));
        }
        Ok(decide(premise, &findings))
    }
}

/// The precedence procedure. Pure and total: exactly one classification
/// comes out for any finding triple.
fn decide(premise: &PremiseSet, findings: &[(TriggerType, ConflictFinding)]) -> Diagnosis {
    for (trigger, finding) in findings {
        if finding.negates_goal {
            return Diagnosis {
                classification: Classification::Antinomy,
                triggering_branch: Some(*trigger),
                reasoning: reasoning_or(finding, || {
                    format!(
                        "the {} outcome directly negates the stated goal",
                        trigger.label()
                    )
                }),
            };
        }
    }
    for (trigger, finding) in findings {
        if let Some(named) = &finding.contradicted_assumption {
            if let Some(assumption) = match_assumption(premise, named) {
                return Diagnosis {
                    classification: Classification::Falsidical,
                    triggering_branch: Some(*trigger),
                    reasoning: reasoning_or(finding, || {
                        format!(
                            "the {} outcome contradicts the hidden assumption \"{assumption}\"",
                            trigger.label()
                        )
                    }),
                };
            }
        }
    }
    for (trigger, finding) in findings {
        if finding.counterintuitive {
            return Diagnosis {
                classification: Classification::Veridical,
                triggering_branch: Some(*trigger),
                reasoning: reasoning_or(finding, || {
                    format!(
                        "the {} outcome is surprising but internally consistent",
                        trigger.label()
                    )
                }),
            };
        }
    }
    Diagnosis::none_found()
}

/// Resolves an oracle-named assumption against the recorded ones,
/// case-insensitively and in either containment direction. A name that
/// matches nothing recorded does not count as an assumption conflict.
fn match_assumption(premise: &PremiseSet, named: &str) -> Option<String> {
    let wanted = named.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    premise
        .hidden_assumptions
        .iter()
        .find(|recorded| {
            let lowered = recorded.to_lowercase();
            lowered.contains(&wanted) || wanted.contains(&lowered)
        })
        .cloned()
}

fn reasoning_or(finding: &ConflictFinding, fallback: impl FnOnce() -> String) -> String {
    let rationale = finding.rationale.trim();
    if rationale.is_empty() {
        fallback()
    } else {
        rationale.to_owned()
    }
}
