use std::{collections::HashSet, sync::Arc};

use crate::{
    module::{normalize_text, PipelineError, PremiseSet, Stage, Variable},
    oracle::{
        query_with_retry, KnowledgeDraft, OracleAnswer, OracleError, OracleQuestion,
        ReasoningOracle,
    },
};

/// Phase I: turns raw input text into a `PremiseSet` via the oracle.
///
/// Extraction runs in two consultations: a knowledge-retrieval pre-step
/// pulling the oracle's internal background on the claim, then the premise
/// extraction itself with that background attached. Both belong to the
/// extraction stage; a failure in either is an extraction failure.
pub struct PremiseExtractor {
    oracle: Arc<dyn ReasoningOracle>,
}

impl PremiseExtractor {
    /// Creates an extractor bound to an oracle.
    #[must_use]
    pub fn new(oracle: Arc<dyn ReasoningOracle>) -> Self {
        Self { oracle }
    }

    /// Extracts variables, goal, and hidden assumptions.
    ///
    /// Empty or whitespace-only input is rejected before any oracle call.
    /// Non-empty input for which the oracle finds no stated goal is an
    /// `ExtractionFailure`; no partial premise is ever returned.
    pub async fn extract(&self, input_text: &str) -> Result<PremiseSet, PipelineError> {
        if input_text.trim().is_empty() {
            return Err(PipelineError::InvalidInput);
        }
        let background = self.retrieve_knowledge(input_text).await?;
        let answer = query_with_retry(
            self.oracle.as_ref(),
            OracleQuestion::ExtractPremise {
                input_text: input_text.to_owned(),
                background,
            },
        )
        .await
        .map_err(|source| PipelineError::Oracle {
            stage: Stage::Extraction,
            source,
        })?;
        let OracleAnswer::Premise(draft) = answer else {
            return Err(PipelineError::Oracle {
                stage: Stage::Extraction,
                source: OracleError::Malformed("expected a premise answer".into()),
            });
        };

        let stated_goal = draft.stated_goal.trim().to_owned();
        if stated_goal.is_empty() {
            return Err(PipelineError::ExtractionFailure(
                "oracle identified no stated goal".into(),
            ));
        }

        // De-duplicate case/whitespace-insensitively, first occurrence wins.
        let mut seen = HashSet::new();
        let mut variables = Vec::new();
        for var in draft.variables {
            let name = normalize_text(&var.name);
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.to_lowercase()) {
                variables.push(Variable::new(name, var.role));
            }
        }

        let hidden_assumptions = draft
            .hidden_assumptions
            .into_iter()
            .map(|a| a.trim().to_owned())
            .filter(|a| !a.is_empty())
            .collect();

        Ok(PremiseSet {
            variables,
            stated_goal,
            hidden_assumptions,
        })
    }

    async fn retrieve_knowledge(
        &self,
        input_text: &str,
    ) -> Result<KnowledgeDraft, PipelineError> {
        let answer = query_with_retry(
            self.oracle.as_ref(),
            OracleQuestion::RetrieveKnowledge {
                input_text: input_text.to_owned(),
            },
        )
        .await
        .map_err(|source| PipelineError::Oracle {
            stage: Stage::Extraction,
            source,
        })?;
        let OracleAnswer::Knowledge(draft) = answer else {
            return Err(PipelineError::Oracle {
                stage: Stage::Extraction,
                source: OracleError::Malformed("expected a knowledge answer".into()),
            });
        };
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        module::VariableRole,
        oracle::{Confidence, KnowledgeItem, PremiseDraft, ScriptedOracle, VariableDraft},
    };

    fn draft(goal: &str, names: &[&str]) -> PremiseDraft {
        PremiseDraft {
            stated_goal: goal.into(),
            variables: names
                .iter()
                .map(|n| VariableDraft {
                    name: (*n).into(),
                    role: VariableRole::Independent,
                })
                .collect(),
            hidden_assumptions: vec!["  network RTT is negligible ".into(), " ".into()],
        }
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_oracle_call() {
        let oracle = Arc::new(ScriptedOracle::new());
        let extractor = PremiseExtractor::new(oracle.clone());
        let err = extractor.extract("   \t\n").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput));
        assert_eq!(oracle.query_count(), 0);
    }

    #[tokio::test]
    async fn missing_goal_is_an_extraction_failure() {
        let oracle = Arc::new(ScriptedOracle::new().with_premise(draft("  ", &[])));
        let extractor = PremiseExtractor::new(oracle);
        let err = extractor.extract("some claim").await.unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailure(_)));
    }

    #[tokio::test]
    async fn variables_are_normalized_and_deduplicated() {
        let oracle = Arc::new(ScriptedOracle::new().with_premise(draft(
            "ship with zero latency overhead",
            &["network  delay", "Network Delay", "cache size", ""],
        )));
        let extractor = PremiseExtractor::new(oracle);
        let premise = extractor.extract("some claim").await.unwrap();
        let names: Vec<_> = premise.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["network delay", "cache size"]);
        assert_eq!(
            premise.hidden_assumptions,
            vec!["network RTT is negligible".to_owned()]
        );
    }

    #[tokio::test]
    async fn knowledge_is_retrieved_before_the_premise() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .with_knowledge(KnowledgeDraft {
                    items: vec![KnowledgeItem {
                        item: "caches trade memory for latency".into(),
                        relevance: "bears on the stated goal".into(),
                        confidence: Confidence::High,
                    }],
                    gaps: vec!["actual workload distribution".into()],
                })
                .with_premise(draft("ship with zero latency overhead", &["cache size"])),
        );
        let extractor = PremiseExtractor::new(oracle.clone());
        let premise = extractor.extract("some claim").await.unwrap();
        assert_eq!(premise.stated_goal, "ship with zero latency overhead");
        // One retrieval consultation, then one extraction consultation.
        assert_eq!(oracle.query_count(), 2);
    }

    #[tokio::test]
    async fn failed_retrieval_is_an_extraction_stage_failure() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .fail_next(OracleError::Timeout)
                .fail_next(OracleError::Timeout),
        );
        let extractor = PremiseExtractor::new(oracle);
        let err = extractor.extract("some claim").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Oracle {
                stage: Stage::Extraction,
                ..
            }
        ));
    }
}
