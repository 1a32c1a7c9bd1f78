use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::{
    module::{
        normalize_text, Branch, Classification, Diagnosis, PipelineError, PremiseSet, Report,
        Stage,
    },
    oracle::{query_with_retry, OracleAnswer, OracleError, OracleQuestion, ReasoningOracle},
};

/// Separator fed between hashed fields so that adjacent values cannot
/// collide by concatenation.
const FIELD_SEP: [u8; 1] = [0x1f];

/// Assembles the immutable `Report` from the three upstream phases.
pub struct ReportBuilder {
    oracle: Arc<dyn ReasoningOracle>,
}

impl ReportBuilder {
    /// Creates a builder bound to an oracle (consulted for mitigation only).
    #[must_use]
    pub fn new(oracle: Arc<dyn ReasoningOracle>) -> Self {
        Self { oracle }
    }

    /// Builds the report. Mitigation text is requested from the oracle only
    /// when a contradiction was diagnosed; `NoneFound` reports carry an
    /// empty mitigation.
    pub async fn build(
        &self,
        input_text: &str,
        premise: PremiseSet,
        branches: [Branch; 3],
        diagnosis: Diagnosis,
    ) -> Result<Report, PipelineError> {
        let mitigation = if diagnosis.classification == Classification::NoneFound {
            String::new()
        } else {
            self.suggest_mitigation(&premise, &diagnosis).await?
        };
        Ok(Report {
            id: report_id(input_text, &premise),
            premise,
            branches,
            diagnosis,
            mitigation,
            generated_at: Utc::now(),
        })
    }

    async fn suggest_mitigation(
        &self,
        premise: &PremiseSet,
        diagnosis: &Diagnosis,
    ) -> Result<String, PipelineError> {
        let answer = query_with_retry(
            self.oracle.as_ref(),
            OracleQuestion::SuggestMitigation {
                premise: premise.clone(),
                reasoning: diagnosis.reasoning.clone(),
            },
        )
        .await
        .map_err(|source| PipelineError::Oracle {
            stage: Stage::Reporting,
            source,
        })?;
        match answer {
            OracleAnswer::Text(text) if !text.trim().is_empty() => Ok(text.trim().to_owned()),
            OracleAnswer::Text(_) => Err(PipelineError::Oracle {
                stage: Stage::Reporting,
                source: OracleError::Malformed("oracle returned an empty mitigation".into()),
            }),
            _ => Err(PipelineError::Oracle {
                stage: Stage::Reporting,
                source: OracleError::Malformed("expected a mitigation text answer".into()),
            }),
        }
    }
}

/// Deterministic content-derived identifier: SHA-256 over the normalized
/// input text and the premise fields, truncated to 12 hex characters.
///
/// Branch outcomes are deliberately excluded — oracle phrasing may differ
/// across runs for the same premise, and the id tracks the question asked,
/// not the answer given.
#[must_use]
pub fn report_id(input_text: &str, premise: &PremiseSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(input_text).as_bytes());
    hasher.update(FIELD_SEP);
    hasher.update(premise.stated_goal.as_bytes());
    for variable in &premise.variables {
        hasher.update(FIELD_SEP);
        hasher.update(variable.name.as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(variable.role.label().as_bytes());
    }
    for assumption in &premise.hidden_assumptions {
        hasher.update(FIELD_SEP);
        hasher.update(assumption.as_bytes());
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Renders the fixed-section report document. The mitigation section is
/// omitted entirely, not rendered empty, when no contradiction was found.
#[must_use]
pub fn render_report(report: &Report) -> String {
    let mut lines: Vec<String> = vec![format!("REPORT ID: {}", report.id)];

    lines.push(String::new());
    lines.push("1. LOGICAL BREAKDOWN".into());
    lines.push(format!("- Stated Goal: {}", report.premise.stated_goal));
    if report.premise.variables.is_empty() {
        lines.push("- Variables: N/A".into());
    } else {
        lines.push("- Variables:".into());
        for variable in &report.premise.variables {
            lines.push(format!("  - {} ({})", variable.name, variable.role.label()));
        }
    }
    lines.push("- Hidden Assumptions:".into());
    if report.premise.hidden_assumptions.is_empty() {
        lines.push("  - N/A".into());
    } else {
        for assumption in &report.premise.hidden_assumptions {
            lines.push(format!("  - {assumption}"));
        }
    }

    lines.push(String::new());
    lines.push("2. STRESS TEST RESULTS".into());
    for branch in &report.branches {
        lines.push(format!("- {}:", branch.trigger.title()));
        lines.push(format!("  Outcome: {}", branch.outcome_description));
        if let Some(direction) = branch.parameter {
            lines.push(format!("  Decisive Limit: {}", direction.label()));
        }
        if let Some(hint) = branch.stability_hint {
            lines.push(format!("  Stability: {}", hint.label()));
        }
    }

    lines.push(String::new());
    lines.push("3. PARADOX DIAGNOSIS".into());
    lines.push(format!(
        "- Type: {}",
        report.diagnosis.classification.label()
    ));
    if let Some(trigger) = report.diagnosis.triggering_branch {
        lines.push(format!("- Triggering Branch: {}", trigger.title()));
    }
    lines.push(format!(
        "- Reasoning: {}",
        if report.diagnosis.reasoning.is_empty() {
            "N/A"
        } else {
            report.diagnosis.reasoning.as_str()
        }
    ));

    if report.diagnosis.classification != Classification::NoneFound {
        lines.push(String::new());
        lines.push("4. SUGGESTED MITIGATION".into());
        lines.push(format!("- {}", report.mitigation));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        module::{StabilityHint, TriggerType, Variable, VariableRole},
        oracle::ScriptedOracle,
    };

    fn premise() -> PremiseSet {
        PremiseSet {
            variables: vec![Variable::new("network delay", VariableRole::Independent)],
            stated_goal: "ship with zero latency overhead".into(),
            hidden_assumptions: vec!["network round-trip time is negligible".into()],
        }
    }

    fn branches(outcome: &str) -> [Branch; 3] {
        [
            Branch {
                trigger: TriggerType::Extremification,
                parameter: None,
                outcome_description: outcome.into(),
                stability_hint: None,
            },
            Branch {
                trigger: TriggerType::Inversion,
                parameter: None,
                outcome_description: outcome.into(),
                stability_hint: None,
            },
            Branch {
                trigger: TriggerType::TimeScaling,
                parameter: None,
                outcome_description: outcome.into(),
                stability_hint: Some(StabilityHint::Unresolved),
            },
        ]
    }

    #[test]
    fn id_is_deterministic_and_ignores_branch_outcomes() {
        let first = report_id("We can ship  this", &premise());
        let second = report_id("  We can ship this ", &premise());
        assert_eq!(first, second);
        assert_eq!(first.len(), 12);

        let mut other_premise = premise();
        other_premise.stated_goal = "a different goal".into();
        assert_ne!(first, report_id("We can ship this", &other_premise));
    }

    #[tokio::test]
    async fn mitigation_is_empty_iff_none_found() {
        let oracle = Arc::new(ScriptedOracle::new().with_mitigation("budget the overhead"));
        let builder = ReportBuilder::new(oracle.clone());

        let clean = builder
            .build("claim", premise(), branches("fine"), Diagnosis::none_found())
            .await
            .unwrap();
        assert!(clean.mitigation.is_empty());
        // NoneFound reports never consult the oracle.
        assert_eq!(oracle.query_count(), 0);

        let diagnosed = builder
            .build(
                "claim",
                premise(),
                branches("latency explodes"),
                Diagnosis {
                    classification: Classification::Falsidical,
                    triggering_branch: Some(TriggerType::Extremification),
                    reasoning: "the RTT assumption is false".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(diagnosed.mitigation, "budget the overhead");
    }

    #[tokio::test]
    async fn rendering_omits_mitigation_section_for_none_found() {
        let oracle = Arc::new(ScriptedOracle::new());
        let builder = ReportBuilder::new(oracle);
        let report = builder
            .build("claim", premise(), branches("fine"), Diagnosis::none_found())
            .await
            .unwrap();
        let text = render_report(&report);
        assert!(text.starts_with("REPORT ID: "));
        assert!(text.contains("1. LOGICAL BREAKDOWN"));
        assert!(text.contains("2. STRESS TEST RESULTS"));
        assert!(text.contains("3. PARADOX DIAGNOSIS"));
        assert!(text.contains("- Type: None"));
        assert!(!text.contains("4. SUGGESTED MITIGATION"));
    }

    #[tokio::test]
    async fn rendering_includes_all_sections_when_diagnosed() {
        let oracle = Arc::new(ScriptedOracle::new().with_mitigation("relax the goal"));
        let builder = ReportBuilder::new(oracle);
        let report = builder
            .build(
                "claim",
                premise(),
                branches("latency explodes"),
                Diagnosis {
                    classification: Classification::Antinomy,
                    triggering_branch: Some(TriggerType::Inversion),
                    reasoning: "goal requires its own negation".into(),
                },
            )
            .await
            .unwrap();
        let text = render_report(&report);
        assert!(text.contains("- Type: Antinomy"));
        assert!(text.contains("- Triggering Branch: Inversion"));
        assert!(text.contains("4. SUGGESTED MITIGATION"));
        assert!(text.contains("- relax the goal"));
        assert!(text.contains("Stability: unresolved"));
    }
}
