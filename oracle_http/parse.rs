use paradox_engine::{
    Confidence, ConflictFinding, ExtremeDirection, KnowledgeDraft, KnowledgeItem, OracleAnswer,
    OracleError, OracleQuestion, PremiseDraft, VariableDraft, VariableRole,
};
use serde::Deserialize;
use serde_json::Value;

/// Pulls the first complete JSON object out of model output.
///
/// Tolerates markdown fences and prose around the object: the cleaned text
/// is parsed directly first, then scanned brace-by-brace for a balanced
/// candidate object.
pub fn extract_json_object(text: &str) -> Result<Value, OracleError> {
    let mut cleaned = text.trim().replace("```json", "```");
    if cleaned.starts_with("```") {
        cleaned = cleaned.trim_matches('`').trim().to_owned();
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(Value::Object(map));
    }

    let bytes = cleaned.as_bytes();
    let mut start = 0;
    while let Some(offset) = cleaned[start..].find('{') {
        let open = start + offset;
        let mut depth = 0usize;
        for (idx, byte) in bytes.iter().enumerate().skip(open) {
            match *byte {
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        let candidate = &cleaned[open..=idx];
                        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
                            return Ok(Value::Object(map));
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        start = open + 1;
    }

    Err(OracleError::Malformed(format!(
        "could not parse a JSON object from model output: {text}"
    )))
}

/// Decodes a raw JSON answer into the shape the asking question expects.
pub fn decode_answer(question: &OracleQuestion, value: Value) -> Result<OracleAnswer, OracleError> {
    match question {
        OracleQuestion::RetrieveKnowledge { .. } => {
            let raw: RawKnowledge = decode(value)?;
            Ok(OracleAnswer::Knowledge(KnowledgeDraft {
                items: raw
                    .internal_knowledge
                    .into_iter()
                    .filter(|entry| !entry.item.trim().is_empty())
                    .map(|entry| KnowledgeItem {
                        item: entry.item,
                        relevance: entry.relevance,
                        confidence: parse_confidence(&entry.confidence),
                    })
                    .collect(),
                gaps: raw
                    .knowledge_gaps
                    .into_iter()
                    .filter(|gap| !gap.trim().is_empty())
                    .collect(),
            }))
        }
        OracleQuestion::ExtractPremise { .. } => {
            let raw: RawPremise = decode(value)?;
            Ok(OracleAnswer::Premise(PremiseDraft {
                stated_goal: raw.stated_goal,
                variables: raw
                    .variables
                    .into_iter()
                    .map(|v| VariableDraft {
                        name: v.name,
                        role: parse_role(&v.role),
                    })
                    .collect(),
                hidden_assumptions: raw.hidden_assumptions,
            }))
        }
        OracleQuestion::PredictExtremes { .. } => {
            let raw: RawExtremes = decode(value)?;
            Ok(OracleAnswer::Extremes {
                toward_zero: raw.toward_zero,
                toward_infinity: raw.toward_infinity,
                decisive: raw.decisive.as_deref().and_then(parse_direction),
                variable: raw.variable.filter(|v| !v.trim().is_empty()),
            })
        }
        OracleQuestion::PredictInversion { .. } | OracleQuestion::PredictTimeScale { .. } => {
            let raw: RawOutcome = decode(value)?;
            if raw.outcome.trim().is_empty() {
                return Err(OracleError::Malformed("empty outcome".into()));
            }
            Ok(OracleAnswer::Outcome {
                description: raw.outcome,
            })
        }
        OracleQuestion::CompareOutcome { .. } => {
            let raw: RawConflict = decode(value)?;
            Ok(OracleAnswer::Conflict(ConflictFinding {
                negates_goal: raw.negates_goal,
                contradicted_assumption: raw
                    .contradicted_assumption
                    .filter(|a| !a.trim().is_empty()),
                counterintuitive: raw.counterintuitive,
                rationale: raw.rationale,
            }))
        }
        OracleQuestion::SuggestMitigation { .. } => {
            let raw: RawMitigation = decode(value)?;
            Ok(OracleAnswer::Text(raw.mitigation))
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, OracleError> {
    serde_json::from_value(value)
        .map_err(|err| OracleError::Malformed(format!("unexpected answer shape: {err}")))
}

fn parse_role(raw: &str) -> VariableRole {
    if raw.trim().eq_ignore_ascii_case("independent") {
        VariableRole::Independent
    } else {
        VariableRole::Dependent
    }
}

fn parse_confidence(raw: &str) -> Confidence {
    match raw.trim().to_lowercase().as_str() {
        "high" => Confidence::High,
        "low" => Confidence::Low,
        _ => Confidence::Medium,
    }
}

fn parse_direction(raw: &str) -> Option<ExtremeDirection> {
    match raw.trim().to_lowercase().as_str() {
        "zero" | "toward_zero" | "toward zero" => Some(ExtremeDirection::TowardZero),
        "infinity" | "inf" | "toward_infinity" | "toward infinity" => {
            Some(ExtremeDirection::TowardInfinity)
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct RawKnowledge {
    #[serde(default)]
    internal_knowledge: Vec<RawKnowledgeItem>,
    #[serde(default)]
    knowledge_gaps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawKnowledgeItem {
    #[serde(default)]
    item: String,
    #[serde(default)]
    relevance: String,
    #[serde(default)]
    confidence: String,
}

#[derive(Debug, Deserialize)]
struct RawPremise {
    #[serde(default)]
    stated_goal: String,
    #[serde(default)]
    variables: Vec<RawVariable>,
    #[serde(default)]
    hidden_assumptions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
}

#[derive(Debug, Deserialize)]
struct RawExtremes {
    #[serde(default)]
    variable: Option<String>,
    #[serde(default)]
    toward_zero: String,
    #[serde(default)]
    toward_infinity: String,
    #[serde(default)]
    decisive: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutcome {
    #[serde(default)]
    outcome: String,
}

#[derive(Debug, Deserialize)]
struct RawConflict {
    #[serde(default)]
    negates_goal: bool,
    #[serde(default)]
    contradicted_assumption: Option<String>,
    #[serde(default)]
    counterintuitive: bool,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawMitigation {
    #[serde(default)]
    mitigation: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use paradox_engine::PremiseSet;

    fn premise() -> PremiseSet {
        PremiseSet {
            variables: vec![],
            stated_goal: "goal".into(),
            hidden_assumptions: vec![],
        }
    }

    #[test]
    fn parses_plain_and_fenced_objects() {
        let plain = extract_json_object(r#"{"outcome": "fine"}"#).unwrap();
        assert_eq!(plain["outcome"], "fine");
        let fenced = extract_json_object("```json\n{\"outcome\": \"fine\"}\n```").unwrap();
        assert_eq!(fenced["outcome"], "fine");
    }

    #[test]
    fn scans_past_surrounding_prose() {
        let wrapped =
            extract_json_object("Here is my answer: {\"outcome\": \"fine\"} hope it helps").unwrap();
        assert_eq!(wrapped["outcome"], "fine");
        let nested =
            extract_json_object("x {\"a\": {\"b\": 1}, \"outcome\": \"ok\"} y").unwrap();
        assert_eq!(nested["outcome"], "ok");
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            extract_json_object("no json here at all"),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn decodes_premise_roles_tolerantly() {
        let value = serde_json::json!({
            "stated_goal": "g",
            "variables": [
                {"name": "x", "role": "Independent"},
                {"name": "y", "role": "something odd"},
            ],
            "hidden_assumptions": ["a"],
        });
        let question = OracleQuestion::ExtractPremise {
            input_text: "t".into(),
            background: KnowledgeDraft::default(),
        };
        let OracleAnswer::Premise(draft) = decode_answer(&question, value).unwrap() else {
            panic!("expected premise answer");
        };
        assert_eq!(draft.variables[0].role, VariableRole::Independent);
        assert_eq!(draft.variables[1].role, VariableRole::Dependent);
    }

    #[test]
    fn decodes_knowledge_with_graded_confidence() {
        let value = serde_json::json!({
            "internal_knowledge": [
                {"item": "caches trade memory for latency", "relevance": "core mechanism", "confidence": "High"},
                {"item": "  ", "confidence": "low"},
                {"item": "workloads vary", "confidence": "somewhere in between"},
            ],
            "knowledge_gaps": ["actual workload distribution", ""],
        });
        let question = OracleQuestion::RetrieveKnowledge {
            input_text: "t".into(),
        };
        let OracleAnswer::Knowledge(draft) = decode_answer(&question, value).unwrap() else {
            panic!("expected knowledge answer");
        };
        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[0].confidence, Confidence::High);
        assert_eq!(draft.items[1].confidence, Confidence::Medium);
        assert_eq!(draft.gaps, vec!["actual workload distribution".to_owned()]);
    }

    #[test]
    fn decodes_decisive_direction() {
        let value = serde_json::json!({
            "variable": "x",
            "toward_zero": "a",
            "toward_infinity": "b",
            "decisive": "infinity",
        });
        let question = OracleQuestion::PredictExtremes {
            premise: premise(),
            candidates: vec!["x".into()],
        };
        let OracleAnswer::Extremes { decisive, .. } = decode_answer(&question, value).unwrap()
        else {
            panic!("expected extremes answer");
        };
        assert_eq!(decisive, Some(ExtremeDirection::TowardInfinity));
    }

    #[test]
    fn empty_outcome_is_malformed() {
        let question = OracleQuestion::PredictInversion { premise: premise() };
        let err = decode_answer(&question, serde_json::json!({"outcome": "  "})).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }
}
