use std::fmt::Write as _;

use paradox_engine::{KnowledgeDraft, OracleQuestion, PremiseSet};

/// System prompt shared by every pipeline query. The referee persona keeps
/// the model adversarial toward weak assumptions and pins the JSON-only
/// output contract.
pub const BASE_SYSTEM_PROMPT: &str = "\
You are a strict logic referee for a paradox-detection pipeline.
Rules:
1) Be objective and adversarial toward weak assumptions.
2) Do not be polite or agreeable by default.
3) Return valid JSON only. No markdown fences, no prose around the object.
4) Keep outputs concise and technically rigorous.";

/// Renders the user prompt for one pipeline question. When an output
/// language is given, every free-text answer field is requested in it.
#[must_use]
pub fn render_question(question: &OracleQuestion, output_language: Option<&str>) -> String {
    let rendered = match question {
        OracleQuestion::RetrieveKnowledge { input_text } => format!(
            "Internal knowledge retrieval.\n\
             Retrieve internal domain knowledge relevant to the statement: \
             mechanisms, constraints, and known trade-offs that can affect \
             its validity. Keep each item atomic and reusable. List the \
             knowledge gaps you cannot fill.\n\n\
             Return this exact JSON schema:\n\
             {{\"internal_knowledge\": [{{\"item\": \"string\", \
             \"relevance\": \"string\", \
             \"confidence\": \"high | medium | low\"}}], \
             \"knowledge_gaps\": [\"string\"]}}\n\n\
             Statement:\n{input_text}"
        ),
        OracleQuestion::ExtractPremise {
            input_text,
            background,
        } => format!(
            "Premise extraction.\n\
             Trust the retrieved background below. Identify the explicit goal \
             of the statement, its core variables (each independent or \
             dependent), and the hidden assumptions its success depends on. \
             Leave stated_goal empty only if the statement truly contains no \
             objective.\n\n\
             Return this exact JSON schema:\n\
             {{\"stated_goal\": \"string\", \
             \"variables\": [{{\"name\": \"string\", \"role\": \"independent | dependent\"}}], \
             \"hidden_assumptions\": [\"string\"]}}\n\n\
             {}\
             Statement:\n{input_text}",
            knowledge_context(background)
        ),
        OracleQuestion::PredictExtremes { premise, candidates } => {
            let candidate_list = if candidates.is_empty() {
                "none identified; extremify the premise as a whole".to_owned()
            } else {
                candidates.join(", ")
            };
            format!(
                "Extremification probe.\n\
                 From the candidate independent variables, pick the one most \
                 load-bearing for the stated goal and predict the outcome as it \
                 goes to zero and to infinity. Mark one limit decisive only if \
                 it alone determines the goal's fate.\n\n\
                 Candidates: {candidate_list}\n\n\
                 Return this exact JSON schema:\n\
                 {{\"variable\": \"string or null\", \
                 \"toward_zero\": \"string\", \
                 \"toward_infinity\": \"string\", \
                 \"decisive\": \"zero | infinity | null\"}}\n\n\
                 {}",
                premise_context(premise)
            )
        }
        OracleQuestion::PredictInversion { premise } => format!(
            "Inversion probe.\n\
             Predict the outcome of enforcing the logical negation of the \
             stated goal's premise.\n\n\
             Return this exact JSON schema:\n\
             {{\"outcome\": \"string\"}}\n\n\
             {}",
            premise_context(premise)
        ),
        OracleQuestion::PredictTimeScale { premise, iterations } => format!(
            "Time-scaling probe.\n\
             Predict the trend after applying the same rule for {iterations} \
             iterations. Say explicitly whether the system converges, stays \
             stable, diverges, breaks, or fails.\n\n\
             Return this exact JSON schema:\n\
             {{\"outcome\": \"string\"}}\n\n\
             {}",
            premise_context(premise)
        ),
        OracleQuestion::CompareOutcome {
            premise,
            trigger,
            outcome_description,
        } => format!(
            "Contradiction check for the {} branch.\n\
             Judge the branch outcome against the stated goal and the hidden \
             assumptions. negates_goal is true only when achieving the goal \
             requires its own negation. contradicted_assumption must quote one \
             of the listed hidden assumptions, or be null. counterintuitive is \
             true for results that are surprising yet internally consistent.\n\n\
             Branch outcome:\n{outcome_description}\n\n\
             Return this exact JSON schema:\n\
             {{\"negates_goal\": true, \
             \"contradicted_assumption\": \"string or null\", \
             \"counterintuitive\": false, \
             \"rationale\": \"string\"}}\n\n\
             {}",
            trigger.title(),
            premise_context(premise)
        ),
        OracleQuestion::SuggestMitigation { premise, reasoning } => format!(
            "Mitigation.\n\
             Given this contradiction, name one concrete adjustment to the \
             stated goal or to an assumption that resolves it.\n\n\
             Contradiction reasoning:\n{reasoning}\n\n\
             Return this exact JSON schema:\n\
             {{\"mitigation\": \"string\"}}\n\n\
             {}",
            premise_context(premise)
        ),
    };
    match output_language {
        Some(language) if !language.trim().is_empty() => {
            format!("{rendered}\n\nOutput language: {}", language.trim())
        }
        _ => rendered,
    }
}

/// Renders retrieved knowledge as a plain-text context block. Empty
/// retrievals render nothing rather than an empty heading.
fn knowledge_context(background: &KnowledgeDraft) -> String {
    if background.items.is_empty() && background.gaps.is_empty() {
        return String::new();
    }
    let mut block = String::from("Retrieved background:\n");
    for item in &background.items {
        let _ = write!(block, "- [{}] {}", item.confidence.label(), item.item);
        if item.relevance.is_empty() {
            block.push('\n');
        } else {
            let _ = writeln!(block, " ({})", item.relevance);
        }
    }
    for gap in &background.gaps {
        let _ = writeln!(block, "- Knowledge gap: {gap}");
    }
    block.push('\n');
    block
}

/// Renders the premise as a plain-text context block.
fn premise_context(premise: &PremiseSet) -> String {
    let mut block = String::from("Premise under test:\n");
    let _ = writeln!(block, "- Stated goal: {}", premise.stated_goal);
    if premise.variables.is_empty() {
        block.push_str("- Variables: none\n");
    } else {
        block.push_str("- Variables:\n");
        for variable in &premise.variables {
            let _ = writeln!(block, "  - {} ({})", variable.name, variable.role.label());
        }
    }
    if premise.hidden_assumptions.is_empty() {
        block.push_str("- Hidden assumptions: none\n");
    } else {
        block.push_str("- Hidden assumptions:\n");
        for assumption in &premise.hidden_assumptions {
            let _ = writeln!(block, "  - {assumption}");
        }
    }
    block
}
