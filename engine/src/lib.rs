#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! Paradox-detection pipeline: premise extraction, branch expansion,
//! contradiction classification, and deterministic report assembly.

/// Telemetry builder/hook for pipeline stages.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Domain data model and error taxonomy.
#[path = "../module.rs"]
pub mod module;

/// Reasoning-oracle interface, retry policy, and scripted implementation.
#[path = "../oracle.rs"]
pub mod oracle;

/// Phase I: premise extraction.
#[path = "../extract.rs"]
pub mod extract;

/// Phase II: multi-dimensional branch expansion.
#[path = "../expand.rs"]
pub mod expand;

/// Phase III: contradiction detection and classification.
#[path = "../classify.rs"]
pub mod classify;

/// Report assembly and rendering.
#[path = "../report.rs"]
pub mod report;

/// Pipeline runtime entry point.
#[path = "../main.rs"]
pub mod runtime;

pub use classify::ParadoxClassifier;
pub use expand::{classify_stability, BranchExpander};
pub use extract::PremiseExtractor;
pub use module::{
    Branch, Classification, Diagnosis, ExtremeDirection, PipelineError, PremiseSet, Report,
    StabilityHint, Stage, TriggerType, Variable, VariableRole,
};
pub use oracle::{
    query_with_retry, Confidence, ConflictFinding, KnowledgeDraft, KnowledgeItem, OracleAnswer,
    OracleError, OracleQuestion, PremiseDraft, ReasoningOracle, ScriptedOracle, VariableDraft,
};
pub use report::{render_report, report_id, ReportBuilder};
pub use runtime::{CancelHandle, ParadoxPipeline, PipelineConfig};
pub use telemetry::{PipelineTelemetry, PipelineTelemetryBuilder};
