//! Typed pipeline failures.
//!
//! Stages return [`PipelineError`]; the worker receives it wrapped in an
//! `anyhow::Error` and downcasts to decide whether the attempt may be
//! retried and which stage to report.

use crate::pipeline::AgentStage;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The submission could not be turned into a valid intake. Retrying
    /// cannot fix it.
    #[error("invalid intake: {0}")]
    InvalidIntake(String),

    #[error("metabolic calculation failed: {0}")]
    Metabolic(String),

    #[error("recipe curation failed: {0}")]
    Curation(String),

    #[error("nutrition compilation failed: {0}")]
    Nutrition(String),

    #[error("plan rejected by quality gate (composite {composite:.2}): {reason}")]
    QualityGate { composite: f64, reason: String },

    #[error("rendering failed: {0}")]
    Render(String),
}

impl PipelineError {
    /// The stage that raised the error.
    pub fn stage(&self) -> AgentStage {
        match self {
            Self::InvalidIntake(_) => AgentStage::IntakeNormalizer,
            Self::Metabolic(_) => AgentStage::MetabolicCalculator,
            Self::Curation(_) => AgentStage::RecipeCurator,
            Self::Nutrition(_) => AgentStage::NutritionCompiler,
            Self::QualityGate { .. } => AgentStage::QaValidator,
            Self::Render(_) => AgentStage::OutputRenderer,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidIntake(_))
    }
}
