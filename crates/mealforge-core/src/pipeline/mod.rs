//! The six generation stages and the orchestrator that chains them.

pub mod curator;
pub mod intake;
pub mod library;
pub mod metabolic;
pub mod nutrition;
pub mod orchestrator;
pub mod qa;
pub mod render;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use curator::{curate_recipes, DeterministicRecipes, HttpRecipeSource, RecipeSource};
pub use intake::normalize_intake;
pub use metabolic::calculate_metabolic_profile;
pub use nutrition::{compile_nutrition, FoodTable, HttpNutritionSource, NutritionSource};
pub use orchestrator::{run_pipeline, PipelineOutput};
pub use qa::{validate_plan, QaConfig};
pub use render::render_plan;

/// One of the six ordered pipeline stages ("agents").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStage {
    IntakeNormalizer,
    MetabolicCalculator,
    RecipeCurator,
    NutritionCompiler,
    QaValidator,
    OutputRenderer,
}

impl AgentStage {
    pub const ALL: [AgentStage; 6] = [
        Self::IntakeNormalizer,
        Self::MetabolicCalculator,
        Self::RecipeCurator,
        Self::NutritionCompiler,
        Self::QaValidator,
        Self::OutputRenderer,
    ];

    /// 1-based position in the pipeline; the `agent` field of progress events.
    pub fn number(self) -> u8 {
        match self {
            Self::IntakeNormalizer => 1,
            Self::MetabolicCalculator => 2,
            Self::RecipeCurator => 3,
            Self::NutritionCompiler => 4,
            Self::QaValidator => 5,
            Self::OutputRenderer => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::IntakeNormalizer => "Intake Normalizer",
            Self::MetabolicCalculator => "Metabolic Calculator",
            Self::RecipeCurator => "Recipe Curator",
            Self::NutritionCompiler => "Nutrition Compiler",
            Self::QaValidator => "QA Validator",
            Self::OutputRenderer => "Output Renderer",
        }
    }

    pub fn started_message(self) -> &'static str {
        match self {
            Self::IntakeNormalizer => "Normalizing intake started",
            Self::MetabolicCalculator => "Calculating energy targets started",
            Self::RecipeCurator => "Curating recipes started",
            Self::NutritionCompiler => "Compiling nutrition started",
            Self::QaValidator => "Scoring plan started",
            Self::OutputRenderer => "Rendering plan started",
        }
    }

    pub fn finished_message(self) -> &'static str {
        match self {
            Self::IntakeNormalizer => "Intake normalized",
            Self::MetabolicCalculator => "Energy targets calculated",
            Self::RecipeCurator => "Recipes curated",
            Self::NutritionCompiler => "Nutrition compiled",
            Self::QaValidator => "Plan scored and accepted",
            Self::OutputRenderer => "Plan rendered",
        }
    }
}

impl fmt::Display for AgentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared, read-only collaborators every job's pipeline run uses.
#[derive(Clone)]
pub struct PipelineContext {
    pub recipes: Arc<dyn RecipeSource>,
    pub nutrition: Arc<dyn NutritionSource>,
    pub qa: QaConfig,
}

impl PipelineContext {
    /// Built-in recipe library and food table, default acceptance threshold.
    /// Fully deterministic.
    pub fn deterministic() -> Self {
        Self {
            recipes: Arc::new(DeterministicRecipes::new()),
            nutrition: Arc::new(FoodTable::builtin()),
            qa: QaConfig::default(),
        }
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("recipes", &self.recipes.name())
            .field("nutrition", &self.nutrition.name())
            .field("qa", &self.qa)
            .finish()
    }
}
