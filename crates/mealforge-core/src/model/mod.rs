//! Typed data handed from one pipeline stage to the next.
//!
//! ```text
//! RawIntakeForm -> ClientIntake -> MetabolicProfile -> MealPlanDraft
//!     -> MealPlanCompiled -> MealPlanValidated -> RenderedPlan
//! ```

pub mod intake;
pub mod metabolic;
pub mod plan;

pub use intake::{
    ActivityLevel, ClientIntake, DietaryStyle, GoalRate, GoalType, JobSubmission, MacroStyle,
    RawIntakeForm, Sex, Weekday,
};
pub use metabolic::{MacroTargets, MetabolicProfile};
pub use plan::{
    CompiledDay, CompiledIngredient, CompiledMeal, ConfidenceLevel, DraftDay, DraftIngredient,
    DraftMeal, GroceryItem, MealPlanCompiled, MealPlanDraft, MealPlanValidated, MealSlot,
    Nutrition, PlanSummary, RenderedPlan,
};
