//! The plan as it moves through stages 3 to 6.
//!
//! Each stage wraps or extends what it receives: `CompiledMeal` keeps every
//! field of `DraftMeal` and adds measured nutrition, `MealPlanValidated`
//! embeds the compiled plan, `RenderedPlan` embeds the validated one.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use super::intake::Weekday;
use super::metabolic::MacroTargets;
use crate::scoring::{Grade, ScorecardResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

/// Whether nutrition came from the trusted source or was estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Verified,
    Estimated,
}

/// Energy and macros of a food quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nutrition {
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl Nutrition {
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            kcal: self.kcal * factor,
            protein_g: self.protein_g * factor,
            carbs_g: self.carbs_g * factor,
            fat_g: self.fat_g * factor,
        }
    }
}

impl Add for Nutrition {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            kcal: self.kcal + rhs.kcal,
            protein_g: self.protein_g + rhs.protein_g,
            carbs_g: self.carbs_g + rhs.carbs_g,
            fat_g: self.fat_g + rhs.fat_g,
        }
    }
}

impl AddAssign for Nutrition {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl From<MacroTargets> for Nutrition {
    fn from(t: MacroTargets) -> Self {
        Self {
            kcal: t.kcal,
            protein_g: t.protein_g,
            carbs_g: t.carbs_g,
            fat_g: t.fat_g,
        }
    }
}

// ---------------------------------------------------------------------------
// Draft (stage 3)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftIngredient {
    pub name: String,
    pub grams: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMeal {
    pub slot: MealSlot,
    pub name: String,
    pub cuisine: String,
    pub primary_protein: Option<String>,
    pub prep_minutes: u32,
    pub cook_minutes: u32,
    pub ingredients: Vec<DraftIngredient>,
    /// The recipe source's own nutrition estimate.
    #[serde(default)]
    pub estimated: Nutrition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDay {
    pub day_index: u32,
    pub weekday: Weekday,
    pub is_training_day: bool,
    pub target: MacroTargets,
    pub meals: Vec<DraftMeal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanDraft {
    pub days: Vec<DraftDay>,
    /// Name of the recipe source that produced the draft.
    pub source: String,
}

// ---------------------------------------------------------------------------
// Compiled (stage 4)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledIngredient {
    pub name: String,
    pub grams: f64,
    pub nutrition: Nutrition,
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledMeal {
    pub slot: MealSlot,
    pub name: String,
    pub cuisine: String,
    pub primary_protein: Option<String>,
    pub prep_minutes: u32,
    pub cook_minutes: u32,
    pub ingredients: Vec<CompiledIngredient>,
    pub estimated: Nutrition,
    /// Sum of the compiled ingredients.
    pub nutrition: Nutrition,
    /// `Verified` only when every ingredient is verified.
    pub confidence: ConfidenceLevel,
}

impl CompiledMeal {
    pub fn total_minutes(&self) -> u32 {
        self.prep_minutes + self.cook_minutes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledDay {
    pub day_index: u32,
    pub weekday: Weekday,
    pub is_training_day: bool,
    pub target: MacroTargets,
    pub meals: Vec<CompiledMeal>,
    pub totals: Nutrition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanCompiled {
    pub days: Vec<CompiledDay>,
    pub source: String,
}

impl MealPlanCompiled {
    pub fn meals(&self) -> impl Iterator<Item = &CompiledMeal> {
        self.days.iter().flat_map(|d| d.meals.iter())
    }
}

// ---------------------------------------------------------------------------
// Validated (stage 5) and rendered (stage 6)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanValidated {
    #[serde(flatten)]
    pub plan: MealPlanCompiled,
    pub scorecard: ScorecardResult,
    /// Non-blocking findings (low coverage, weak categories).
    pub warnings: Vec<String>,
}

/// One line of the aggregated shopping list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    pub name: String,
    pub total_grams: f64,
    pub uses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub day_count: usize,
    pub meal_count: usize,
    pub average_daily: Nutrition,
    pub average_target: Nutrition,
    pub composite: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPlan {
    #[serde(flatten)]
    pub validated: MealPlanValidated,
    pub grocery_list: Vec<GroceryItem>,
    pub summary: PlanSummary,
    pub markdown: String,
}
