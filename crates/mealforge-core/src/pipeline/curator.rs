//! Stage 3: choose meals for every day of the plan.
//!
//! The curator lays out the slots of each day and their calorie budgets,
//! asks a [`RecipeSource`] to fill them, and refuses any meal that hits a
//! declared allergy or exclusion.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::library::{Course, Recipe, RECIPES};
use super::nutrition::FoodTable;
use crate::error::PipelineError;
use crate::model::{
    ClientIntake, DraftDay, DraftIngredient, DraftMeal, MacroTargets, MealPlanDraft, MealSlot,
    MetabolicProfile, Nutrition, Weekday,
};
use crate::scoring::{ComplianceRules, ViolationKind};

/// Share of the day's calories each snack receives.
const SNACK_SHARE: f64 = 0.10;
/// Days (including the current one) a recipe is kept out of rotation.
const REPEAT_WINDOW_DAYS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    pub slot: MealSlot,
    pub kcal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRequest {
    pub day_index: u32,
    pub weekday: Weekday,
    pub is_training_day: bool,
    pub target: MacroTargets,
    pub slots: Vec<SlotRequest>,
}

/// What a recipe source is asked to produce.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationRequest<'a> {
    pub intake: &'a ClientIntake,
    pub days: Vec<DayRequest>,
}

/// Produces meals for a curation request.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    fn name(&self) -> &str;

    /// One list of meals per requested day, in slot order.
    async fn plan_days(&self, request: &CurationRequest<'_>) -> Result<Vec<Vec<DraftMeal>>>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn RecipeSource) {}
};

/// Slot order for a day: mains first, then snacks.
pub fn slot_layout(meals_per_day: u32, snacks_per_day: u32) -> Vec<MealSlot> {
    let mut slots = match meals_per_day {
        0 => Vec::new(),
        1 => vec![MealSlot::Dinner],
        2 => vec![MealSlot::Lunch, MealSlot::Dinner],
        _ => vec![MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner],
    };
    for extra in 3..meals_per_day {
        slots.push(if extra % 2 == 1 {
            MealSlot::Lunch
        } else {
            MealSlot::Dinner
        });
    }
    slots.extend(std::iter::repeat_n(MealSlot::Snack, snacks_per_day as usize));
    slots
}

fn main_weight(slot: MealSlot) -> f64 {
    match slot {
        MealSlot::Breakfast => 0.8,
        MealSlot::Lunch => 1.0,
        MealSlot::Dinner => 1.2,
        MealSlot::Snack => 0.0,
    }
}

/// Split `kcal` across the slots: each snack gets a fixed share, mains
/// divide the rest by weight.
pub fn slot_budgets(slots: &[MealSlot], kcal: f64) -> Vec<SlotRequest> {
    let snacks = slots.iter().filter(|s| **s == MealSlot::Snack).count() as f64;
    let snack_kcal = kcal * SNACK_SHARE;
    let main_total: f64 = slots.iter().map(|s| main_weight(*s)).sum();
    let main_kcal = kcal - snack_kcal * snacks;
    slots
        .iter()
        .map(|&slot| SlotRequest {
            slot,
            kcal: if slot == MealSlot::Snack {
                snack_kcal
            } else if main_total > 0.0 {
                main_kcal * main_weight(slot) / main_total
            } else {
                0.0
            },
        })
        .collect()
}

fn build_request<'a>(intake: &'a ClientIntake, profile: &MetabolicProfile) -> CurationRequest<'a> {
    let slots = slot_layout(intake.meals_per_day, intake.snacks_per_day);
    let days = (0..intake.plan_duration_days)
        .map(|day_index| {
            let weekday = Weekday::from_index(day_index as usize);
            let is_training_day = intake.is_training_day(weekday);
            let target = profile.target_for(is_training_day);
            DayRequest {
                day_index,
                weekday,
                is_training_day,
                target,
                slots: slot_budgets(&slots, target.kcal),
            }
        })
        .collect();
    CurationRequest { intake, days }
}

fn curation_error(msg: impl Into<String>) -> PipelineError {
    PipelineError::Curation(msg.into())
}

/// Ask `source` for meals and assemble the draft plan.
pub async fn curate_recipes(
    intake: &ClientIntake,
    profile: &MetabolicProfile,
    source: &dyn RecipeSource,
) -> Result<MealPlanDraft, PipelineError> {
    let request = build_request(intake, profile);
    let planned = source
        .plan_days(&request)
        .await
        .map_err(|e| curation_error(format!("{} failed: {e:#}", source.name())))?;

    if planned.len() != request.days.len() {
        return Err(curation_error(format!(
            "{} returned {} days, expected {}",
            source.name(),
            planned.len(),
            request.days.len()
        )));
    }

    let rules = ComplianceRules::for_intake(intake);
    let mut days = Vec::with_capacity(planned.len());
    for (day, meals) in request.days.into_iter().zip(planned) {
        if meals.len() != day.slots.len() {
            return Err(curation_error(format!(
                "{} returned {} meals for day {}, expected {}",
                source.name(),
                meals.len(),
                day.day_index + 1,
                day.slots.len()
            )));
        }
        for meal in &meals {
            let hits = rules.scan_meal(&meal.name, meal.ingredients.iter().map(|i| i.name.as_str()));
            if let Some(hit) = hits
                .iter()
                .find(|f| matches!(f.kind, ViolationKind::Allergen | ViolationKind::Exclusion))
            {
                return Err(curation_error(format!(
                    "'{}' on day {} contains {} ({})",
                    meal.name,
                    day.day_index + 1,
                    hit.term,
                    hit.rule
                )));
            }
        }
        days.push(DraftDay {
            day_index: day.day_index,
            weekday: day.weekday,
            is_training_day: day.is_training_day,
            target: day.target,
            meals,
        });
    }

    tracing::debug!(source = source.name(), days = days.len(), "recipes curated");
    Ok(MealPlanDraft {
        days,
        source: source.name().to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Deterministic library source
// ---------------------------------------------------------------------------

/// Builds plans from the built-in recipe library.
///
/// Picks are seeded by a hash of the intake, so the same intake always
/// yields the same plan.
#[derive(Debug, Clone)]
pub struct DeterministicRecipes {
    table: FoodTable,
}

impl DeterministicRecipes {
    pub fn new() -> Self {
        Self {
            table: FoodTable::builtin(),
        }
    }

    fn seed(intake: &ClientIntake) -> Result<[u8; 32]> {
        let bytes = serde_json::to_vec(intake).context("failed to serialize intake for seeding")?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Library recipes of a course the client can eat, preferring ones that
    /// fit their time and skill.
    fn candidates(
        intake: &ClientIntake,
        rules: &ComplianceRules,
        course: Course,
    ) -> Result<Vec<&'static Recipe>> {
        let allowed: Vec<&'static Recipe> = RECIPES
            .iter()
            .filter(|r| r.course == course)
            .filter(|r| {
                rules
                    .scan_meal(r.name, r.ingredients.iter().map(|(name, _)| *name))
                    .is_empty()
            })
            .collect();
        if allowed.is_empty() {
            bail!("no {course:?} recipe in the library satisfies the client's restrictions");
        }

        let time_limit = intake.prep_time_max.saturating_mul(3) / 2;
        let practical: Vec<&'static Recipe> = allowed
            .iter()
            .copied()
            .filter(|r| r.prep_minutes + r.cook_minutes <= time_limit)
            .filter(|r| r.difficulty <= intake.cooking_skill + 3)
            .collect();

        Ok(if practical.is_empty() { allowed } else { practical })
    }

    fn scale(&self, recipe: &Recipe, slot: &SlotRequest) -> DraftMeal {
        let base_kcal: f64 = recipe
            .ingredients
            .iter()
            .filter_map(|(name, grams)| self.table.for_grams(name, *grams))
            .map(|n| n.kcal)
            .sum();
        let factor = if base_kcal > 0.0 {
            (slot.kcal / base_kcal).clamp(0.5, 3.0)
        } else {
            1.0
        };

        let mut estimated = Nutrition::default();
        let ingredients = recipe
            .ingredients
            .iter()
            .map(|&(name, grams)| {
                let grams = round_grams(grams * factor);
                if let Some(n) = self.table.for_grams(name, grams) {
                    estimated += n;
                }
                DraftIngredient {
                    name: name.to_owned(),
                    grams,
                }
            })
            .collect();

        DraftMeal {
            slot: slot.slot,
            name: recipe.name.to_owned(),
            cuisine: recipe.cuisine.to_owned(),
            primary_protein: Some(recipe.protein.to_owned()),
            prep_minutes: recipe.prep_minutes,
            cook_minutes: recipe.cook_minutes,
            ingredients,
            estimated,
        }
    }
}

impl Default for DeterministicRecipes {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole grams under 20 g, otherwise multiples of 5 g.
fn round_grams(grams: f64) -> f64 {
    if grams < 20.0 {
        grams.round().max(1.0)
    } else {
        (grams / 5.0).round() * 5.0
    }
}

#[async_trait]
impl RecipeSource for DeterministicRecipes {
    fn name(&self) -> &str {
        "builtin-library"
    }

    async fn plan_days(&self, request: &CurationRequest<'_>) -> Result<Vec<Vec<DraftMeal>>> {
        let intake = request.intake;
        let rules = ComplianceRules::for_intake(intake);
        let mut picks = StdRng::from_seed(Self::seed(intake)?);

        let mut plan: Vec<Vec<&'static Recipe>> = Vec::with_capacity(request.days.len());
        let mut out = Vec::with_capacity(request.days.len());

        for (i, day) in request.days.iter().enumerate() {
            let window_start = i.saturating_sub(REPEAT_WINDOW_DAYS - 1);
            let previous_proteins: Vec<&str> = i
                .checked_sub(1)
                .map(|p| plan[p].iter().map(|r| r.protein).collect())
                .unwrap_or_default();

            let mut chosen: Vec<&'static Recipe> = Vec::with_capacity(day.slots.len());
            let mut meals = Vec::with_capacity(day.slots.len());

            for slot in &day.slots {
                let candidates = Self::candidates(intake, &rules, Course::for_slot(slot.slot))?;
                let recent = |r: &&Recipe| {
                    plan[window_start..i]
                        .iter()
                        .flatten()
                        .chain(chosen.iter())
                        .any(|used| used.name == r.name)
                };

                let mut pool: Vec<&'static Recipe> =
                    candidates.iter().copied().filter(|r| !recent(r)).collect();
                if pool.is_empty() {
                    pool = candidates
                        .iter()
                        .copied()
                        .filter(|r| !chosen.iter().any(|c| c.name == r.name))
                        .collect();
                }
                if pool.is_empty() {
                    pool = candidates;
                }

                let fresh_protein: Vec<&'static Recipe> = pool
                    .iter()
                    .copied()
                    .filter(|r| !previous_proteins.contains(&r.protein))
                    .collect();
                if !fresh_protein.is_empty() {
                    pool = fresh_protein;
                }

                if !intake.cuisine_preferences.is_empty() && picks.random_bool(0.5) {
                    let preferred: Vec<&'static Recipe> = pool
                        .iter()
                        .copied()
                        .filter(|r| intake.cuisine_preferences.iter().any(|c| c == r.cuisine))
                        .collect();
                    if !preferred.is_empty() {
                        pool = preferred;
                    }
                }

                let Some(&recipe) = pool.choose(&mut picks) else {
                    bail!("no {} recipe left for day {}", slot.slot.as_str(), i + 1);
                };
                meals.push(self.scale(recipe, slot));
                chosen.push(recipe);
            }

            plan.push(chosen);
            out.push(meals);
        }

        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GeneratedPlan {
    days: Vec<GeneratedDay>,
}

#[derive(Debug, Deserialize)]
struct GeneratedDay {
    meals: Vec<DraftMeal>,
}

/// Client for an external meal-generation service
/// (`POST {base}/meal-plans`, bearer key).
pub struct HttpRecipeSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRecipeSource {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build recipe HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        })
    }
}

#[async_trait]
impl RecipeSource for HttpRecipeSource {
    fn name(&self) -> &str {
        "http-recipes"
    }

    async fn plan_days(&self, request: &CurationRequest<'_>) -> Result<Vec<Vec<DraftMeal>>> {
        let url = format!("{}/meal-plans", self.base_url);
        let plan: GeneratedPlan = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("failed to reach recipe service")?
            .error_for_status()
            .context("recipe service returned an error")?
            .json()
            .await
            .context("failed to decode recipe service response")?;

        Ok(plan.days.into_iter().map(|d| d.meals).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DietaryStyle;
    use crate::pipeline::metabolic::calculate_metabolic_profile;
    use crate::scoring::test_support::intake;

    #[test]
    fn layout_puts_snacks_last() {
        assert_eq!(
            slot_layout(3, 2),
            vec![
                MealSlot::Breakfast,
                MealSlot::Lunch,
                MealSlot::Dinner,
                MealSlot::Snack,
                MealSlot::Snack
            ]
        );
        assert_eq!(slot_layout(2, 0), vec![MealSlot::Lunch, MealSlot::Dinner]);
        assert_eq!(slot_layout(5, 0).len(), 5);
    }

    #[test]
    fn budgets_cover_the_day() {
        let slots = slot_layout(3, 1);
        let budgets = slot_budgets(&slots, 2000.0);
        let total: f64 = budgets.iter().map(|b| b.kcal).sum();
        assert!((total - 2000.0).abs() < 1e-9);
        assert_eq!(budgets[3].kcal, 200.0);
        assert!(budgets[2].kcal > budgets[0].kcal);
    }

    #[tokio::test]
    async fn library_plan_is_reproducible() {
        let i = intake();
        let p = calculate_metabolic_profile(&i).unwrap();
        let source = DeterministicRecipes::new();
        let a = curate_recipes(&i, &p, &source).await.unwrap();
        let b = curate_recipes(&i, &p, &source).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.days.len(), 7);
        assert!(a.days.iter().all(|d| d.meals.len() == 3));
    }

    #[tokio::test]
    async fn library_respects_diet_and_allergies() {
        let mut i = intake();
        i.dietary_style = DietaryStyle::Vegan;
        i.allergies = vec!["soy".into()];
        let p = calculate_metabolic_profile(&i).unwrap();
        let draft = curate_recipes(&i, &p, &DeterministicRecipes::new()).await.unwrap();
        let rules = ComplianceRules::for_intake(&i);
        for meal in draft.days.iter().flat_map(|d| &d.meals) {
            let hits = rules.scan_meal(&meal.name, meal.ingredients.iter().map(|x| x.name.as_str()));
            assert!(hits.is_empty(), "{} violates {hits:?}", meal.name);
        }
    }

    struct Canned(Vec<Vec<DraftMeal>>);

    #[async_trait]
    impl RecipeSource for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn plan_days(&self, _: &CurationRequest<'_>) -> Result<Vec<Vec<DraftMeal>>> {
            Ok(self.0.clone())
        }
    }

    fn meal(name: &str, ingredients: &[&str]) -> DraftMeal {
        DraftMeal {
            slot: MealSlot::Lunch,
            name: name.into(),
            cuisine: "test".into(),
            primary_protein: None,
            prep_minutes: 5,
            cook_minutes: 5,
            ingredients: ingredients
                .iter()
                .map(|n| DraftIngredient {
                    name: n.to_string(),
                    grams: 100.0,
                })
                .collect(),
            estimated: Nutrition::default(),
        }
    }

    #[tokio::test]
    async fn rejects_source_meals_with_allergens() {
        let mut i = intake();
        i.plan_duration_days = 1;
        i.meals_per_day = 2;
        i.allergies = vec!["peanuts".into()];
        let p = calculate_metabolic_profile(&i).unwrap();
        let source = Canned(vec![vec![
            meal("Satay Noodles", &["peanut butter", "rice noodles"]),
            meal("Green Salad", &["mixed greens"]),
        ]]);
        let err = curate_recipes(&i, &p, &source).await.unwrap_err();
        assert!(matches!(err, PipelineError::Curation(ref m) if m.contains("peanut")));
    }

    #[tokio::test]
    async fn rejects_wrong_shape() {
        let mut i = intake();
        i.plan_duration_days = 2;
        let p = calculate_metabolic_profile(&i).unwrap();
        let source = Canned(vec![vec![]]);
        assert!(curate_recipes(&i, &p, &source).await.is_err());
    }
}
