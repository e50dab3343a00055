//! Stage 4: attach measured nutrition to every ingredient.
//!
//! A [`NutritionSource`] answers "kcal and macros per 100 g of X". Matched
//! ingredients are `Verified`; the rest keep a share of the recipe source's
//! own estimate and are marked `Estimated`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::model::{
    CompiledDay, CompiledIngredient, CompiledMeal, ConfidenceLevel, DraftMeal, MealPlanCompiled,
    MealPlanDraft, Nutrition,
};

/// Lookup of nutrition facts per 100 g.
#[async_trait]
pub trait NutritionSource: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when the source has no match for `ingredient`.
    async fn per_100g(&self, ingredient: &str) -> Result<Option<Nutrition>>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn NutritionSource) {}
};

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

/// `(name, kcal, protein g, carbs g, fat g)` per 100 g.
const FOODS: &[(&str, f64, f64, f64, f64)] = &[
    // proteins
    ("chicken breast", 165.0, 31.0, 0.0, 3.6),
    ("chicken thigh", 209.0, 26.0, 0.0, 10.9),
    ("ground turkey", 150.0, 19.7, 0.0, 8.0),
    ("beef sirloin", 183.0, 27.0, 0.0, 8.0),
    ("ground beef", 250.0, 26.0, 0.0, 15.0),
    ("pork tenderloin", 143.0, 26.0, 0.0, 3.5),
    ("bacon", 541.0, 37.0, 1.4, 42.0),
    ("salmon fillet", 208.0, 20.0, 0.0, 13.0),
    ("cod fillet", 82.0, 18.0, 0.0, 0.7),
    ("shrimp", 99.0, 24.0, 0.2, 0.3),
    ("tuna", 116.0, 26.0, 0.0, 0.8),
    ("eggs", 143.0, 12.6, 0.7, 9.5),
    ("tofu", 144.0, 17.0, 3.0, 9.0),
    ("tempeh", 192.0, 20.0, 7.6, 10.8),
    ("chickpeas", 164.0, 8.9, 27.4, 2.6),
    ("black beans", 132.0, 8.9, 23.7, 0.5),
    ("lentils", 116.0, 9.0, 20.0, 0.4),
    ("whey protein", 400.0, 80.0, 8.0, 6.0),
    // dairy
    ("greek yogurt", 73.0, 10.0, 3.6, 1.9),
    ("cottage cheese", 98.0, 11.0, 3.4, 4.3),
    ("feta", 264.0, 14.0, 4.0, 21.0),
    ("parmesan", 431.0, 38.0, 4.1, 29.0),
    ("cheddar", 403.0, 25.0, 1.3, 33.0),
    ("milk", 61.0, 3.2, 4.8, 3.3),
    ("butter", 717.0, 0.9, 0.1, 81.0),
    // grains and starches
    ("rolled oats", 389.0, 16.9, 66.3, 6.9),
    ("brown rice", 112.0, 2.3, 23.5, 0.8),
    ("white rice", 130.0, 2.7, 28.0, 0.3),
    ("quinoa", 120.0, 4.4, 21.3, 1.9),
    ("whole wheat pasta", 149.0, 6.0, 30.0, 1.7),
    ("rice noodles", 108.0, 1.8, 24.0, 0.2),
    ("whole wheat bread", 247.0, 13.0, 41.0, 3.4),
    ("corn tortilla", 218.0, 5.7, 44.6, 2.9),
    ("granola", 471.0, 10.0, 64.0, 20.0),
    ("rice cakes", 387.0, 8.0, 81.0, 2.8),
    ("sweet potato", 86.0, 1.6, 20.0, 0.1),
    ("potato", 77.0, 2.0, 17.0, 0.1),
    // fruit
    ("banana", 89.0, 1.1, 22.8, 0.3),
    ("blueberries", 57.0, 0.7, 14.5, 0.3),
    ("apple", 52.0, 0.3, 13.8, 0.2),
    ("avocado", 160.0, 2.0, 8.5, 14.7),
    ("lemon", 29.0, 1.1, 9.3, 0.3),
    ("lime", 30.0, 0.7, 10.5, 0.2),
    // vegetables
    ("broccoli", 34.0, 2.8, 6.6, 0.4),
    ("spinach", 23.0, 2.9, 3.6, 0.4),
    ("bell pepper", 31.0, 1.0, 6.0, 0.3),
    ("onion", 40.0, 1.1, 9.3, 0.1),
    ("garlic", 149.0, 6.4, 33.0, 0.5),
    ("ginger", 80.0, 1.8, 17.8, 0.8),
    ("tomato", 18.0, 0.9, 3.9, 0.2),
    ("cucumber", 15.0, 0.7, 3.6, 0.1),
    ("zucchini", 17.0, 1.2, 3.1, 0.3),
    ("mushrooms", 22.0, 3.1, 3.3, 0.3),
    ("carrot", 41.0, 0.9, 9.6, 0.2),
    ("kale", 49.0, 4.3, 8.8, 0.9),
    ("mixed greens", 20.0, 1.5, 3.6, 0.2),
    ("green beans", 31.0, 1.8, 7.0, 0.2),
    ("cauliflower", 25.0, 1.9, 5.0, 0.3),
    ("asparagus", 20.0, 2.2, 3.9, 0.1),
    ("cabbage", 25.0, 1.3, 5.8, 0.1),
    ("eggplant", 25.0, 1.0, 6.0, 0.2),
    ("cilantro", 23.0, 2.1, 3.7, 0.5),
    // fats, nuts, seeds
    ("olive oil", 884.0, 0.0, 0.0, 100.0),
    ("sesame oil", 884.0, 0.0, 0.0, 100.0),
    ("coconut milk", 230.0, 2.3, 6.0, 24.0),
    ("almond milk", 15.0, 0.6, 0.3, 1.2),
    ("peanut butter", 588.0, 25.0, 20.0, 50.0),
    ("almonds", 579.0, 21.0, 22.0, 50.0),
    ("walnuts", 654.0, 15.0, 14.0, 65.0),
    ("chia seeds", 486.0, 17.0, 42.0, 31.0),
    ("hemp seeds", 553.0, 31.6, 8.7, 48.8),
    ("tahini", 595.0, 17.0, 21.0, 54.0),
    ("hummus", 166.0, 7.9, 14.3, 9.6),
    ("dark chocolate", 546.0, 4.9, 61.0, 31.0),
    // condiments
    ("soy sauce", 53.0, 8.1, 4.9, 0.6),
    ("honey", 304.0, 0.3, 82.0, 0.0),
    ("salsa", 36.0, 1.5, 7.0, 0.2),
    ("curry powder", 325.0, 14.0, 56.0, 14.0),
];

/// Offline nutrition table covering every ingredient of the built-in recipe
/// library. Lookups ignore case and surrounding whitespace.
#[derive(Debug, Clone)]
pub struct FoodTable {
    foods: HashMap<String, Nutrition>,
}

impl FoodTable {
    pub fn builtin() -> Self {
        let foods = FOODS
            .iter()
            .map(|&(name, kcal, protein_g, carbs_g, fat_g)| {
                (
                    name.to_owned(),
                    Nutrition {
                        kcal,
                        protein_g,
                        carbs_g,
                        fat_g,
                    },
                )
            })
            .collect();
        Self { foods }
    }

    pub fn get(&self, ingredient: &str) -> Option<Nutrition> {
        self.foods.get(&ingredient.trim().to_lowercase()).copied()
    }

    /// Nutrition of `grams` of `ingredient`, if known.
    pub fn for_grams(&self, ingredient: &str, grams: f64) -> Option<Nutrition> {
        self.get(ingredient).map(|n| n.scaled(grams / 100.0))
    }
}

#[async_trait]
impl NutritionSource for FoodTable {
    fn name(&self) -> &str {
        "builtin-food-table"
    }

    async fn per_100g(&self, ingredient: &str) -> Result<Option<Nutrition>> {
        Ok(self.get(ingredient))
    }
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

const NUTRIENT_ENERGY: &str = "208";
const NUTRIENT_PROTEIN: &str = "203";
const NUTRIENT_FAT: &str = "204";
const NUTRIENT_CARBS: &str = "205";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<FoodHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoodHit {
    #[serde(default)]
    food_nutrients: Vec<FoodNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoodNutrient {
    nutrient_number: Option<String>,
    value: Option<f64>,
}

impl FoodHit {
    fn nutrient(&self, number: &str) -> Option<f64> {
        self.food_nutrients
            .iter()
            .find(|n| n.nutrient_number.as_deref() == Some(number))
            .and_then(|n| n.value)
    }

    /// Per-100 g facts; a hit without an energy value is no match.
    fn to_nutrition(&self) -> Option<Nutrition> {
        Some(Nutrition {
            kcal: self.nutrient(NUTRIENT_ENERGY)?,
            protein_g: self.nutrient(NUTRIENT_PROTEIN).unwrap_or(0.0),
            carbs_g: self.nutrient(NUTRIENT_CARBS).unwrap_or(0.0),
            fat_g: self.nutrient(NUTRIENT_FAT).unwrap_or(0.0),
        })
    }
}

/// Client for a food-search API in the FoodData Central format
/// (`GET {base}/foods/search?query=..&pageSize=1`, `X-Api-Key` header).
///
/// Answers, including misses, are cached for the life of the source.
pub struct HttpNutritionSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: Mutex<HashMap<String, Option<Nutrition>>>,
}

impl HttpNutritionSource {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build nutrition HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn cached(&self, key: &str) -> Option<Option<Nutrition>> {
        self.cache.lock().ok()?.get(key).copied()
    }

    fn remember(&self, key: String, value: Option<Nutrition>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, value);
        }
    }
}

#[async_trait]
impl NutritionSource for HttpNutritionSource {
    fn name(&self) -> &str {
        "http-nutrition"
    }

    async fn per_100g(&self, ingredient: &str) -> Result<Option<Nutrition>> {
        let key = ingredient.trim().to_lowercase();
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let url = format!("{}/foods/search", self.base_url);
        let response: SearchResponse = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[("query", key.as_str()), ("pageSize", "1")])
            .send()
            .await
            .with_context(|| format!("failed to query nutrition service for {key:?}"))?
            .error_for_status()
            .with_context(|| format!("nutrition service rejected lookup for {key:?}"))?
            .json()
            .await
            .with_context(|| format!("failed to decode nutrition response for {key:?}"))?;

        let found = response.foods.first().and_then(FoodHit::to_nutrition);
        tracing::debug!(ingredient = %key, matched = found.is_some(), "nutrition lookup");
        self.remember(key, found);
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

async fn compile_meal(meal: DraftMeal, source: &dyn NutritionSource) -> Result<CompiledMeal> {
    let total_grams: f64 = meal.ingredients.iter().map(|i| i.grams).sum();
    let mut ingredients = Vec::with_capacity(meal.ingredients.len());
    let mut nutrition = Nutrition::default();
    let mut all_verified = true;

    for ingredient in meal.ingredients {
        let (facts, confidence) = match source.per_100g(&ingredient.name).await? {
            Some(per_100g) => (
                per_100g.scaled(ingredient.grams / 100.0),
                ConfidenceLevel::Verified,
            ),
            None => {
                all_verified = false;
                let share = if total_grams > 0.0 {
                    ingredient.grams / total_grams
                } else {
                    0.0
                };
                (meal.estimated.scaled(share), ConfidenceLevel::Estimated)
            }
        };
        nutrition += facts;
        ingredients.push(CompiledIngredient {
            name: ingredient.name,
            grams: ingredient.grams,
            nutrition: facts,
            confidence,
        });
    }

    Ok(CompiledMeal {
        slot: meal.slot,
        name: meal.name,
        cuisine: meal.cuisine,
        primary_protein: meal.primary_protein,
        prep_minutes: meal.prep_minutes,
        cook_minutes: meal.cook_minutes,
        ingredients,
        estimated: meal.estimated,
        nutrition,
        confidence: if all_verified {
            ConfidenceLevel::Verified
        } else {
            ConfidenceLevel::Estimated
        },
    })
}

/// Compile a draft into measured nutrition, day by day.
pub async fn compile_nutrition(
    draft: MealPlanDraft,
    source: &dyn NutritionSource,
) -> Result<MealPlanCompiled, PipelineError> {
    let mut days = Vec::with_capacity(draft.days.len());
    for day in draft.days {
        let mut meals = Vec::with_capacity(day.meals.len());
        let mut totals = Nutrition::default();
        for meal in day.meals {
            let compiled = compile_meal(meal, source)
                .await
                .map_err(|e| PipelineError::Nutrition(format!("{e:#}")))?;
            totals += compiled.nutrition;
            meals.push(compiled);
        }
        days.push(CompiledDay {
            day_index: day.day_index,
            weekday: day.weekday,
            is_training_day: day.is_training_day,
            target: day.target,
            meals,
            totals,
        });
    }
    Ok(MealPlanCompiled {
        days,
        source: draft.source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DraftDay, DraftIngredient, MacroTargets, MealSlot, Weekday};

    fn draft(ingredients: &[(&str, f64)], estimated: Nutrition) -> MealPlanDraft {
        MealPlanDraft {
            days: vec![DraftDay {
                day_index: 0,
                weekday: Weekday::Monday,
                is_training_day: false,
                target: MacroTargets {
                    kcal: 2000.0,
                    protein_g: 100.0,
                    carbs_g: 250.0,
                    fat_g: 70.0,
                },
                meals: vec![DraftMeal {
                    slot: MealSlot::Lunch,
                    name: "Test Bowl".into(),
                    cuisine: "test".into(),
                    primary_protein: Some("chicken".into()),
                    prep_minutes: 10,
                    cook_minutes: 10,
                    ingredients: ingredients
                        .iter()
                        .map(|(n, g)| DraftIngredient {
                            name: n.to_string(),
                            grams: *g,
                        })
                        .collect(),
                    estimated,
                }],
            }],
            source: "test".into(),
        }
    }

    #[test]
    fn table_lookup_ignores_case() {
        let table = FoodTable::builtin();
        assert!(table.get(" Chicken Breast ").is_some());
        assert!(table.get("dragonfruit").is_none());
        let n = table.for_grams("olive oil", 10.0).unwrap();
        assert!((n.fat_g - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn known_ingredients_are_verified() {
        let plan = draft(&[("chicken breast", 200.0), ("brown rice", 150.0)], Nutrition::default());
        let compiled = compile_nutrition(plan, &FoodTable::builtin()).await.unwrap();
        let meal = &compiled.days[0].meals[0];
        assert_eq!(meal.confidence, ConfidenceLevel::Verified);
        assert!((meal.nutrition.kcal - (330.0 + 168.0)).abs() < 1e-9);
        assert_eq!(compiled.days[0].totals, meal.nutrition);
    }

    #[tokio::test]
    async fn unknown_ingredients_share_the_estimate() {
        let estimate = Nutrition {
            kcal: 400.0,
            protein_g: 20.0,
            carbs_g: 40.0,
            fat_g: 10.0,
        };
        let plan = draft(&[("chicken breast", 100.0), ("mystery sauce", 100.0)], estimate);
        let compiled = compile_nutrition(plan, &FoodTable::builtin()).await.unwrap();
        let meal = &compiled.days[0].meals[0];
        assert_eq!(meal.confidence, ConfidenceLevel::Estimated);
        assert_eq!(meal.ingredients[1].confidence, ConfidenceLevel::Estimated);
        assert_eq!(meal.ingredients[1].nutrition.kcal, 200.0);
        assert_eq!(meal.estimated, estimate);
    }

    struct Broken;

    #[async_trait]
    impl NutritionSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn per_100g(&self, _: &str) -> Result<Option<Nutrition>> {
            anyhow::bail!("service unavailable")
        }
    }

    #[tokio::test]
    async fn source_failure_is_a_nutrition_error() {
        let plan = draft(&[("tofu", 100.0)], Nutrition::default());
        let err = compile_nutrition(plan, &Broken).await.unwrap_err();
        assert!(matches!(err, PipelineError::Nutrition(ref m) if m.contains("unavailable")));
    }

    #[test]
    fn parses_food_search_hit() {
        let body = serde_json::json!({
            "foods": [{
                "description": "Lentils, cooked",
                "foodNutrients": [
                    {"nutrientNumber": "208", "value": 116.0},
                    {"nutrientNumber": "203", "value": 9.0},
                    {"nutrientNumber": "205", "value": 20.1},
                    {"nutrientNumber": "204", "value": 0.4}
                ]
            }]
        });
        let resp: SearchResponse = serde_json::from_value(body).unwrap();
        let n = resp.foods[0].to_nutrition().unwrap();
        assert_eq!(n.kcal, 116.0);
        assert_eq!(n.carbs_g, 20.1);
    }
}
