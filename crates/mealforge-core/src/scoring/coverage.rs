//! Read-only projections reported alongside the scores: how much of the
//! plan's nutrition was verified, and how each day compares to its target.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{
    ClientIntake, ConfidenceLevel, MealPlanCompiled, MetabolicProfile, Nutrition, Weekday,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientCoverage {
    pub total: usize,
    pub verified: usize,
    pub estimated: usize,
    /// `verified / total`; 0 for an empty plan.
    pub verified_fraction: f64,
    /// Sorted, distinct names of estimated ingredients.
    pub unmatched: Vec<String>,
}

pub fn ingredient_coverage(plan: &MealPlanCompiled) -> IngredientCoverage {
    let mut coverage = IngredientCoverage::default();
    let mut unmatched = BTreeSet::new();
    for ingredient in plan.meals().flat_map(|m| m.ingredients.iter()) {
        coverage.total += 1;
        match ingredient.confidence {
            ConfidenceLevel::Verified => coverage.verified += 1,
            ConfidenceLevel::Estimated => {
                coverage.estimated += 1;
                unmatched.insert(ingredient.name.trim().to_lowercase());
            }
        }
    }
    if coverage.total > 0 {
        coverage.verified_fraction = coverage.verified as f64 / coverage.total as f64;
    }
    coverage.unmatched = unmatched.into_iter().collect();
    coverage
}

/// Target versus actual for one day; variances are signed percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAdherence {
    pub day_index: u32,
    pub weekday: Weekday,
    pub is_training_day: bool,
    pub target: Nutrition,
    pub actual: Nutrition,
    pub variance_pct: Nutrition,
}

fn variance_pct(actual: f64, target: f64) -> f64 {
    if target <= 0.0 {
        0.0
    } else {
        (actual - target) / target * 100.0
    }
}

pub fn day_adherence(
    plan: &MealPlanCompiled,
    intake: &ClientIntake,
    profile: &MetabolicProfile,
) -> Vec<DayAdherence> {
    plan.days
        .iter()
        .map(|day| {
            let is_training_day = intake.is_training_day(day.weekday);
            let target = Nutrition::from(profile.target_for(is_training_day));
            let actual = day.totals;
            DayAdherence {
                day_index: day.day_index,
                weekday: day.weekday,
                is_training_day,
                target,
                actual,
                variance_pct: Nutrition {
                    kcal: variance_pct(actual.kcal, target.kcal),
                    protein_g: variance_pct(actual.protein_g, target.protein_g),
                    carbs_g: variance_pct(actual.carbs_g, target.carbs_g),
                    fat_g: variance_pct(actual.fat_g, target.fat_g),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::{intake, plan_of, profile};

    #[test]
    fn coverage_counts_and_sorts_unmatched() {
        let mut plan = plan_of(&[&[("A", &["rice", "Za'atar", "sumac"])], &[("B", &["sumac"])]]);
        for meal in plan.days.iter_mut().flat_map(|d| d.meals.iter_mut()) {
            for ing in &mut meal.ingredients {
                if ing.name != "rice" {
                    ing.confidence = ConfidenceLevel::Estimated;
                }
            }
        }
        let c = ingredient_coverage(&plan);
        assert_eq!(c.total, 4);
        assert_eq!(c.verified, 1);
        assert_eq!(c.estimated, 3);
        assert_eq!(c.verified_fraction, 0.25);
        assert_eq!(c.unmatched, vec!["sumac", "za'atar"]);
    }

    #[test]
    fn adherence_reports_signed_variance() {
        let mut i = intake();
        i.training_days = [Weekday::Monday].into_iter().collect();
        let mut plan = plan_of(&[&[("A", &[])], &[("B", &[])]]);
        plan.days[0].totals.kcal = 2100.0;
        plan.days[1].totals.kcal = 2100.0;

        let rows = day_adherence(&plan, &i, &profile());
        assert!(rows[0].is_training_day);
        assert_eq!(rows[0].target.kcal, 2200.0);
        assert!((rows[0].variance_pct.kcal + 4.545).abs() < 0.01);
        assert!(!rows[1].is_training_day);
        assert!((rows[1].variance_pct.kcal - 5.0).abs() < 1e-9);
    }
}
