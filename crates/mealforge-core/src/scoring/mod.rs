//! Plan scoring: five weighted categories, a composite and a grade.
//!
//! | Category             | Weight |
//! |----------------------|--------|
//! | Nutritional accuracy | 0.30   |
//! | Practicality         | 0.25   |
//! | Dietary compliance   | 0.20   |
//! | Variety              | 0.15   |
//! | Grocery feasibility  | 0.10   |
//!
//! Every category score and the composite are clamped to `[1, 10]`.

pub mod accuracy;
pub mod compliance;
pub mod coverage;
pub mod grocery;
pub mod practicality;
pub mod terms;
pub mod variety;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use compliance::{ComplianceRules, Violation, ViolationKind};
pub use coverage::{DayAdherence, IngredientCoverage};

use crate::model::{ClientIntake, MealPlanCompiled, MetabolicProfile};

pub const WEIGHT_ACCURACY: f64 = 0.30;
pub const WEIGHT_PRACTICALITY: f64 = 0.25;
pub const WEIGHT_COMPLIANCE: f64 = 0.20;
pub const WEIGHT_VARIETY: f64 = 0.15;
pub const WEIGHT_GROCERY: f64 = 0.10;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        MIN_SCORE
    } else {
        score.clamp(MIN_SCORE, MAX_SCORE)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// One scored category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub name: String,
    pub score: f64,
    pub weight: f64,
    /// `score * weight`.
    pub weighted: f64,
    /// Human-readable reasons for the score.
    pub evidence: Vec<String>,
}

impl CategoryScore {
    /// Build a category score, clamping `raw` into `[1, 10]`.
    pub fn new(name: &str, raw: f64, weight: f64, evidence: Vec<String>) -> Self {
        let score = clamp_score(raw);
        Self {
            name: name.to_owned(),
            score,
            weight,
            weighted: score * weight,
            evidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Failing,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Grade {
    pub fn from_composite(composite: f64) -> Self {
        if composite >= 9.0 {
            Self::Excellent
        } else if composite >= 7.5 {
            Self::Good
        } else if composite >= 6.0 {
            Self::Fair
        } else if composite >= 4.0 {
            Self::Poor
        } else {
            Self::Failing
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Failing => "Failing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorecardResult {
    pub nutritional_accuracy: CategoryScore,
    pub practicality: CategoryScore,
    pub dietary_compliance: CategoryScore,
    pub variety: CategoryScore,
    pub grocery_feasibility: CategoryScore,
    pub composite: f64,
    pub grade: Grade,
    pub allergen_violations: Vec<Violation>,
    /// Dietary-style violations and exclusion hits.
    pub dietary_violations: Vec<Violation>,
    pub coverage: IngredientCoverage,
    pub adherence: Vec<DayAdherence>,
}

impl ScorecardResult {
    pub fn categories(&self) -> [&CategoryScore; 5] {
        [
            &self.nutritional_accuracy,
            &self.practicality,
            &self.dietary_compliance,
            &self.variety,
            &self.grocery_feasibility,
        ]
    }
}

/// Weighted sum of the category scores, clamped and rounded to hundredths.
pub fn composite_of(categories: &[&CategoryScore]) -> f64 {
    round2(clamp_score(categories.iter().map(|c| c.weighted).sum()))
}

/// Score a compiled plan against the intake and profile it was built for.
pub fn score_plan(
    plan: &MealPlanCompiled,
    intake: &ClientIntake,
    profile: &MetabolicProfile,
) -> ScorecardResult {
    let rules = ComplianceRules::for_intake(intake);
    let findings = compliance::find_violations(plan, &rules);

    let nutritional_accuracy = accuracy::score_accuracy(plan, intake, profile);
    let practicality = practicality::score_practicality(plan, intake);
    let dietary_compliance = compliance::score_compliance(&findings);
    let variety = variety::score_variety(plan);
    let grocery_feasibility = grocery::score_grocery(plan);

    let composite = composite_of(&[
        &nutritional_accuracy,
        &practicality,
        &dietary_compliance,
        &variety,
        &grocery_feasibility,
    ]);

    ScorecardResult {
        nutritional_accuracy,
        practicality,
        dietary_compliance,
        variety,
        grocery_feasibility,
        composite,
        grade: Grade::from_composite(composite),
        allergen_violations: findings.allergens,
        dietary_violations: findings.dietary,
        coverage: coverage::ingredient_coverage(plan),
        adherence: coverage::day_adherence(plan, intake, profile),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_score_is_clamped() {
        assert_eq!(CategoryScore::new("x", -4.0, 0.3, vec![]).score, 1.0);
        assert_eq!(CategoryScore::new("x", 12.5, 0.3, vec![]).score, 10.0);
        assert_eq!(CategoryScore::new("x", f64::NAN, 0.3, vec![]).score, 1.0);
        let c = CategoryScore::new("x", 8.0, 0.25, vec![]);
        assert_eq!(c.weighted, 2.0);
    }

    #[test]
    fn weights_sum_to_one() {
        let sum =
            WEIGHT_ACCURACY + WEIGHT_PRACTICALITY + WEIGHT_COMPLIANCE + WEIGHT_VARIETY + WEIGHT_GROCERY;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_composite(9.0), Grade::Excellent);
        assert_eq!(Grade::from_composite(8.99), Grade::Good);
        assert_eq!(Grade::from_composite(7.5), Grade::Good);
        assert_eq!(Grade::from_composite(6.0), Grade::Fair);
        assert_eq!(Grade::from_composite(4.0), Grade::Poor);
        assert_eq!(Grade::from_composite(3.99), Grade::Failing);
    }

    #[test]
    fn grade_is_monotonic_in_composite() {
        let mut previous = Grade::from_composite(1.0);
        let mut c = 1.0;
        while c <= 10.0 {
            let g = Grade::from_composite(c);
            assert!(g >= previous, "grade dropped at {c}");
            previous = g;
            c += 0.05;
        }
    }

    #[test]
    fn composite_stays_in_range() {
        let low = CategoryScore::new("x", 1.0, 0.5, vec![]);
        assert_eq!(composite_of(&[&low]), 1.0);
        let high = CategoryScore::new("x", 10.0, 1.0, vec![]);
        assert_eq!(composite_of(&[&high, &high]), 10.0);
    }
}
