//! Category A: how closely each day's nutrition matches its target.

use super::{CategoryScore, WEIGHT_ACCURACY};
use crate::model::{ClientIntake, MacroTargets, MealPlanCompiled, MetabolicProfile, Nutrition};

const KCAL_WEIGHT: f64 = 0.4;
const PROTEIN_WEIGHT: f64 = 0.3;
const CARB_WEIGHT: f64 = 0.15;
const FAT_WEIGHT: f64 = 0.15;

/// `(max weighted error, score)`, checked in order.
const ERROR_STEPS: [(f64, f64); 9] = [
    (0.03, 10.0),
    (0.05, 9.0),
    (0.08, 8.0),
    (0.10, 7.0),
    (0.15, 6.0),
    (0.20, 5.0),
    (0.30, 4.0),
    (0.40, 3.0),
    (0.50, 2.0),
];

/// `|actual - target| / target`. A zero target is met only by zero.
pub fn relative_error(actual: f64, target: f64) -> f64 {
    if target <= 0.0 {
        if actual.abs() < f64::EPSILON { 0.0 } else { 1.0 }
    } else {
        (actual - target).abs() / target
    }
}

/// Per-macro relative errors of one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayError {
    pub kcal: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl DayError {
    pub fn between(actual: &Nutrition, target: &MacroTargets) -> Self {
        Self {
            kcal: relative_error(actual.kcal, target.kcal),
            protein: relative_error(actual.protein_g, target.protein_g),
            carbs: relative_error(actual.carbs_g, target.carbs_g),
            fat: relative_error(actual.fat_g, target.fat_g),
        }
    }

    pub fn weighted(&self) -> f64 {
        KCAL_WEIGHT * self.kcal
            + PROTEIN_WEIGHT * self.protein
            + CARB_WEIGHT * self.carbs
            + FAT_WEIGHT * self.fat
    }
}

pub fn score_for_error(error: f64) -> f64 {
    ERROR_STEPS
        .iter()
        .find(|(max, _)| error <= *max)
        .map_or(1.0, |(_, score)| *score)
}

/// Targets are chosen from the weekday of each day, not from the day's own
/// flag, so a mislabeled day is judged against what the client declared.
pub fn score_accuracy(
    plan: &MealPlanCompiled,
    intake: &ClientIntake,
    profile: &MetabolicProfile,
) -> CategoryScore {
    if plan.days.is_empty() {
        return CategoryScore::new(
            "Nutritional Accuracy",
            1.0,
            WEIGHT_ACCURACY,
            vec!["plan has no days".to_owned()],
        );
    }

    let mut evidence = Vec::new();
    let mut total = 0.0;
    let mut worst: Option<(u32, f64)> = None;

    for day in &plan.days {
        let training = intake.is_training_day(day.weekday);
        let target = profile.target_for(training);
        let error = DayError::between(&day.totals, &target).weighted();
        total += error;
        if worst.is_none_or(|(_, w)| error > w) {
            worst = Some((day.day_index, error));
        }
    }

    let average = total / plan.days.len() as f64;
    evidence.push(format!(
        "average weighted macro error {:.1}% across {} days",
        average * 100.0,
        plan.days.len()
    ));
    if let Some((index, error)) = worst {
        evidence.push(format!("largest error on day {}: {:.1}%", index + 1, error * 100.0));
    }

    CategoryScore::new(
        "Nutritional Accuracy",
        score_for_error(average),
        WEIGHT_ACCURACY,
        evidence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Weekday;
    use crate::scoring::test_support::{intake, plan_of, profile};

    #[test]
    fn step_table_boundaries() {
        assert_eq!(score_for_error(0.0), 10.0);
        assert_eq!(score_for_error(0.03), 10.0);
        assert_eq!(score_for_error(0.031), 9.0);
        assert_eq!(score_for_error(0.10), 7.0);
        assert_eq!(score_for_error(0.50), 2.0);
        assert_eq!(score_for_error(0.51), 1.0);
    }

    #[test]
    fn zero_target() {
        assert_eq!(relative_error(0.0, 0.0), 0.0);
        assert_eq!(relative_error(5.0, 0.0), 1.0);
    }

    #[test]
    fn training_day_target_drives_error() {
        let mut i = intake();
        i.training_days = [Weekday::Monday, Weekday::Wednesday, Weekday::Friday]
            .into_iter()
            .collect();
        let p = profile();

        let monday = p.target_for(i.is_training_day(Weekday::Monday));
        let tuesday = p.target_for(i.is_training_day(Weekday::Tuesday));
        assert_eq!(monday.kcal, 2200.0);
        assert_eq!(tuesday.kcal, 2000.0);

        let actual = Nutrition {
            kcal: 2100.0,
            ..Nutrition::from(monday)
        };
        let err = DayError::between(&actual, &monday);
        assert!((err.kcal - 100.0 / 2200.0).abs() < 1e-12);
        assert!((err.kcal - 0.045).abs() < 0.001);
    }

    #[test]
    fn exact_plan_scores_ten() {
        let i = intake();
        let p = profile();
        let mut plan = plan_of(&[&[("A", &["x"])], &[("B", &["y"])]]);
        for day in &mut plan.days {
            day.totals = p.base.into();
        }
        assert_eq!(score_accuracy(&plan, &i, &p).score, 10.0);
    }

    #[test]
    fn empty_plan_scores_one() {
        let plan = plan_of(&[]);
        assert_eq!(score_accuracy(&plan, &intake(), &profile()).score, 1.0);
    }
}
