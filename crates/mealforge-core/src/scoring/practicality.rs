//! Category B: can this client realistically cook the plan.

use super::{CategoryScore, WEIGHT_PRACTICALITY};
use crate::model::{ClientIntake, MealPlanCompiled};

const LOW_SKILL: u32 = 3;

pub fn score_practicality(plan: &MealPlanCompiled, intake: &ClientIntake) -> CategoryScore {
    let meals: Vec<_> = plan.meals().collect();
    if meals.is_empty() {
        return CategoryScore::new(
            "Practicality",
            1.0,
            WEIGHT_PRACTICALITY,
            vec!["plan has no meals".to_owned()],
        );
    }

    let count = meals.len() as f64;
    let avg_ingredients = meals.iter().map(|m| m.ingredients.len()).sum::<usize>() as f64 / count;
    let avg_minutes = meals.iter().map(|m| f64::from(m.total_minutes())).sum::<f64>() / count;
    let ceiling = f64::from(intake.prep_time_max);
    let over = meals
        .iter()
        .filter(|m| f64::from(m.total_minutes()) > 1.5 * ceiling)
        .count() as f64
        / count;

    let mut score = 10.0;
    let mut evidence = vec![
        format!("{avg_ingredients:.1} ingredients per meal on average"),
        format!(
            "{:.0}% of meals exceed 1.5x the {}-minute prep ceiling",
            over * 100.0,
            intake.prep_time_max
        ),
    ];

    if !(3.0..=12.0).contains(&avg_ingredients) {
        score -= 3.0;
        evidence.push("ingredient count far outside 4-8 per meal (-3)".to_owned());
    } else if !(4.0..=8.0).contains(&avg_ingredients) {
        score -= 1.5;
        evidence.push("ingredient count outside 4-8 per meal (-1.5)".to_owned());
    }

    if over > 0.30 {
        score -= 3.0;
        evidence.push("many meals take too long (-3)".to_owned());
    } else if over > 0.15 {
        score -= 1.5;
        evidence.push("several meals take too long (-1.5)".to_owned());
    } else if over > 0.0 {
        score -= 0.5;
        evidence.push("a few meals take too long (-0.5)".to_owned());
    }

    if intake.cooking_skill <= LOW_SKILL && (avg_ingredients > 7.0 || avg_minutes > ceiling) {
        score -= 1.0;
        evidence.push(format!(
            "demanding recipes for cooking skill {} (-1)",
            intake.cooking_skill
        ));
    }

    CategoryScore::new("Practicality", score, WEIGHT_PRACTICALITY, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::{intake, plan_of};

    const FIVE: &[&str] = &["a", "b", "c", "d", "e"];

    #[test]
    fn simple_plan_scores_ten() {
        let plan = plan_of(&[&[("M1", FIVE), ("M2", FIVE)]]);
        assert_eq!(score_practicality(&plan, &intake()).score, 10.0);
    }

    #[test]
    fn ingredient_count_penalties() {
        let two: &[&str] = &["a", "b"];
        let plan = plan_of(&[&[("M1", two), ("M2", two)]]);
        assert_eq!(score_practicality(&plan, &intake()).score, 7.0);

        let nine: &[&str] = &["a", "b", "c", "d", "e", "f", "g", "h", "i"];
        let plan = plan_of(&[&[("M1", nine)]]);
        assert_eq!(score_practicality(&plan, &intake()).score, 8.5);
    }

    #[test]
    fn slow_meals_and_low_skill() {
        let mut plan = plan_of(&[&[("M1", FIVE), ("M2", FIVE), ("M3", FIVE), ("M4", FIVE)]]);
        // One of four meals (25%) runs 100 minutes against a 45-minute ceiling.
        plan.days[0].meals[0].cook_minutes = 90;
        let mut i = intake();
        assert_eq!(score_practicality(&plan, &i).score, 8.5);

        i.cooking_skill = 2;
        i.prep_time_max = 15;
        // Still one slow meal, and the 40-minute average exceeds the ceiling.
        assert_eq!(score_practicality(&plan, &i).score, 7.5);
    }

    #[test]
    fn empty_plan_scores_one() {
        assert_eq!(score_practicality(&plan_of(&[]), &intake()).score, 1.0);
    }
}
