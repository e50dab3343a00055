//! Category D: protein, cuisine and meal variety across the plan.

use std::collections::BTreeSet;

use super::{CategoryScore, WEIGHT_VARIETY};
use crate::model::{CompiledDay, MealPlanCompiled};

const PROTEIN_REPEAT_PENALTY: f64 = 0.25;
const PROTEIN_REPEAT_CAP: f64 = 2.0;
const NAME_REPEAT_PENALTY: f64 = 0.5;
const NAME_REPEAT_CAP: f64 = 3.0;
/// A meal name repeats if it appeared on this day or the two before it.
const NAME_WINDOW_DAYS: usize = 3;

fn proteins_of(day: &CompiledDay) -> BTreeSet<String> {
    day.meals
        .iter()
        .filter_map(|m| m.primary_protein.as_deref())
        .map(|p| p.trim().to_lowercase())
        .collect()
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Proteins shared by immediately consecutive days, summed over the plan.
pub fn consecutive_protein_repeats(plan: &MealPlanCompiled) -> usize {
    plan.days
        .windows(2)
        .map(|pair| proteins_of(&pair[0]).intersection(&proteins_of(&pair[1])).count())
        .sum()
}

/// Meals whose name already appeared earlier in the trailing window.
///
/// The window includes the current day, so the same meal served twice on
/// one day counts as a repeat too.
pub fn windowed_name_repeats(plan: &MealPlanCompiled) -> usize {
    let mut repeats = 0;
    for (i, day) in plan.days.iter().enumerate() {
        let start = i.saturating_sub(NAME_WINDOW_DAYS - 1);
        let mut seen: Vec<String> = plan.days[start..i]
            .iter()
            .flat_map(|d| d.meals.iter().map(|m| key(&m.name)))
            .collect();
        for meal in &day.meals {
            let name = key(&meal.name);
            if seen.contains(&name) {
                repeats += 1;
            }
            seen.push(name);
        }
    }
    repeats
}

pub fn score_variety(plan: &MealPlanCompiled) -> CategoryScore {
    let proteins: BTreeSet<String> = plan.days.iter().flat_map(proteins_of).collect();
    let cuisines: BTreeSet<String> = plan.meals().map(|m| key(&m.cuisine)).collect();
    let protein_repeats = consecutive_protein_repeats(plan);
    let name_repeats = windowed_name_repeats(plan);

    let mut score = 10.0;
    let mut evidence = vec![
        format!("{} distinct primary proteins", proteins.len()),
        format!("{} distinct cuisines", cuisines.len()),
    ];

    if proteins.len() < 3 {
        score -= 3.0;
        evidence.push("fewer than 3 proteins (-3)".to_owned());
    } else if proteins.len() < 5 {
        score -= 1.5;
        evidence.push("fewer than 5 proteins (-1.5)".to_owned());
    }

    if cuisines.len() < 2 {
        score -= 2.0;
        evidence.push("single cuisine (-2)".to_owned());
    } else if cuisines.len() < 3 {
        score -= 1.0;
        evidence.push("only 2 cuisines (-1)".to_owned());
    }

    if protein_repeats > 0 {
        let penalty = (protein_repeats as f64 * PROTEIN_REPEAT_PENALTY).min(PROTEIN_REPEAT_CAP);
        score -= penalty;
        evidence.push(format!(
            "{protein_repeats} proteins repeated on consecutive days (-{penalty})"
        ));
    }

    if name_repeats > 0 {
        let penalty = (name_repeats as f64 * NAME_REPEAT_PENALTY).min(NAME_REPEAT_CAP);
        score -= penalty;
        evidence.push(format!(
            "{name_repeats} meals repeated within {NAME_WINDOW_DAYS} days (-{penalty})"
        ));
    }

    CategoryScore::new("Variety", score, WEIGHT_VARIETY, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MealPlanCompiled;
    use crate::scoring::test_support::plan_of;

    /// Assign proteins and cuisines to meals in order.
    fn tag(plan: &mut MealPlanCompiled, proteins: &[&str], cuisines: &[&str]) {
        let mut n = 0;
        for day in &mut plan.days {
            for meal in &mut day.meals {
                meal.primary_protein = Some(proteins[n % proteins.len()].to_owned());
                meal.cuisine = cuisines[n % cuisines.len()].to_owned();
                n += 1;
            }
        }
    }

    #[test]
    fn varied_plan_scores_ten() {
        let mut plan = plan_of(&[
            &[("A", &[]), ("B", &[])],
            &[("C", &[]), ("D", &[])],
            &[("E", &[]), ("F", &[])],
        ]);
        // Day pairs never share a protein.
        tag(
            &mut plan,
            &["chicken", "tofu", "salmon", "beef", "egg", "lentils"],
            &["thai", "mexican", "italian"],
        );
        assert_eq!(consecutive_protein_repeats(&plan), 0);
        assert_eq!(score_variety(&plan).score, 10.0);
    }

    #[test]
    fn repeats_inside_window_only() {
        let plan = plan_of(&[
            &[("Oats", &[])],
            &[("Salad", &[])],
            &[("Oats", &[])],
            &[("Salad", &[])],
            &[("Curry", &[])],
            &[("Curry", &[])],
        ]);
        // Day 3 repeats day 1, day 4 repeats day 2, day 6 repeats day 5.
        assert_eq!(windowed_name_repeats(&plan), 3);

        let spaced = plan_of(&[&[("Oats", &[])], &[("A", &[])], &[("B", &[])], &[("Oats", &[])]]);
        assert_eq!(windowed_name_repeats(&spaced), 0);
    }

    #[test]
    fn same_day_duplicate_is_a_repeat() {
        let plan = plan_of(&[&[("Oats", &[]), ("Salad", &[]), ("oats ", &[])]]);
        assert_eq!(windowed_name_repeats(&plan), 1);

        let plan = plan_of(&[&[("Oats", &[]), ("Oats", &[])], &[("Oats", &[])]]);
        // Second serving on day 1, then day 2 repeats day 1.
        assert_eq!(windowed_name_repeats(&plan), 2);
    }

    #[test]
    fn monotonous_plan_is_penalized_and_clamped() {
        let day: &[(&str, &[&str])] = &[("Chicken Rice", &[]), ("Chicken Rice", &[])];
        let mut plan = plan_of(&[day; 7]);
        tag(&mut plan, &["chicken"], &["american"]);
        let score = score_variety(&plan);
        // -3 proteins, -2 cuisines, -1.5 consecutive (6 x 0.25), -3 names (capped)
        assert_eq!(score.score, 1.0);
    }
}
