//! Category E: how shoppable the plan is.

use std::collections::BTreeMap;

use super::{CategoryScore, WEIGHT_GROCERY};
use crate::model::MealPlanCompiled;

/// Ingredient name (trimmed, lowercased) to number of uses across the plan.
pub fn ingredient_uses(plan: &MealPlanCompiled) -> BTreeMap<String, usize> {
    let mut uses = BTreeMap::new();
    for meal in plan.meals() {
        for ingredient in &meal.ingredients {
            *uses
                .entry(ingredient.name.trim().to_lowercase())
                .or_insert(0) += 1;
        }
    }
    uses
}

pub fn score_grocery(plan: &MealPlanCompiled) -> CategoryScore {
    let uses = ingredient_uses(plan);
    let unique = uses.len();
    if unique == 0 {
        return CategoryScore::new(
            "Grocery Feasibility",
            1.0,
            WEIGHT_GROCERY,
            vec!["plan has no ingredients".to_owned()],
        );
    }
    let total: usize = uses.values().sum();
    let reuse = total as f64 / unique as f64;

    let mut score = 10.0;
    let mut evidence = vec![
        format!("{unique} unique ingredients"),
        format!("each ingredient used {reuse:.2} times on average"),
    ];

    if unique < 10 {
        score -= 3.0;
        evidence.push("very short ingredient list (-3)".to_owned());
    } else if unique < 15 {
        score -= 2.0;
        evidence.push("short ingredient list (-2)".to_owned());
    } else if unique > 80 {
        score -= 3.0;
        evidence.push("very long shopping list (-3)".to_owned());
    } else if unique > 60 {
        score -= 1.5;
        evidence.push("long shopping list (-1.5)".to_owned());
    }

    if reuse < 1.5 {
        score -= 2.5;
        evidence.push("ingredients rarely reused (-2.5)".to_owned());
    } else if reuse < 2.0 {
        score -= 1.0;
        evidence.push("limited ingredient reuse (-1)".to_owned());
    }

    CategoryScore::new("Grocery Feasibility", score, WEIGHT_GROCERY, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::plan_of;

    #[test]
    fn names_are_case_insensitive() {
        let plan = plan_of(&[&[("A", &["Rice", " rice", "Beans"])]]);
        let uses = ingredient_uses(&plan);
        assert_eq!(uses["rice"], 2);
        assert_eq!(uses.len(), 2);
    }

    #[test]
    fn reuse_penalties() {
        let names: Vec<String> = (0..20).map(|i| format!("food {i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        // 20 unique, each used once.
        let plan = plan_of(&[&[("A", &refs[..])]]);
        assert_eq!(score_grocery(&plan).score, 7.5);
        // Used twice each.
        let plan = plan_of(&[&[("A", &refs[..]), ("B", &refs[..])]]);
        assert_eq!(score_grocery(&plan).score, 10.0);
    }
}
