//! Stage 6: grocery list, summary and a markdown rendering of the plan.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::PipelineError;
use crate::model::{
    GroceryItem, MealPlanCompiled, MealPlanValidated, Nutrition, PlanSummary, RenderedPlan,
};
use crate::scoring::ScorecardResult;

/// Every ingredient with its total quantity, alphabetically.
pub fn grocery_list(plan: &MealPlanCompiled) -> Vec<GroceryItem> {
    let mut items: BTreeMap<String, GroceryItem> = BTreeMap::new();
    for ingredient in plan.meals().flat_map(|m| m.ingredients.iter()) {
        let name = ingredient.name.trim().to_lowercase();
        let item = items.entry(name.clone()).or_insert(GroceryItem {
            name,
            total_grams: 0.0,
            uses: 0,
        });
        item.total_grams += ingredient.grams;
        item.uses += 1;
    }
    items.into_values().collect()
}

pub fn summarize(plan: &MealPlanCompiled, scorecard: &ScorecardResult) -> PlanSummary {
    let days = plan.days.len();
    let mut actual = Nutrition::default();
    let mut target = Nutrition::default();
    for day in &plan.days {
        actual += day.totals;
        target += Nutrition::from(day.target);
    }
    let per_day = if days == 0 { 0.0 } else { 1.0 / days as f64 };
    PlanSummary {
        day_count: days,
        meal_count: plan.meals().count(),
        average_daily: actual.scaled(per_day),
        average_target: target.scaled(per_day),
        composite: scorecard.composite,
        grade: scorecard.grade,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn markdown(
    validated: &MealPlanValidated,
    summary: &PlanSummary,
    groceries: &[GroceryItem],
) -> Result<String, std::fmt::Error> {
    let plan = &validated.plan;
    let card = &validated.scorecard;
    let mut out = String::new();

    writeln!(out, "# Meal Plan")?;
    writeln!(out)?;
    writeln!(
        out,
        "**Score:** {:.2}/10 ({}), {} days, {} meals",
        summary.composite, summary.grade, summary.day_count, summary.meal_count
    )?;
    writeln!(
        out,
        "**Daily average:** {:.0} kcal, {:.0} g protein, {:.0} g carbs, {:.0} g fat",
        summary.average_daily.kcal,
        summary.average_daily.protein_g,
        summary.average_daily.carbs_g,
        summary.average_daily.fat_g
    )?;
    writeln!(out)?;

    writeln!(out, "| Category | Score | Weight |")?;
    writeln!(out, "|---|---|---|")?;
    for category in card.categories() {
        writeln!(
            out,
            "| {} | {:.1} | {:.2} |",
            category.name, category.score, category.weight
        )?;
    }

    for day in &plan.days {
        writeln!(out)?;
        let training = if day.is_training_day { " (training)" } else { "" };
        writeln!(
            out,
            "## Day {}: {}{training}",
            day.day_index + 1,
            capitalize(day.weekday.as_str())
        )?;
        writeln!(
            out,
            "Target {:.0} kcal, planned {:.0} kcal",
            day.target.kcal, day.totals.kcal
        )?;
        for meal in &day.meals {
            writeln!(out)?;
            writeln!(
                out,
                "### {}: {}",
                capitalize(meal.slot.as_str()),
                meal.name
            )?;
            writeln!(
                out,
                "_{} · {} min · {:.0} kcal · P {:.0} g · C {:.0} g · F {:.0} g_",
                meal.cuisine,
                meal.total_minutes(),
                meal.nutrition.kcal,
                meal.nutrition.protein_g,
                meal.nutrition.carbs_g,
                meal.nutrition.fat_g
            )?;
            for ingredient in &meal.ingredients {
                writeln!(out, "- {:.0} g {}", ingredient.grams, ingredient.name)?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "## Grocery List")?;
    writeln!(out)?;
    for item in groceries {
        writeln!(out, "- {} ({:.0} g)", item.name, item.total_grams)?;
    }

    if !validated.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "## Notes")?;
        writeln!(out)?;
        for warning in &validated.warnings {
            writeln!(out, "- {warning}")?;
        }
    }

    Ok(out)
}

pub fn render_plan(validated: MealPlanValidated) -> Result<RenderedPlan, PipelineError> {
    let grocery_list = grocery_list(&validated.plan);
    let summary = summarize(&validated.plan, &validated.scorecard);
    let markdown = markdown(&validated, &summary, &grocery_list)
        .map_err(|e| PipelineError::Render(e.to_string()))?;
    Ok(RenderedPlan {
        validated,
        grocery_list,
        summary,
        markdown,
    })
}
