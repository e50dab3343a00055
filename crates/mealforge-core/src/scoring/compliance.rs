//! Category C: dietary compliance.
//!
//! Meal names and ingredient names are tokenized into lowercase words and
//! scanned for allergen terms (declared allergies expanded through
//! [`super::terms`]), terms the dietary style forbids, and declared
//! exclusions. A single allergen hit floors the category at 1.

use serde::{Deserialize, Serialize};

use super::terms::{allergy_families, forbidden_for, TermFamily};
use super::{CategoryScore, WEIGHT_COMPLIANCE};
use crate::model::{ClientIntake, MealPlanCompiled};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Allergen,
    Dietary,
    Exclusion,
}

/// A term found where the client's rules forbid it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub kind: ViolationKind,
    pub day_index: u32,
    pub meal: String,
    /// The allergy, diet family or exclusion that was hit.
    pub rule: String,
    pub term: String,
}

/// A rule hit inside one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: ViolationKind,
    pub rule: String,
    pub term: String,
}

#[derive(Debug, Clone)]
struct Rule {
    kind: ViolationKind,
    label: String,
    terms: Vec<String>,
    exempt: Vec<String>,
}

impl Rule {
    fn from_family(kind: ViolationKind, label: &str, family: &TermFamily) -> Self {
        Self {
            kind,
            label: label.to_owned(),
            terms: family.terms.iter().map(|t| t.to_string()).collect(),
            exempt: family.exempt.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn literal(kind: ViolationKind, term: &str) -> Self {
        Self {
            kind,
            label: term.to_owned(),
            terms: vec![term.to_owned()],
            exempt: Vec::new(),
        }
    }
}

/// Everything the client must not be served, compiled once per intake.
#[derive(Debug, Clone)]
pub struct ComplianceRules {
    rules: Vec<Rule>,
}

impl ComplianceRules {
    pub fn for_intake(intake: &ClientIntake) -> Self {
        let mut rules = Vec::new();

        for allergy in &intake.allergies {
            let families = allergy_families(allergy);
            if families.is_empty() {
                rules.push(Rule::literal(ViolationKind::Allergen, allergy));
            }
            for family in families {
                rules.push(Rule::from_family(ViolationKind::Allergen, allergy, family));
            }
        }

        for family in forbidden_for(intake.dietary_style) {
            let label = format!("{} ({})", intake.dietary_style.as_str(), family.name);
            rules.push(Rule::from_family(ViolationKind::Dietary, &label, family));
        }

        for exclusion in &intake.exclusions {
            rules.push(Rule::literal(ViolationKind::Exclusion, exclusion));
        }

        Self { rules }
    }

    /// Every rule hit in `text`, at most one finding per rule.
    pub fn scan(&self, text: &str) -> Vec<Finding> {
        let words = tokenize(text);
        let mut findings = Vec::new();
        for rule in &self.rules {
            let cleaned = blank_phrases(&words, &rule.exempt);
            if let Some(term) = rule.terms.iter().find(|t| contains_term(&cleaned, t)) {
                findings.push(Finding {
                    kind: rule.kind,
                    rule: rule.label.clone(),
                    term: term.clone(),
                });
            }
        }
        findings
    }

    /// Findings for a meal's name and ingredients, deduplicated so that the
    /// same term in the name and an ingredient counts once.
    pub fn scan_meal<'a>(
        &self,
        name: &'a str,
        ingredients: impl IntoIterator<Item = &'a str>,
    ) -> Vec<Finding> {
        let mut out: Vec<Finding> = Vec::new();
        let texts = std::iter::once(name).chain(ingredients);
        for text in texts {
            for finding in self.scan(text) {
                if !out.contains(&finding) {
                    out.push(finding);
                }
            }
        }
        out
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `token` is `word` or a regular plural of it.
fn plural_of(token: &str, word: &str) -> bool {
    if token == word {
        return true;
    }
    if let Some(stem) = token.strip_suffix("es") {
        if stem == word {
            return true;
        }
    }
    if let Some(stem) = token.strip_suffix('s') {
        if stem == word {
            return true;
        }
    }
    if let (Some(t), Some(w)) = (token.strip_suffix("ies"), word.strip_suffix('y')) {
        return t == w;
    }
    false
}

fn word_matches(token: &str, word: &str) -> bool {
    plural_of(token, word) || plural_of(word, token)
}

/// Rule terms are split exactly like the text they are matched against.
fn contains_term(words: &[String], term: &str) -> bool {
    let parts = tokenize(term);
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words
        .windows(parts.len())
        .any(|window| window.iter().zip(&parts).all(|(w, p)| word_matches(w, p)))
}

/// Replace every occurrence of the given phrases with empty words.
fn blank_phrases(words: &[String], phrases: &[String]) -> Vec<String> {
    let mut out = words.to_vec();
    for phrase in phrases {
        let parts = tokenize(phrase);
        if parts.is_empty() || parts.len() > out.len() {
            continue;
        }
        for start in 0..=out.len() - parts.len() {
            let hit = out[start..start + parts.len()]
                .iter()
                .zip(&parts)
                .all(|(w, p)| word_matches(w, p));
            if hit {
                for w in &mut out[start..start + parts.len()] {
                    w.clear();
                }
            }
        }
    }
    out
}

/// Violations found in a plan, split into allergens and everything else.
#[derive(Debug, Clone, Default)]
pub struct ComplianceFindings {
    pub allergens: Vec<Violation>,
    /// Dietary-style violations and exclusion hits.
    pub dietary: Vec<Violation>,
}

pub fn find_violations(plan: &MealPlanCompiled, rules: &ComplianceRules) -> ComplianceFindings {
    let mut findings = ComplianceFindings::default();
    for day in &plan.days {
        for meal in &day.meals {
            let hits = rules.scan_meal(&meal.name, meal.ingredients.iter().map(|i| i.name.as_str()));
            for hit in hits {
                let violation = Violation {
                    kind: hit.kind,
                    day_index: day.day_index,
                    meal: meal.name.clone(),
                    rule: hit.rule,
                    term: hit.term,
                };
                match hit.kind {
                    ViolationKind::Allergen => findings.allergens.push(violation),
                    ViolationKind::Dietary | ViolationKind::Exclusion => {
                        findings.dietary.push(violation)
                    }
                }
            }
        }
    }
    findings
}

fn violation_bucket(count: usize) -> f64 {
    match count {
        0 => 10.0,
        1..=2 => 6.0,
        3..=5 => 4.0,
        _ => 2.0,
    }
}

pub fn score_compliance(findings: &ComplianceFindings) -> CategoryScore {
    let mut evidence = Vec::new();

    let score = if !findings.allergens.is_empty() {
        for v in &findings.allergens {
            evidence.push(format!(
                "day {}: '{}' contains {} (allergy: {})",
                v.day_index + 1,
                v.meal,
                v.term,
                v.rule
            ));
        }
        1.0
    } else {
        for v in &findings.dietary {
            evidence.push(format!(
                "day {}: '{}' contains {} ({})",
                v.day_index + 1,
                v.meal,
                v.term,
                v.rule
            ));
        }
        violation_bucket(findings.dietary.len())
    };

    if evidence.is_empty() {
        evidence.push("no allergen or dietary violations".to_owned());
    }

    CategoryScore::new("Dietary Compliance", score, WEIGHT_COMPLIANCE, evidence)
}
