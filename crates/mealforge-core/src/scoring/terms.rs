//! Term tables for allergen and diet scanning.
//!
//! Terms are matched on whole words (see [`super::compliance`]), so `egg`
//! does not hit `eggplant`. Each family lists phrases to blank out before
//! matching, for foods whose names contain a term without containing the
//! ingredient (`coconut milk` is not dairy).

use crate::model::DietaryStyle;

/// A named group of terms plus the phrases that exempt a match.
#[derive(Debug, Clone, Copy)]
pub struct TermFamily {
    pub name: &'static str,
    pub terms: &'static [&'static str],
    pub exempt: &'static [&'static str],
}

pub const PEANUT: TermFamily = TermFamily {
    name: "peanut",
    terms: &["peanut", "peanut butter", "groundnut"],
    exempt: &[],
};

pub const TREE_NUT: TermFamily = TermFamily {
    name: "tree nut",
    terms: &[
        "almond", "walnut", "cashew", "pecan", "pistachio", "hazelnut", "macadamia", "pine nut",
        "brazil nut",
    ],
    exempt: &[],
};

pub const DAIRY: TermFamily = TermFamily {
    name: "dairy",
    terms: &[
        "milk", "cheese", "butter", "cream", "yogurt", "yoghurt", "whey", "casein", "ghee",
        "parmesan", "mozzarella", "feta", "cheddar", "ricotta", "paneer",
    ],
    exempt: &[
        "coconut milk",
        "almond milk",
        "oat milk",
        "soy milk",
        "peanut butter",
        "almond butter",
        "cocoa butter",
        "coconut cream",
    ],
};

pub const EGG: TermFamily = TermFamily {
    name: "egg",
    terms: &["egg", "mayonnaise", "meringue"],
    exempt: &[],
};

pub const FISH: TermFamily = TermFamily {
    name: "fish",
    terms: &[
        "fish", "salmon", "tuna", "cod", "tilapia", "trout", "anchovy", "sardine", "halibut",
        "mackerel",
    ],
    exempt: &[],
};

pub const SHELLFISH: TermFamily = TermFamily {
    name: "shellfish",
    terms: &[
        "shellfish", "shrimp", "prawn", "crab", "lobster", "clam", "mussel", "oyster", "scallop",
    ],
    exempt: &[],
};

pub const SOY: TermFamily = TermFamily {
    name: "soy",
    terms: &["soy", "soy sauce", "tofu", "tempeh", "edamame", "miso", "tamari"],
    exempt: &[],
};

pub const GLUTEN: TermFamily = TermFamily {
    name: "gluten",
    terms: &[
        "wheat", "flour", "bread", "pasta", "couscous", "barley", "rye", "seitan", "tortilla",
        "noodle", "breadcrumb", "soy sauce", "granola",
    ],
    exempt: &["rice noodles", "rice noodle", "corn tortilla"],
};

pub const SESAME: TermFamily = TermFamily {
    name: "sesame",
    terms: &["sesame", "tahini", "hummus"],
    exempt: &[],
};

pub const MEAT: TermFamily = TermFamily {
    name: "meat",
    terms: &[
        "chicken", "beef", "pork", "turkey", "lamb", "bacon", "ham", "sausage", "steak",
        "prosciutto", "chorizo", "duck", "veal", "burger",
    ],
    exempt: &[],
};

pub const OTHER_ANIMAL: TermFamily = TermFamily {
    name: "animal product",
    terms: &["honey", "gelatin"],
    exempt: &[],
};

pub const HIGH_CARB: TermFamily = TermFamily {
    name: "high-carb",
    terms: &[
        "rice", "oats", "pasta", "bread", "potato", "banana", "quinoa", "tortilla", "noodle",
        "honey", "sugar", "beans", "lentils", "chickpeas", "granola", "couscous", "hummus",
        "rice cakes",
    ],
    exempt: &["green beans"],
};

pub const GRAIN: TermFamily = TermFamily {
    name: "grain",
    terms: &[
        "rice", "oats", "pasta", "bread", "quinoa", "tortilla", "noodle", "couscous", "granola",
        "wheat", "flour", "barley",
    ],
    exempt: &[],
};

pub const LEGUME: TermFamily = TermFamily {
    name: "legume",
    terms: &[
        "beans", "lentils", "chickpeas", "peanut", "tofu", "tempeh", "soy", "hummus", "edamame",
    ],
    exempt: &["green beans"],
};

pub const REFINED_SUGAR: TermFamily = TermFamily {
    name: "refined sugar",
    terms: &["sugar", "syrup"],
    exempt: &["maple syrup"],
};

/// Map a declared allergy to the families it covers.
///
/// Returns an empty slice for allergies the table does not know; those are
/// matched literally.
pub fn allergy_families(declared: &str) -> &'static [TermFamily] {
    match declared.trim().to_lowercase().as_str() {
        "peanut" | "peanuts" | "groundnut" | "groundnuts" => &[PEANUT],
        "tree nut" | "tree nuts" | "tree_nuts" | "tree-nuts" => &[TREE_NUT],
        "nut" | "nuts" => &[PEANUT, TREE_NUT],
        "dairy" | "milk" | "lactose" => &[DAIRY],
        "egg" | "eggs" => &[EGG],
        "fish" => &[FISH],
        "shellfish" | "crustacean" | "crustaceans" => &[SHELLFISH],
        "seafood" => &[FISH, SHELLFISH],
        "soy" | "soya" => &[SOY],
        "gluten" | "wheat" | "celiac" | "coeliac" => &[GLUTEN],
        "sesame" => &[SESAME],
        _ => &[],
    }
}

/// Families a dietary style forbids.
pub fn forbidden_for(style: DietaryStyle) -> &'static [TermFamily] {
    match style {
        DietaryStyle::Omnivore => &[],
        DietaryStyle::Vegetarian => &[MEAT, FISH, SHELLFISH],
        DietaryStyle::Pescatarian => &[MEAT],
        DietaryStyle::Vegan => &[MEAT, FISH, SHELLFISH, DAIRY, EGG, OTHER_ANIMAL],
        DietaryStyle::Keto => &[HIGH_CARB],
        DietaryStyle::Paleo => &[DAIRY, GRAIN, LEGUME, REFINED_SUGAR],
    }
}
