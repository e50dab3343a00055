//! The built-in recipe library behind deterministic curation.
//!
//! Quantities are one reference portion; the curator scales them to each
//! slot's calorie budget. Every ingredient is present in the built-in
//! [`super::nutrition::FoodTable`].

use crate::model::MealSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Course {
    Breakfast,
    Main,
    Snack,
}

impl Course {
    pub fn for_slot(slot: MealSlot) -> Self {
        match slot {
            MealSlot::Breakfast => Self::Breakfast,
            MealSlot::Lunch | MealSlot::Dinner => Self::Main,
            MealSlot::Snack => Self::Snack,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    pub name: &'static str,
    pub course: Course,
    pub cuisine: &'static str,
    pub protein: &'static str,
    pub prep_minutes: u32,
    pub cook_minutes: u32,
    /// 1 (assemble) to 10 (restaurant technique).
    pub difficulty: u32,
    /// `(ingredient, grams)`.
    pub ingredients: &'static [(&'static str, f64)],
}

const fn recipe(
    name: &'static str,
    course: Course,
    cuisine: &'static str,
    protein: &'static str,
    (prep_minutes, cook_minutes, difficulty): (u32, u32, u32),
    ingredients: &'static [(&'static str, f64)],
) -> Recipe {
    Recipe {
        name,
        course,
        cuisine,
        protein,
        prep_minutes,
        cook_minutes,
        difficulty,
        ingredients,
    }
}

use Course::{Breakfast, Main, Snack};

pub const RECIPES: &[Recipe] = &[
    // -- breakfast --------------------------------------------------------
    recipe("Greek Yogurt Berry Bowl", Breakfast, "mediterranean", "dairy", (5, 0, 1), &[
        ("greek yogurt", 250.0), ("blueberries", 100.0), ("granola", 40.0),
        ("honey", 10.0), ("chia seeds", 10.0),
    ]),
    recipe("Spinach Feta Omelette", Breakfast, "mediterranean", "egg", (5, 10, 3), &[
        ("eggs", 150.0), ("spinach", 60.0), ("feta", 30.0), ("tomato", 80.0),
        ("olive oil", 5.0),
    ]),
    recipe("Overnight Oats with Banana", Breakfast, "american", "dairy", (5, 0, 1), &[
        ("rolled oats", 60.0), ("milk", 200.0), ("banana", 100.0), ("chia seeds", 10.0),
        ("peanut butter", 15.0),
    ]),
    recipe("Tofu Veggie Scramble", Breakfast, "american", "tofu", (10, 10, 3), &[
        ("tofu", 200.0), ("spinach", 50.0), ("bell pepper", 80.0), ("onion", 50.0),
        ("mushrooms", 60.0), ("olive oil", 5.0),
    ]),
    recipe("Avocado Egg Toast", Breakfast, "american", "egg", (5, 5, 2), &[
        ("whole wheat bread", 70.0), ("avocado", 70.0), ("eggs", 100.0), ("tomato", 60.0),
        ("lemon", 10.0),
    ]),
    recipe("Blueberry Protein Oatmeal", Breakfast, "american", "whey", (3, 5, 1), &[
        ("rolled oats", 60.0), ("whey protein", 30.0), ("almond milk", 250.0),
        ("blueberries", 80.0), ("walnuts", 15.0),
    ]),
    recipe("Bacon Zucchini Frittata", Breakfast, "italian", "pork", (10, 20, 4), &[
        ("eggs", 150.0), ("bacon", 30.0), ("zucchini", 80.0), ("onion", 40.0),
        ("cheddar", 20.0), ("butter", 5.0),
    ]),
    recipe("Coconut Chia Pudding", Breakfast, "caribbean", "seeds", (5, 0, 1), &[
        ("chia seeds", 40.0), ("coconut milk", 150.0), ("almond milk", 100.0),
        ("hemp seeds", 20.0), ("blueberries", 60.0),
    ]),
    recipe("Smoked Salmon Scramble", Breakfast, "nordic", "salmon", (5, 8, 3), &[
        ("eggs", 150.0), ("salmon fillet", 80.0), ("spinach", 40.0), ("cucumber", 60.0),
        ("olive oil", 5.0),
    ]),
    recipe("Sweet Potato Turkey Hash", Breakfast, "mexican", "turkey", (10, 20, 4), &[
        ("sweet potato", 200.0), ("ground turkey", 120.0), ("bell pepper", 80.0),
        ("onion", 50.0), ("olive oil", 10.0), ("cilantro", 5.0),
    ]),
    recipe("Black Bean Breakfast Burrito", Breakfast, "mexican", "egg", (10, 10, 3), &[
        ("corn tortilla", 60.0), ("eggs", 100.0), ("black beans", 80.0), ("salsa", 50.0),
        ("avocado", 50.0), ("cheddar", 20.0),
    ]),
    // -- lunch and dinner -------------------------------------------------
    recipe("Lemon Herb Chicken with Quinoa", Main, "mediterranean", "chicken", (15, 25, 4), &[
        ("chicken breast", 180.0), ("quinoa", 150.0), ("broccoli", 120.0), ("lemon", 20.0),
        ("olive oil", 10.0), ("garlic", 5.0),
    ]),
    recipe("Beef and Broccoli Stir Fry", Main, "chinese", "beef", (15, 15, 5), &[
        ("beef sirloin", 170.0), ("broccoli", 150.0), ("brown rice", 150.0),
        ("soy sauce", 15.0), ("garlic", 5.0), ("ginger", 5.0), ("sesame oil", 8.0),
    ]),
    recipe("Roasted Salmon with Asparagus", Main, "american", "salmon", (10, 25, 4), &[
        ("salmon fillet", 170.0), ("asparagus", 120.0), ("sweet potato", 150.0),
        ("olive oil", 10.0), ("lemon", 15.0),
    ]),
    recipe("Chickpea Spinach Curry", Main, "indian", "legumes", (15, 25, 5), &[
        ("chickpeas", 200.0), ("spinach", 100.0), ("tomato", 150.0), ("coconut milk", 80.0),
        ("onion", 60.0), ("curry powder", 8.0), ("brown rice", 150.0),
    ]),
    recipe("Turkey Taco Bowl", Main, "mexican", "turkey", (15, 15, 4), &[
        ("ground turkey", 160.0), ("brown rice", 130.0), ("black beans", 100.0),
        ("salsa", 60.0), ("bell pepper", 80.0), ("avocado", 50.0), ("lime", 10.0),
    ]),
    recipe("Shrimp Rice Noodle Stir Fry", Main, "thai", "shrimp", (20, 15, 6), &[
        ("shrimp", 170.0), ("rice noodles", 180.0), ("bell pepper", 80.0),
        ("cabbage", 80.0), ("soy sauce", 15.0), ("lime", 10.0), ("cilantro", 5.0),
        ("sesame oil", 8.0),
    ]),
    recipe("Mediterranean Tuna Salad", Main, "mediterranean", "tuna", (15, 0, 2), &[
        ("tuna", 150.0), ("mixed greens", 80.0), ("cucumber", 100.0), ("tomato", 100.0),
        ("chickpeas", 80.0), ("olive oil", 12.0), ("feta", 30.0), ("lemon", 10.0),
    ]),
    recipe("Tofu Vegetable Stir Fry", Main, "chinese", "tofu", (15, 15, 4), &[
        ("tofu", 200.0), ("broccoli", 100.0), ("bell pepper", 80.0), ("mushrooms", 80.0),
        ("brown rice", 150.0), ("soy sauce", 15.0), ("ginger", 5.0), ("sesame oil", 8.0),
    ]),
    recipe("Garlic Pork Tenderloin with Green Beans", Main, "american", "pork", (10, 30, 5), &[
        ("pork tenderloin", 180.0), ("green beans", 150.0), ("potato", 200.0),
        ("olive oil", 10.0), ("garlic", 5.0),
    ]),
    recipe("Hearty Lentil Vegetable Soup", Main, "middle eastern", "legumes", (15, 35, 3), &[
        ("lentils", 200.0), ("carrot", 80.0), ("onion", 60.0), ("tomato", 120.0),
        ("spinach", 60.0), ("olive oil", 10.0), ("garlic", 5.0),
        ("whole wheat bread", 50.0),
    ]),
    recipe("Chicken Fajita Bowl", Main, "mexican", "chicken", (15, 15, 4), &[
        ("chicken thigh", 170.0), ("bell pepper", 120.0), ("onion", 60.0),
        ("brown rice", 130.0), ("salsa", 50.0), ("avocado", 40.0), ("lime", 10.0),
    ]),
    recipe("Beef Burger Lettuce Wraps", Main, "american", "beef", (10, 12, 3), &[
        ("ground beef", 150.0), ("mixed greens", 60.0), ("tomato", 60.0), ("onion", 30.0),
        ("avocado", 50.0), ("cheddar", 20.0),
    ]),
    recipe("Cod with Cauliflower Mash", Main, "french", "cod", (15, 20, 5), &[
        ("cod fillet", 200.0), ("cauliflower", 250.0), ("butter", 10.0),
        ("green beans", 100.0), ("lemon", 10.0), ("garlic", 5.0),
    ]),
    recipe("Tempeh Buddha Bowl", Main, "asian", "tempeh", (15, 15, 4), &[
        ("tempeh", 150.0), ("quinoa", 150.0), ("kale", 60.0), ("carrot", 60.0),
        ("tahini", 20.0), ("cucumber", 80.0), ("lemon", 10.0),
    ]),
    recipe("Grilled Chicken Greek Salad", Main, "greek", "chicken", (15, 12, 3), &[
        ("chicken breast", 160.0), ("mixed greens", 80.0), ("cucumber", 80.0),
        ("tomato", 80.0), ("feta", 30.0), ("olive oil", 12.0), ("whole wheat bread", 60.0),
    ]),
    recipe("Moroccan Chickpea Stew", Main, "moroccan", "legumes", (15, 30, 4), &[
        ("chickpeas", 180.0), ("eggplant", 150.0), ("tomato", 150.0), ("onion", 60.0),
        ("olive oil", 10.0), ("quinoa", 120.0),
    ]),
    recipe("Shrimp Scampi with Zucchini Ribbons", Main, "italian", "shrimp", (15, 10, 4), &[
        ("shrimp", 180.0), ("zucchini", 250.0), ("garlic", 8.0), ("butter", 10.0),
        ("olive oil", 10.0), ("lemon", 15.0), ("parmesan", 15.0),
    ]),
    recipe("Whole Wheat Pasta Primavera", Main, "italian", "dairy", (10, 20, 3), &[
        ("whole wheat pasta", 200.0), ("zucchini", 100.0), ("tomato", 100.0),
        ("spinach", 50.0), ("parmesan", 20.0), ("olive oil", 10.0), ("garlic", 5.0),
    ]),
    recipe("Steak with Garlic Mushrooms", Main, "american", "beef", (10, 20, 5), &[
        ("beef sirloin", 180.0), ("mushrooms", 150.0), ("butter", 10.0), ("garlic", 5.0),
        ("asparagus", 100.0), ("olive oil", 5.0),
    ]),
    recipe("Chicken Thigh Cabbage Skillet", Main, "german", "chicken", (10, 25, 3), &[
        ("chicken thigh", 180.0), ("cabbage", 200.0), ("onion", 60.0), ("olive oil", 10.0),
        ("carrot", 60.0), ("garlic", 5.0),
    ]),
    recipe("Salmon Avocado Rice Bowl", Main, "japanese", "salmon", (15, 15, 4), &[
        ("salmon fillet", 150.0), ("white rice", 150.0), ("avocado", 60.0),
        ("cucumber", 80.0), ("soy sauce", 10.0), ("sesame oil", 5.0), ("carrot", 50.0),
    ]),
    recipe("Black Bean Sweet Potato Tacos", Main, "mexican", "legumes", (15, 20, 3), &[
        ("corn tortilla", 90.0), ("black beans", 150.0), ("sweet potato", 150.0),
        ("salsa", 50.0), ("avocado", 50.0), ("lime", 10.0), ("cilantro", 5.0),
    ]),
    // -- snacks -----------------------------------------------------------
    recipe("Apple with Peanut Butter", Snack, "american", "legumes", (2, 0, 1), &[
        ("apple", 180.0), ("peanut butter", 30.0),
    ]),
    recipe("Hummus and Veggie Sticks", Snack, "middle eastern", "legumes", (5, 0, 1), &[
        ("hummus", 80.0), ("carrot", 80.0), ("cucumber", 80.0), ("bell pepper", 60.0),
    ]),
    recipe("Cottage Cheese with Berries", Snack, "american", "dairy", (2, 0, 1), &[
        ("cottage cheese", 200.0), ("blueberries", 80.0), ("walnuts", 10.0),
    ]),
    recipe("Almonds and Dark Chocolate", Snack, "american", "nuts", (1, 0, 1), &[
        ("almonds", 30.0), ("dark chocolate", 20.0), ("blueberries", 50.0),
    ]),
    recipe("Banana Protein Shake", Snack, "american", "whey", (3, 0, 1), &[
        ("whey protein", 30.0), ("almond milk", 300.0), ("banana", 100.0),
        ("peanut butter", 15.0),
    ]),
    recipe("Boiled Eggs with Avocado", Snack, "american", "egg", (2, 10, 1), &[
        ("eggs", 100.0), ("avocado", 50.0), ("tomato", 60.0),
    ]),
    recipe("Rice Cakes with Hummus", Snack, "middle eastern", "legumes", (2, 0, 1), &[
        ("rice cakes", 20.0), ("hummus", 50.0), ("cucumber", 60.0),
    ]),
    recipe("Greek Yogurt with Walnuts", Snack, "greek", "dairy", (2, 0, 1), &[
        ("greek yogurt", 170.0), ("walnuts", 15.0), ("honey", 10.0),
    ]),
    recipe("Tuna Cucumber Bites", Snack, "mediterranean", "tuna", (5, 0, 1), &[
        ("tuna", 80.0), ("cucumber", 120.0), ("avocado", 40.0), ("lemon", 5.0),
    ]),
    recipe("Curried Roasted Chickpeas", Snack, "indian", "legumes", (5, 25, 2), &[
        ("chickpeas", 120.0), ("olive oil", 5.0), ("curry powder", 2.0),
    ]),
];
