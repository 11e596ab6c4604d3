//! Natural keys used to detect collisions between guest and account records.
//!
//! Keys are case-folded with whitespace runs collapsed, so `"  Rust  Basics"`
//! and `"rust basics"` collide.

/// Normalize free text into a comparison key.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Natural key of a curriculum (its title).
#[must_use]
pub fn curriculum_key(title: &str) -> String {
    normalize(title)
}

/// Natural key of a module within its curriculum (its title).
#[must_use]
pub fn module_key(title: &str) -> String {
    normalize(title)
}

/// Natural key of a lesson within its module (its title).
#[must_use]
pub fn lesson_key(title: &str) -> String {
    normalize(title)
}

/// Natural key of a flashcard (front and back together).
#[must_use]
pub fn flashcard_key(front: &str, back: &str) -> String {
    format!("{}\u{1f}{}", normalize(front), normalize(back))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_and_spacing() {
        assert_eq!(curriculum_key("  Rust\tBasics "), curriculum_key("rust basics"));
        assert_ne!(curriculum_key("Rust Basics"), curriculum_key("Rust Advanced"));
    }

    #[test]
    fn flashcard_key_keeps_front_and_back_apart() {
        assert_ne!(flashcard_key("a b", "c"), flashcard_key("a", "b c"));
        assert_eq!(flashcard_key("Hola", "Hello"), flashcard_key("hola ", " HELLO"));
    }
}
