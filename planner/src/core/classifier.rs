//! Keyword-based primitive task classification.
//!
//! A task is primitive when one of its words names a basic robot action. Words
//! are lowercased, stripped of punctuation and reduced by a small suffix
//! lemmatizer before lookup.

use std::collections::HashSet;

use crate::oracle::{OracleResult, PrimitiveTest};

/// Basic robot actions that need no further decomposition.
pub const PRIMITIVE_ACTIONS: &[&str] = &[
    "grab", "reach", "twist", "move", "push", "pull", "lift", "hold", "release", "turn", "rotate",
    "locate", "identify", "find", "pick", "place", "put", "insert", "remove", "open", "close",
    "clean", "wipe", "sweep", "mop", "vacuum", "wash", "rinse", "cook", "heat", "boil", "fry",
    "bake", "microwave", "cut", "slice", "dice", "chop", "examine", "grate", "peel", "mix",
    "blend", "stir", "pour", "serve", "stop", "scan", "activate",
];

#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    vocabulary: HashSet<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(PRIMITIVE_ACTIONS.iter().copied())
    }
}

impl KeywordClassifier {
    pub fn new<'a, I: IntoIterator<Item = &'a str>>(vocabulary: I) -> Self {
        Self {
            vocabulary: vocabulary.into_iter().map(str::to_lowercase).collect(),
        }
    }

    pub fn classify(&self, task: &str) -> bool {
        task.split_whitespace()
            .map(normalize_word)
            .filter(|word| !word.is_empty())
            .any(|word| lemma_candidates(&word).iter().any(|l| self.vocabulary.contains(l)))
    }
}

impl PrimitiveTest for KeywordClassifier {
    fn is_primitive(&self, task: &str) -> OracleResult<bool> {
        Ok(self.classify(task))
    }
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Possible base forms for `word`, the word itself first.
fn lemma_candidates(word: &str) -> Vec<String> {
    let mut out = vec![word.to_string()];
    let mut push = |s: &str| {
        if s.len() >= 2 && !out.iter().any(|o| o == s) {
            out.push(s.to_string());
        }
    };

    if let Some(stem) = word.strip_suffix("ies") {
        push(&format!("{stem}y"));
    }
    if let Some(stem) = word.strip_suffix("es") {
        push(stem);
    }
    if let Some(stem) = word.strip_suffix('s')
        && !word.ends_with("ss")
    {
        push(stem);
    }
    for suffix in ["ing", "ed"] {
        if let Some(stem) = word.strip_suffix(suffix) {
            push(stem);
            push(&format!("{stem}e"));
            if let Some(undoubled) = undouble(stem) {
                push(undoubled);
            }
        }
    }
    out
}

/// `stirr` -> `stir`, `chopp` -> `chop`.
fn undouble(stem: &str) -> Option<&str> {
    let bytes = stem.as_bytes();
    let n = bytes.len();
    if n >= 3 && bytes[n - 1] == bytes[n - 2] && bytes[n - 1].is_ascii_alphabetic() {
        Some(&stem[..n - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_action_words_are_primitive() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.classify("grab the cup"));
        assert!(classifier.classify("Scan room"));
    }

    #[test]
    fn inflected_forms_are_recognized() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.classify("Moves to the kitchen"));
        assert!(classifier.classify("stirring the soup"));
        assert!(classifier.classify("chopped onions"));
        assert!(classifier.classify("placing plates"));
        assert!(classifier.classify("washes dishes"));
    }

    #[test]
    fn punctuation_is_ignored() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.classify("first, (open) the fridge."));
    }

    #[test]
    fn abstract_tasks_are_not_primitive() {
        let classifier = KeywordClassifier::default();
        assert!(!classifier.classify("prepare breakfast"));
        assert!(!classifier.classify("make the house tidy"));
        assert!(!classifier.classify(""));
    }

    #[test]
    fn custom_vocabulary_replaces_default() {
        let classifier = KeywordClassifier::new(["Weld"]);
        assert!(classifier.classify("weld the seam"));
        assert!(!classifier.classify("grab the torch"));
        assert_eq!(classifier.is_primitive("welding joints"), Ok(true));
    }
}
