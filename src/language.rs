//! Per-user cached language detection.
//!
//! Detection is script-range counting with a hint-word refinement for
//! Latin-script languages. The resolved language is cached per user so
//! short messages ("ok", "да") keep the established language.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_RANGES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("ru", Regex::new("[\u{0400}-\u{04FF}]").unwrap()),
        ("ar", Regex::new("[\u{0600}-\u{06FF}]").unwrap()),
        ("zh", Regex::new("[\u{4E00}-\u{9FFF}]").unwrap()),
        ("ja", Regex::new("[\u{3040}-\u{30FF}]").unwrap()),
        ("ko", Regex::new("[\u{AC00}-\u{D7AF}]").unwrap()),
        ("he", Regex::new("[\u{0590}-\u{05FF}]").unwrap()),
        ("en", Regex::new("[A-Za-z]").unwrap()),
    ]
});

/// Hint words for Latin-script languages that would otherwise detect as "en".
static HINT_WORDS: &[(&str, &[&str])] = &[
    ("es", &["hola", "cómo", "estás", "gracias", "quiero", "puedo", "tengo", "bueno"]),
    ("fr", &["bonjour", "comment", "merci", "je suis", "oui", "non", "très"]),
    ("de", &["hallo", "danke", "ich bin", "wie", "bitte", "guten"]),
    ("pt", &["olá", "obrigado", "obrigada", "como", "estou", "bom", "muito"]),
];

/// Minimum text length before a detection result replaces the cached value.
const MIN_DETECT_LEN: usize = 4;

pub struct LanguageResolver {
    cache: Mutex<HashMap<String, String>>,
}

impl LanguageResolver {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Detect language from text alone.
    pub fn detect(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return "en".to_string();
        }

        let mut counts: Vec<(&str, usize)> = Vec::new();
        for (lang, pattern) in SCRIPT_RANGES.iter() {
            let count = pattern.find_iter(text).count();
            if count > 0 {
                counts.push((lang, count));
            }
        }

        let Some(&(dominant, _)) = counts.iter().max_by_key(|(_, c)| *c) else {
            return "en".to_string();
        };

        if dominant == "en" {
            let lower = text.to_lowercase();
            let mut best = ("en", 0usize);
            for (lang, words) in HINT_WORDS {
                let hits = words.iter().filter(|w| lower.contains(**w)).count();
                if hits > best.1 {
                    best = (lang, hits);
                }
            }
            return best.0.to_string();
        }

        dominant.to_string()
    }

    /// Detect, cache, and return. Texts shorter than 4 chars return the
    /// cached language (or "en") without touching the cache.
    pub fn resolve(&self, user_id: &str, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_DETECT_LEN {
            return self.cached(user_id).unwrap_or_else(|| "en".to_string());
        }

        let lang = self.detect(text);
        self.cache
            .lock()
            .expect("language cache lock poisoned")
            .insert(user_id.to_string(), lang.clone());
        lang
    }

    pub fn cached(&self, user_id: &str) -> Option<String> {
        self.cache
            .lock()
            .expect("language cache lock poisoned")
            .get(user_id)
            .cloned()
    }

    /// Explicit override, e.g. from a user preference setting.
    pub fn set_language(&self, user_id: &str, language: &str) {
        self.cache
            .lock()
            .expect("language cache lock poisoned")
            .insert(user_id.to_string(), language.to_string());
    }
}

impl Default for LanguageResolver {
    fn default() -> Self {
        Self::new()
    }
}
