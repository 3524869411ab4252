//! CLDR plural category resolution.
//!
//! Backs the built-in `plural` macro injected per locale. Different
//! languages have different plural rules - English has "one" and "other",
//! while Russian has "one", "few", "many", and "other".
//!
//! Plural rules are cached per thread per language to avoid re-creating
//! `PluralRules` instances on every call.

use std::cell::RefCell;

use icu_locale_core::locale;
use icu_plurals::{PluralCategory, PluralRuleType, PluralRules};

/// Supported language codes for plural rule resolution.
const SUPPORTED_LANGUAGES: &[&str] = &[
    "ar", "bn", "de", "el", "en", "es", "fa", "fr", "he", "hi", "id", "it", "ja", "ko", "nl", "pl",
    "pt", "ro", "ru", "th", "tr", "uk", "vi", "zh",
];

thread_local! {
    /// Per-thread cache of `PluralRules` keyed by language code.
    static PLURAL_RULES_CACHE: RefCell<Vec<(&'static str, PluralRules)>> = const { RefCell::new(Vec::new()) };
}

/// Normalize a language code to a supported static string reference.
///
/// Region subtags are ignored (`en-US` uses `en` rules); unrecognized codes
/// fall back to `"en"`.
fn normalize_lang(lang: &str) -> &'static str {
    let base = lang.split('-').next().unwrap_or(lang);
    SUPPORTED_LANGUAGES
        .iter()
        .find(|&&code| code == base)
        .copied()
        .unwrap_or("en")
}

/// Build `PluralRules` for a normalized language code.
fn build_rules(lang: &'static str) -> PluralRules {
    let loc = match lang {
        "ru" => locale!("ru"),
        "ar" => locale!("ar"),
        "de" => locale!("de"),
        "es" => locale!("es"),
        "fr" => locale!("fr"),
        "it" => locale!("it"),
        "pt" => locale!("pt"),
        "ja" => locale!("ja"),
        "zh" => locale!("zh"),
        "ko" => locale!("ko"),
        "nl" => locale!("nl"),
        "pl" => locale!("pl"),
        "tr" => locale!("tr"),
        "uk" => locale!("uk"),
        "vi" => locale!("vi"),
        "th" => locale!("th"),
        "id" => locale!("id"),
        "el" => locale!("el"),
        "ro" => locale!("ro"),
        "fa" => locale!("fa"),
        "bn" => locale!("bn"),
        "hi" => locale!("hi"),
        "he" => locale!("he"),
        _ => locale!("en"),
    };
    PluralRules::try_new(loc.into(), PluralRuleType::Cardinal.into())
        .expect("locale should be supported")
}

/// Translate a `PluralCategory` enum to its string representation.
fn category_str(category: PluralCategory) -> &'static str {
    match category {
        PluralCategory::Zero => "zero",
        PluralCategory::One => "one",
        PluralCategory::Two => "two",
        PluralCategory::Few => "few",
        PluralCategory::Many => "many",
        PluralCategory::Other => "other",
    }
}

/// Get the CLDR plural category for a number in a given language.
///
/// Returns one of: "zero", "one", "two", "few", "many", "other".
///
/// # Examples
///
/// ```
/// use l20n::compiler::plural_category;
///
/// assert_eq!(plural_category("en", 1), "one");
/// assert_eq!(plural_category("en", 2), "other");
/// assert_eq!(plural_category("ru", 2), "few");
/// assert_eq!(plural_category("ru", 5), "many");
/// ```
pub fn plural_category(lang: &str, n: i64) -> &'static str {
    let lang = normalize_lang(lang);
    PLURAL_RULES_CACHE.with_borrow_mut(|cache| {
        if let Some(entry) = cache.iter().find(|(code, _)| *code == lang) {
            return category_str(entry.1.category_for(n));
        }
        let rules = build_rules(lang);
        let category = category_str(rules.category_for(n));
        cache.push((lang, rules));
        category
    })
}
