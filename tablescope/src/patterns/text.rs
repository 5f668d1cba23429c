//! Text pattern detection: a fixed regex catalog plus novel character-class
//! signature inference for columns no catalog pattern covers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::profile::{TextPattern, TextPatternType};

/// Minimum share of non-null values a catalog pattern must match to be reported.
const CATALOG_MATCH_THRESHOLD: f64 = 0.10;
/// Minimum share of samples the dominant signature must cover to report a novel pattern.
const NOVEL_DOMINANCE_THRESHOLD: f64 = 0.70;
/// Sample bounds for novel detection.
const NOVEL_MAX_SAMPLES: usize = 200;
const NOVEL_MIN_SAMPLES: usize = 10;
const NOVEL_MIN_LEN: usize = 2;
const NOVEL_MAX_LEN: usize = 100;

struct CatalogEntry {
    pattern_type: TextPatternType,
    regex: Regex,
    description: &'static str,
}

static CATALOG: Lazy<Vec<CatalogEntry>> = Lazy::new(|| {
    let entry = |pattern_type, pattern: &str, description| CatalogEntry {
        pattern_type,
        regex: Regex::new(pattern).expect("static catalog regex"),
        description,
    };
    vec![
        entry(
            TextPatternType::Email,
            r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$",
            "email address",
        ),
        entry(
            TextPatternType::Url,
            r"^https?://[^\s/$.?#].[^\s]*$",
            "URL",
        ),
        entry(
            TextPatternType::Uuid,
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
            "UUID",
        ),
        entry(
            TextPatternType::Phone,
            r"^\+?[0-9][0-9 ().-]{6,18}[0-9]$",
            "phone number",
        ),
        entry(
            TextPatternType::Ipv4,
            r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
            "IPv4 address",
        ),
        entry(
            TextPatternType::CreditCard,
            r"^[0-9]{4}[ -]?[0-9]{4}[ -]?[0-9]{4}[ -]?[0-9]{4}$",
            "credit card number",
        ),
        entry(
            TextPatternType::Percentage,
            r"^-?[0-9]+(\.[0-9]+)?\s?%$",
            "percentage",
        ),
        entry(
            TextPatternType::Currency,
            r"^[$€£¥][0-9][0-9,]*(\.[0-9]+)?$",
            "currency amount",
        ),
    ]
});

/// Tests the catalog against sampled non-null values. Patterns matching at
/// least 10% of values are reported, sorted by match percent descending.
pub fn detect_catalog_patterns(values: &[String]) -> Vec<TextPattern> {
    if values.is_empty() {
        return Vec::new();
    }

    let total = values.len() as f64;
    let mut detected: Vec<TextPattern> = CATALOG
        .iter()
        .filter_map(|entry| {
            let matches = values.iter().filter(|v| entry.regex.is_match(v)).count();
            let rate = matches as f64 / total;
            if rate >= CATALOG_MATCH_THRESHOLD {
                Some(TextPattern {
                    pattern_type: entry.pattern_type.clone(),
                    regex: entry.regex.as_str().to_string(),
                    match_percent: rate * 100.0,
                    description: entry.description.to_string(),
                })
            } else {
                None
            }
        })
        .collect();

    detected.sort_by(|a, b| {
        b.match_percent
            .partial_cmp(&a.match_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    detected
}

/// Character classes used in novel pattern signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Letters,
    Digits,
    Whitespace,
    Symbols,
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_ascii_alphabetic() {
            Self::Letters
        } else if c.is_ascii_digit() {
            Self::Digits
        } else if c.is_whitespace() {
            Self::Whitespace
        } else {
            Self::Symbols
        }
    }

    fn code(&self) -> char {
        match self {
            Self::Letters => 'A',
            Self::Digits => 'N',
            Self::Whitespace => 'W',
            Self::Symbols => 'S',
        }
    }

    fn regex_fragment(&self) -> &'static str {
        match self {
            Self::Letters => "[a-zA-Z]+",
            Self::Digits => "[0-9]+",
            Self::Whitespace => r"\s+",
            Self::Symbols => r"[^a-zA-Z0-9\s]+",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            Self::Letters => "letters",
            Self::Digits => "numbers",
            Self::Whitespace => "spaces",
            Self::Symbols => "symbols",
        }
    }
}

/// Maps a value to its collapsed character-class signature, e.g.
/// `"XX-12345"` -> `"ASN"`.
pub fn char_class_signature(value: &str) -> String {
    let mut signature = String::new();
    let mut last: Option<CharClass> = None;
    for c in value.chars() {
        let class = CharClass::of(c);
        if last != Some(class) {
            signature.push(class.code());
            last = Some(class);
        }
    }
    signature
}

fn signature_regex(signature: &str) -> String {
    let mut regex = String::from("^");
    for code in signature.chars() {
        let class = match code {
            'A' => CharClass::Letters,
            'N' => CharClass::Digits,
            'W' => CharClass::Whitespace,
            _ => CharClass::Symbols,
        };
        regex.push_str(class.regex_fragment());
    }
    regex.push('$');
    regex
}

fn signature_description(signature: &str) -> String {
    let nouns: Vec<&str> = signature
        .chars()
        .map(|code| match code {
            'A' => CharClass::Letters.noun(),
            'N' => CharClass::Digits.noun(),
            'W' => CharClass::Whitespace.noun(),
            _ => CharClass::Symbols.noun(),
        })
        .collect();
    nouns.join(" + ")
}

/// Infers a novel pattern from sample values when no catalog pattern matched.
///
/// Takes up to 200 distinct values of length 2..=100, groups them by collapsed
/// character-class signature, and reports the dominant signature when it
/// covers at least 70% of the samples. The returned regex is anchored and
/// matches every sample that contributed to the inference.
pub fn detect_novel_pattern(values: &[String]) -> Option<TextPattern> {
    let mut distinct: Vec<&String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for v in values {
        if v.len() < NOVEL_MIN_LEN || v.len() > NOVEL_MAX_LEN {
            continue;
        }
        if seen.insert(v.as_str()) {
            distinct.push(v);
            if distinct.len() >= NOVEL_MAX_SAMPLES {
                break;
            }
        }
    }

    if distinct.len() < NOVEL_MIN_SAMPLES {
        return None;
    }

    let mut groups: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for v in &distinct {
        *groups.entry(char_class_signature(v)).or_insert(0) += 1;
    }

    let (signature, count) = groups
        .into_iter()
        .max_by_key(|(_, count)| *count)?;
    let coverage = count as f64 / distinct.len() as f64;
    if coverage < NOVEL_DOMINANCE_THRESHOLD || signature.is_empty() {
        return None;
    }

    Some(TextPattern {
        pattern_type: TextPatternType::Novel,
        regex: signature_regex(&signature),
        match_percent: coverage * 100.0,
        description: signature_description(&signature),
    })
}
