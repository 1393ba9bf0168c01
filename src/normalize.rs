// 🧹 Normalizer - Canonical forms for license numbers and addresses
//
// Problem solved:
// - "050 1234567", "#0501234567", "50-1234567" → "050-1234567"
// - "123 Main Street, Portland, OR 97201" and "123 MAIN ST, PORTLAND, OR" → same key
//
// Every function here is pure and total: the worst input yields an empty
// string or None, never an error. Both datasets go through the same rules.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinel the survey export uses for "no license recorded"
pub const LICENSE_SENTINEL: &str = "Unspecified";

/// Oregon recreational retailer license prefix
const OREGON_PREFIX: &str = "050";

// ============================================================================
// PATTERNS
// ============================================================================

static USA_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*USA$").unwrap());

static STATE_ZIP_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*OR\s*\d{5}.*$").unwrap());

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,.\-]").unwrap());

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Whole-word abbreviation table, applied in order
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("STREET", "ST"),
    ("AVENUE", "AVE"),
    ("BOULEVARD", "BLVD"),
    ("DRIVE", "DR"),
    ("ROAD", "RD"),
    ("LANE", "LN"),
    ("SUITE", "STE"),
    ("APARTMENT", "APT"),
    ("HIGHWAY", "HWY"),
    ("PARKWAY", "PKWY"),
    ("NORTHWEST", "NW"),
    ("NORTHEAST", "NE"),
    ("SOUTHWEST", "SW"),
    ("SOUTHEAST", "SE"),
    ("NORTH", "N"),
    ("SOUTH", "S"),
    ("EAST", "E"),
    ("WEST", "W"),
];

static ABBREVIATION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ABBREVIATIONS
        .iter()
        .map(|(full, short)| (Regex::new(&format!(r"\b{}\b", full)).unwrap(), *short))
        .collect()
});

// ============================================================================
// LICENSE NUMBERS
// ============================================================================

/// Normalize a raw license string to the canonical `050-XXXXXXX` style token.
///
/// Returns `None` for missing, blank, or sentinel input, and for input that
/// cleans down to nothing (e.g. `"#"`).
///
/// ```
/// use dispensary_match::normalize::normalize_license;
///
/// assert_eq!(normalize_license(Some("050 1234567")), Some("050-1234567".to_string()));
/// assert_eq!(normalize_license(Some("50-1234567")), Some("050-1234567".to_string()));
/// assert_eq!(normalize_license(Some("Unspecified")), None);
/// ```
pub fn normalize_license(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw == LICENSE_SENTINEL || raw.trim().is_empty() {
        return None;
    }

    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '#' | '"'))
        .collect();
    let mut license = stripped.to_uppercase().trim().to_string();

    if license.is_empty() {
        return None;
    }

    // Missing dash after the prefix: "0501234567" → "050-1234567"
    if let Some(rest) = license.strip_prefix(OREGON_PREFIX) {
        if !rest.is_empty() && !rest.starts_with('-') {
            license = format!("{}-{}", OREGON_PREFIX, rest);
        }
    }

    // Truncated prefix: "50-1234567" → "050-1234567"
    if license.starts_with("50-") && license.len() > 3 {
        license.insert(0, '0');
    }

    Some(license)
}

// ============================================================================
// ADDRESSES
// ============================================================================

/// Normalize an address for exact comparison across datasets.
///
/// Uppercases, strips the `, USA` and `, OR <zip>...` tails, abbreviates
/// street types and directions on word boundaries, turns `,` `.` `-` into
/// spaces and collapses whitespace.
pub fn normalize_address(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => return String::new(),
    };

    let upper = raw.to_uppercase();
    let mut addr = upper.trim().to_string();

    addr = USA_SUFFIX.replace(&addr, "").into_owned();
    addr = STATE_ZIP_SUFFIX.replace(&addr, "").into_owned();

    for (pattern, short) in ABBREVIATION_PATTERNS.iter() {
        addr = pattern.replace_all(&addr, *short).into_owned();
    }

    let spaced = PUNCTUATION.replace_all(&addr, " ");
    WHITESPACE_RUN.replace_all(&spaced, " ").trim().to_string()
}

/// Coarse street key: the first three tokens of the normalized address.
///
/// Lets "123 MAIN ST STE 4 PORTLAND" and "123 MAIN ST" land in the same
/// bucket. Addresses with a single token are returned whole.
pub fn extract_street_prefix(raw: Option<&str>) -> String {
    let addr = normalize_address(raw);
    let parts: Vec<&str> = addr.split_whitespace().collect();

    if parts.len() >= 2 {
        parts.iter().take(3).copied().collect::<Vec<_>>().join(" ")
    } else {
        addr
    }
}

/// Uppercased, trimmed business name used for containment checks
pub fn normalize_name(raw: &str) -> String {
    raw.to_uppercase().trim().to_string()
}

/// True when one non-empty name contains the other
pub fn names_overlap(a: &str, b: &str) -> bool {
    let a = normalize_name(a);
    let b = normalize_name(b);

    if a.is_empty() || b.is_empty() {
        return false;
    }

    a.contains(&b) || b.contains(&a)
}

// ============================================================================
// TESTS
// ============================================================================
