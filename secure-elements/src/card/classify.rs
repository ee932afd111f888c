//! Local card classification: brand candidates, mask and Luhn.

use std::sync::Arc;

use super::{
    brand::{BrandRegistry, BrandRule, MaskElement, default_mask, digit_count},
    luhn::luhn_valid,
};

/// Strips the characters the card number input ignores (spaces and tabs).
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars().filter(|c| *c != ' ' && *c != '\t').collect()
}

/// A brand rule that matched the input, with how strongly.
#[derive(Debug, Clone)]
pub struct BrandCandidate {
    /// The matching rule.
    pub rule: Arc<BrandRule>,
    /// Digits pinned by the matched pattern, once the input covers all of them.
    pub strength: Option<usize>,
}

/// Result of classifying one input. Recomputed from scratch on every change.
#[derive(Debug, Clone)]
pub struct CardClassification {
    /// Matching brands, best match first, then by strength, then registration order.
    pub candidates: Vec<BrandCandidate>,
    /// The settled brand, if the candidates allow one.
    pub best_match: Option<Arc<BrandRule>>,
    /// Mask the input is evaluated against.
    pub mask: Vec<MaskElement>,
    /// Number of digits in the normalized input.
    pub digit_count: usize,
    /// Whether the input is numeric (or empty).
    pub numeric: bool,
    /// Digit count equals the mask's digit count.
    pub mask_satisfied: bool,
    /// Luhn checksum passes.
    pub luhn_valid: bool,
}

impl CardClassification {
    /// Brand id of the best match.
    #[must_use]
    pub fn brand(&self) -> Option<&str> {
        self.best_match.as_deref().map(BrandRule::id)
    }

    /// Brand id, or `unknown`.
    #[must_use]
    pub fn brand_or_unknown(&self) -> &str {
        self.brand().unwrap_or(UNKNOWN_BRAND)
    }
}

/// Brand reported when nothing settles.
pub const UNKNOWN_BRAND: &str = "unknown";

/// Picks the best candidate.
///
/// A lone candidate wins outright. Otherwise every candidate must have a
/// strength (the input covers its whole pattern) and the strongest wins,
/// earlier registration breaking ties.
fn best_match(candidates: &[BrandCandidate]) -> Option<Arc<BrandRule>> {
    if let [only] = candidates {
        return Some(Arc::clone(&only.rule));
    }
    if candidates.is_empty() || candidates.iter().any(|c| c.strength.is_none()) {
        return None;
    }
    let mut best = &candidates[0];
    for candidate in &candidates[1..] {
        if candidate.strength > best.strength {
            best = candidate;
        }
    }
    Some(Arc::clone(&best.rule))
}

/// Classifies `text` against the rules in `registry`.
///
/// Whitespace is stripped first. Non-numeric input yields no candidates and
/// is neither mask-satisfied nor Luhn-valid. Without a settled brand the
/// generic 16-digit mask applies.
///
/// ```
/// use secure_elements::card::{BrandRegistry, classify};
///
/// let c = classify("4242 4242 4242 4242", BrandRegistry::global());
/// assert_eq!(c.brand(), Some("visa"));
/// assert!(c.mask_satisfied && c.luhn_valid);
/// ```
#[must_use]
pub fn classify(text: &str, registry: &BrandRegistry) -> CardClassification {
    let digits = normalize(text);
    let digit_total = digits.chars().count();
    let numeric = digits.bytes().all(|b| b.is_ascii_digit());

    if !numeric {
        return CardClassification {
            candidates: Vec::new(),
            best_match: None,
            mask: default_mask(),
            digit_count: digit_total,
            numeric,
            mask_satisfied: false,
            luhn_valid: false,
        };
    }

    let rules = registry.snapshot();
    let mut candidates: Vec<BrandCandidate> = rules
        .iter()
        .filter_map(|rule| {
            rule.matching_pattern(&digits).map(|pattern| BrandCandidate {
                rule: Arc::clone(rule),
                strength: (digits.len() >= pattern.len()).then(|| pattern.len()),
            })
        })
        .collect();

    let best = best_match(&candidates);
    // stable: registration order survives among equal strengths
    candidates.sort_by(|a, b| b.strength.cmp(&a.strength));
    if let Some(best) = &best
        && let Some(pos) = candidates.iter().position(|c| Arc::ptr_eq(&c.rule, best))
    {
        let chosen = candidates.remove(pos);
        candidates.insert(0, chosen);
    }

    let mask = best.as_ref().map_or_else(default_mask, |rule| rule.mask_for(digits.len()));
    let mask_satisfied = !digits.is_empty() && digits.len() == digit_count(&mask);

    CardClassification {
        candidates,
        best_match: best,
        mask,
        digit_count: digit_total,
        numeric,
        mask_satisfied,
        luhn_valid: luhn_valid(&digits),
    }
}
