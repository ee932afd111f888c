//! Card brand rules and the process-wide rule table.
//!
//! A [`BrandRule`] pairs the BIN prefixes a brand owns with the input mask
//! and the card lengths it accepts. The [`BrandRegistry`] holds the rules in
//! registration order and hands out immutable snapshots, so classification
//! never observes a half-registered rule.

use std::{
    fmt,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use tracing::debug;

use crate::error::{ElementsError, Result};

/// Longest card number any rule may accept.
pub const MAX_CARD_LENGTH: usize = 19;

/// Wildcard accepted inside a [`PatternGroup::Prefix`].
pub const WILDCARD: char = 'x';

/// One BIN pattern of a brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternGroup {
    /// Literal prefix; `x` matches any digit.
    Prefix(String),
    /// Inclusive numeric range. Both bounds have the same number of digits.
    Range {
        /// Lower bound.
        min: String,
        /// Upper bound.
        max: String,
    },
}

impl PatternGroup {
    /// Creates a prefix pattern.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Creates a range pattern.
    #[must_use]
    pub fn range(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self::Range { min: min.into(), max: max.into() }
    }

    /// Number of digits the pattern pins down; the match strength once the
    /// input is at least this long.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Prefix(p) => p.len(),
            Self::Range { min, .. } => min.len(),
        }
    }

    /// Patterns are never empty once validated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `digits` is compatible with this pattern over their common length.
    ///
    /// A shorter input matches if it could still grow into the pattern, so
    /// `"3"` matches the range `34..=37`.
    #[must_use]
    pub fn matches(&self, digits: &str) -> bool {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match self {
            Self::Prefix(prefix) => digits
                .chars()
                .zip(prefix.chars())
                .all(|(d, p)| p == WILDCARD || d == p),
            Self::Range { min, max } => {
                let n = digits.len().min(min.len());
                match (
                    digits[..n].parse::<u64>(),
                    min[..n].parse::<u64>(),
                    max[..n.min(max.len())].parse::<u64>(),
                ) {
                    (Ok(value), Ok(lo), Ok(hi)) => lo <= value && value <= hi,
                    _ => false,
                }
            }
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Self::Prefix(p) => {
                if p.is_empty() || !p.chars().all(|c| c.is_ascii_digit() || c == WILDCARD) {
                    return Err(format!("prefix {p:?} must be digits or '{WILDCARD}'"));
                }
            }
            Self::Range { min, max } => {
                let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
                if !digits(min) || !digits(max) || min.len() != max.len() {
                    return Err(format!("range {min}..{max} must be digit strings of equal length"));
                }
                if min > max {
                    return Err(format!("range {min}..{max} is inverted"));
                }
            }
        }
        Ok(())
    }
}

/// One element of a card number mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskElement {
    /// A separator shown as-is.
    Literal(char),
    /// A digit slot.
    Digit,
}

impl MaskElement {
    /// Parses a mask element.
    ///
    /// `\d` and `[0-9]` are digit slots; any other single character is a literal.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError::InvalidMask`] for anything else, such as
    /// multi-character strings or unsupported character classes.
    pub fn parse(element: &str) -> Result<Self> {
        if element == r"\d" || element == "[0-9]" {
            return Ok(Self::Digit);
        }
        let mut chars = element.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self::Literal(c)),
            _ => Err(ElementsError::InvalidMask(format!(
                "mask element {element:?} is neither a single character nor a digit matcher"
            ))),
        }
    }
}

/// Builds a mask of `length` digit slots with a space after each gap offset.
#[must_use]
pub fn mask_with_gaps(gaps: &[usize], length: usize) -> Vec<MaskElement> {
    let mut mask = Vec::with_capacity(length + gaps.len());
    for i in 0..length {
        if i > 0 && gaps.contains(&i) {
            mask.push(MaskElement::Literal(' '));
        }
        mask.push(MaskElement::Digit);
    }
    mask
}

/// Counts digit slots.
#[must_use]
pub fn digit_count(mask: &[MaskElement]) -> usize {
    mask.iter().filter(|e| matches!(e, MaskElement::Digit)).count()
}

/// Lays `digits` out on `mask`, stopping when the digits run out.
///
/// Digits beyond the mask are dropped.
#[must_use]
pub fn format_with_mask(mask: &[MaskElement], digits: &str) -> String {
    let mut out = String::with_capacity(mask.len());
    let mut remaining = digits.chars().peekable();
    for element in mask {
        if remaining.peek().is_none() {
            break;
        }
        match element {
            MaskElement::Literal(c) => out.push(*c),
            MaskElement::Digit => {
                if let Some(d) = remaining.next() {
                    out.push(d);
                }
            }
        }
    }
    out
}

/// The 16-digit mask used when no brand matches.
#[must_use]
pub fn default_mask() -> Vec<MaskElement> {
    mask_with_gaps(&[4, 8, 12], 16)
}

/// A card brand: id, BIN patterns, mask and accepted lengths.
///
/// Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct BrandRule {
    id: String,
    patterns: Vec<PatternGroup>,
    mask: Vec<MaskElement>,
    valid_lengths: Vec<usize>,
}

impl BrandRule {
    /// Builds and validates a rule.
    ///
    /// The mask describes the longest accepted length; shorter lengths use a
    /// prefix of it.
    ///
    /// # Errors
    ///
    /// - [`ElementsError::InvalidBrandRule`] for an empty id, no patterns, a
    ///   malformed pattern, or lengths outside `1..=19`
    /// - [`ElementsError::InvalidMask`] if the mask has no digit slots or its
    ///   digit count differs from the longest valid length
    pub fn new(
        id: impl Into<String>,
        patterns: Vec<PatternGroup>,
        mask: Vec<MaskElement>,
        valid_lengths: impl IntoIterator<Item = usize>,
    ) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ElementsError::InvalidBrandRule("brand id must not be empty".to_owned()));
        }
        if patterns.is_empty() {
            return Err(ElementsError::InvalidBrandRule(format!("{id}: no match patterns")));
        }
        for pattern in &patterns {
            pattern.validate().map_err(|e| ElementsError::InvalidBrandRule(format!("{id}: {e}")))?;
        }

        let mut valid_lengths: Vec<usize> = valid_lengths.into_iter().collect();
        valid_lengths.sort_unstable();
        valid_lengths.dedup();
        let Some(&longest) = valid_lengths.last() else {
            return Err(ElementsError::InvalidBrandRule(format!("{id}: no valid lengths")));
        };
        if valid_lengths.first() == Some(&0) || longest > MAX_CARD_LENGTH {
            return Err(ElementsError::InvalidBrandRule(format!(
                "{id}: lengths must be between 1 and {MAX_CARD_LENGTH}"
            )));
        }

        let slots = digit_count(&mask);
        if slots == 0 {
            return Err(ElementsError::InvalidMask(format!("{id}: mask has no digit slots")));
        }
        if slots != longest {
            return Err(ElementsError::InvalidMask(format!(
                "{id}: mask has {slots} digit slots but longest length is {longest}"
            )));
        }

        Ok(Self { id, patterns, mask, valid_lengths })
    }

    /// Builds a rule from textual mask elements (see [`MaskElement::parse`]).
    ///
    /// # Errors
    ///
    /// Same as [`BrandRule::new`], plus [`ElementsError::InvalidMask`] for any
    /// element that does not parse.
    pub fn from_mask_strings(
        id: impl Into<String>,
        patterns: Vec<PatternGroup>,
        mask: &[&str],
        valid_lengths: impl IntoIterator<Item = usize>,
    ) -> Result<Self> {
        let mask = mask.iter().map(|e| MaskElement::parse(e)).collect::<Result<Vec<_>>>()?;
        Self::new(id, patterns, mask, valid_lengths)
    }

    /// Builds a built-in rule whose mask puts spaces at `gaps`.
    fn builtin(id: &str, patterns: Vec<PatternGroup>, gaps: &[usize], lengths: &[usize]) -> Self {
        let longest = lengths.iter().copied().max().unwrap_or(16);
        Self {
            id: id.to_owned(),
            patterns,
            mask: mask_with_gaps(gaps, longest),
            valid_lengths: lengths.to_vec(),
        }
    }

    /// Brand id, e.g. `visa`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// BIN patterns in declaration order.
    #[must_use]
    pub fn patterns(&self) -> &[PatternGroup] {
        &self.patterns
    }

    /// Mask for the longest valid length.
    #[must_use]
    pub fn mask(&self) -> &[MaskElement] {
        &self.mask
    }

    /// Accepted lengths, ascending.
    #[must_use]
    pub fn valid_lengths(&self) -> &[usize] {
        &self.valid_lengths
    }

    /// First pattern compatible with `digits`.
    #[must_use]
    pub fn matching_pattern(&self, digits: &str) -> Option<&PatternGroup> {
        self.patterns.iter().find(|p| p.matches(digits))
    }

    /// Target length for an input of `digit_count` digits: the shortest valid
    /// length that is not below it, or the longest one.
    #[must_use]
    pub fn target_length(&self, digit_count: usize) -> usize {
        self.valid_lengths
            .iter()
            .copied()
            .find(|&len| len >= digit_count)
            .or_else(|| self.valid_lengths.last().copied())
            .unwrap_or(MAX_CARD_LENGTH)
    }

    /// Mask covering exactly [`target_length`](Self::target_length) digits.
    #[must_use]
    pub fn mask_for(&self, digit_count: usize) -> Vec<MaskElement> {
        let target = self.target_length(digit_count);
        let mut seen = 0;
        let mut out = Vec::with_capacity(self.mask.len());
        for element in &self.mask {
            if seen == target {
                break;
            }
            if matches!(element, MaskElement::Digit) {
                seen += 1;
            }
            out.push(*element);
        }
        out
    }

    /// Formats digits for display with this brand's mask.
    #[must_use]
    pub fn format(&self, digits: &str) -> String {
        format_with_mask(&self.mask_for(digits.len()), digits)
    }
}

impl fmt::Debug for BrandRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrandRule")
            .field("id", &self.id)
            .field("patterns", &self.patterns.len())
            .field("valid_lengths", &self.valid_lengths)
            .finish_non_exhaustive()
    }
}

/// Append-only table of brand rules.
///
/// Reads take a cheap snapshot (`Arc` clone); registration copies the list,
/// appends and swaps the new list in.
#[derive(Debug)]
pub struct BrandRegistry {
    rules: RwLock<Arc<Vec<Arc<BrandRule>>>>,
}

static GLOBAL: LazyLock<BrandRegistry> = LazyLock::new(BrandRegistry::with_defaults);

impl BrandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: RwLock::new(Arc::new(Vec::new())) }
    }

    /// Creates a registry with the built-in brands.
    #[must_use]
    pub fn with_defaults() -> Self {
        let rules = default_rules().into_iter().map(Arc::new).collect();
        Self { rules: RwLock::new(Arc::new(rules)) }
    }

    /// The process-wide registry, seeded with the built-in brands.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Current rules in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Arc<BrandRule>>> {
        // the guarded value is only ever replaced wholesale, so a poisoned
        // lock still holds a consistent list
        Arc::clone(&self.rules.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Looks up a rule by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<BrandRule>> {
        self.snapshot().iter().find(|r| r.id() == id).cloned()
    }

    /// Appends a rule.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError::InvalidBrandRule`] if a rule with the same id
    /// is already registered.
    pub fn register(&self, rule: BrandRule) -> Result<()> {
        let mut guard = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if guard.iter().any(|r| r.id() == rule.id()) {
            return Err(ElementsError::InvalidBrandRule(format!(
                "brand {} is already registered",
                rule.id()
            )));
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        debug!(brand = rule.id(), "card brand registered");
        next.push(Arc::new(rule));
        *guard = Arc::new(next);
        Ok(())
    }
}

impl Default for BrandRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn p(prefix: &str) -> PatternGroup {
    PatternGroup::prefix(prefix)
}

fn r(min: &str, max: &str) -> PatternGroup {
    PatternGroup::range(min, max)
}

const GAPS_4_8_12: &[usize] = &[4, 8, 12];
const GAPS_4_10: &[usize] = &[4, 10];

/// Built-in brands in priority order.
#[must_use]
pub fn default_rules() -> Vec<BrandRule> {
    vec![
        BrandRule::builtin("visa", vec![p("4")], GAPS_4_8_12, &[16, 18, 19]),
        BrandRule::builtin(
            "mastercard",
            vec![
                r("51", "55"),
                r("2221", "2229"),
                r("223", "229"),
                r("23", "26"),
                r("270", "271"),
                p("2720"),
            ],
            GAPS_4_8_12,
            &[16],
        ),
        BrandRule::builtin("american-express", vec![p("34"), p("37")], GAPS_4_10, &[15]),
        BrandRule::builtin(
            "diners-club",
            vec![r("300", "305"), p("36"), p("38"), p("39")],
            GAPS_4_10,
            &[14, 16, 19],
        ),
        BrandRule::builtin(
            "discover",
            vec![p("6011"), r("644", "649"), p("65")],
            GAPS_4_8_12,
            &[16, 19],
        ),
        BrandRule::builtin(
            "jcb",
            vec![p("2131"), p("1800"), r("3528", "3589")],
            GAPS_4_8_12,
            &[16, 17, 18, 19],
        ),
        BrandRule::builtin(
            "unionpay",
            vec![
                p("620"),
                r("62100", "62182"),
                r("62184", "62187"),
                r("62185", "62197"),
                r("62200", "62205"),
                r("622010", "622999"),
                p("622018"),
                r("62207", "62209"),
                r("623", "626"),
                p("6270"),
                p("6272"),
                p("6276"),
                r("627700", "627779"),
                r("627781", "627799"),
                r("6282", "6289"),
                p("6291"),
                p("6292"),
                p("810"),
                r("8110", "8131"),
                r("8132", "8151"),
                r("8152", "8163"),
                r("8164", "8171"),
            ],
            GAPS_4_8_12,
            &[14, 15, 16, 17, 18, 19],
        ),
        BrandRule::builtin(
            "maestro",
            vec![
                p("493698"),
                r("500000", "504174"),
                r("504176", "506698"),
                r("506779", "508999"),
                r("56", "59"),
                p("63"),
                p("67"),
                p("6"),
            ],
            GAPS_4_8_12,
            &[12, 13, 14, 15, 16, 17, 18, 19],
        ),
        BrandRule::builtin(
            "elo",
            vec![
                p("401178"),
                p("401179"),
                p("438935"),
                p("457631"),
                p("457632"),
                p("431274"),
                p("451416"),
                p("457393"),
                p("504175"),
                r("506699", "506778"),
                r("509000", "509999"),
                p("627780"),
                p("636297"),
                p("636368"),
                r("650031", "650033"),
                r("650035", "650051"),
                r("650405", "650439"),
                r("650485", "650538"),
                r("650541", "650598"),
                r("650700", "650718"),
                r("650720", "650727"),
                r("650901", "650978"),
                r("651652", "651679"),
                r("655000", "655019"),
                r("655021", "655058"),
            ],
            GAPS_4_8_12,
            &[16],
        ),
        BrandRule::builtin("mir", vec![r("2200", "2204")], GAPS_4_8_12, &[16, 17, 18, 19]),
        BrandRule::builtin(
            "hiper",
            vec![
                p("637095"),
                p("63737423"),
                p("63743358"),
                p("637568"),
                p("637599"),
                p("637609"),
                p("637612"),
            ],
            GAPS_4_8_12,
            &[16],
        ),
        BrandRule::builtin("hipercard", vec![p("606282")], GAPS_4_8_12, &[16]),
    ]
}
