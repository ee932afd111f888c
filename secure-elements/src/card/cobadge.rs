//! Co-badged network resolution.
//!
//! A co-badged card carries more than one payment network on the same BIN.
//! When the host opts into co-badge support, the networks from the BIN
//! lookup that match the current input are offered for selection, and the
//! card is not complete until one is chosen.

use std::collections::BTreeSet;

use crate::bin_lookup::{BinInfo, BinRange};

/// Normalizes a network name to a brand id: lower case, spaces and
/// underscores become `-`.
///
/// ```
/// use secure_elements::card::normalize_brand;
///
/// assert_eq!(normalize_brand("CARTES BANCAIRES"), "cartes-bancaires");
/// assert_eq!(normalize_brand("American_Express"), "american-express");
/// ```
#[must_use]
pub fn normalize_brand(brand: &str) -> String {
    brand
        .trim()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c.to_ascii_lowercase() })
        .collect()
}

/// Display form of a brand id: upper case, `-` becomes a space.
#[must_use]
pub fn display_name(brand_id: &str) -> String {
    brand_id.to_uppercase().replace('-', " ")
}

fn ranges_match(ranges: Option<&[BinRange]>, digits: &str) -> bool {
    match ranges {
        None | Some([]) => true,
        Some(ranges) => ranges.iter().any(|r| r.contains(digits)),
    }
}

/// Networks from `info` that `digits` falls into and that are supported.
///
/// The primary brand is always eligible; additional networks must be in
/// `supported` (normalized ids). A network without ranges matches any input.
/// Result order: primary first, then additional networks as listed, without
/// duplicates.
#[must_use]
pub fn available_networks(
    info: &BinInfo,
    digits: &str,
    supported: &BTreeSet<String>,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |brand: &str| {
        let id = normalize_brand(brand);
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    };

    if let Some(primary) = info.brand.as_deref()
        && ranges_match(info.bin_range.as_deref(), digits)
    {
        push(primary);
    }

    for network in info.additional.iter().flatten() {
        if supported.contains(&normalize_brand(&network.brand))
            && ranges_match(network.bin_range.as_deref(), digits)
        {
            push(&network.brand);
        }
    }
    out
}

/// Co-badge state for one card number input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoBadgeSelection {
    supported: BTreeSet<String>,
    available: Vec<String>,
    selected: Option<String>,
}

impl CoBadgeSelection {
    /// Creates a selection for the given supported networks (any spelling).
    #[must_use]
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            supported: supported.into_iter().map(|s| normalize_brand(s.as_ref())).collect(),
            available: Vec::new(),
            selected: None,
        }
    }

    /// Whether any co-badged network is supported.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.supported.is_empty()
    }

    /// Supported network ids.
    #[must_use]
    pub const fn supported(&self) -> &BTreeSet<String> {
        &self.supported
    }

    /// Networks currently offered.
    #[must_use]
    pub fn available(&self) -> &[String] {
        &self.available
    }

    /// The committed network.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// A choice is required while more than one network is offered and none is committed.
    #[must_use]
    pub fn needs_selection(&self) -> bool {
        self.available.len() > 1 && self.selected.is_none()
    }

    /// Recomputes the offered networks. Returns true if they changed.
    ///
    /// A committed network that is no longer offered is cleared. Does nothing
    /// useful while co-badge support is disabled.
    pub fn update(&mut self, info: Option<&BinInfo>, digits: &str) -> bool {
        let next = match info {
            Some(info) if self.is_enabled() => available_networks(info, digits, &self.supported),
            _ => Vec::new(),
        };
        if let Some(selected) = &self.selected
            && !next.contains(selected)
        {
            self.selected = None;
        }
        let changed = next != self.available;
        self.available = next;
        changed
    }

    /// Commits a network. Returns false, and clears any previous choice, if
    /// the network is not currently offered.
    pub fn select(&mut self, network: &str) -> bool {
        let id = normalize_brand(network);
        if self.available.contains(&id) {
            self.selected = Some(id);
            true
        } else {
            self.selected = None;
            false
        }
    }

    /// Drops the offered networks and the choice.
    pub fn clear(&mut self) {
        self.available.clear();
        self.selected = None;
    }
}
