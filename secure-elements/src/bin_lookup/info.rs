//! BIN enrichment response types.

use serde::{Deserialize, Serialize};

/// Issuing bank details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardIssuerDetails {
    /// ISO country code.
    pub country: String,
    /// Issuer name.
    pub name: String,
}

/// An inclusive range of BINs, as digit strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinRange {
    /// Lower bound.
    pub bin_min: String,
    /// Upper bound.
    pub bin_max: String,
}

impl BinRange {
    /// Creates a range.
    #[must_use]
    pub fn new(bin_min: impl Into<String>, bin_max: impl Into<String>) -> Self {
        Self { bin_min: bin_min.into(), bin_max: bin_max.into() }
    }

    /// Whether `digits` falls inside the range.
    ///
    /// Each bound is compared over the length it shares with the input, as
    /// integers, so a 6-digit input can be checked against 8-digit bounds.
    #[must_use]
    pub fn contains(&self, digits: &str) -> bool {
        fn prefix_value(s: &str, n: usize) -> Option<u64> {
            s.get(..n).filter(|p| p.bytes().all(|b| b.is_ascii_digit())).and_then(|p| p.parse().ok())
        }

        if digits.is_empty() {
            return false;
        }
        let lo_len = digits.len().min(self.bin_min.len());
        let hi_len = digits.len().min(self.bin_max.len());
        match (
            prefix_value(digits, lo_len),
            prefix_value(&self.bin_min, lo_len),
            prefix_value(digits, hi_len),
            prefix_value(&self.bin_max, hi_len),
        ) {
            (Some(value_lo), Some(min), Some(value_hi), Some(max)) => {
                value_lo >= min && value_hi <= max
            }
            _ => false,
        }
    }
}

/// An additional network a co-badged BIN belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInfo {
    /// Network brand, e.g. `CARTES BANCAIRES`.
    pub brand: String,
    /// Funding type.
    pub funding: String,
    /// Issuer for this network.
    pub issuer: CardIssuerDetails,
    /// Ranges this network covers; absent means the whole BIN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_range: Option<Vec<BinRange>>,
}

/// Card metadata for a 6-digit BIN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinInfo {
    /// Primary brand.
    #[serde(default)]
    pub brand: Option<String>,
    /// Funding type (credit, debit, prepaid).
    #[serde(default)]
    pub funding: Option<String>,
    /// Issuing bank.
    #[serde(default)]
    pub issuer: Option<CardIssuerDetails>,
    /// Market segment.
    #[serde(default)]
    pub segment: Option<String>,
    /// Ranges the primary brand covers; absent means the whole BIN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_range: Option<Vec<BinRange>>,
    /// Other networks on the same BIN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<Vec<CardInfo>>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let info: BinInfo = serde_json::from_value(json!({
            "brand": "VISA",
            "funding": "DEBIT",
            "issuer": {"country": "FR", "name": "BANQUE"},
            "segment": "Consumer",
            "binRange": [{"binMin": "40209700", "binMax": "40209799"}],
            "additional": [{
                "brand": "CARTES BANCAIRES",
                "funding": "DEBIT",
                "issuer": {"country": "FR", "name": "BANQUE"},
                "binRange": [{"binMin": "40209700", "binMax": "40209799"}]
            }]
        }))
        .unwrap();

        assert_eq!(info.brand.as_deref(), Some("VISA"));
        assert_eq!(info.issuer.as_ref().map(|i| i.country.as_str()), Some("FR"));
        assert_eq!(info.bin_range.as_ref().map(Vec::len), Some(1));
        assert_eq!(info.additional.as_ref().unwrap()[0].brand, "CARTES BANCAIRES");
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let info: BinInfo = serde_json::from_value(json!({})).unwrap();
        assert_eq!(info, BinInfo::default());
    }

    #[test]
    fn test_range_contains_over_shared_prefix() {
        let range = BinRange::new("40209700", "40209799");
        assert!(range.contains("402097"));
        assert!(range.contains("4020971234567899"));
        assert!(range.contains("40209799"));
        assert!(!range.contains("40209800"));
        assert!(!range.contains("402098"));
        assert!(!range.contains(""));
    }

    #[test]
    fn test_range_with_short_bounds() {
        let range = BinRange::new("51", "55");
        assert!(range.contains("5454422955385717"));
        assert!(!range.contains("5654"));
    }
}
