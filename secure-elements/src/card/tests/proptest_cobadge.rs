use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::{
    bin_lookup::{BinInfo, BinRange, CardInfo, CardIssuerDetails},
    card::{available_networks, normalize_brand},
};

const BRANDS: &[&str] = &["VISA", "CARTES BANCAIRES", "MASTERCARD", "MAESTRO", "cartes_bancaires"];
const IDS: &[&str] = &["visa", "cartes-bancaires", "mastercard", "maestro"];

fn bin_range() -> impl Strategy<Value = BinRange> {
    ("[0-9]{6,8}", "[0-9]{6,8}").prop_map(|(min, max)| BinRange::new(min, max))
}

fn ranges() -> impl Strategy<Value = Option<Vec<BinRange>>> {
    prop::option::of(prop::collection::vec(bin_range(), 0..3))
}

fn network() -> impl Strategy<Value = CardInfo> {
    (prop::sample::select(BRANDS), ranges()).prop_map(|(brand, bin_range)| CardInfo {
        brand: brand.to_owned(),
        funding: "DEBIT".to_owned(),
        issuer: CardIssuerDetails { country: "FR".to_owned(), name: "BANQUE".to_owned() },
        bin_range,
    })
}

fn bin_info() -> impl Strategy<Value = BinInfo> {
    (
        prop::option::of(prop::sample::select(BRANDS)),
        ranges(),
        prop::collection::vec(network(), 0..4),
    )
        .prop_map(|(brand, bin_range, additional)| BinInfo {
            brand: brand.map(str::to_owned),
            bin_range,
            additional: Some(additional),
            ..BinInfo::default()
        })
}

fn supported() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(prop::sample::select(IDS).prop_map(str::to_owned), 0..4)
}

/// Keeps only the additional networks that survived filtering.
fn retain_offered(info: &BinInfo, offered: &[String]) -> BinInfo {
    let mut kept = info.clone();
    if let Some(additional) = kept.additional.as_mut() {
        additional.retain(|network| offered.contains(&normalize_brand(&network.brand)));
    }
    kept
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_filtering_twice_changes_nothing(
        info in bin_info(),
        digits in "[0-9]{6,16}",
        supported in supported(),
    ) {
        let offered = available_networks(&info, &digits, &supported);
        let again = available_networks(&retain_offered(&info, &offered), &digits, &supported);
        prop_assert_eq!(offered, again);
    }

    #[test]
    fn test_offered_networks_are_primary_or_supported(
        info in bin_info(),
        digits in "[0-9]{6,16}",
        supported in supported(),
    ) {
        let primary = info.brand.as_deref().map(normalize_brand);
        let offered = available_networks(&info, &digits, &supported);

        let unique: BTreeSet<&String> = offered.iter().collect();
        prop_assert_eq!(unique.len(), offered.len());
        for id in &offered {
            prop_assert!(primary.as_ref() == Some(id) || supported.contains(id), "{} offered", id);
        }
    }

    #[test]
    fn test_filtering_is_deterministic(
        info in bin_info(),
        digits in "[0-9]{6,16}",
        supported in supported(),
    ) {
        prop_assert_eq!(
            available_networks(&info, &digits, &supported),
            available_networks(&info, &digits, &supported)
        );
    }
}
