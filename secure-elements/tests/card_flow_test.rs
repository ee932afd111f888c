//! End-to-end card number flows: classification, BIN enrichment and
//! co-badged network selection.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use secure_elements::{
    ElementsError, Result,
    bin_lookup::{BinFetcher, BinInfo, BinLookupCache, BinRange, CardInfo, CardIssuerDetails},
    card::{BrandSelector, CardNumberElement, CardNumberMessage, CardNumberOptions},
    element::ElementValue,
};
use tokio::sync::mpsc;

/// Serves a co-badged VISA / CARTES BANCAIRES BIN for `402097` and a plain
/// VISA BIN for everything else; `400000` fails.
#[derive(Debug, Default)]
struct FakeEnrichment {
    calls: AtomicUsize,
    delay_ms: u64,
}

fn issuer() -> CardIssuerDetails {
    CardIssuerDetails { country: "FR".into(), name: "BANQUE".into() }
}

impl BinFetcher for FakeEnrichment {
    fn fetch<'a>(&'a self, bin: &'a str) -> impl Future<Output = Result<BinInfo>> + Send + 'a {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            match bin {
                "400000" => Err(ElementsError::BinLookup("HTTP error! status: 500".into())),
                "402097" => Ok(BinInfo {
                    brand: Some("VISA".into()),
                    funding: Some("DEBIT".into()),
                    issuer: Some(issuer()),
                    additional: Some(vec![CardInfo {
                        brand: "CARTES BANCAIRES".into(),
                        funding: "DEBIT".into(),
                        issuer: issuer(),
                        bin_range: Some(vec![BinRange::new("40209700", "40209799")]),
                    }]),
                    ..BinInfo::default()
                }),
                _ => Ok(BinInfo { brand: Some("VISA".into()), ..BinInfo::default() }),
            }
        }
    }
}

fn options(co_badged: &[&str]) -> CardNumberOptions {
    CardNumberOptions {
        element_id: "card_number".into(),
        bin_lookup: true,
        co_badged_support: co_badged.iter().map(|s| (*s).to_owned()).collect(),
    }
}

type Cache = Arc<BinLookupCache<FakeEnrichment>>;

fn element(co_badged: &[&str]) -> (CardNumberElement<FakeEnrichment>, Cache) {
    let cache = Arc::new(BinLookupCache::new(FakeEnrichment::default()));
    (CardNumberElement::with_bin_lookup(options(co_badged), Arc::clone(&cache)), cache)
}

#[test]
fn test_brand_resolution_vectors() {
    let element = CardNumberElement::new(CardNumberOptions::default());

    for (number, brand, last4, bin) in [
        ("4242424242424242", "visa", "4242", "42424242"),
        ("5454422955385717", "mastercard", "5717", "54544229"),
        ("348570250878868", "american-express", "8868", "348570"),
    ] {
        element.set_text(number);
        assert!(element.is_complete(), "{brand} should be complete");
        let metadata = element.metadata();
        assert_eq!(metadata.card_brand, brand);
        assert_eq!(metadata.card_last4.as_deref(), Some(last4));
        assert_eq!(metadata.card_bin.as_deref(), Some(bin));
    }
}

#[tokio::test]
async fn test_cobadged_card_requires_selection() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (element, _cache) = element(&["cartes-bancaires"]);
    let element = element.with_events(tx);

    element.update("4020971234567899").await;

    assert_eq!(element.available_networks(), ["visa", "cartes-bancaires"]);
    assert!(element.classification().mask_satisfied);
    assert!(element.classification().luhn_valid);
    assert!(!element.is_complete());
    assert!(!element.is_ready());

    let mut selector = BrandSelector::new();
    while let Ok(message) = rx.try_recv() {
        selector.handle(&message);
    }
    assert!(selector.is_visible());
    assert_eq!(selector.options()[1].label, "CARTES BANCAIRES");

    assert!(selector.select("cartes-bancaires", &element));
    assert!(element.is_complete());
    assert_eq!(element.selected_network().as_deref(), Some("cartes-bancaires"));

    let last = std::iter::from_fn(|| rx.try_recv().ok()).last();
    let Some(CardNumberMessage::Event(event)) = last else {
        panic!("selection should emit an event");
    };
    assert!(event.complete);
    assert_eq!(event.selected_network.as_deref(), Some("cartes-bancaires"));
}

#[tokio::test]
async fn test_without_cobadge_support_single_brand_completes() {
    let (element, _cache) = element(&[]);
    element.update("4020971234567899").await;

    assert!(element.bin_info().is_some());
    assert!(element.available_networks().is_empty());
    assert!(element.is_complete());
}

#[tokio::test]
async fn test_unsupported_network_is_rejected() {
    let (element, _cache) = element(&["cartes-bancaires"]);
    element.update("4020971234567899").await;

    assert!(element.select_network("cartes-bancaires"));
    assert!(!element.select_network("mastercard"));
    assert_eq!(element.selected_network(), None);
    assert!(!element.is_complete());
}

#[tokio::test]
async fn test_shortening_below_bin_clears_selection() {
    let (element, _cache) = element(&["cartes-bancaires"]);
    element.update("4020971234567899").await;
    assert!(element.select_network("visa"));

    element.update("40209").await;
    assert_eq!(element.bin_info(), None);
    assert_eq!(element.selected_network(), None);
    assert!(element.available_networks().is_empty());
}

#[tokio::test]
async fn test_stale_lookup_is_discarded() {
    let (element, _cache) = element(&["cartes-bancaires"]);

    let first = element.set_text("402097").expect("new BIN triggers lookup");
    let second = element.set_text("424242").expect("changed BIN triggers lookup");
    assert_eq!(first, "402097");
    assert_eq!(second, "424242");

    // the result for the abandoned BIN arrives after the input moved on
    assert!(element.lookup_bin(second).await);
    assert!(!element.lookup_bin(first).await);

    assert_eq!(element.bin_info().and_then(|info| info.additional), None);
    assert!(element.available_networks().len() <= 1);
}

#[tokio::test]
async fn test_same_bin_is_looked_up_once() {
    let (element, cache) = element(&[]);

    element.update("424242").await;
    element.update("4242424").await;
    element.update("42424242").await;
    element.update("4242424242424242").await;

    assert_eq!(cache.fetcher().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_lookup_leaves_no_metadata() {
    let (element, cache) = element(&[]);
    element.update("4000000000000002").await;

    assert_eq!(element.bin_info(), None);
    assert!(cache.is_empty());
    assert_eq!(element.metadata().card_brand, "visa");
}

#[tokio::test]
async fn test_elements_share_one_cache() {
    let cache = Arc::new(BinLookupCache::new(FakeEnrichment { delay_ms: 20, ..Default::default() }));
    let a = CardNumberElement::with_bin_lookup(options(&[]), Arc::clone(&cache));
    let b = CardNumberElement::with_bin_lookup(options(&[]), Arc::clone(&cache));

    tokio::join!(a.update("555555"), b.update("555555"));

    assert_eq!(cache.fetcher().calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.bin_info(), b.bin_info());
}
