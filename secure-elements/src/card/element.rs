//! Stateful card number element.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use super::{
    brand::{BrandRegistry, format_with_mask},
    classify::{CardClassification, classify, normalize},
    cobadge::CoBadgeSelection,
};
use crate::{
    bin_lookup::{BIN_LENGTH, BinFetcher, BinInfo, BinLookupCache, HttpBinFetcher},
    element::{ElementValue, ValueKind},
};

/// Event type emitted on every change.
pub const TEXT_CHANGE: &str = "textChange";

/// Card number length from which the BIN is reported as 8 digits.
const LONG_BIN_THRESHOLD: usize = 16;

/// Options for a [`CardNumberElement`].
#[derive(Debug, Clone, Default)]
pub struct CardNumberOptions {
    /// Element id used in logs and errors.
    pub element_id: String,
    /// Fetch BIN metadata once six digits are entered.
    pub bin_lookup: bool,
    /// Co-badged networks the host accepts, e.g. `cartes-bancaires`.
    /// Non-empty implies `bin_lookup`.
    pub co_badged_support: Vec<String>,
}

/// One entry of [`ElementEvent::details`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDetail {
    /// `cardBrand`, `cardLast4` or `cardBin`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Detail value.
    pub message: String,
}

impl EventDetail {
    fn new(kind: &str, message: impl Into<String>) -> Self {
        Self { kind: kind.to_owned(), message: message.into() }
    }
}

/// Snapshot of the element after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementEvent {
    /// Always [`TEXT_CHANGE`].
    #[serde(rename = "type")]
    pub event_type: String,
    /// Source element.
    pub element_id: String,
    /// Mask satisfied, Luhn valid, and no network selection pending.
    pub complete: bool,
    /// No input.
    pub empty: bool,
    /// Luhn valid.
    pub valid: bool,
    /// Digit count matches the brand mask.
    pub mask_satisfied: bool,
    /// `cardBrand` always; `cardLast4` and `cardBin` only when complete.
    pub details: Vec<EventDetail>,
    /// BIN metadata, when looked up.
    pub bin_info: Option<BinInfo>,
    /// Committed co-badged network.
    pub selected_network: Option<String>,
}

/// Messages sent to the host and to a brand selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardNumberMessage {
    /// The element changed.
    Event(ElementEvent),
    /// The co-badged networks on offer changed.
    BrandOptionsUpdated(Vec<String>),
}

/// Card metadata safe to show to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMetadata {
    /// Best matching brand, or `unknown`.
    pub card_brand: String,
    /// Last four digits, when complete.
    pub card_last4: Option<String>,
    /// First 6 digits (8 for numbers of 16+ digits), when complete.
    pub card_bin: Option<String>,
}

struct CardState {
    text: Zeroizing<String>,
    classification: CardClassification,
    bin_info: Option<BinInfo>,
    last_bin_lookup: Option<String>,
    cobadge: CoBadgeSelection,
}

impl CardState {
    fn complete(&self) -> bool {
        self.classification.mask_satisfied
            && self.classification.luhn_valid
            && !self.cobadge.needs_selection()
    }

    fn metadata(&self) -> CardMetadata {
        let complete = self.complete();
        let text = self.text.as_str();
        let bin_len = if text.len() < LONG_BIN_THRESHOLD { 6 } else { 8 };
        CardMetadata {
            card_brand: self.classification.brand_or_unknown().to_owned(),
            card_last4: complete.then(|| text[text.len().saturating_sub(4)..].to_owned()),
            card_bin: complete.then(|| text[..bin_len.min(text.len())].to_owned()),
        }
    }

    fn event(&self, element_id: &str) -> ElementEvent {
        let metadata = self.metadata();
        let mut details = vec![EventDetail::new("cardBrand", metadata.card_brand)];
        if let (Some(last4), Some(bin)) = (metadata.card_last4, metadata.card_bin) {
            details.push(EventDetail::new("cardLast4", last4));
            details.push(EventDetail::new("cardBin", bin));
        }
        ElementEvent {
            event_type: TEXT_CHANGE.to_owned(),
            element_id: element_id.to_owned(),
            complete: self.complete(),
            empty: self.text.is_empty(),
            valid: self.classification.luhn_valid,
            mask_satisfied: self.classification.mask_satisfied,
            details,
            bin_info: self.bin_info.clone(),
            selected_network: self.cobadge.selected().map(str::to_owned),
        }
    }

    /// Recomputes co-badge options; true if they changed.
    fn refresh_cobadge(&mut self) -> bool {
        let Self { cobadge, bin_info, text, .. } = self;
        cobadge.update(bin_info.as_ref(), text)
    }
}

/// A card number input.
///
/// Every change reclassifies the whole input, updates BIN lookup and
/// co-badge state, then emits a [`CardNumberMessage::Event`]. BIN lookups
/// are keyed by the first six digits; a result that arrives after the input
/// moved to another BIN (or below six digits) is discarded.
///
/// # Examples
///
/// ```
/// use secure_elements::{
///     card::{CardNumberElement, CardNumberOptions},
///     element::ElementValue,
/// };
///
/// let element = CardNumberElement::new(CardNumberOptions {
///     element_id: "card_number".into(),
///     ..CardNumberOptions::default()
/// });
/// element.set_text("4242 4242 4242 4242");
///
/// assert!(element.is_ready());
/// let metadata = element.metadata();
/// assert_eq!(metadata.card_brand, "visa");
/// assert_eq!(metadata.card_last4.as_deref(), Some("4242"));
/// assert_eq!(metadata.card_bin.as_deref(), Some("42424242"));
/// ```
pub struct CardNumberElement<F = HttpBinFetcher> {
    id: String,
    lookup_enabled: bool,
    registry: Option<Arc<BrandRegistry>>,
    cache: Option<Arc<BinLookupCache<F>>>,
    events: Option<UnboundedSender<CardNumberMessage>>,
    state: Mutex<CardState>,
}

impl CardNumberElement<HttpBinFetcher> {
    /// Creates an element without BIN lookup.
    #[must_use]
    pub fn new(options: CardNumberOptions) -> Self {
        Self::build(options, None)
    }
}

impl<F: BinFetcher> CardNumberElement<F> {
    /// Creates an element that looks BINs up through `cache`.
    #[must_use]
    pub fn with_bin_lookup(options: CardNumberOptions, cache: Arc<BinLookupCache<F>>) -> Self {
        Self::build(options, Some(cache))
    }

    fn build(options: CardNumberOptions, cache: Option<Arc<BinLookupCache<F>>>) -> Self {
        let cobadge = CoBadgeSelection::new(&options.co_badged_support);
        let lookup_enabled = cache.is_some() && (options.bin_lookup || cobadge.is_enabled());
        let state = CardState {
            text: Zeroizing::new(String::new()),
            classification: classify("", BrandRegistry::global()),
            bin_info: None,
            last_bin_lookup: None,
            cobadge,
        };
        Self {
            id: options.element_id,
            lookup_enabled,
            registry: None,
            cache,
            events: None,
            state: Mutex::new(state),
        }
    }

    /// Sends events and brand option updates to `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: UnboundedSender<CardNumberMessage>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Classifies against `registry` instead of the global one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<BrandRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    fn registry(&self) -> &BrandRegistry {
        match self.registry.as_deref() {
            Some(registry) => registry,
            None => BrandRegistry::global(),
        }
    }

    fn state(&self) -> MutexGuard<'_, CardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, message: CardNumberMessage) {
        if let Some(sender) = &self.events
            && sender.send(message).is_err()
        {
            debug!(element_id = %self.id, "event receiver dropped");
        }
    }

    fn publish(&self, state: &CardState, options_changed: bool) {
        if options_changed && state.cobadge.is_enabled() {
            self.emit(CardNumberMessage::BrandOptionsUpdated(state.cobadge.available().to_vec()));
        }
        self.emit(CardNumberMessage::Event(state.event(&self.id)));
    }

    /// Applies new input.
    ///
    /// Returns the BIN to look up when the input reached a new 6-digit
    /// prefix and lookups are enabled; pass it to
    /// [`lookup_bin`](Self::lookup_bin). Never blocks.
    pub fn set_text(&self, text: &str) -> Option<String> {
        let mut guard = self.state();
        let state = &mut *guard;

        state.text = Zeroizing::new(normalize(text));
        state.classification = classify(&state.text, self.registry());

        let mut pending = None;
        if state.text.len() < BIN_LENGTH || !state.classification.numeric {
            state.bin_info = None;
            state.last_bin_lookup = None;
        } else if self.lookup_enabled {
            let bin = &state.text[..BIN_LENGTH];
            if state.last_bin_lookup.as_deref() != Some(bin) {
                // metadata belongs to the previous BIN
                state.bin_info = None;
                state.last_bin_lookup = Some(bin.to_owned());
                pending = Some(bin.to_owned());
            }
        }

        let options_changed = state.refresh_cobadge();
        debug!(
            element_id = %self.id,
            brand = state.classification.brand_or_unknown(),
            complete = state.complete(),
            "card number changed"
        );
        self.publish(state, options_changed);
        pending
    }

    /// Applies a BIN lookup result.
    ///
    /// Returns false, changing nothing, if the input no longer starts with
    /// `bin` or a newer lookup was started.
    pub fn apply_bin_info(&self, bin: &str, info: Option<BinInfo>) -> bool {
        let mut guard = self.state();
        let state = &mut *guard;

        if state.last_bin_lookup.as_deref() != Some(bin) || !state.text.starts_with(bin) {
            debug!(element_id = %self.id, bin, "discarding stale BIN lookup result");
            return false;
        }

        state.bin_info = info;
        let options_changed = state.refresh_cobadge();
        self.publish(state, options_changed);
        true
    }

    /// Looks `bin` up and applies the result. Returns whether it was applied.
    #[instrument(skip(self), fields(element_id = %self.id))]
    pub async fn lookup_bin(&self, bin: String) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        let info = cache.get(&bin).await;
        self.apply_bin_info(&bin, info)
    }

    /// [`set_text`](Self::set_text) followed by the lookup it asks for.
    pub async fn update(&self, text: &str) {
        if let Some(bin) = self.set_text(text) {
            self.lookup_bin(bin).await;
        }
    }

    /// Commits a co-badged network. Returns false, clearing any previous
    /// choice, if the network is not on offer.
    pub fn select_network(&self, network: &str) -> bool {
        let mut guard = self.state();
        let accepted = guard.cobadge.select(network);
        debug!(element_id = %self.id, network, accepted, "co-badged network selected");
        self.publish(&guard, false);
        accepted
    }

    /// Clears the input.
    pub fn clear(&self) {
        self.set_text("");
    }

    /// Current classification.
    #[must_use]
    pub fn classification(&self) -> CardClassification {
        self.state().classification.clone()
    }

    /// Current BIN metadata.
    #[must_use]
    pub fn bin_info(&self) -> Option<BinInfo> {
        self.state().bin_info.clone()
    }

    /// Co-badged networks on offer.
    #[must_use]
    pub fn available_networks(&self) -> Vec<String> {
        self.state().cobadge.available().to_vec()
    }

    /// Committed co-badged network.
    #[must_use]
    pub fn selected_network(&self) -> Option<String> {
        self.state().cobadge.selected().map(str::to_owned)
    }

    /// Whether the number is complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state().complete()
    }

    /// Brand, last four and BIN.
    #[must_use]
    pub fn metadata(&self) -> CardMetadata {
        self.state().metadata()
    }

    /// The event describing the current state.
    #[must_use]
    pub fn event(&self) -> ElementEvent {
        self.state().event(&self.id)
    }

    /// Input formatted with the current mask.
    #[must_use]
    pub fn display_text(&self) -> String {
        let state = self.state();
        format_with_mask(&state.classification.mask, &state.text)
    }
}

impl<F: BinFetcher> ElementValue for CardNumberElement<F> {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn is_ready(&self) -> bool {
        self.is_complete()
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::String
    }

    fn read(&self) -> String {
        self.state().text.to_string()
    }

    fn read_if_ready(&self) -> Option<String> {
        let state = self.state();
        state.complete().then(|| state.text.to_string())
    }
}

impl<F> fmt::Debug for CardNumberElement<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardNumberElement")
            .field("id", &self.id)
            .field("lookup_enabled", &self.lookup_enabled)
            .finish_non_exhaustive()
    }
}
