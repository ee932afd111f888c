//! Co-badged network picker that follows a card number element.

use super::{
    cobadge::{display_name, normalize_brand},
    element::{CardNumberElement, CardNumberMessage},
};
use crate::bin_lookup::BinFetcher;

/// One selectable network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandOption {
    /// Normalized brand id, e.g. `cartes-bancaires`.
    pub id: String,
    /// Display name, e.g. `CARTES BANCAIRES`.
    pub label: String,
}

/// Tracks the networks a [`CardNumberElement`] offers and forwards the
/// user's choice back to it.
///
/// Feed it every [`CardNumberMessage`] the element sends. The selector is
/// only shown while more than one network is on offer.
#[derive(Debug, Clone, Default)]
pub struct BrandSelector {
    options: Vec<BrandOption>,
    selected: Option<String>,
}

impl BrandSelector {
    /// Creates an empty, hidden selector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a message from the card number element. Returns true if the
    /// options or the selection changed.
    pub fn handle(&mut self, message: &CardNumberMessage) -> bool {
        match message {
            CardNumberMessage::BrandOptionsUpdated(networks) => self.set_options(networks),
            CardNumberMessage::Event(event) => {
                let changed = self.selected != event.selected_network;
                self.selected.clone_from(&event.selected_network);
                changed
            }
        }
    }

    fn set_options(&mut self, networks: &[String]) -> bool {
        let options: Vec<BrandOption> = networks
            .iter()
            .map(|network| {
                let id = normalize_brand(network);
                let label = display_name(&id);
                BrandOption { id, label }
            })
            .collect();

        if options == self.options {
            return false;
        }
        if let Some(selected) = &self.selected
            && !options.iter().any(|o| &o.id == selected)
        {
            self.selected = None;
        }
        self.options = options;
        true
    }

    /// Whether the selector should be shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.options.len() > 1
    }

    /// Networks on offer.
    #[must_use]
    pub fn options(&self) -> &[BrandOption] {
        &self.options
    }

    /// The committed network.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Commits `network` on the element. Returns false if the element did
    /// not accept it.
    pub fn select<F: BinFetcher>(&mut self, network: &str, element: &CardNumberElement<F>) -> bool {
        let accepted = element.select_network(network);
        self.selected = accepted.then(|| normalize_brand(network));
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{ElementEvent, TEXT_CHANGE};

    fn event(selected: Option<&str>) -> CardNumberMessage {
        CardNumberMessage::Event(ElementEvent {
            event_type: TEXT_CHANGE.to_owned(),
            element_id: "card_number".to_owned(),
            complete: false,
            empty: false,
            valid: false,
            mask_satisfied: false,
            details: Vec::new(),
            bin_info: None,
            selected_network: selected.map(str::to_owned),
        })
    }

    #[test]
    fn test_hidden_with_one_option() {
        let mut selector = BrandSelector::new();
        assert!(!selector.is_visible());
        selector.handle(&CardNumberMessage::BrandOptionsUpdated(vec!["visa".into()]));
        assert!(!selector.is_visible());
    }

    #[test]
    fn test_visible_with_display_names() {
        let mut selector = BrandSelector::new();
        let changed = selector.handle(&CardNumberMessage::BrandOptionsUpdated(vec![
            "visa".into(),
            "CARTES BANCAIRES".into(),
        ]));
        assert!(changed);
        assert!(selector.is_visible());
        let labels: Vec<&str> = selector.options().iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["VISA", "CARTES BANCAIRES"]);
        assert_eq!(selector.options()[1].id, "cartes-bancaires");
    }

    #[test]
    fn test_follows_element_selection() {
        let mut selector = BrandSelector::new();
        selector.handle(&CardNumberMessage::BrandOptionsUpdated(vec![
            "visa".into(),
            "cartes-bancaires".into(),
        ]));
        assert!(selector.handle(&event(Some("visa"))));
        assert_eq!(selector.selected(), Some("visa"));
        assert!(!selector.handle(&event(Some("visa"))));

        // network dropped from the offer
        selector.handle(&CardNumberMessage::BrandOptionsUpdated(vec!["cartes-bancaires".into()]));
        assert_eq!(selector.selected(), None);
    }

    #[test]
    fn test_unchanged_options() {
        let mut selector = BrandSelector::new();
        let networks = vec!["visa".to_owned(), "cartes-bancaires".to_owned()];
        assert!(selector.handle(&CardNumberMessage::BrandOptionsUpdated(networks.clone())));
        assert!(!selector.handle(&CardNumberMessage::BrandOptionsUpdated(networks)));
    }
}
