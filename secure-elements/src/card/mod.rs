//! Card identification engine.
//!
//! - [`brand`]: brand rules, masks and the process-wide [`BrandRegistry`]
//! - [`classify()`]: brand candidates, best match, mask and Luhn for one input
//! - [`CoBadgeSelection`]: co-badged networks from BIN metadata
//! - [`CardNumberElement`]: the stateful input tying these together
//! - [`BrandSelector`]: network picker fed by the element's messages

pub mod brand;
mod classify;
mod cobadge;
mod element;
mod luhn;
mod selector;

#[cfg(test)]
#[path = "tests/proptest_luhn.rs"]
mod proptest_luhn;

#[cfg(test)]
#[path = "tests/proptest_cobadge.rs"]
mod proptest_cobadge;

pub use self::{
    brand::{BrandRegistry, BrandRule, MaskElement, PatternGroup},
    classify::{BrandCandidate, CardClassification, UNKNOWN_BRAND, classify, normalize},
    cobadge::{CoBadgeSelection, available_networks, display_name, normalize_brand},
    element::{
        CardMetadata, CardNumberElement, CardNumberMessage, CardNumberOptions, ElementEvent,
        EventDetail, TEXT_CHANGE,
    },
    luhn::{check_digit, luhn_valid},
    selector::{BrandOption, BrandSelector},
};
