//! BIN enrichment: metadata types, the lookup cache, and the HTTP fetcher.

mod cache;
mod http;
mod info;

pub use self::{
    cache::{BIN_LENGTH, BinFetcher, BinLookupCache, DEFAULT_CAPACITY, is_valid_bin},
    http::{HttpBinFetcher, USER_AGENT},
    info::{BinInfo, BinRange, CardInfo, CardIssuerDetails},
};
