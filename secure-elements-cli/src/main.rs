//! `secure-elements`: encrypt token requests and classify card numbers from
//! the command line.
//!
//! ```text
//! secure-elements encrypt --public-key <KEY> --key-id <ID> --type card '{"number":"4242424242424242"}'
//! secure-elements classify 4242424242424242
//! secure-elements --config elements.toml classify --bin-lookup --co-badged cartes-bancaires 4020971234567899
//! ```

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest"
)]

mod observability;

use std::{
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use clap::{Parser, Subcommand};
use observability::{LogFormat, init_observability};
use secure_elements::{
    ElementsError, Result,
    bin_lookup::{BinLookupCache, HttpBinFetcher},
    card::{CardNumberElement, CardNumberOptions},
    config::ElementsConfig,
    element::ElementValue as _,
    encrypt_token::{EncryptTokenRequest, encrypt_token},
    json::RequestNode,
    redact::mask_pan,
};
use serde_json::{Value, json};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "secure-elements", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, short, env = "SECURE_ELEMENTS_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, ignore_case = true, env = "LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Debug logging for this crate.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encrypt a token request as a JWE.
    Encrypt {
        /// Recipient X25519 public key (base64 or PEM). Defaults to `[encryption]` in the config.
        #[arg(long)]
        public_key: Option<String>,

        /// Recipient key id. Defaults to `[encryption]` in the config.
        #[arg(long)]
        key_id: Option<String>,

        /// Token type.
        #[arg(long = "type", default_value = "token")]
        token_type: String,

        /// Token data as JSON; read from stdin when omitted.
        data: Option<String>,
    },

    /// Classify a card number.
    Classify {
        /// Card number; spaces are ignored.
        number: String,

        /// Enrich with BIN metadata (needs `api_key` in the config).
        #[arg(long)]
        bin_lookup: bool,

        /// Accepted co-badged networks; implies `--bin-lookup`.
        #[arg(long = "co-badged", value_delimiter = ',')]
        co_badged: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_observability(cli.log_format.unwrap_or_else(LogFormat::from_env), cli.verbose);

    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let config = load_config(cli.config.as_ref())?;

    let output = match cli.command {
        Command::Encrypt { public_key, key_id, token_type, data } => {
            encrypt(&config, public_key, key_id, token_type, data)?
        }
        Command::Classify { number, bin_lookup, co_badged } => {
            classify(&config, &number, bin_lookup, co_badged).await?
        }
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

fn load_config(path: Option<&PathBuf>) -> Result<ElementsConfig> {
    let Some(path) = path else {
        return Ok(ElementsConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| ElementsError::Config(format!("cannot read {}: {e}", path.display())))?;
    let config = ElementsConfig::from_toml_str(&text)?;
    info!(path = %path.display(), base_url = %config.base_url(), "configuration loaded");
    Ok(config)
}

fn encrypt(
    config: &ElementsConfig,
    public_key: Option<String>,
    key_id: Option<String>,
    token_type: String,
    data: Option<String>,
) -> Result<Value> {
    let configured = config.encryption.as_ref();
    let public_key = public_key
        .or_else(|| configured.map(|k| k.public_key.clone()))
        .ok_or_else(|| ElementsError::Config("no public key given or configured".to_owned()))?;
    let key_id = key_id
        .or_else(|| configured.map(|k| k.key_id.clone()))
        .ok_or_else(|| ElementsError::Config("no key id given or configured".to_owned()))?;

    let data = match data {
        Some(data) => data,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| ElementsError::InvalidInput(format!("cannot read stdin: {e}")))?;
            buf
        }
    };
    let data: Value = serde_json::from_str(data.trim())?;

    let request = RequestNode::map().with("type", token_type).with("data", data);
    let response = encrypt_token(EncryptTokenRequest::single(request, public_key, key_id))?;
    Ok(serde_json::to_value(response)?)
}

async fn classify(
    config: &ElementsConfig,
    number: &str,
    bin_lookup: bool,
    co_badged: Vec<String>,
) -> Result<Value> {
    let options = CardNumberOptions {
        element_id: "card_number".to_owned(),
        bin_lookup,
        co_badged_support: co_badged,
    };

    if options.bin_lookup || !options.co_badged_support.is_empty() {
        let fetcher = HttpBinFetcher::from_config(config)?;
        let cache = Arc::new(BinLookupCache::with_capacity(
            fetcher,
            config.bin_lookup.cache_capacity,
        ));
        let element = CardNumberElement::with_bin_lookup(options, cache);
        element.update(number).await;
        Ok(describe(&element))
    } else {
        let element = CardNumberElement::new(options);
        element.set_text(number);
        Ok(describe(&element))
    }
}

fn describe(element: &CardNumberElement) -> Value {
    let classification = element.classification();
    let event = element.event();
    let metadata = element.metadata();
    let digits = element.read();

    json!({
        "number": mask_pan(&digits),
        "brand": metadata.card_brand,
        "candidates": classification
            .candidates
            .iter()
            .map(|c| c.rule.id().to_owned())
            .collect::<Vec<_>>(),
        "maskSatisfied": event.mask_satisfied,
        "luhnValid": event.valid,
        "complete": event.complete,
        "last4": metadata.card_last4,
        "bin": metadata.card_bin,
        "binInfo": event.bin_info,
        "availableNetworks": element.available_networks(),
    })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    const KEY: &str = "3p7bfXt9wbTTW2HC7OQ1Nz+DQ8hbeGdNrfx+FG+IK08=";

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_classify() {
        let cli = Cli::parse_from([
            "secure-elements",
            "classify",
            "--co-badged",
            "cartes-bancaires,visa",
            "4020971234567899",
        ]);
        let Command::Classify { number, co_badged, bin_lookup } = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(number, "4020971234567899");
        assert_eq!(co_badged, ["cartes-bancaires", "visa"]);
        assert!(!bin_lookup);
    }

    #[tokio::test]
    async fn test_classify_offline() {
        let value = classify(&ElementsConfig::default(), "4242 4242 4242 4242", false, vec![])
            .await
            .unwrap();
        assert_eq!(value["brand"], "visa");
        assert_eq!(value["complete"], true);
        assert_eq!(value["number"], "424242******4242");
        assert_eq!(value["bin"], "42424242");
    }

    #[tokio::test]
    async fn test_classify_lookup_requires_api_key() {
        let result = classify(&ElementsConfig::default(), "424242", true, vec![]).await;
        assert!(matches!(result, Err(ElementsError::Config(_))));
    }

    #[test]
    fn test_encrypt_with_flags() {
        let value = encrypt(
            &ElementsConfig::default(),
            Some(KEY.to_owned()),
            Some("key-1".to_owned()),
            "card".to_owned(),
            Some(r#"{"number":"4242424242424242"}"#.to_owned()),
        )
        .unwrap();
        assert_eq!(value["type"], "card");
        assert_eq!(value["encrypted"].as_str().unwrap().split('.').count(), 5);
    }

    #[test]
    fn test_encrypt_needs_key() {
        let result = encrypt(&ElementsConfig::default(), None, None, "card".to_owned(), None);
        assert!(matches!(result, Err(ElementsError::Config(_))));
    }
}
