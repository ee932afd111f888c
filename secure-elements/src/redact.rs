//! Redaction of card data before it reaches a log line.

/// Shortest digit run treated as a card number.
const MIN_PAN_DIGITS: usize = 12;

/// Masks a card number for display, keeping at most the first six and last
/// four digits.
///
/// Inputs shorter than eleven digits are fully masked.
///
/// ```
/// use secure_elements::redact::mask_pan;
///
/// assert_eq!(mask_pan("4242424242424242"), "424242******4242");
/// assert_eq!(mask_pan("4242"), "****");
/// ```
#[must_use]
pub fn mask_pan(digits: &str) -> String {
    let len = digits.chars().count();
    if len < 11 {
        return "*".repeat(len);
    }
    digits
        .chars()
        .enumerate()
        .map(|(i, c)| if i < 6 || i >= len - 4 { c } else { '*' })
        .collect()
}

/// Redacts card numbers and CVC values from free-form text.
///
/// - Runs of 12 or more digits, optionally separated by single spaces or
///   dashes, become `XXXX-XXXX-XXXX-XXXX`. A longer run may hold a card
///   number joined to other digits, so it is redacted whole.
/// - Three or four digits following `cvv`, `cvc`, `cvv2` or `cid` and a `:`,
///   `=` or space become `***`
///
/// ```
/// use secure_elements::redact::redact_sensitive;
///
/// assert_eq!(
///     redact_sensitive("card 4242 4242 4242 4242 cvc: 123"),
///     "card XXXX-XXXX-XXXX-XXXX cvc: ***"
/// );
/// ```
#[must_use]
pub fn redact_sensitive(input: &str) -> String {
    redact_cvv(&redact_card_numbers(input))
}

fn redact_card_numbers(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() || (i > 0 && chars[i - 1].is_ascii_digit()) {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        // scan a run of digits with single separators between them
        let mut end = i;
        let mut digits = 0;
        let mut j = i;
        while j < chars.len() {
            if chars[j].is_ascii_digit() {
                digits += 1;
                j += 1;
                end = j;
            } else if (chars[j] == ' ' || chars[j] == '-')
                && j + 1 < chars.len()
                && chars[j + 1].is_ascii_digit()
                && digits > 0
            {
                j += 1;
            } else {
                break;
            }
        }

        if digits >= MIN_PAN_DIGITS {
            out.push_str("XXXX-XXXX-XXXX-XXXX");
            i = end;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn redact_cvv(input: &str) -> String {
    const KEYWORDS: [&str; 4] = ["cvv2", "cvv", "cvc", "cid"];

    let chars: Vec<char> = input.chars().collect();
    let lower: Vec<char> = input.to_lowercase().chars().collect();
    if lower.len() != chars.len() {
        return input.to_owned();
    }

    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        let keyword = KEYWORDS.iter().find(|k| {
            let k: Vec<char> = k.chars().collect();
            lower.get(i..i + k.len()) == Some(k.as_slice())
        });

        if let Some(keyword) = keyword {
            let after = i + keyword.len();
            if matches!(chars.get(after), Some(':' | '=' | ' ')) {
                let mut j = after + 1;
                while chars.get(j).is_some_and(|c| *c == ' ') {
                    j += 1;
                }
                let run = chars[j..].iter().take_while(|c| c.is_ascii_digit()).count();
                if run == 3 || run == 4 {
                    out.extend(&chars[i..j]);
                    out.push_str("***");
                    i = j + run;
                    continue;
                }
            }
        }

        out.push(chars[i]);
        i += 1;
    }
    out
}
