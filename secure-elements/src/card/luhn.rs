//! Luhn (mod 10) checksum.

/// Returns true if `digits` is a non-empty digit string passing the Luhn check.
///
/// Walking from the rightmost digit, every second digit is doubled with
/// `9` contributing `9` and `0..=8` contributing `(d * 2) % 9`.
///
/// ```
/// use secure_elements::card::luhn_valid;
///
/// assert!(luhn_valid("4242424242424242"));
/// assert!(!luhn_valid("4129939187355598"));
/// assert!(!luhn_valid(""));
/// ```
#[must_use]
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }

    let mut sum: u32 = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(d) = c.to_digit(10) else {
            return false;
        };
        let odd = i % 2 == 1;
        sum += match (odd, d) {
            (true, 9) => 9,
            (true, _) => (d * 2) % 9,
            (false, _) => d,
        };
    }
    sum % 10 == 0
}

/// Computes the check digit that makes `payload` followed by it Luhn-valid.
///
/// Returns `None` if `payload` contains a non-digit.
#[must_use]
pub fn check_digit(payload: &str) -> Option<u32> {
    let mut sum: u32 = 0;
    // payload digits shift one position left once the check digit is appended
    for (i, c) in payload.chars().rev().enumerate() {
        let d = c.to_digit(10)?;
        sum += if i % 2 == 0 {
            if d == 9 { 9 } else { (d * 2) % 9 }
        } else {
            d
        };
    }
    Some((10 - sum % 10) % 10)
}
