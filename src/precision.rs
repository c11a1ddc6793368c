//! The `precision` attribute: `"2"`/`"F2"` for decimal places, `"E3"` for
//! significant digits.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::ParseError;

static PRECISION_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_precision_regex() -> &'static Regex {
    PRECISION_REGEX.get_or_init(|| {
        Regex::new(r"^(?:F?(\d+)|E(\d+))$").expect("Failed to compile precision regex")
    })
}

/// How a precision degree is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecisionKind {
    DecimalPlaces,
    SignificantDigits,
}

impl PrecisionKind {
    pub fn description(self) -> &'static str {
        match self {
            PrecisionKind::DecimalPlaces => "decimal places",
            PrecisionKind::SignificantDigits => "significant digits",
        }
    }
}

impl fmt::Display for PrecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A parsed precision attribute.
///
/// Two precisions are only ordered against each other when they count the
/// same kind of digit, so `partial_cmp` returns `None` for `"F2"` vs `"E2"`.
/// Equality follows the same rule: `"2"` and `"F2"` are equal.
#[derive(Debug, Clone)]
pub struct Precision {
    value: String,
    kind: PrecisionKind,
    degree: u32,
}

impl Precision {
    pub const PATTERN: &'static str = r"(?:F?(\d+)|E(\d+))";

    pub fn parse(value: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::Precision {
            value: value.to_string(),
            pattern: Self::PATTERN,
        };
        let caps = get_precision_regex().captures(value).ok_or_else(invalid)?;
        let (kind, digits) = match (caps.get(1), caps.get(2)) {
            (Some(digits), _) => (PrecisionKind::DecimalPlaces, digits),
            (None, Some(digits)) => (PrecisionKind::SignificantDigits, digits),
            (None, None) => return Err(invalid()),
        };
        let degree = digits.as_str().parse::<u32>().map_err(|_| invalid())?;

        Ok(Self {
            value: value.to_string(),
            kind,
            degree,
        })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> PrecisionKind {
        self.kind
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    pub fn uses_significant_digits(&self) -> bool {
        self.kind == PrecisionKind::SignificantDigits
    }

    pub fn comparable_to(&self, other: &Precision) -> bool {
        self.kind == other.kind
    }

    /// Whether this precision allows more digits than `other`.
    ///
    /// `None` when the two count different kinds of digit.
    pub fn is_more_precise_than(&self, other: &Precision) -> Option<bool> {
        self.partial_cmp(other).map(|ord| ord == Ordering::Greater)
    }

    /// Human readable form, e.g. `"2 decimal places"`
    pub fn description(&self) -> String {
        format!("{} {}", self.degree, self.kind.description())
    }

    /// Whether the numeric text `value` carries more digits than allowed.
    ///
    /// Values that are not finite decimal numbers never exceed a precision;
    /// rejecting those is the datatype's job.
    pub fn exceeded_by_value(&self, value: &str) -> bool {
        let Some(number) = DecimalText::parse(value) else {
            return false;
        };
        let digits = match self.kind {
            PrecisionKind::DecimalPlaces => number.decimal_places(),
            PrecisionKind::SignificantDigits => number.significant_digits(),
        };
        digits > u64::from(self.degree)
    }
}

impl PartialEq for Precision {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.degree == other.degree
    }
}

impl PartialOrd for Precision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.comparable_to(other) {
            Some(self.degree.cmp(&other.degree))
        } else {
            None
        }
    }
}

impl FromStr for Precision {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Signed exponent digits; magnitudes past `i64` saturate
fn parse_exponent(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(match text.parse::<i64>() {
        Ok(exponent) => exponent,
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    })
}

/// Digits of a decimal literal such as `-12.340e-3`, split for counting
struct DecimalText<'a> {
    integer: &'a str,
    fraction: &'a str,
    exponent: i64,
}

impl<'a> DecimalText<'a> {
    fn parse(value: &'a str) -> Option<Self> {
        let unsigned = value.trim().trim_start_matches(['+', '-']);
        let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
            Some((mantissa, exponent)) => (mantissa, parse_exponent(exponent)?),
            None => (unsigned, 0),
        };
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if integer.is_empty() && fraction.is_empty() {
            return None;
        }
        if !all_digits(integer) || !all_digits(fraction) {
            return None;
        }

        Some(Self {
            integer,
            fraction,
            exponent,
        })
    }

    fn decimal_places(&self) -> u64 {
        let places = self.fraction.len() as i128 - i128::from(self.exponent);
        u64::try_from(places.max(0)).unwrap_or(u64::MAX)
    }

    /// Digits of the unscaled value, ignoring leading zeros; zero counts as one
    fn significant_digits(&self) -> u64 {
        let leading_zeros = self
            .integer
            .chars()
            .chain(self.fraction.chars())
            .take_while(|&c| c == '0')
            .count();
        let total = self.integer.len() + self.fraction.len();
        (total - leading_zeros).max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        let plain = Precision::parse("2").unwrap();
        assert_eq!(plain.kind(), PrecisionKind::DecimalPlaces);
        assert_eq!(plain.degree(), 2);

        let fixed = Precision::parse("F4").unwrap();
        assert!(!fixed.uses_significant_digits());
        assert_eq!(fixed.degree(), 4);

        let exp = Precision::parse("E3").unwrap();
        assert!(exp.uses_significant_digits());
        assert_eq!(exp.description(), "3 significant digits");
    }

    #[test]
    fn test_invalid_grammar() {
        let err = Precision::parse("X2").unwrap_err();
        assert_eq!(
            err.to_string(),
            r"Expected value 'X2' to match '(?:F?(\d+)|E(\d+))'"
        );
        assert!(Precision::parse("").is_err());
        assert!(Precision::parse("F").is_err());
        assert!(Precision::parse("E-1").is_err());
    }

    #[test]
    fn test_comparison_requires_same_kind() {
        let f2 = Precision::parse("F2").unwrap();
        let f4 = Precision::parse("4").unwrap();
        let e3 = Precision::parse("E3").unwrap();

        assert_eq!(f4.is_more_precise_than(&f2), Some(true));
        assert_eq!(f2.is_more_precise_than(&f4), Some(false));
        assert_eq!(f2.is_more_precise_than(&e3), None);
        assert!(!f2.comparable_to(&e3));
        assert_eq!(Precision::parse("2").unwrap(), f2);
    }

    #[test]
    fn test_exceeded_by_decimal_places() {
        let f2 = Precision::parse("F2").unwrap();
        assert!(f2.exceeded_by_value("1.234"));
        assert!(!f2.exceeded_by_value("1.23"));
        assert!(!f2.exceeded_by_value("-1.2"));
        assert!(!f2.exceeded_by_value("12345"));
        assert!(!f2.exceeded_by_value("1.234e2"));
        assert!(f2.exceeded_by_value("1.2e-2"));
    }

    #[test]
    fn test_exceeded_by_extreme_exponents() {
        let f2 = Precision::parse("F2").unwrap();
        assert!(f2.exceeded_by_value("1.5e-9223372036854775808"));
        assert!(f2.exceeded_by_value("1.5e-99999999999999999999"));
        assert!(!f2.exceeded_by_value("1.5e9223372036854775807"));
        assert!(!f2.exceeded_by_value("1.5e+99999999999999999999"));

        let e3 = Precision::parse("E3").unwrap();
        assert!(!e3.exceeded_by_value("1.5e-9223372036854775808"));
    }

    #[test]
    fn test_exceeded_by_significant_digits() {
        let e3 = Precision::parse("E3").unwrap();
        assert!(!e3.exceeded_by_value("12.3"));
        assert!(e3.exceeded_by_value("12.34"));
        assert!(!e3.exceeded_by_value("0.00123"));
        assert!(e3.exceeded_by_value("1.200"));
        assert!(!e3.exceeded_by_value("1.20E3"));
        assert!(!e3.exceeded_by_value("0"));
    }

    #[test]
    fn test_non_finite_never_exceeds() {
        let f0 = Precision::parse("0").unwrap();
        assert!(!f0.exceeded_by_value("NaN"));
        assert!(!f0.exceeded_by_value("-Infinity"));
        assert!(!f0.exceeded_by_value("inf"));
    }
}
