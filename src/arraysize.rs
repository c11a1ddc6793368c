//! The `arraysize` attribute of VOTABLE FIELDs and PARAMs.
//!
//! Only the single-dimension form is supported: an optional bound followed by
//! an optional variability marker (`""`, `"*"`, `"12"`, `"12*"`). The
//! multi-dimensional and FITS-style extensions are rejected.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::ParseError;

/// Cached regex for the arraysize grammar
static ARRAYSIZE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_arraysize_regex() -> &'static Regex {
    ARRAYSIZE_REGEX.get_or_init(|| {
        Regex::new(r"^(\d+)?(\*)?$").expect("Failed to compile arraysize regex")
    })
}

/// A parsed arraysize: an optional upper bound plus a variability flag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arraysize {
    value: String,
    maximum: Option<u64>,
    variable: bool,
}

impl Arraysize {
    /// The grammar accepted by [`Arraysize::parse`], as reported in errors
    pub const PATTERN: &'static str = r"(\d+)?(\*)?";

    /// Parse an arraysize attribute value
    pub fn parse(value: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::Arraysize {
            value: value.to_string(),
            pattern: Self::PATTERN,
        };
        let caps = get_arraysize_regex().captures(value).ok_or_else(invalid)?;
        let maximum = match caps.get(1) {
            Some(digits) => Some(digits.as_str().parse::<u64>().map_err(|_| invalid())?),
            None => None,
        };

        Ok(Self {
            value: value.to_string(),
            maximum,
            variable: caps.get(2).is_some(),
        })
    }

    /// Build a (possibly variable) arraysize with the given bound
    pub fn bounded(maximum: u64, variable: bool) -> Self {
        let value = if variable {
            format!("{}*", maximum)
        } else {
            maximum.to_string()
        };
        Self {
            value,
            maximum: Some(maximum),
            variable,
        }
    }

    /// The text this arraysize was parsed from
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn maximum(&self) -> Option<u64> {
        self.maximum
    }

    pub fn has_maximum(&self) -> bool {
        self.maximum.is_some()
    }

    pub fn is_variable(&self) -> bool {
        self.variable
    }

    /// True only if both arraysizes are bounded and this bound is larger
    pub fn definitely_exceeds(&self, max_arraysize: &Arraysize) -> bool {
        match (self.maximum, max_arraysize.maximum) {
            (Some(own), Some(max)) => own > max,
            _ => false,
        }
    }

    /// Whether `value` has more characters than this arraysize allows.
    ///
    /// An unbounded arraysize is never exceeded.
    pub fn exceeded_by_value(&self, value: &str) -> bool {
        self.maximum
            .is_some_and(|max| value.chars().count() as u64 > max)
    }

    /// The tighter of this arraysize and `other`.
    ///
    /// The result keeps the variability marker if either side is variable.
    /// Returns `None` when `self` is already at least as tight.
    pub fn narrowed_by(&self, other: &Arraysize) -> Option<Arraysize> {
        let other_max = other.maximum?;
        match self.maximum {
            Some(own) if own <= other_max => None,
            _ => Some(Arraysize::bounded(
                other_max,
                self.variable || other.variable,
            )),
        }
    }
}

impl FromStr for Arraysize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Arraysize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_is_unbounded_and_fixed() {
        let arraysize = Arraysize::parse("").unwrap();
        assert_eq!(arraysize.value(), "");
        assert_eq!(arraysize.maximum(), None);
        assert!(!arraysize.is_variable());
        assert!(!arraysize.has_maximum());
    }

    #[test]
    fn test_separator_forms_rejected() {
        let err = Arraysize::parse("*10s,").unwrap_err();
        assert_eq!(
            err.to_string(),
            r"Expected value '*10s,' to match '(\d+)?(\*)?'"
        );
        assert!(Arraysize::parse("20A:SSTR50/032").is_err());
        assert!(Arraysize::parse("10x20").is_err());
        assert!(Arraysize::parse("-1").is_err());
    }

    #[test]
    fn test_purely_unbounded() {
        let arraysize = Arraysize::parse("*").unwrap();
        assert_eq!(arraysize.maximum(), None);
        assert!(arraysize.is_variable());
        assert!(!arraysize.exceeded_by_value(&"x".repeat(10_000)));
    }

    #[test]
    fn test_bounded_values() {
        let fixed = Arraysize::parse("30").unwrap();
        assert_eq!(fixed.maximum(), Some(30));
        assert!(!fixed.is_variable());

        let variable = Arraysize::parse("40*").unwrap();
        assert_eq!(variable.maximum(), Some(40));
        assert!(variable.is_variable());
        assert_eq!(variable.to_string(), "40*");
    }

    #[test]
    fn test_exceeded_by_value() {
        let arraysize = Arraysize::parse("5").unwrap();
        assert!(arraysize.exceeded_by_value("abcdef"));
        assert!(!arraysize.exceeded_by_value("abcde"));
        assert!(!arraysize.exceeded_by_value(""));
    }

    #[test]
    fn test_definitely_exceeds() {
        let unbounded = Arraysize::parse("*").unwrap();
        let ten = Arraysize::parse("10").unwrap();
        let five_var = Arraysize::parse("5*").unwrap();

        assert!(!unbounded.definitely_exceeds(&unbounded));
        assert!(!unbounded.definitely_exceeds(&ten));
        assert!(!ten.definitely_exceeds(&unbounded));
        assert!(ten.definitely_exceeds(&five_var));
        assert!(!five_var.definitely_exceeds(&ten));
        assert!(!ten.definitely_exceeds(&ten));
    }

    #[test]
    fn test_narrowed_by() {
        let ten = Arraysize::parse("10").unwrap();
        let five = Arraysize::parse("5").unwrap();
        let twenty_var = Arraysize::parse("20*").unwrap();
        let unbounded = Arraysize::parse("*").unwrap();

        assert_eq!(ten.narrowed_by(&five).unwrap().value(), "5");
        assert!(five.narrowed_by(&ten).is_none());
        assert!(five.narrowed_by(&unbounded).is_none());
        assert_eq!(unbounded.narrowed_by(&ten).unwrap().value(), "10*");
        assert_eq!(twenty_var.narrowed_by(&five).unwrap().value(), "5*");
    }
}
