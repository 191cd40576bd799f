//! Typed access to environment variables
//!
//! [`get`] reads a variable and wraps its raw text in an [`EnvValue`], which
//! converts it on demand. A missing variable reads as an empty string, so
//! every conversion fails (or falls back to its default) the same way for
//! "unset" and "set to nothing".

use crate::errors::{ConvertError, ConvertResult};

use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const MAX_FRACTION_DIGITS: usize = 20;

/// Read an environment variable as a convertible value
///
/// # Examples
///
/// ```
/// use esox_multiplier::env;
///
/// let value = env::get("ESOX_MULTIPLIER_DOC_SURELY_UNSET");
/// assert_eq!(value.as_str(), "");
/// assert_eq!(value.as_integer_or(7), 7);
/// ```
pub fn get(key: &str) -> EnvValue {
    let raw = std::env::var_os(key)
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_default();
    EnvValue::new(raw)
}

/// Raw text of an environment variable with typed conversions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvValue(String);

impl EnvValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_integer(&self) -> ConvertResult<i64> {
        self.0.parse().map_err(|source| ConvertError::Integer {
            value: self.0.clone(),
            source,
        })
    }

    pub fn as_integer_or(&self, default: i64) -> i64 {
        self.as_integer().unwrap_or(default)
    }

    /// `true`/`1` and `false`/`0`; anything else yields `default`
    pub fn as_bool_or(&self, default: bool) -> bool {
        match self.0.as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => default,
        }
    }

    /// Parse a duration such as `300ms`, `1h30m` or `1.5s`
    ///
    /// Every number needs a unit (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`)
    /// except a lone `0`. Negative durations are rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_multiplier::env::EnvValue;
    /// use std::time::Duration;
    ///
    /// let value = EnvValue::new("1m30s");
    /// assert_eq!(value.as_duration().unwrap(), Duration::from_secs(90));
    /// assert!(EnvValue::new("2").as_duration().is_err());
    /// ```
    pub fn as_duration(&self) -> ConvertResult<Duration> {
        parse_duration(&self.0).map_err(|reason| ConvertError::Duration {
            value: self.0.clone(),
            reason,
        })
    }

    pub fn as_rfc3339_time(&self) -> ConvertResult<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.0).map_err(|source| ConvertError::Rfc3339Time {
            value: self.0.clone(),
            source,
        })
    }

    /// Split on `separator`, trimming whitespace around every item
    ///
    /// It is an error when splitting and trimming leave the value untouched,
    /// i.e. a single item equal to the raw text. A value without the
    /// separator but with surrounding whitespace yields that one trimmed item.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_multiplier::env::EnvValue;
    ///
    /// assert_eq!(EnvValue::new("a, b").as_slice_of_strings(",").unwrap(), vec!["a", "b"]);
    /// assert_eq!(EnvValue::new("abc\n").as_slice_of_strings(",").unwrap(), vec!["abc"]);
    /// assert!(EnvValue::new("a;b").as_slice_of_strings(",").is_err());
    /// ```
    pub fn as_slice_of_strings(&self, separator: &str) -> ConvertResult<Vec<String>> {
        let error = || ConvertError::StringSlice {
            value: self.0.clone(),
            separator: separator.to_string(),
        };
        if separator.is_empty() {
            return Err(error());
        }

        let items: Vec<String> = self
            .0
            .split(separator)
            .map(|item| item.trim_matches(['\n', '\t', '\r', ' ']).to_string())
            .collect();

        if let [only] = items.as_slice()
            && *only == self.0
        {
            return Err(error());
        }

        Ok(items)
    }

    /// Parse `key<pair_separator>value` pairs joined by `separator`
    ///
    /// Malformed pairs and pairs with an empty key or value are skipped.
    /// It is an error when no pair survives.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_multiplier::env::EnvValue;
    ///
    /// let value = EnvValue::new("region=eu,tier=gold");
    /// let map = value.as_string_map("=", ",").unwrap();
    /// assert_eq!(map["tier"], "gold");
    /// ```
    pub fn as_string_map(
        &self,
        pair_separator: &str,
        separator: &str,
    ) -> ConvertResult<HashMap<String, String>> {
        let mut result = HashMap::new();

        if !pair_separator.is_empty() && !separator.is_empty() {
            for pair in self.0.split(separator) {
                let parts: Vec<&str> = pair.split(pair_separator).collect();
                if let [key, value] = parts.as_slice()
                    && !key.is_empty()
                    && !value.is_empty()
                {
                    result.insert(key.to_string(), value.to_string());
                }
            }
        }

        if result.is_empty() {
            return Err(ConvertError::StringMap {
                value: self.0.clone(),
                separator: separator.to_string(),
                pair_separator: pair_separator.to_string(),
            });
        }

        Ok(result)
    }
}

impl From<&str> for EnvValue {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

fn parse_duration(input: &str) -> Result<Duration, String> {
    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err("empty duration".to_string());
    }

    let overflow = || "duration overflows".to_string();
    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let (whole, after_whole) = split_digits(rest);
        let (fraction, after_number) = match after_whole.strip_prefix('.') {
            Some(tail) => split_digits(tail),
            None => ("", after_whole),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(format!("expected a number at '{}'", rest));
        }
        rest = after_number;

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        if unit_len == 0 {
            return Err("missing unit".to_string());
        }
        let scale: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "h" => 3_600 * NANOS_PER_SECOND,
            unit => return Err(format!("unknown unit '{}'", unit)),
        };
        rest = &rest[unit_len..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        total_nanos = whole
            .checked_mul(scale)
            .and_then(|nanos| total_nanos.checked_add(nanos))
            .ok_or_else(overflow)?;

        // Fraction digits past this cannot add a nanosecond, even for hours
        let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        if !fraction.is_empty() {
            let numerator: u128 = fraction.parse().map_err(|_| overflow())?;
            let denominator = 10_u128.pow(fraction.len() as u32);
            total_nanos += numerator * scale / denominator;
        }

        if total_nanos > u128::from(u64::MAX) {
            return Err(overflow());
        }
    }

    if negative && total_nanos > 0 {
        return Err("negative durations are not supported".to_string());
    }

    let nanos = u64::try_from(total_nanos).map_err(|_| overflow())?;
    Ok(Duration::from_nanos(nanos))
}

/// Split off the leading ASCII digits
fn split_digits(input: &str) -> (&str, &str) {
    let len = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_reads_variable() {
        // SAFETY: the key is unique to this test; std serialises concurrent
        // environment reads and writes from other tests behind its env lock
        unsafe { std::env::set_var("ESOX_MULTIPLIER_TEST_GET_READS", "13") };

        assert_eq!(get("ESOX_MULTIPLIER_TEST_GET_READS").as_integer().unwrap(), 13);
    }

    #[test]
    fn test_get_templated_keys() {
        // SAFETY: the keys are unique to this test; std serialises concurrent
        // environment reads and writes from other tests behind its env lock
        unsafe {
            std::env::set_var("ESOX_MULTIPLIER_FIRST_TEST_KEY", "2h");
            std::env::set_var("ESOX_MULTIPLIER_SECOND_TEST_KEY", "15s");
        }

        for (name, expected) in [("FIRST", 7200), ("SECOND", 15)] {
            let key = format!("ESOX_MULTIPLIER_{}_TEST_KEY", name);
            assert_eq!(get(&key).as_duration().unwrap(), Duration::from_secs(expected));
        }
    }

    #[test]
    fn test_missing_variable_reads_empty() {
        let value = get("ESOX_MULTIPLIER_TEST_DOES_NOT_EXIST");

        assert_eq!(value.as_str(), "");
        assert!(value.as_integer().is_err());
        assert!(value.as_duration().is_err());
        assert!(value.as_rfc3339_time().is_err());
        assert!(value.as_slice_of_strings(",").is_err());
        assert!(value.as_string_map("=", ",").is_err());
        assert_eq!(value.as_integer_or(7), 7);
        assert!(value.as_bool_or(true));
    }

    #[test]
    fn test_integer() {
        assert_eq!(EnvValue::new("13").as_integer().unwrap(), 13);
        assert_eq!(EnvValue::new("-4").as_integer().unwrap(), -4);
        assert!(EnvValue::new("A").as_integer().is_err());
        assert_eq!(EnvValue::new("13").as_integer_or(7), 13);
        assert_eq!(EnvValue::new("").as_integer_or(7), 7);
    }

    #[test]
    fn test_bool_with_default() {
        assert!(!EnvValue::new("false").as_bool_or(true));
        assert!(EnvValue::new("true").as_bool_or(false));
        assert!(EnvValue::new("1").as_bool_or(false));
        assert!(!EnvValue::new("0").as_bool_or(true));
        assert!(EnvValue::new("yes").as_bool_or(true));
        assert!(!EnvValue::new("").as_bool_or(false));
    }

    #[test]
    fn test_duration() {
        assert_eq!(EnvValue::new("2h").as_duration().unwrap(), Duration::from_secs(7200));
        assert_eq!(EnvValue::new("10ms").as_duration().unwrap(), Duration::from_millis(10));
        assert_eq!(EnvValue::new("1h30m").as_duration().unwrap(), Duration::from_secs(5400));
        assert_eq!(EnvValue::new("1.5s").as_duration().unwrap(), Duration::from_millis(1500));
        assert_eq!(EnvValue::new("250us").as_duration().unwrap(), Duration::from_micros(250));
        assert_eq!(EnvValue::new("0").as_duration().unwrap(), Duration::ZERO);
        assert_eq!(EnvValue::new("-0s").as_duration().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_duration_is_exact() {
        assert_eq!(
            EnvValue::new("9007199254740993ns").as_duration().unwrap(),
            Duration::from_nanos(9_007_199_254_740_993)
        );
        assert_eq!(
            EnvValue::new("18446744073709551615ns").as_duration().unwrap(),
            Duration::from_nanos(u64::MAX)
        );
        assert_eq!(
            EnvValue::new("1.000000001s").as_duration().unwrap(),
            Duration::from_nanos(1_000_000_001)
        );
        assert_eq!(EnvValue::new(".5s").as_duration().unwrap(), Duration::from_millis(500));
        assert_eq!(EnvValue::new("2.s").as_duration().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_duration_overflow() {
        assert!(EnvValue::new("18446744073709551616ns").as_duration().is_err());
        assert!(EnvValue::new("5124096h").as_duration().is_err());
        assert!(EnvValue::new("99999999999999999999999999999999999999999h").as_duration().is_err());
    }

    #[test]
    fn test_invalid_duration() {
        for raw in ["2", "", "s", ".", "1x", "1..5s", "-1s", "ms10"] {
            assert!(EnvValue::new(raw).as_duration().is_err(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_rfc3339_time() {
        let value = EnvValue::new("2023-08-21T21:04:05+03:00");
        let expected = DateTime::parse_from_rfc3339("2023-08-21T21:04:05+03:00").unwrap();

        assert_eq!(value.as_rfc3339_time().unwrap(), expected);
        assert!(EnvValue::new("2").as_rfc3339_time().is_err());
        assert!(EnvValue::new("1988-13-11T13:30:00+10:00").as_rfc3339_time().is_err());
    }

    #[test]
    fn test_slice_of_strings() {
        let items = EnvValue::new("firstValue, secondValue\n")
            .as_slice_of_strings(",")
            .unwrap();
        assert_eq!(items, vec!["firstValue", "secondValue"]);

        assert!(EnvValue::new("firstValue;secondValue").as_slice_of_strings(",").is_err());
        assert!(EnvValue::new("").as_slice_of_strings(",").is_err());
        assert!(EnvValue::new("a,b").as_slice_of_strings("").is_err());
        assert_eq!(
            EnvValue::new(" single\t").as_slice_of_strings(",").unwrap(),
            vec!["single"]
        );
    }

    #[test]
    fn test_string_map() {
        let map = EnvValue::new("firstSubKey=firstSubValue,secondSubKey=secondSubValue,broken=,=x")
            .as_string_map("=", ",")
            .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map["firstSubKey"], "firstSubValue");
        assert_eq!(map["secondSubKey"], "secondSubValue");

        assert!(
            EnvValue::new("firstSubKey->firstSubValue|secondSubKey->secondSubValue")
                .as_string_map("=", ",")
                .is_err()
        );
    }
}
