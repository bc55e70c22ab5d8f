//! Quantity + unit value objects.
//!
//! A [`Measurement`] pairs a finite amount with an open-domain unit label.
//! Internal math always works on full-precision amounts; rounding only
//! happens through [`Measurement::rounded`] at presentation time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConversionError, ParseError};
use crate::units::{self, UnitConverter};

/// Default unit for fermentable color.
pub const DEFAULT_COLOR_UNIT: &str = "SRM";
/// Default unit for fermentable weight.
pub const DEFAULT_FERMENTABLE_WEIGHT_UNIT: &str = "lb";
/// Default unit for hop weight.
pub const DEFAULT_HOP_WEIGHT_UNIT: &str = "oz";
/// Default unit for hop time.
pub const DEFAULT_TIME_UNIT: &str = "min";
/// Default unit for volumes.
pub const DEFAULT_VOLUME_UNIT: &str = "gal";

/// An amount paired with a unit label.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    amount: f64,
    unit: String,
}

/// Raw input accepted wherever a [`Measurement`] is expected.
///
/// Bare numbers take the caller's default unit; text is split into amount and
/// unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantity {
    /// A bare number.
    Amount(f64),
    /// A combined string such as `"10 lb"`.
    Text(String),
    /// An already validated measurement.
    Measured(Measurement),
}

impl From<f64> for Quantity {
    fn from(amount: f64) -> Self {
        Quantity::Amount(amount)
    }
}

impl From<i32> for Quantity {
    fn from(amount: i32) -> Self {
        Quantity::Amount(f64::from(amount))
    }
}

impl From<u32> for Quantity {
    fn from(amount: u32) -> Self {
        Quantity::Amount(f64::from(amount))
    }
}

impl From<&str> for Quantity {
    fn from(text: &str) -> Self {
        Quantity::Text(text.to_string())
    }
}

impl From<String> for Quantity {
    fn from(text: String) -> Self {
        Quantity::Text(text)
    }
}

impl From<&String> for Quantity {
    fn from(text: &String) -> Self {
        Quantity::Text(text.clone())
    }
}

impl From<Measurement> for Quantity {
    fn from(measurement: Measurement) -> Self {
        Quantity::Measured(measurement)
    }
}

impl From<&Measurement> for Quantity {
    fn from(measurement: &Measurement) -> Self {
        Quantity::Measured(measurement.clone())
    }
}

impl Measurement {
    /// Create a measurement, validating that the amount is finite and the
    /// unit is non-empty.
    pub fn new(amount: f64, unit: impl Into<String>) -> Result<Self, ParseError> {
        let unit = unit.into();
        if !amount.is_finite() {
            return Err(ParseError::NotFinite { amount });
        }
        Ok(Self {
            amount,
            unit: check_unit(&unit)?.to_string(),
        })
    }

    /// Build from parts already known to satisfy the invariant.
    pub(crate) fn known(amount: f64, unit: &str) -> Self {
        debug_assert!(amount.is_finite() && !unit.is_empty());
        Self {
            amount,
            unit: unit.to_string(),
        }
    }

    /// Build a measurement from a number or a combined string.
    ///
    /// ```
    /// use grain::Measurement;
    ///
    /// let weight = Measurement::parse(2, "oz").unwrap();
    /// assert_eq!(weight.unit(), "oz");
    ///
    /// let color = Measurement::parse("20 EBC", "SRM").unwrap();
    /// assert_eq!(color.unit(), "EBC");
    /// ```
    pub fn parse(input: impl Into<Quantity>, default_unit: &str) -> Result<Self, ParseError> {
        match input.into() {
            Quantity::Amount(amount) => Self::new(amount, default_unit),
            Quantity::Text(text) => {
                let (amount, unit) = units::split_measure(&text, Some(default_unit))?;
                Self::new(amount, unit)
            }
            Quantity::Measured(measurement) => Ok(measurement),
        }
    }

    /// The numeric amount.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// The unit label.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Format as `"{amount} {unit}"`.
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// Amount expressed in `target`, using the standard converter.
    pub fn to(&self, target: &str) -> Result<f64, ConversionError> {
        self.to_with(target, units::standard())
    }

    /// Amount expressed in `target`, using `converter`.
    ///
    /// The identity when `target` is this measurement's own unit.
    pub fn to_with(
        &self,
        target: &str,
        converter: &(impl UnitConverter + ?Sized),
    ) -> Result<f64, ConversionError> {
        if target == self.unit {
            return Ok(self.amount);
        }
        converter.convert(self.amount, &self.unit, target)
    }

    /// A new measurement expressed in `target`.
    pub fn convert(
        &self,
        target: &str,
        converter: &(impl UnitConverter + ?Sized),
    ) -> Result<Measurement, ConversionError> {
        Ok(Measurement {
            amount: self.to_with(target, converter)?,
            unit: target.to_string(),
        })
    }

    /// A copy rounded to `decimals` places, for display.
    pub fn rounded(&self, decimals: u32) -> Measurement {
        Measurement {
            amount: units::round(self.amount, decimals),
            unit: self.unit.clone(),
        }
    }
}

/// Trim `unit` and check it can follow an amount in formatted text.
pub(crate) fn check_unit(unit: &str) -> Result<&str, ParseError> {
    let unit = unit.trim();
    match unit.chars().next() {
        None => Err(ParseError::EmptyUnit),
        Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | '/') => Err(ParseError::NumericUnit {
            unit: unit.to_string(),
        }),
        Some(_) => Ok(unit),
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

impl FromStr for Measurement {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, unit) = units::split_measure(s, None)?;
        Self::new(amount, unit)
    }
}

impl Serialize for Measurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Measurement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_input_takes_default_unit() {
        let color = Measurement::parse(10, DEFAULT_COLOR_UNIT).unwrap();
        assert_eq!(color.amount(), 10.0);
        assert_eq!(color.unit(), "SRM");
    }

    #[test]
    fn test_text_input_keeps_its_unit() {
        let weight = Measurement::parse("16 oz", DEFAULT_FERMENTABLE_WEIGHT_UNIT).unwrap();
        assert_eq!(weight.unit(), "oz");
        let bare = Measurement::parse("3", DEFAULT_FERMENTABLE_WEIGHT_UNIT).unwrap();
        assert_eq!(bare.unit(), "lb");
    }

    #[test]
    fn test_rejects_non_finite() {
        assert_eq!(
            Measurement::new(f64::NAN, "lb").unwrap_err().to_string(),
            "amount NaN is not finite"
        );
        assert_eq!(Measurement::new(1.0, "  "), Err(ParseError::EmptyUnit));
    }

    #[test]
    fn test_rejects_units_that_read_as_numbers() {
        for unit in ["1/2cup", "2l", "-F", "+lb", ".5oz", "/min"] {
            assert_eq!(
                Measurement::new(3.0, unit),
                Err(ParseError::NumericUnit { unit: unit.into() }),
                "{unit}"
            );
        }
        let cup = Measurement::new(3.0, "cup/2").unwrap();
        assert_eq!(Measurement::parse(cup.format(), "ignored").unwrap(), cup);
    }

    #[test]
    fn test_format_and_round_trip() {
        for (amount, unit) in [(10.0, "SRM"), (0.1, "oz"), (-2.25, "C"), (1e-7, "kg")] {
            let m = Measurement::new(amount, unit).unwrap();
            let parsed = Measurement::parse(m.format(), "ignored").unwrap();
            assert_eq!(parsed, m);
        }
        assert_eq!(Measurement::new(10.0, "lb").unwrap().format(), "10 lb");
    }

    #[test]
    fn test_to_is_identity_for_same_unit() {
        let m = Measurement::new(3.0, "handfuls").unwrap();
        assert_eq!(m.to("handfuls").unwrap(), 3.0);
        assert!(m.to("g").is_err());
    }

    #[test]
    fn test_convert_and_rounded() {
        let m = Measurement::new(5.0, "gal").unwrap();
        let liters = m.convert("l", units::standard()).unwrap();
        assert_eq!(liters.unit(), "l");
        assert_eq!(liters.rounded(2).amount(), 18.93);
        assert!((liters.amount() - 18.927_058_92).abs() < 1e-9);
    }

    #[test]
    fn test_from_str_requires_unit() {
        assert!("12".parse::<Measurement>().is_err());
        assert_eq!(
            "12 lb".parse::<Measurement>().unwrap(),
            Measurement::new(12.0, "lb").unwrap()
        );
    }
}
