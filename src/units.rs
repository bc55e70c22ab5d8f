//! Unit conversion and measurement-string splitting.
//!
//! The recipe engine never hard-codes a conversion; it goes through a
//! [`UnitConverter`]. [`StandardUnits`] is the table-driven default and covers
//! the dimensions a recipe deals with: mass, volume, time, color,
//! temperature and length. Color and temperature scales are affine.

use crate::error::{ConversionError, ParseError};

/// Converts an amount between two unit labels.
///
/// Implementations decide which labels are valid. Converting a label to
/// itself must be the identity.
pub trait UnitConverter: Send + Sync {
    /// Convert `amount` expressed in `from` into `to`.
    fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, ConversionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Mass,
    Volume,
    Time,
    Color,
    Temperature,
    Length,
}

/// A unit is `base = amount * scale + offset` in its dimension's base unit.
#[derive(Debug, Clone, Copy)]
struct UnitDef {
    label: &'static str,
    dimension: Dimension,
    scale: f64,
    offset: f64,
}

const fn linear(label: &'static str, dimension: Dimension, scale: f64) -> UnitDef {
    UnitDef {
        label,
        dimension,
        scale,
        offset: 0.0,
    }
}

const fn affine(label: &'static str, dimension: Dimension, scale: f64, offset: f64) -> UnitDef {
    UnitDef {
        label,
        dimension,
        scale,
        offset,
    }
}

// Base units: g, ml, s, SRM, C, m.
const UNITS: &[UnitDef] = &[
    linear("mg", Dimension::Mass, 0.001),
    linear("g", Dimension::Mass, 1.0),
    linear("kg", Dimension::Mass, 1000.0),
    linear("oz", Dimension::Mass, 28.349_523_125),
    linear("lb", Dimension::Mass, 453.592_37),
    linear("ml", Dimension::Volume, 1.0),
    linear("l", Dimension::Volume, 1000.0),
    linear("hl", Dimension::Volume, 100_000.0),
    linear("tsp", Dimension::Volume, 4.928_921_593_75),
    linear("tbsp", Dimension::Volume, 14.786_764_781_25),
    linear("floz", Dimension::Volume, 29.573_529_562_5),
    linear("cup", Dimension::Volume, 236.588_236_5),
    linear("pt", Dimension::Volume, 473.176_473),
    linear("qt", Dimension::Volume, 946.352_946),
    linear("gal", Dimension::Volume, 3_785.411_784),
    linear("bbl", Dimension::Volume, 117_347.765_304),
    linear("s", Dimension::Time, 1.0),
    linear("min", Dimension::Time, 60.0),
    linear("h", Dimension::Time, 3_600.0),
    linear("d", Dimension::Time, 86_400.0),
    linear("wk", Dimension::Time, 604_800.0),
    linear("SRM", Dimension::Color, 1.0),
    linear("EBC", Dimension::Color, 1.0 / 1.97),
    // Morey approximation SRM = 1.3546 L - 0.76.
    affine("L", Dimension::Color, 1.3546, -0.76),
    linear("C", Dimension::Temperature, 1.0),
    affine("F", Dimension::Temperature, 5.0 / 9.0, -160.0 / 9.0),
    affine("K", Dimension::Temperature, 1.0, -273.15),
    linear("m", Dimension::Length, 1.0),
    linear("ft", Dimension::Length, 0.3048),
];

const ALIASES: &[(&str, &str)] = &[
    ("milligram", "mg"),
    ("milligrams", "mg"),
    ("gram", "g"),
    ("grams", "g"),
    ("kilogram", "kg"),
    ("kilograms", "kg"),
    ("kgs", "kg"),
    ("ounce", "oz"),
    ("ounces", "oz"),
    ("lbs", "lb"),
    ("pound", "lb"),
    ("pounds", "lb"),
    ("milliliter", "ml"),
    ("milliliters", "ml"),
    ("liter", "l"),
    ("liters", "l"),
    ("litre", "l"),
    ("litres", "l"),
    ("hectoliter", "hl"),
    ("hectoliters", "hl"),
    ("teaspoon", "tsp"),
    ("teaspoons", "tsp"),
    ("tablespoon", "tbsp"),
    ("tablespoons", "tbsp"),
    ("fl-oz", "floz"),
    ("cups", "cup"),
    ("pint", "pt"),
    ("pints", "pt"),
    ("quart", "qt"),
    ("quarts", "qt"),
    ("gallon", "gal"),
    ("gallons", "gal"),
    ("barrel", "bbl"),
    ("barrels", "bbl"),
    ("sec", "s"),
    ("second", "s"),
    ("seconds", "s"),
    ("mins", "min"),
    ("minute", "min"),
    ("minutes", "min"),
    ("hr", "h"),
    ("hrs", "h"),
    ("hour", "h"),
    ("hours", "h"),
    ("day", "d"),
    ("days", "d"),
    ("week", "wk"),
    ("weeks", "wk"),
    ("srm", "SRM"),
    ("ebc", "EBC"),
    ("°L", "L"),
    ("lovibond", "L"),
    ("°C", "C"),
    ("celsius", "C"),
    ("°F", "F"),
    ("fahrenheit", "F"),
    ("kelvin", "K"),
    ("meter", "m"),
    ("meters", "m"),
    ("metre", "m"),
    ("metres", "m"),
    ("feet", "ft"),
    ("foot", "ft"),
];

/// Table-driven converter for the units a brewing recipe uses.
///
/// Labels are matched exactly first, then through a case-insensitive alias
/// table (`"lbs"`, `"Gallons"`, `"°F"`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardUnits;

static STANDARD: StandardUnits = StandardUnits;

/// Shared instance of the standard converter.
pub fn standard() -> &'static StandardUnits {
    &STANDARD
}

impl StandardUnits {
    fn lookup(&self, label: &str) -> Option<&'static UnitDef> {
        let label = label.trim();
        if let Some(def) = UNITS.iter().find(|u| u.label == label) {
            return Some(def);
        }
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(label))
            .map(|(_, canonical)| *canonical)
            .or_else(|| {
                UNITS
                    .iter()
                    .find(|u| u.label.eq_ignore_ascii_case(label))
                    .map(|u| u.label)
            })?;
        UNITS.iter().find(|u| u.label == canonical)
    }

    /// Canonical label for `label`, if the converter knows it.
    pub fn canonical(&self, label: &str) -> Option<&'static str> {
        self.lookup(label).map(|def| def.label)
    }
}

impl UnitConverter for StandardUnits {
    fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, ConversionError> {
        if from == to {
            return Ok(amount);
        }
        let unknown = |unit: &str| ConversionError::UnknownUnit {
            unit: unit.to_string(),
        };
        let source = self.lookup(from).ok_or_else(|| unknown(from))?;
        let target = self.lookup(to).ok_or_else(|| unknown(to))?;
        if source.dimension != target.dimension {
            return Err(ConversionError::Incompatible {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if source.label == target.label {
            return Ok(amount);
        }
        let base = amount * source.scale + source.offset;
        Ok((base - target.offset) / target.scale)
    }
}

/// Round `value` to `decimals` decimal places.
pub fn round(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Split a measurement string into its leading amount and trailing unit.
///
/// Accepts a signed decimal with optional exponent (`"1.5e1 min"`), a simple
/// fraction (`"1/2 oz"`) or a mixed number (`"1 1/2 lb"`). When the string
/// carries no unit, `assumed_unit` is used; without one the split fails.
pub fn split_measure(input: &str, assumed_unit: Option<&str>) -> Result<(f64, String), ParseError> {
    let trimmed = input.trim();
    let no_amount = || ParseError::NoAmount {
        input: input.to_string(),
    };

    let (mut amount, mut rest) = leading_number(trimmed).ok_or_else(no_amount)?;

    if let Some(after_slash) = rest.strip_prefix('/') {
        let (denominator, after) = leading_number(after_slash).ok_or_else(no_amount)?;
        amount /= denominator;
        rest = after;
    } else if let Some((fraction, after)) = mixed_fraction(rest) {
        amount = if amount.is_sign_negative() {
            amount - fraction
        } else {
            amount + fraction
        };
        rest = after;
    }

    if !amount.is_finite() {
        return Err(ParseError::NotFinite { amount });
    }

    let unit = rest.trim();
    if unit.is_empty() {
        return match assumed_unit {
            Some(unit) if !unit.trim().is_empty() => Ok((amount, unit.trim().to_string())),
            _ => Err(ParseError::MissingUnit {
                input: input.to_string(),
            }),
        };
    }
    Ok((amount, unit.to_string()))
}

/// Parse the longest numeric prefix of `input`.
fn leading_number(input: &str) -> Option<(f64, &str)> {
    let bytes = input.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    let mantissa = &input[digits_start..end];
    if mantissa.is_empty() || mantissa == "." {
        return None;
    }
    // Exponent only if followed by digits, so "5 EBC" keeps its unit.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    let amount = input[..end].parse::<f64>().ok()?;
    Some((amount, &input[end..]))
}

/// Recognize the `" 1/2"` tail of a mixed number.
fn mixed_fraction(rest: &str) -> Option<(f64, &str)> {
    let candidate = rest.trim_start();
    if candidate.len() == rest.len() {
        return None;
    }
    let (numerator, after) = leading_number(candidate)?;
    let after = after.strip_prefix('/')?;
    let (denominator, after) = leading_number(after)?;
    if numerator < 0.0 || denominator <= 0.0 {
        return None;
    }
    Some((numerator / denominator, after))
}
