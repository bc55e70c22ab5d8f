//! Brewing-chemistry formulas.
//!
//! The recipe engine only consumes these as pure functions of plain numbers.
//! Units are fixed by the [`Formulas`] contract: weights in pounds (grain) or
//! ounces (hops), volumes in US gallons, times in minutes, elevation in feet.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FormulaError, InvalidEnumValue};

/// mg/L of alpha acid per (oz of alpha acid / US gal).
const MG_PER_L_PER_OZ_GAL: f64 = 7490.0;

/// Inputs shared by every hop-utilization method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopAddition {
    /// Hop weight in ounces.
    pub weight_oz: f64,
    /// Alpha acid in percent.
    pub alpha: f64,
    /// Boil time in minutes.
    pub time_min: f64,
    /// Batch volume in gallons.
    pub batch_gal: f64,
    /// Original gravity of the wort.
    pub og: f64,
}

/// Hop-utilization method used to estimate IBU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopFormula {
    /// Glenn Tinseth's method.
    #[default]
    Tinseth,
    /// Jackie Rager's method.
    Rager,
    /// Mark Garetz's method; needs boil volume, elevation and an IBU estimate.
    Garetz,
}

impl HopFormula {
    /// Canonical names.
    pub const NAMES: &'static [&'static str] = &["tinseth", "rager", "garetz"];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HopFormula::Tinseth => "tinseth",
            HopFormula::Rager => "rager",
            HopFormula::Garetz => "garetz",
        }
    }
}

impl fmt::Display for HopFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HopFormula {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tinseth" => Ok(HopFormula::Tinseth),
            "rager" => Ok(HopFormula::Rager),
            "garetz" => Ok(HopFormula::Garetz),
            _ => Err(InvalidEnumValue {
                kind: "hop formula",
                value: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

/// The brewing-math collaborator.
///
/// Every method is pure. Implementations report impossible results (for
/// example a zero batch volume) as [`FormulaError`] instead of returning
/// NaN or infinity.
pub trait Formulas: Send + Sync {
    /// Original gravity from per-fermentable gravity contributions
    /// (points per pound per gallon times pounds), mash efficiency in percent
    /// and batch volume in gallons.
    fn og(&self, contributions: &[f64], efficiency: f64, volume_gal: f64) -> Result<f64, FormulaError>;

    /// Final gravity from original gravity and yeast attenuation (0..=1).
    fn fg(&self, og: f64, attenuation: f64) -> Result<f64, FormulaError>;

    /// Alcohol by volume in percent.
    fn abv(&self, og: f64, fg: f64) -> Result<f64, FormulaError>;

    /// IBU contribution of one addition, Tinseth method.
    fn tinseth(&self, hop: &HopAddition) -> Result<f64, FormulaError>;

    /// IBU contribution of one addition, Rager method.
    fn rager(&self, hop: &HopAddition) -> Result<f64, FormulaError>;

    /// IBU contribution of one addition, Garetz method.
    ///
    /// `ibu_estimate` feeds the hopping-rate factor.
    fn garetz(
        &self,
        hop: &HopAddition,
        boil_gal: f64,
        ibu_estimate: f64,
        elevation_ft: f64,
    ) -> Result<f64, FormulaError>;
}

/// Textbook implementations of the brewing formulas.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFormulas;

fn finite(formula: &'static str, value: f64) -> Result<f64, FormulaError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormulaError::NonFinite { formula })
    }
}

fn positive(formula: &'static str, what: &str, value: f64) -> Result<(), FormulaError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(FormulaError::InvalidInput {
            formula,
            message: format!("{what} must be positive, got {value}"),
        })
    }
}

impl Formulas for StandardFormulas {
    fn og(&self, contributions: &[f64], efficiency: f64, volume_gal: f64) -> Result<f64, FormulaError> {
        positive("og", "batch volume", volume_gal)?;
        let points: f64 = contributions.iter().sum::<f64>() * efficiency / 100.0 / volume_gal;
        finite("og", 1.0 + points / 1000.0)
    }

    fn fg(&self, og: f64, attenuation: f64) -> Result<f64, FormulaError> {
        if !(0.0..=1.0).contains(&attenuation) {
            return Err(FormulaError::InvalidInput {
                formula: "fg",
                message: format!("attenuation must be within 0..=1, got {attenuation}"),
            });
        }
        finite("fg", 1.0 + (og - 1.0) * (1.0 - attenuation))
    }

    fn abv(&self, og: f64, fg: f64) -> Result<f64, FormulaError> {
        finite("abv", (og - fg) * 131.25)
    }

    fn tinseth(&self, hop: &HopAddition) -> Result<f64, FormulaError> {
        positive("tinseth", "batch volume", hop.batch_gal)?;
        let bigness = 1.65 * 0.000_125_f64.powf(hop.og - 1.0);
        let boil_time = (1.0 - (-0.04 * hop.time_min).exp()) / 4.15;
        let mg_per_l = hop.alpha / 100.0 * hop.weight_oz * MG_PER_L_PER_OZ_GAL / hop.batch_gal;
        finite("tinseth", bigness * boil_time * mg_per_l)
    }

    fn rager(&self, hop: &HopAddition) -> Result<f64, FormulaError> {
        positive("rager", "batch volume", hop.batch_gal)?;
        let utilization = (18.11 + 13.86 * ((hop.time_min - 31.32) / 18.27).tanh()) / 100.0;
        let gravity_adjustment = if hop.og > 1.050 {
            (hop.og - 1.050) / 0.2
        } else {
            0.0
        };
        let ibu = hop.weight_oz * utilization * hop.alpha / 100.0 * MG_PER_L_PER_OZ_GAL
            / (hop.batch_gal * (1.0 + gravity_adjustment));
        finite("rager", ibu)
    }

    fn garetz(
        &self,
        hop: &HopAddition,
        boil_gal: f64,
        ibu_estimate: f64,
        elevation_ft: f64,
    ) -> Result<f64, FormulaError> {
        positive("garetz", "batch volume", hop.batch_gal)?;
        positive("garetz", "boil volume", boil_gal)?;
        let concentration = hop.batch_gal / boil_gal;
        let boil_gravity = concentration * (hop.og - 1.0) + 1.0;
        let gravity_factor = if boil_gravity > 1.050 {
            (boil_gravity - 1.050) / 0.2 + 1.0
        } else {
            1.0
        };
        let hopping_rate_factor = concentration * ibu_estimate / 260.0 + 1.0;
        let temperature_factor = elevation_ft / 550.0 * 0.02 + 1.0;
        let combined = gravity_factor * hopping_rate_factor * temperature_factor;
        let utilization = (7.2994 + 15.0746 * ((hop.time_min - 21.86) / 24.71).tanh()) / 100.0;
        let ibu = utilization * hop.alpha / 100.0 * hop.weight_oz * MG_PER_L_PER_OZ_GAL
            / (hop.batch_gal * combined);
        finite("garetz", ibu)
    }
}

/// Evaluate one hop addition with the configured method.
///
/// Garetz is a composite: its hopping-rate factor is fed the sum of the
/// Tinseth and Rager estimates for the same addition.
pub fn hop_ibu(
    formulas: &dyn Formulas,
    method: HopFormula,
    hop: &HopAddition,
    boil_gal: f64,
    elevation_ft: f64,
) -> Result<f64, FormulaError> {
    match method {
        HopFormula::Tinseth => formulas.tinseth(hop),
        HopFormula::Rager => formulas.rager(hop),
        HopFormula::Garetz => {
            let estimate = formulas.tinseth(hop)? + formulas.rager(hop)?;
            formulas.garetz(hop, boil_gal, estimate, elevation_ft)
        }
    }
}
