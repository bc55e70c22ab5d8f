//! Recipe presentation and calculation settings.

use serde::{Deserialize, Serialize};

use crate::formula::HopFormula;

/// Unit every volume is stored and calculated in.
pub const CALC_VOLUME_UNIT: &str = "gal";
/// Unit fermentable masses are summed in.
pub const CALC_FERMENTABLE_MASS_UNIT: &str = "lb";
/// Unit hop masses are summed in.
pub const CALC_HOP_MASS_UNIT: &str = "oz";
/// Unit elevation is passed to the formulas in.
pub const CALC_ELEVATION_UNIT: &str = "ft";
/// Unit hop times are passed to the formulas in.
pub const CALC_TIME_UNIT: &str = "min";
/// Unit colors are summed in.
pub const CALC_COLOR_UNIT: &str = "SRM";

/// Settings fixed when a recipe is built.
///
/// ```
/// use grain::{HopFormula, RecipeConfig};
///
/// let config = RecipeConfig::default()
///     .with_volume_precision(1)
///     .with_default_hop_formula(HopFormula::Rager);
/// assert_eq!(config.volume_precision, 1);
/// assert_eq!(config.color_precision, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipeConfig {
    /// Decimal places of volumes converted to the display unit.
    pub volume_precision: u32,
    /// Decimal places of the SRM sum.
    pub color_precision: u32,
    /// Hop formula of the equipment profile a recipe gets when none is given.
    pub default_hop_formula: HopFormula,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            volume_precision: 2,
            color_precision: 0,
            default_hop_formula: HopFormula::Tinseth,
        }
    }
}

impl RecipeConfig {
    pub fn with_volume_precision(mut self, decimals: u32) -> Self {
        self.volume_precision = decimals;
        self
    }

    pub fn with_color_precision(mut self, decimals: u32) -> Self {
        self.color_precision = decimals;
        self
    }

    pub fn with_default_hop_formula(mut self, formula: HopFormula) -> Self {
        self.default_hop_formula = formula;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecipeConfig::default();
        assert_eq!(config.volume_precision, 2);
        assert_eq!(config.color_precision, 0);
        assert_eq!(config.default_hop_formula, HopFormula::Tinseth);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: RecipeConfig = serde_json::from_str(r#"{"colorPrecision": 1}"#).unwrap();
        assert_eq!(config.color_precision, 1);
        assert_eq!(config.volume_precision, 2);
    }
}
