use serde::{Deserialize, Serialize};

use super::{named_enum, non_negative, Choice, Ingredient};
use crate::error::RecipeError;
use crate::measurement::{Measurement, Quantity, DEFAULT_COLOR_UNIT, DEFAULT_FERMENTABLE_WEIGHT_UNIT};

named_enum! {
    /// Kind of fermentable.
    pub enum FermentableType: "fermentable type" {
        /// Malted or unmalted grain.
        Grain => "grain",
        /// Simple sugar.
        Sugar => "sugar",
        /// Liquid or dry malt extract.
        Extract => "extract",
    }
}

/// A catalog fermentable.
#[derive(Debug, Clone, PartialEq)]
pub struct Fermentable {
    name: String,
    gu: f64,
    color: Measurement,
    kind: FermentableType,
}

/// Plain record of a [`Fermentable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FermentableSnapshot {
    pub name: String,
    pub gu: f64,
    #[serde(rename = "type")]
    pub kind: FermentableType,
    pub color: String,
}

impl Fermentable {
    /// Create a catalog fermentable.
    ///
    /// `gu` is the potential in gravity points per pound per gallon. A bare
    /// numeric `color` is taken as SRM.
    pub fn new(
        name: impl Into<String>,
        gu: f64,
        color: impl Into<Quantity>,
        kind: impl Into<Choice>,
    ) -> Result<Self, RecipeError> {
        if !gu.is_finite() || gu < 0.0 {
            return Err(RecipeError::InvalidValue {
                field: "gu",
                message: format!("gravity units must be a non-negative number, got {gu}"),
            });
        }
        Ok(Self {
            name: name.into(),
            gu,
            color: Measurement::parse(color, DEFAULT_COLOR_UNIT)?,
            kind: FermentableType::resolve(kind)?,
        })
    }

    /// Rebuild a fermentable from its snapshot.
    pub fn from_snapshot(snapshot: FermentableSnapshot) -> Result<Self, RecipeError> {
        Self::new(snapshot.name, snapshot.gu, snapshot.color, snapshot.kind)
    }

    pub fn gu(&self) -> f64 {
        self.gu
    }

    pub fn color(&self) -> &Measurement {
        &self.color
    }

    pub fn kind(&self) -> FermentableType {
        self.kind
    }

    pub fn snapshot(&self) -> FermentableSnapshot {
        FermentableSnapshot {
            name: self.name.clone(),
            gu: self.gu,
            kind: self.kind,
            color: self.color.format(),
        }
    }

    /// Create a recipe-scoped copy carrying `weight` (pounds when bare).
    pub fn create(&self, weight: impl Into<Quantity>) -> Result<RecipeFermentable, RecipeError> {
        let weight = Measurement::parse(weight, DEFAULT_FERMENTABLE_WEIGHT_UNIT)?;
        RecipeFermentable::from_snapshot(RecipeFermentableSnapshot {
            fermentable: self.snapshot(),
            weight: weight.format(),
        })
    }
}

impl Ingredient for Fermentable {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> String {
        self.name.clone()
    }
}

/// A fermentable as used in a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFermentable {
    fermentable: Fermentable,
    weight: Measurement,
}

/// Plain record of a [`RecipeFermentable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeFermentableSnapshot {
    #[serde(flatten)]
    pub fermentable: FermentableSnapshot,
    pub weight: String,
}

impl RecipeFermentable {
    /// Rebuild a recipe fermentable from its snapshot.
    pub fn from_snapshot(snapshot: RecipeFermentableSnapshot) -> Result<Self, RecipeError> {
        Ok(Self {
            fermentable: Fermentable::from_snapshot(snapshot.fermentable)?,
            weight: non_negative("weight", Measurement::parse(snapshot.weight, DEFAULT_FERMENTABLE_WEIGHT_UNIT)?)?,
        })
    }

    /// The catalog entry this was created from.
    pub fn fermentable(&self) -> &Fermentable {
        &self.fermentable
    }

    pub fn gu(&self) -> f64 {
        self.fermentable.gu
    }

    pub fn color(&self) -> &Measurement {
        &self.fermentable.color
    }

    pub fn kind(&self) -> FermentableType {
        self.fermentable.kind
    }

    pub fn weight(&self) -> &Measurement {
        &self.weight
    }

    /// Replace the weight. Nothing changes if `weight` does not parse or is
    /// negative.
    pub fn set_weight(&mut self, weight: impl Into<Quantity>) -> Result<(), RecipeError> {
        self.weight = non_negative("weight", Measurement::parse(weight, DEFAULT_FERMENTABLE_WEIGHT_UNIT)?)?;
        Ok(())
    }

    pub fn snapshot(&self) -> RecipeFermentableSnapshot {
        RecipeFermentableSnapshot {
            fermentable: self.fermentable.snapshot(),
            weight: self.weight.format(),
        }
    }
}

impl Ingredient for RecipeFermentable {
    fn name(&self) -> &str {
        &self.fermentable.name
    }

    fn summary(&self) -> String {
        format!("{} ({})", self.fermentable.name, self.weight)
    }
}
