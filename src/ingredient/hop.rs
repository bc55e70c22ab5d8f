use serde::{Deserialize, Serialize};

use super::{named_enum, non_negative, Choice, Ingredient};
use crate::error::RecipeError;
use crate::measurement::{Measurement, Quantity, DEFAULT_HOP_WEIGHT_UNIT, DEFAULT_TIME_UNIT};

named_enum! {
    /// What a hop variety is typically used for.
    pub enum HopPurpose: "hop purpose" {
        /// Early boil additions.
        Bittering => "bittering",
        /// Late, whirlpool and dry-hop additions.
        Aroma => "aroma",
        /// Dual purpose.
        Both => "both",
    }
}

named_enum! {
    /// Physical form of a hop addition.
    pub enum HopForm: "hop form" {
        Pellet => "pellet",
        Leaf => "leaf",
        Plug => "plug",
    }
}

fn check_alpha(alpha: f64) -> Result<f64, RecipeError> {
    if alpha.is_finite() && (0.0..=100.0).contains(&alpha) {
        Ok(alpha)
    } else {
        Err(RecipeError::InvalidValue {
            field: "alpha",
            message: format!("alpha acid must be a percentage, got {alpha}"),
        })
    }
}

/// A catalog hop variety.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    name: String,
    description: String,
    alpha: f64,
    purpose: HopPurpose,
}

/// Plain record of a [`Hop`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopSnapshot {
    pub name: String,
    pub description: String,
    pub alpha: f64,
    pub purpose: HopPurpose,
}

impl Hop {
    /// Create a catalog hop. `alpha` is the alpha acid percentage.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        alpha: f64,
        purpose: impl Into<Choice>,
    ) -> Result<Self, RecipeError> {
        Ok(Self {
            name: name.into(),
            description: description.into(),
            alpha: check_alpha(alpha)?,
            purpose: HopPurpose::resolve(purpose)?,
        })
    }

    pub fn from_snapshot(snapshot: HopSnapshot) -> Result<Self, RecipeError> {
        Self::new(
            snapshot.name,
            snapshot.description,
            snapshot.alpha,
            snapshot.purpose,
        )
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn purpose(&self) -> HopPurpose {
        self.purpose
    }

    pub fn snapshot(&self) -> HopSnapshot {
        HopSnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            alpha: self.alpha,
            purpose: self.purpose,
        }
    }

    /// Create a recipe-scoped addition of this hop.
    ///
    /// A bare `weight` is in ounces and a bare `time` in minutes. `alpha`
    /// overrides the catalog value for this lot when given.
    pub fn create(
        &self,
        weight: impl Into<Quantity>,
        alpha: Option<f64>,
        time: impl Into<Quantity>,
        form: impl Into<Choice>,
    ) -> Result<RecipeHop, RecipeError> {
        let mut hop = self.snapshot();
        if let Some(alpha) = alpha {
            hop.alpha = alpha;
        }
        let created = RecipeHop::from_snapshot(RecipeHopSnapshot {
            hop,
            weight: Measurement::parse(weight, DEFAULT_HOP_WEIGHT_UNIT)?.format(),
            time: Measurement::parse(time, DEFAULT_TIME_UNIT)?.format(),
            form: HopForm::resolve(form)?,
        })?;
        Ok(RecipeHop {
            hop: self.clone(),
            ..created
        })
    }
}

impl Ingredient for Hop {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        Some(&self.description)
    }

    fn summary(&self) -> String {
        format!("{} ({})", self.name, self.alpha)
    }
}

/// A hop addition in a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeHop {
    hop: Hop,
    weight: Measurement,
    alpha: f64,
    time: Measurement,
    form: HopForm,
}

/// Plain record of a [`RecipeHop`]. `alpha` is the addition's own value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeHopSnapshot {
    #[serde(flatten)]
    pub hop: HopSnapshot,
    pub weight: String,
    pub time: String,
    #[serde(rename = "type")]
    pub form: HopForm,
}

impl RecipeHop {
    pub fn from_snapshot(snapshot: RecipeHopSnapshot) -> Result<Self, RecipeError> {
        let hop = Hop::from_snapshot(snapshot.hop)?;
        Ok(Self {
            weight: non_negative("weight", Measurement::parse(snapshot.weight, DEFAULT_HOP_WEIGHT_UNIT)?)?,
            alpha: hop.alpha,
            time: non_negative("time", Measurement::parse(snapshot.time, DEFAULT_TIME_UNIT)?)?,
            form: snapshot.form,
            hop,
        })
    }

    /// The catalog variety, with its catalog alpha.
    pub fn hop(&self) -> &Hop {
        &self.hop
    }

    /// Alpha acid percentage of this addition.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn purpose(&self) -> HopPurpose {
        self.hop.purpose
    }

    pub fn weight(&self) -> &Measurement {
        &self.weight
    }

    pub fn time(&self) -> &Measurement {
        &self.time
    }

    pub fn form(&self) -> HopForm {
        self.form
    }

    pub fn set_weight(&mut self, weight: impl Into<Quantity>) -> Result<(), RecipeError> {
        self.weight = non_negative("weight", Measurement::parse(weight, DEFAULT_HOP_WEIGHT_UNIT)?)?;
        Ok(())
    }

    pub fn set_time(&mut self, time: impl Into<Quantity>) -> Result<(), RecipeError> {
        self.time = non_negative("time", Measurement::parse(time, DEFAULT_TIME_UNIT)?)?;
        Ok(())
    }

    pub fn set_alpha(&mut self, alpha: f64) -> Result<(), RecipeError> {
        self.alpha = check_alpha(alpha)?;
        Ok(())
    }

    pub fn set_form(&mut self, form: impl Into<Choice>) -> Result<(), RecipeError> {
        self.form = HopForm::resolve(form)?;
        Ok(())
    }

    pub fn snapshot(&self) -> RecipeHopSnapshot {
        RecipeHopSnapshot {
            hop: HopSnapshot {
                alpha: self.alpha,
                ..self.hop.snapshot()
            },
            weight: self.weight.format(),
            time: self.time.format(),
            form: self.form,
        }
    }
}

impl Ingredient for RecipeHop {
    fn name(&self) -> &str {
        &self.hop.name
    }

    fn description(&self) -> Option<&str> {
        Some(&self.hop.description)
    }

    fn summary(&self) -> String {
        format!("{} ({}) {} @ {}", self.hop.name, self.alpha, self.weight, self.time)
    }
}
