use serde::{Deserialize, Serialize};

use super::{named_enum, Choice, Ingredient};
use crate::error::RecipeError;

named_enum! {
    /// Packaging of a yeast strain.
    pub enum YeastType: "yeast type" {
        Dry => "dry",
        Liquid => "liquid",
    }
}

/// A catalog yeast strain.
#[derive(Debug, Clone, PartialEq)]
pub struct Yeast {
    name: String,
    company: String,
    kind: YeastType,
    attenuation: f64,
}

/// Plain record of a [`Yeast`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YeastSnapshot {
    pub name: String,
    pub company: String,
    #[serde(rename = "type")]
    pub kind: YeastType,
    pub attenuation: f64,
}

impl Yeast {
    /// Create a yeast strain. `attenuation` is the apparent attenuation as a
    /// fraction between 0 and 1.
    pub fn new(
        name: impl Into<String>,
        company: impl Into<String>,
        kind: impl Into<Choice>,
        attenuation: f64,
    ) -> Result<Self, RecipeError> {
        if !(0.0..=1.0).contains(&attenuation) {
            return Err(RecipeError::InvalidValue {
                field: "attenuation",
                message: format!("attenuation must be a fraction within 0..=1, got {attenuation}"),
            });
        }
        Ok(Self {
            name: name.into(),
            company: company.into(),
            kind: YeastType::resolve(kind)?,
            attenuation,
        })
    }

    pub fn from_snapshot(snapshot: YeastSnapshot) -> Result<Self, RecipeError> {
        Self::new(snapshot.name, snapshot.company, snapshot.kind, snapshot.attenuation)
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn kind(&self) -> YeastType {
        self.kind
    }

    pub fn attenuation(&self) -> f64 {
        self.attenuation
    }

    pub fn snapshot(&self) -> YeastSnapshot {
        YeastSnapshot {
            name: self.name.clone(),
            company: self.company.clone(),
            kind: self.kind,
            attenuation: self.attenuation,
        }
    }
}

impl Ingredient for Yeast {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> String {
        format!("{} ({})", self.name, self.company)
    }
}
