#![doc = include_str!("../README.md")]

pub mod channel;
pub mod config;
pub mod error;
pub mod formula;
pub mod graph;
pub mod ingredient;
pub mod measurement;
pub mod profile;
pub mod recipe;
pub mod tracer;
pub mod units;

pub use channel::{ChangeChannel, ChangeEvent, ChangeRecorder, SubscriptionHandle};
pub use config::{RecipeConfig, CALC_VOLUME_UNIT};
pub use error::{ConversionError, FormulaError, GraphError, InvalidEnumValue, ParseError, RecipeError};
pub use formula::{Formulas, HopAddition, HopFormula, StandardFormulas};
pub use graph::{DependencyGraph, InputCategory, Metric};
pub use ingredient::{
    Choice, Fermentable, FermentableSnapshot, FermentableType, Hop, HopForm, HopPurpose, HopSnapshot, Ingredient,
    RecipeFermentable, RecipeFermentableSnapshot, RecipeHop, RecipeHopSnapshot, Yeast, YeastSnapshot, YeastType,
};
pub use measurement::{Measurement, Quantity};
pub use profile::{EquipmentField, EquipmentProfile, EquipmentSnapshot, MashField, MashProfile, MashSnapshot, MashStep};
pub use recipe::{Metrics, Recipe, RecipeBuilder, RecipeField, RecipeSnapshot, RecipeType};
pub use tracer::{LogTracer, NoopTracer, SpanId, Tracer};
pub use units::{StandardUnits, UnitConverter};
