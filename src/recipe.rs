//! The recipe aggregate.
//!
//! A [`Recipe`] owns its ingredient lists, its equipment and mash profiles
//! and a cached set of derived [`Metrics`]. Every mutator validates and
//! stores its input, then recomputes the plan of the changed
//! [`InputCategory`] into a staged copy of the metrics. The staged copy is
//! only committed when every metric of the plan succeeded; otherwise the input
//! is put back and the error is returned. After a commit the recipe emits one
//! event for the input and one per recomputed metric, in plan order, so a
//! listener always reads metrics whose dependencies are already up to date.
//!
//! ```
//! use grain::{Fermentable, Hop, Recipe, RecipeField, Yeast};
//!
//! let malt = Fermentable::new("Pale Malt", 37.0, "10 SRM", "grain").unwrap();
//! let cascade = Hop::new("Cascade", "", 5.0, "bittering").unwrap();
//! let mut recipe = Recipe::builder("Pale Ale", "all grain")
//!     .target_batch_volume("5 gal")
//!     .yeast(Yeast::new("US-05", "Fermentis", "dry", 0.75).unwrap())
//!     .fermentable(malt.create("10 lb").unwrap())
//!     .hop(cascade.create("1 oz", None, "60 min", "pellet").unwrap())
//!     .build()
//!     .unwrap();
//! assert!(recipe.og() > 1.0);
//!
//! let events = grain::ChangeRecorder::new();
//! recipe.subscribe([RecipeField::Og, RecipeField::HopsMass], events.listener());
//! recipe.update_fermentable(0, |f| f.set_weight("12 lb")).unwrap();
//! assert_eq!(events.fields(), vec![RecipeField::Og]);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channel::{ChangeChannel, ChangeEvent, SubscriptionHandle};
use crate::config::{
    RecipeConfig, CALC_COLOR_UNIT, CALC_ELEVATION_UNIT, CALC_FERMENTABLE_MASS_UNIT, CALC_HOP_MASS_UNIT,
    CALC_TIME_UNIT, CALC_VOLUME_UNIT,
};
use crate::error::{ConversionError, FormulaError, RecipeError, Result};
use crate::formula::{self, Formulas, HopAddition, StandardFormulas};
use crate::graph::{DependencyGraph, InputCategory, Metric};
use crate::ingredient::{
    named_enum, Choice, RecipeFermentable, RecipeFermentableSnapshot, RecipeHop, RecipeHopSnapshot, Yeast,
    YeastSnapshot,
};
use crate::measurement::{Measurement, Quantity, DEFAULT_VOLUME_UNIT};
use crate::profile::{EquipmentProfile, EquipmentSnapshot, MashField, MashProfile, MashSnapshot};
use crate::tracer::{NoopTracer, SpanId, Tracer};
use crate::units::{self, UnitConverter};

named_enum! {
    /// Brewing method of a recipe.
    pub enum RecipeType: "recipe type" {
        AllGrain => "all grain",
        PartialMash => "partial mash",
        Extract => "extract",
    }
}

impl RecipeType {
    /// Whether recipes of this type carry a mash profile.
    pub fn uses_mash(&self) -> bool {
        matches!(self, RecipeType::AllGrain | RecipeType::PartialMash)
    }
}

/// Fields of a [`Recipe`] that emit change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeField {
    Name,
    Type,
    TargetBatchVolume,
    Fermentables,
    Hops,
    Yeast,
    Equipment,
    Mash,
    TargetBoilVolume,
    Og,
    Fg,
    Ibu,
    Abv,
    Srm,
    Ratio,
    FermentablesMass,
    HopsMass,
}

impl From<Metric> for RecipeField {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::TargetBoilVolume => RecipeField::TargetBoilVolume,
            Metric::Og => RecipeField::Og,
            Metric::Fg => RecipeField::Fg,
            Metric::Ibu => RecipeField::Ibu,
            Metric::Abv => RecipeField::Abv,
            Metric::Srm => RecipeField::Srm,
            Metric::Ratio => RecipeField::Ratio,
            Metric::FermentablesMass => RecipeField::FermentablesMass,
            Metric::HopsMass => RecipeField::HopsMass,
        }
    }
}

impl From<InputCategory> for RecipeField {
    fn from(category: InputCategory) -> Self {
        match category {
            InputCategory::Fermentables => RecipeField::Fermentables,
            InputCategory::Hops => RecipeField::Hops,
            InputCategory::Yeast => RecipeField::Yeast,
            InputCategory::Equipment => RecipeField::Equipment,
            InputCategory::Mash => RecipeField::Mash,
            InputCategory::TargetBatchVolume => RecipeField::TargetBatchVolume,
        }
    }
}

/// Cached derived values, in calculation units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Gallons.
    pub target_boil_volume: f64,
    pub og: f64,
    pub fg: f64,
    pub ibu: f64,
    /// Percent.
    pub abv: f64,
    pub srm: f64,
    /// `None` while the recipe has no gravity.
    pub ratio: Option<f64>,
    /// Pounds.
    pub fermentables_mass: f64,
    /// Ounces.
    pub hops_mass: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            target_boil_volume: 0.0,
            og: 1.0,
            fg: 1.0,
            ibu: 0.0,
            abv: 0.0,
            srm: 0.0,
            ratio: None,
            fermentables_mass: 0.0,
            hops_mass: 0.0,
        }
    }
}

impl Metrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TargetBoilVolume => Some(self.target_boil_volume),
            Metric::Og => Some(self.og),
            Metric::Fg => Some(self.fg),
            Metric::Ibu => Some(self.ibu),
            Metric::Abv => Some(self.abv),
            Metric::Srm => Some(self.srm),
            Metric::Ratio => self.ratio,
            Metric::FermentablesMass => Some(self.fermentables_mass),
            Metric::HopsMass => Some(self.hops_mass),
        }
    }

    fn set(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::Ratio => {
                self.ratio = value;
                return;
            }
            Metric::TargetBoilVolume => &mut self.target_boil_volume,
            Metric::Og => &mut self.og,
            Metric::Fg => &mut self.fg,
            Metric::Ibu => &mut self.ibu,
            Metric::Abv => &mut self.abv,
            Metric::Srm => &mut self.srm,
            Metric::FermentablesMass => &mut self.fermentables_mass,
            Metric::HopsMass => &mut self.hops_mass,
        };
        if let Some(value) = value {
            *slot = value;
        }
    }
}

/// Plain record of a [`Recipe`]. Volumes are in the calculation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RecipeType,
    pub target_batch_volume: String,
    pub target_boil_volume: String,
    pub fermentables: Vec<RecipeFermentableSnapshot>,
    pub hops: Vec<RecipeHopSnapshot>,
    pub yeast: Option<YeastSnapshot>,
    pub equipment: EquipmentSnapshot,
    pub mash: Option<MashSnapshot>,
    pub metrics: Metrics,
}

/// A brewing recipe with reactive derived metrics.
pub struct Recipe {
    name: String,
    kind: RecipeType,
    /// Gallons.
    target_batch_volume: f64,
    fermentables: Vec<RecipeFermentable>,
    hops: Vec<RecipeHop>,
    yeast: Option<Yeast>,
    equipment: EquipmentProfile,
    mash: Option<MashProfile>,
    metrics: Metrics,
    graph: DependencyGraph,
    formulas: Arc<dyn Formulas>,
    converter: Arc<dyn UnitConverter>,
    tracer: Arc<dyn Tracer>,
    config: RecipeConfig,
    channel: ChangeChannel<RecipeField>,
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target_batch_volume", &self.target_batch_volume)
            .field("fermentables", &self.fermentables.len())
            .field("hops", &self.hops.len())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

fn positive_volume(gallons: f64) -> Result<f64> {
    if gallons.is_finite() && gallons > 0.0 {
        Ok(gallons)
    } else {
        Err(RecipeError::InvalidValue {
            field: "target batch volume",
            message: format!("must be a positive volume, got {gallons} {CALC_VOLUME_UNIT}"),
        })
    }
}

fn check_index(kind: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(RecipeError::IndexOutOfRange { kind, index, len })
    }
}

impl Recipe {
    /// Start building a recipe. `kind` is a recipe type name or ordinal.
    pub fn builder(name: impl Into<String>, kind: impl Into<Choice>) -> RecipeBuilder {
        RecipeBuilder::new(name, kind)
    }

    /// Rebuild a recipe from its snapshot. The stored metrics are ignored and
    /// recomputed.
    pub fn from_snapshot(snapshot: RecipeSnapshot) -> Result<Self> {
        let mut builder = Recipe::builder(snapshot.name, snapshot.kind)
            .target_batch_volume(snapshot.target_batch_volume)
            .equipment(EquipmentProfile::from_snapshot(snapshot.equipment)?);
        if let Some(mash) = snapshot.mash {
            builder = builder.mash_profile(MashProfile::from_snapshot(mash)?);
        }
        if let Some(yeast) = snapshot.yeast {
            builder = builder.yeast(Yeast::from_snapshot(yeast)?);
        }
        for fermentable in snapshot.fermentables {
            builder = builder.fermentable(RecipeFermentable::from_snapshot(fermentable)?);
        }
        for hop in snapshot.hops {
            builder = builder.hop(RecipeHop::from_snapshot(hop)?);
        }
        builder.build()
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RecipeType {
        self.kind
    }

    pub fn fermentables(&self) -> &[RecipeFermentable] {
        &self.fermentables
    }

    pub fn hops(&self) -> &[RecipeHop] {
        &self.hops
    }

    pub fn yeast(&self) -> Option<&Yeast> {
        self.yeast.as_ref()
    }

    pub fn equipment(&self) -> &EquipmentProfile {
        &self.equipment
    }

    /// The mash profile, while the recipe type uses one.
    pub fn mash_profile(&self) -> Option<&MashProfile> {
        self.mash.as_ref().filter(|_| self.kind.uses_mash())
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &RecipeConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn og(&self) -> f64 {
        self.metrics.og
    }

    pub fn fg(&self) -> f64 {
        self.metrics.fg
    }

    pub fn ibu(&self) -> f64 {
        self.metrics.ibu
    }

    pub fn abv(&self) -> f64 {
        self.metrics.abv
    }

    pub fn srm(&self) -> f64 {
        self.metrics.srm
    }

    /// Bitterness to gravity ratio; `None` while OG is exactly 1.
    pub fn ratio(&self) -> Option<f64> {
        self.metrics.ratio
    }

    /// Total fermentable weight in pounds.
    pub fn fermentables_mass(&self) -> f64 {
        self.metrics.fermentables_mass
    }

    /// Total hop weight in ounces.
    pub fn hops_mass(&self) -> f64 {
        self.metrics.hops_mass
    }

    /// Batch volume in gallons.
    pub fn target_batch_gallons(&self) -> f64 {
        self.target_batch_volume
    }

    /// Boil volume in gallons.
    pub fn target_boil_gallons(&self) -> f64 {
        self.metrics.target_boil_volume
    }

    /// Batch volume in the equipment profile's volume unit.
    pub fn target_batch_volume(&self) -> Result<Measurement, ConversionError> {
        self.display_volume(self.target_batch_volume)
    }

    /// Boil volume in the equipment profile's volume unit.
    pub fn target_boil_volume(&self) -> Result<Measurement, ConversionError> {
        self.display_volume(self.metrics.target_boil_volume)
    }

    /// Converted values are rounded to the configured precision; values
    /// already in the calculation unit are returned as stored.
    fn display_volume(&self, gallons: f64) -> Result<Measurement, ConversionError> {
        let stored = Measurement::known(gallons, CALC_VOLUME_UNIT);
        let measure = self.equipment.volume_measure();
        if measure == CALC_VOLUME_UNIT {
            return Ok(stored);
        }
        Ok(stored
            .convert(measure, &*self.converter)?
            .rounded(self.config.volume_precision))
    }

    pub fn snapshot(&self) -> RecipeSnapshot {
        RecipeSnapshot {
            name: self.name.clone(),
            kind: self.kind,
            target_batch_volume: Measurement::known(self.target_batch_volume, CALC_VOLUME_UNIT).format(),
            target_boil_volume: Measurement::known(self.metrics.target_boil_volume, CALC_VOLUME_UNIT).format(),
            fermentables: self.fermentables.iter().map(RecipeFermentable::snapshot).collect(),
            hops: self.hops.iter().map(RecipeHop::snapshot).collect(),
            yeast: self.yeast.as_ref().map(Yeast::snapshot),
            equipment: self.equipment.snapshot(),
            mash: self.mash.as_ref().map(MashProfile::snapshot),
            metrics: self.metrics,
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Subscribe to recipe changes. An empty field list means every field.
    ///
    /// Callbacks run synchronously inside the mutator that triggered them and
    /// only see the event, so they cannot mutate the recipe.
    pub fn subscribe(
        &mut self,
        fields: impl IntoIterator<Item = RecipeField>,
        callback: impl FnMut(&ChangeEvent<RecipeField>) + Send + 'static,
    ) -> SubscriptionHandle {
        self.channel.subscribe(fields, callback)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.channel.unsubscribe(handle)
    }

    // ------------------------------------------------------------------
    // Mutators without derived metrics
    // ------------------------------------------------------------------

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.emit(RecipeField::Name, None);
    }

    /// Change the recipe type. Switching to a mash type without a mash profile
    /// installs a default one.
    pub fn set_type(&mut self, kind: impl Into<Choice>) -> Result<()> {
        let kind = RecipeType::resolve(kind)?;
        self.kind = kind;
        if kind.uses_mash() && self.mash.is_none() {
            self.mash = Some(MashProfile::new(format!("{} mash", self.name)));
        }
        self.emit(RecipeField::Type, Some(kind.ordinal() as f64));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutators with derived metrics
    // ------------------------------------------------------------------

    /// Set the batch volume. A bare number is taken in gallons.
    pub fn set_target_batch_volume(&mut self, volume: impl Into<Quantity>) -> Result<()> {
        let volume = Measurement::parse(volume, DEFAULT_VOLUME_UNIT)?;
        let gallons = positive_volume(volume.to_with(CALC_VOLUME_UNIT, &*self.converter)?)?;
        let previous = std::mem::replace(&mut self.target_batch_volume, gallons);
        self.propagate(
            InputCategory::TargetBatchVolume,
            Some(gallons),
            previous,
            |recipe, previous| recipe.target_batch_volume = previous,
        )
    }

    pub fn set_fermentables(&mut self, fermentables: Vec<RecipeFermentable>) -> Result<()> {
        let count = fermentables.len() as f64;
        let previous = std::mem::replace(&mut self.fermentables, fermentables);
        self.propagate(InputCategory::Fermentables, Some(count), previous, |recipe, previous| {
            recipe.fermentables = previous
        })
    }

    pub fn add_fermentable(&mut self, fermentable: RecipeFermentable) -> Result<()> {
        self.fermentables.push(fermentable);
        let count = self.fermentables.len() as f64;
        self.propagate(InputCategory::Fermentables, Some(count), (), |recipe, ()| {
            recipe.fermentables.pop();
        })
    }

    pub fn remove_fermentable(&mut self, index: usize) -> Result<RecipeFermentable> {
        check_index("fermentable", index, self.fermentables.len())?;
        let removed = self.fermentables.remove(index);
        let count = self.fermentables.len() as f64;
        self.propagate(
            InputCategory::Fermentables,
            Some(count),
            removed.clone(),
            move |recipe, removed| recipe.fermentables.insert(index, removed),
        )?;
        Ok(removed)
    }

    /// Edit one fermentable in place.
    ///
    /// ```
    /// # use grain::{Fermentable, Recipe};
    /// # let malt = Fermentable::new("Pale Malt", 37.0, 3, "grain").unwrap();
    /// # let mut recipe = Recipe::builder("Pale", "extract")
    /// #     .fermentable(malt.create(10).unwrap())
    /// #     .build()
    /// #     .unwrap();
    /// recipe.update_fermentable(0, |f| f.set_weight("12 lb")).unwrap();
    /// assert_eq!(recipe.fermentables_mass(), 12.0);
    /// ```
    pub fn update_fermentable(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut RecipeFermentable) -> Result<()>,
    ) -> Result<()> {
        check_index("fermentable", index, self.fermentables.len())?;
        let previous = self.fermentables[index].clone();
        if let Err(err) = edit(&mut self.fermentables[index]) {
            self.fermentables[index] = previous;
            return Err(err);
        }
        let count = self.fermentables.len() as f64;
        self.propagate(InputCategory::Fermentables, Some(count), previous, move |recipe, previous| {
            recipe.fermentables[index] = previous
        })
    }

    pub fn set_hops(&mut self, hops: Vec<RecipeHop>) -> Result<()> {
        let count = hops.len() as f64;
        let previous = std::mem::replace(&mut self.hops, hops);
        self.propagate(InputCategory::Hops, Some(count), previous, |recipe, previous| {
            recipe.hops = previous
        })
    }

    pub fn add_hop(&mut self, hop: RecipeHop) -> Result<()> {
        self.hops.push(hop);
        let count = self.hops.len() as f64;
        self.propagate(InputCategory::Hops, Some(count), (), |recipe, ()| {
            recipe.hops.pop();
        })
    }

    pub fn remove_hop(&mut self, index: usize) -> Result<RecipeHop> {
        check_index("hop", index, self.hops.len())?;
        let removed = self.hops.remove(index);
        let count = self.hops.len() as f64;
        self.propagate(
            InputCategory::Hops,
            Some(count),
            removed.clone(),
            move |recipe, removed| recipe.hops.insert(index, removed),
        )?;
        Ok(removed)
    }

    /// Edit one hop addition in place.
    pub fn update_hop(&mut self, index: usize, edit: impl FnOnce(&mut RecipeHop) -> Result<()>) -> Result<()> {
        check_index("hop", index, self.hops.len())?;
        let previous = self.hops[index].clone();
        if let Err(err) = edit(&mut self.hops[index]) {
            self.hops[index] = previous;
            return Err(err);
        }
        let count = self.hops.len() as f64;
        self.propagate(InputCategory::Hops, Some(count), previous, move |recipe, previous| {
            recipe.hops[index] = previous
        })
    }

    /// Replace the yeast. Without yeast the recipe assumes no attenuation.
    pub fn set_yeast(&mut self, yeast: Option<Yeast>) -> Result<()> {
        let attenuation = yeast.as_ref().map(Yeast::attenuation);
        let previous = std::mem::replace(&mut self.yeast, yeast);
        self.propagate(InputCategory::Yeast, attenuation, previous, |recipe, previous| {
            recipe.yeast = previous
        })
    }

    /// Replace the equipment profile.
    pub fn set_equipment(&mut self, equipment: EquipmentProfile) -> Result<()> {
        let previous = std::mem::replace(&mut self.equipment, equipment);
        self.propagate(InputCategory::Equipment, None, previous, |recipe, previous| {
            recipe.equipment = previous
        })
    }

    /// Edit the equipment profile and recompute once afterwards.
    ///
    /// The profile's own subscribers receive the events of the setters the
    /// closure called only after the recipe committed the change; a rejected
    /// edit reaches them not at all.
    pub fn update_equipment(
        &mut self,
        edit: impl FnOnce(&mut EquipmentProfile) -> Result<()>,
    ) -> Result<()> {
        let previous = self.equipment.state();
        self.equipment.hold_events();
        let result = match edit(&mut self.equipment) {
            Ok(()) => self.propagate(InputCategory::Equipment, None, previous, |recipe, previous| {
                recipe.equipment.restore(previous)
            }),
            Err(err) => {
                self.equipment.restore(previous);
                Err(err)
            }
        };
        match result {
            Ok(()) => self.equipment.release_events(),
            Err(_) => self.equipment.discard_events(),
        }
        result
    }

    /// Recompute everything that reads the equipment profile.
    pub fn on_equipment_changed(&mut self) -> Result<()> {
        self.propagate(InputCategory::Equipment, None, (), |_, ()| {})
    }

    /// Replace the mash profile. It stays inactive while the recipe type does
    /// not use one.
    pub fn set_mash_profile(&mut self, mash: MashProfile) -> Result<()> {
        let previous = self.mash.replace(mash);
        self.propagate(InputCategory::Mash, None, previous, |recipe, previous| {
            recipe.mash = previous
        })
    }

    /// Edit the active mash profile. Its subscribers are notified the same
    /// way as in [`update_equipment`](Self::update_equipment).
    pub fn update_mash(&mut self, edit: impl FnOnce(&mut MashProfile) -> Result<()>) -> Result<()> {
        let kind = self.kind;
        let Some(mash) = self.mash.as_mut().filter(|_| kind.uses_mash()) else {
            return Err(RecipeError::InvalidValue {
                field: "mash profile",
                message: format!("a {kind} recipe has no mash profile"),
            });
        };
        let previous = mash.state();
        mash.hold_events();
        let result = match edit(&mut *mash) {
            Ok(()) => self.propagate(InputCategory::Mash, None, previous, |recipe, previous| {
                if let Some(mash) = recipe.mash.as_mut() {
                    mash.restore(previous);
                }
            }),
            Err(err) => {
                mash.restore(previous);
                Err(err)
            }
        };
        if let Some(mash) = self.mash.as_mut() {
            match result {
                Ok(()) => mash.release_events(),
                Err(_) => mash.discard_events(),
            }
        }
        result
    }

    /// Recompute everything that reads the mash profile.
    pub fn on_mash_changed(&mut self) -> Result<()> {
        self.propagate(InputCategory::Mash, None, (), |_, ()| {})
    }

    /// Recompute every metric from scratch. Emits one event per metric.
    pub fn recompute_all(&mut self) -> Result<()> {
        let plan = self.graph.topological_order().to_vec();
        let span = self.tracer.new_span_id();
        self.tracer.on_propagation_start(span, None, &plan);
        match self.stage(&plan, span) {
            Ok(staged) => {
                self.metrics = staged;
                self.tracer.on_propagation_end(span, None);
                for metric in plan {
                    self.emit(metric.into(), self.metrics.get(metric));
                }
                Ok(())
            }
            Err(err) => {
                self.tracer.on_rollback(span, None, &err);
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Recompute the plan of `category` and commit it, or call `restore`
    /// with `previous` and return the error. Events are only emitted after a
    /// commit.
    fn propagate<T>(
        &mut self,
        category: InputCategory,
        value: Option<f64>,
        previous: T,
        restore: impl FnOnce(&mut Self, T),
    ) -> Result<()> {
        let plan = self.graph.plan(category).to_vec();
        let span = self.tracer.new_span_id();
        tracing::debug!(recipe = %self.name, %category, ?plan, "propagating change");
        self.tracer.on_propagation_start(span, Some(category), &plan);

        let staged = match self.stage(&plan, span) {
            Ok(staged) => staged,
            Err(err) => {
                restore(self, previous);
                tracing::warn!(recipe = %self.name, %category, error = %err, "change rolled back");
                self.tracer.on_rollback(span, Some(category), &err);
                return Err(err);
            }
        };

        self.metrics = staged;
        self.tracer.on_propagation_end(span, Some(category));
        self.emit(category.into(), value);
        for metric in plan {
            self.emit(metric.into(), self.metrics.get(metric));
        }
        self.forward_to_mash(category, value);
        Ok(())
    }

    fn stage(&self, plan: &[Metric], span: SpanId) -> Result<Metrics> {
        let mut staged = self.metrics;
        for &metric in plan {
            let value = self.compute(metric, &staged)?;
            staged.set(metric, value);
            self.tracer.on_metric_recomputed(span, metric, value);
        }
        Ok(staged)
    }

    /// Compute one metric from the current inputs and the staged metrics it
    /// depends on.
    fn compute(&self, metric: Metric, staged: &Metrics) -> Result<Option<f64>> {
        let converter = &*self.converter;
        let failed = move |source: FormulaError| RecipeError::Formula { metric, source };

        let value = match metric {
            Metric::TargetBoilVolume => {
                self.equipment.boil_off().to_with(CALC_VOLUME_UNIT, converter)?
                    + self.equipment.kettle_loss().to_with(CALC_VOLUME_UNIT, converter)?
                    + self.target_batch_volume
            }
            Metric::Og => {
                let contributions = self
                    .fermentables
                    .iter()
                    .map(|f| Ok(f.gu() * f.weight().to_with(CALC_FERMENTABLE_MASS_UNIT, converter)?))
                    .collect::<Result<Vec<f64>, ConversionError>>()?;
                self.formulas
                    .og(&contributions, self.equipment.efficiency(), self.target_batch_volume)
                    .map_err(failed)?
            }
            Metric::Fg => {
                let attenuation = self.yeast.as_ref().map_or(0.0, Yeast::attenuation);
                self.formulas.fg(staged.og, attenuation).map_err(failed)?
            }
            Metric::Ibu => {
                let method = self.equipment.hop_formula();
                let elevation = self.equipment.elevation().to_with(CALC_ELEVATION_UNIT, converter)?;
                let mut total = 0.0;
                for hop in &self.hops {
                    let addition = HopAddition {
                        weight_oz: hop.weight().to_with(CALC_HOP_MASS_UNIT, converter)?,
                        alpha: hop.alpha(),
                        time_min: hop.time().to_with(CALC_TIME_UNIT, converter)?,
                        batch_gal: self.target_batch_volume,
                        og: staged.og,
                    };
                    total += formula::hop_ibu(
                        self.formulas.as_ref(),
                        method,
                        &addition,
                        staged.target_boil_volume,
                        elevation,
                    )
                    .map_err(failed)?;
                }
                total
            }
            Metric::Abv => self.formulas.abv(staged.og, staged.fg).map_err(failed)?,
            Metric::Srm => {
                let mut total = 0.0;
                for fermentable in &self.fermentables {
                    total += fermentable.color().to_with(CALC_COLOR_UNIT, converter)?;
                }
                units::round(total, self.config.color_precision)
            }
            Metric::Ratio => {
                let points = (staged.og - 1.0) * 1000.0;
                if points.abs() < f64::EPSILON {
                    return Ok(None);
                }
                staged.ibu / points
            }
            Metric::FermentablesMass => {
                let mut total = 0.0;
                for fermentable in &self.fermentables {
                    total += fermentable.weight().to_with(CALC_FERMENTABLE_MASS_UNIT, converter)?;
                }
                total
            }
            Metric::HopsMass => {
                let mut total = 0.0;
                for hop in &self.hops {
                    total += hop.weight().to_with(CALC_HOP_MASS_UNIT, converter)?;
                }
                total
            }
        };
        Ok(Some(value))
    }

    fn emit(&mut self, field: RecipeField, value: Option<f64>) {
        tracing::trace!(recipe = %self.name, ?field, ?value, "recipe changed");
        self.channel.emit(ChangeEvent::new(field, value));
    }

    /// The mash profile follows batch volume and fermentable changes.
    fn forward_to_mash(&mut self, category: InputCategory, value: Option<f64>) {
        let field = match category {
            InputCategory::TargetBatchVolume => MashField::BatchVolume,
            InputCategory::Fermentables => MashField::Fermentables,
            _ => return,
        };
        if !self.kind.uses_mash() {
            return;
        }
        if let Some(mash) = self.mash.as_mut() {
            mash.notify(field, value);
        }
    }
}

/// Builder for [`Recipe`].
///
/// # Example
///
/// ```
/// use grain::{EquipmentProfile, Recipe, RecipeConfig};
///
/// let mut kettle = EquipmentProfile::new("kettle");
/// kettle.set_boil_off("1 gal").unwrap();
/// let recipe = Recipe::builder("Stout", "extract")
///     .target_batch_volume(5)
///     .equipment(kettle)
///     .config(RecipeConfig::default().with_volume_precision(1))
///     .build()
///     .unwrap();
/// assert_eq!(recipe.target_boil_gallons(), 6.0);
/// ```
pub struct RecipeBuilder {
    name: String,
    kind: Choice,
    target_batch_volume: Quantity,
    fermentables: Vec<RecipeFermentable>,
    hops: Vec<RecipeHop>,
    yeast: Option<Yeast>,
    equipment: Option<EquipmentProfile>,
    mash: Option<MashProfile>,
    formulas: Arc<dyn Formulas>,
    converter: Arc<dyn UnitConverter>,
    tracer: Arc<dyn Tracer>,
    config: RecipeConfig,
}

impl RecipeBuilder {
    /// A five gallon recipe with default equipment and no ingredients.
    pub fn new(name: impl Into<String>, kind: impl Into<Choice>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            target_batch_volume: Quantity::Amount(5.0),
            fermentables: Vec::new(),
            hops: Vec::new(),
            yeast: None,
            equipment: None,
            mash: None,
            formulas: Arc::new(StandardFormulas),
            converter: Arc::new(*units::standard()),
            tracer: Arc::new(NoopTracer),
            config: RecipeConfig::default(),
        }
    }

    /// Batch volume; a bare number is taken in gallons.
    pub fn target_batch_volume(mut self, volume: impl Into<Quantity>) -> Self {
        self.target_batch_volume = volume.into();
        self
    }

    pub fn fermentable(mut self, fermentable: RecipeFermentable) -> Self {
        self.fermentables.push(fermentable);
        self
    }

    pub fn fermentables(mut self, fermentables: impl IntoIterator<Item = RecipeFermentable>) -> Self {
        self.fermentables.extend(fermentables);
        self
    }

    pub fn hop(mut self, hop: RecipeHop) -> Self {
        self.hops.push(hop);
        self
    }

    pub fn hops(mut self, hops: impl IntoIterator<Item = RecipeHop>) -> Self {
        self.hops.extend(hops);
        self
    }

    pub fn yeast(mut self, yeast: Yeast) -> Self {
        self.yeast = Some(yeast);
        self
    }

    /// Equipment profile. Without one the recipe gets
    /// [`EquipmentProfile::new`] with the configured default hop formula.
    pub fn equipment(mut self, equipment: EquipmentProfile) -> Self {
        self.equipment = Some(equipment);
        self
    }

    pub fn mash_profile(mut self, mash: MashProfile) -> Self {
        self.mash = Some(mash);
        self
    }

    /// Replace the brewing formulas.
    pub fn formulas(mut self, formulas: impl Formulas + 'static) -> Self {
        self.formulas = Arc::new(formulas);
        self
    }

    /// Replace the unit converter.
    pub fn converter(mut self, converter: impl UnitConverter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    pub fn tracer(mut self, tracer: impl Tracer) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    pub fn config(mut self, config: RecipeConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the inputs and compute every metric.
    pub fn build(self) -> Result<Recipe> {
        let kind = RecipeType::resolve(self.kind)?;
        let volume = Measurement::parse(self.target_batch_volume, DEFAULT_VOLUME_UNIT)?;
        let target_batch_volume = positive_volume(volume.to_with(CALC_VOLUME_UNIT, &*self.converter)?)?;

        let config = self.config;
        let equipment = self.equipment.unwrap_or_else(|| {
            let mut equipment = EquipmentProfile::new("default");
            equipment.set_hop_formula(config.default_hop_formula);
            equipment
        });
        let mash = match self.mash {
            None if kind.uses_mash() => Some(MashProfile::new(format!("{} mash", self.name))),
            mash => mash,
        };

        let mut recipe = Recipe {
            name: self.name,
            kind,
            target_batch_volume,
            fermentables: self.fermentables,
            hops: self.hops,
            yeast: self.yeast,
            equipment,
            mash,
            metrics: Metrics::default(),
            graph: DependencyGraph::standard()?,
            formulas: self.formulas,
            converter: self.converter,
            tracer: self.tracer,
            config,
            channel: ChangeChannel::new(),
        };
        recipe.recompute_all()?;
        tracing::debug!(recipe = %recipe.name, %kind, metrics = ?recipe.metrics, "recipe built");
        Ok(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChangeRecorder;
    use crate::ingredient::{Fermentable, Hop};
    use crate::profile::EquipmentField;

    fn pale_ale() -> Recipe {
        let malt = Fermentable::new("Pale Malt", 37.0, "10 SRM", "grain").unwrap();
        let hop = Hop::new("Cascade", "", 5.0, "bittering").unwrap();
        Recipe::builder("Pale Ale", "all grain")
            .target_batch_volume("5 gal")
            .yeast(Yeast::new("US-05", "Fermentis", "dry", 0.75).unwrap())
            .fermentable(malt.create("10 lb").unwrap())
            .hop(hop.create("1 oz", None, "60 min", "pellet").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_computes_metrics() {
        let recipe = pale_ale();
        assert!((recipe.og() - 1.0555).abs() < 1e-9);
        assert!((recipe.fg() - 1.013_875).abs() < 1e-9);
        assert_eq!(recipe.srm(), 10.0);
        assert_eq!(recipe.fermentables_mass(), 10.0);
        assert_eq!(recipe.hops_mass(), 1.0);
        assert!(recipe.ibu() > 0.0);
        assert!(recipe.ratio().is_some());
    }

    #[test]
    fn test_recipe_type_names() {
        assert_eq!(RecipeType::resolve("All Grain").unwrap(), RecipeType::AllGrain);
        assert!(RecipeType::resolve("brew in a bag").is_err());
        assert!(!RecipeType::Extract.uses_mash());
        assert!(Recipe::builder("x", "lager").build().is_err());
    }

    #[test]
    fn test_empty_recipe_has_no_ratio() {
        let recipe = Recipe::builder("Water", "extract").build().unwrap();
        assert_eq!(recipe.og(), 1.0);
        assert_eq!(recipe.fg(), 1.0);
        assert_eq!(recipe.ratio(), None);
        assert!(recipe.mash_profile().is_none());
    }

    #[test]
    fn test_set_name_and_type_emit_without_metrics() {
        let mut recipe = Recipe::builder("Water", "extract").build().unwrap();
        let events = ChangeRecorder::new();
        recipe.subscribe([], events.listener());

        recipe.set_name("Still Water");
        recipe.set_type("partial mash").unwrap();
        assert!(recipe.set_type(7usize).is_err());

        assert_eq!(events.fields(), vec![RecipeField::Name, RecipeField::Type]);
        assert_eq!(recipe.kind(), RecipeType::PartialMash);
        assert_eq!(recipe.mash_profile().unwrap().name(), "Still Water mash");
    }

    #[test]
    fn test_batch_volume_rejects_non_positive() {
        let mut recipe = pale_ale();
        assert!(recipe.set_target_batch_volume(0).is_err());
        assert!(recipe.set_target_batch_volume("2 kg").is_err());
        assert_eq!(recipe.target_batch_gallons(), 5.0);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut recipe = pale_ale();
        match recipe.remove_hop(3) {
            Err(RecipeError::IndexOutOfRange { kind, index, len }) => {
                assert_eq!((kind, index, len), ("hop", 3, 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_failed_edit_restores_ingredient() {
        let mut recipe = pale_ale();
        let err = recipe.update_hop(0, |hop| {
            hop.set_time("90 min")?;
            hop.set_alpha(250.0)
        });
        assert!(err.is_err());
        assert_eq!(recipe.hops()[0].time().format(), "60 min");
    }

    #[test]
    fn test_unconvertible_boil_off_rolls_back_equipment() {
        let mut recipe = pale_ale();
        let before = *recipe.metrics();
        let result = recipe.update_equipment(|equipment| equipment.set_boil_off("3 handfuls"));
        assert!(matches!(result, Err(RecipeError::Conversion(_))));
        assert_eq!(recipe.equipment().boil_off().format(), "0 gal");
        assert_eq!(*recipe.metrics(), before);
    }

    #[test]
    fn test_rolled_back_equipment_edit_is_not_announced() {
        let mut equipment = EquipmentProfile::new("kettle");
        let seen = ChangeRecorder::new();
        equipment.subscribe([], seen.listener());
        let mut recipe = Recipe::builder("Pale Ale", "extract")
            .equipment(equipment)
            .build()
            .unwrap();

        let result = recipe.update_equipment(|e| e.set_boil_off("3 handfuls"));
        assert!(matches!(result, Err(RecipeError::Conversion(_))));
        assert_eq!(recipe.equipment().boil_off().format(), "0 gal");
        assert!(seen.is_empty(), "{:?}", seen.events());

        let rejected = recipe.update_equipment(|e| {
            e.set_efficiency(70.0)?;
            e.set_efficiency(0.0)
        });
        assert!(rejected.is_err());
        assert_eq!(recipe.equipment().efficiency(), 75.0);
        assert!(seen.is_empty());

        recipe.update_equipment(|e| e.set_boil_off("1 gal")).unwrap();
        assert_eq!(
            seen.events(),
            vec![ChangeEvent::new(EquipmentField::BoilOff, Some(1.0))]
        );
    }

    #[test]
    fn test_rolled_back_mash_edit_is_not_announced() {
        let mut recipe = pale_ale();
        let mut mash = MashProfile::new("single infusion");
        let seen = ChangeRecorder::new();
        mash.subscribe([MashField::Thickness, MashField::Steps], seen.listener());
        recipe.set_mash_profile(mash).unwrap();

        let rejected = recipe.update_mash(|m| {
            m.set_thickness(1.5)?;
            m.set_thickness(-1.0)
        });
        assert!(rejected.is_err());
        assert_eq!(recipe.mash_profile().unwrap().thickness(), 1.25);
        assert!(seen.is_empty());

        recipe.update_mash(|m| m.set_thickness(1.5)).unwrap();
        assert_eq!(seen.fields(), vec![MashField::Thickness]);
    }

    #[test]
    fn test_mash_follows_batch_volume_and_fermentables() {
        let mut recipe = pale_ale();
        let mut mash = MashProfile::new("single infusion");
        let forwarded = ChangeRecorder::new();
        mash.subscribe([MashField::BatchVolume, MashField::Fermentables], forwarded.listener());
        recipe.set_mash_profile(mash).unwrap();

        recipe.set_target_batch_volume(6).unwrap();
        recipe.remove_fermentable(0).unwrap();
        assert_eq!(
            forwarded.events(),
            vec![
                ChangeEvent::new(MashField::BatchVolume, Some(6.0)),
                ChangeEvent::new(MashField::Fermentables, Some(0.0)),
            ]
        );

        recipe.set_type("extract").unwrap();
        recipe.set_target_batch_volume(5).unwrap();
        assert_eq!(forwarded.len(), 2);
        assert!(recipe.update_mash(|m| m.set_thickness(1.5)).is_err());
    }

    #[test]
    fn test_display_volume_rounds_only_when_converted() {
        let mut recipe = pale_ale();
        recipe.set_target_batch_volume(5.123_456).unwrap();
        assert_eq!(recipe.target_batch_volume().unwrap().format(), "5.123456 gal");

        recipe.update_equipment(|e| e.set_volume_measure("l")).unwrap();
        let liters = recipe.target_batch_volume().unwrap();
        assert_eq!(liters.unit(), "l");
        assert_eq!(liters.amount(), 19.39);
        assert_eq!(recipe.target_batch_gallons(), 5.123_456);
    }
}
