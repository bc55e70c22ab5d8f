//! Equipment and mash profiles.
//!
//! Both are collaborators of a recipe: sources of named parameters and
//! emitters of change events. Setters validate first and only emit once the
//! new value is stored.

use serde::{Deserialize, Serialize};

use crate::channel::{ChangeChannel, ChangeEvent, SubscriptionHandle};
use crate::error::RecipeError;
use crate::formula::HopFormula;
use crate::measurement::{self, Measurement, Quantity, DEFAULT_TIME_UNIT, DEFAULT_VOLUME_UNIT};

const DEFAULT_LENGTH_UNIT: &str = "ft";
const DEFAULT_TEMPERATURE_UNIT: &str = "F";

/// Fields of an [`EquipmentProfile`] that emit change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipmentField {
    Name,
    VolumeMeasure,
    Efficiency,
    BoilOff,
    KettleLoss,
    Elevation,
    HopFormula,
}

/// Brewhouse parameters shared by the recipes brewed on it.
#[derive(Debug)]
pub struct EquipmentProfile {
    name: String,
    volume_measure: String,
    efficiency: f64,
    boil_off: Measurement,
    kettle_loss: Measurement,
    elevation: Measurement,
    hop_formula: HopFormula,
    channel: ChangeChannel<EquipmentField>,
}

/// Plain record of an [`EquipmentProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSnapshot {
    pub name: String,
    pub volume_measure: String,
    pub efficiency: f64,
    pub boil_off: String,
    pub kettle_loss: String,
    pub elevation: String,
    pub hop_formula: HopFormula,
}

impl EquipmentProfile {
    /// A profile measuring in gallons at 75% efficiency, sea level, with no
    /// boil-off or kettle loss and Tinseth bitterness.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume_measure: DEFAULT_VOLUME_UNIT.to_string(),
            efficiency: 75.0,
            boil_off: Measurement::known(0.0, DEFAULT_VOLUME_UNIT),
            kettle_loss: Measurement::known(0.0, DEFAULT_VOLUME_UNIT),
            elevation: Measurement::known(0.0, DEFAULT_LENGTH_UNIT),
            hop_formula: HopFormula::default(),
            channel: ChangeChannel::new(),
        }
    }

    pub fn from_snapshot(snapshot: EquipmentSnapshot) -> Result<Self, RecipeError> {
        let mut profile = Self::new(snapshot.name);
        profile.set_volume_measure(snapshot.volume_measure)?;
        profile.set_efficiency(snapshot.efficiency)?;
        profile.set_boil_off(snapshot.boil_off)?;
        profile.set_kettle_loss(snapshot.kettle_loss)?;
        profile.set_elevation(snapshot.elevation)?;
        profile.set_hop_formula(snapshot.hop_formula);
        Ok(profile)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit volumes are presented in.
    pub fn volume_measure(&self) -> &str {
        &self.volume_measure
    }

    /// Brewhouse efficiency in percent.
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    /// Volume lost to evaporation over the boil.
    pub fn boil_off(&self) -> &Measurement {
        &self.boil_off
    }

    /// Volume left behind in the kettle.
    pub fn kettle_loss(&self) -> &Measurement {
        &self.kettle_loss
    }

    pub fn elevation(&self) -> &Measurement {
        &self.elevation
    }

    pub fn hop_formula(&self) -> HopFormula {
        self.hop_formula
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.emit(EquipmentField::Name, None);
    }

    pub fn set_volume_measure(&mut self, unit: impl Into<String>) -> Result<(), RecipeError> {
        let unit = unit.into();
        self.volume_measure = measurement::check_unit(&unit)?.to_string();
        self.emit(EquipmentField::VolumeMeasure, None);
        Ok(())
    }

    pub fn set_efficiency(&mut self, efficiency: f64) -> Result<(), RecipeError> {
        if !(efficiency > 0.0 && efficiency <= 100.0) {
            return Err(RecipeError::InvalidValue {
                field: "efficiency",
                message: format!("efficiency must be a percentage above 0, got {efficiency}"),
            });
        }
        self.efficiency = efficiency;
        self.emit(EquipmentField::Efficiency, Some(efficiency));
        Ok(())
    }

    /// A bare number is taken in gallons.
    pub fn set_boil_off(&mut self, volume: impl Into<Quantity>) -> Result<(), RecipeError> {
        self.boil_off = Measurement::parse(volume, DEFAULT_VOLUME_UNIT)?;
        self.emit(EquipmentField::BoilOff, Some(self.boil_off.amount()));
        Ok(())
    }

    /// A bare number is taken in gallons.
    pub fn set_kettle_loss(&mut self, volume: impl Into<Quantity>) -> Result<(), RecipeError> {
        self.kettle_loss = Measurement::parse(volume, DEFAULT_VOLUME_UNIT)?;
        self.emit(EquipmentField::KettleLoss, Some(self.kettle_loss.amount()));
        Ok(())
    }

    /// A bare number is taken in feet.
    pub fn set_elevation(&mut self, elevation: impl Into<Quantity>) -> Result<(), RecipeError> {
        self.elevation = Measurement::parse(elevation, DEFAULT_LENGTH_UNIT)?;
        self.emit(EquipmentField::Elevation, Some(self.elevation.amount()));
        Ok(())
    }

    pub fn set_hop_formula(&mut self, formula: HopFormula) {
        self.hop_formula = formula;
        self.emit(EquipmentField::HopFormula, None);
    }

    pub fn subscribe(
        &mut self,
        fields: impl IntoIterator<Item = EquipmentField>,
        callback: impl FnMut(&ChangeEvent<EquipmentField>) + Send + 'static,
    ) -> SubscriptionHandle {
        self.channel.subscribe(fields, callback)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.channel.unsubscribe(handle)
    }

    fn emit(&mut self, field: EquipmentField, value: Option<f64>) {
        tracing::trace!(?field, ?value, profile = %self.name, "equipment changed");
        self.channel.emit(ChangeEvent::new(field, value));
    }

    /// Buffer this profile's events until the owning recipe commits or
    /// rolls back an edit.
    pub(crate) fn hold_events(&mut self) {
        self.channel.hold();
    }

    pub(crate) fn release_events(&mut self) {
        self.channel.release();
    }

    pub(crate) fn discard_events(&mut self) {
        let dropped = self.channel.discard();
        tracing::trace!(dropped, profile = %self.name, "equipment events discarded");
    }

    pub(crate) fn state(&self) -> EquipmentState {
        EquipmentState {
            name: self.name.clone(),
            volume_measure: self.volume_measure.clone(),
            efficiency: self.efficiency,
            boil_off: self.boil_off.clone(),
            kettle_loss: self.kettle_loss.clone(),
            elevation: self.elevation.clone(),
            hop_formula: self.hop_formula,
        }
    }

    /// Put back values taken with [`state`](Self::state), keeping
    /// subscribers and emitting nothing.
    pub(crate) fn restore(&mut self, state: EquipmentState) {
        self.name = state.name;
        self.volume_measure = state.volume_measure;
        self.efficiency = state.efficiency;
        self.boil_off = state.boil_off;
        self.kettle_loss = state.kettle_loss;
        self.elevation = state.elevation;
        self.hop_formula = state.hop_formula;
    }

    pub fn snapshot(&self) -> EquipmentSnapshot {
        EquipmentSnapshot {
            name: self.name.clone(),
            volume_measure: self.volume_measure.clone(),
            efficiency: self.efficiency,
            boil_off: self.boil_off.format(),
            kettle_loss: self.kettle_loss.format(),
            elevation: self.elevation.format(),
            hop_formula: self.hop_formula,
        }
    }
}

/// Field values of an [`EquipmentProfile`] without its subscribers.
#[derive(Debug, Clone)]
pub(crate) struct EquipmentState {
    name: String,
    volume_measure: String,
    efficiency: f64,
    boil_off: Measurement,
    kettle_loss: Measurement,
    elevation: Measurement,
    hop_formula: HopFormula,
}

/// Field values of a [`MashProfile`] without its subscribers.
#[derive(Debug, Clone)]
pub(crate) struct MashState {
    name: String,
    grain_temperature: Measurement,
    sparge_temperature: Measurement,
    thickness: f64,
    steps: Vec<MashStep>,
}

/// Fields of a [`MashProfile`] that emit change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MashField {
    Name,
    GrainTemperature,
    SpargeTemperature,
    Thickness,
    Steps,
    /// The owning recipe's batch volume changed.
    BatchVolume,
    /// The owning recipe's fermentables changed.
    Fermentables,
}

/// One rest of a mash schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MashStep {
    pub name: String,
    pub temperature: Measurement,
    pub time: Measurement,
}

impl MashStep {
    /// Bare temperatures are Fahrenheit, bare times minutes.
    pub fn new(
        name: impl Into<String>,
        temperature: impl Into<Quantity>,
        time: impl Into<Quantity>,
    ) -> Result<Self, RecipeError> {
        Ok(Self {
            name: name.into(),
            temperature: Measurement::parse(temperature, DEFAULT_TEMPERATURE_UNIT)?,
            time: Measurement::parse(time, DEFAULT_TIME_UNIT)?,
        })
    }
}

/// Mash schedule and water parameters.
#[derive(Debug)]
pub struct MashProfile {
    name: String,
    grain_temperature: Measurement,
    sparge_temperature: Measurement,
    thickness: f64,
    steps: Vec<MashStep>,
    channel: ChangeChannel<MashField>,
}

/// Plain record of a [`MashProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MashSnapshot {
    pub name: String,
    pub grain_temperature: String,
    pub sparge_temperature: String,
    pub thickness: f64,
    pub steps: Vec<MashStep>,
}

impl MashProfile {
    /// A single-infusion profile: grain at 68 °F, sparge at 168 °F,
    /// 1.25 qt/lb, no steps.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grain_temperature: Measurement::known(68.0, DEFAULT_TEMPERATURE_UNIT),
            sparge_temperature: Measurement::known(168.0, DEFAULT_TEMPERATURE_UNIT),
            thickness: 1.25,
            steps: Vec::new(),
            channel: ChangeChannel::new(),
        }
    }

    pub fn from_snapshot(snapshot: MashSnapshot) -> Result<Self, RecipeError> {
        let mut profile = Self::new(snapshot.name);
        profile.set_grain_temperature(snapshot.grain_temperature)?;
        profile.set_sparge_temperature(snapshot.sparge_temperature)?;
        profile.set_thickness(snapshot.thickness)?;
        profile.set_steps(snapshot.steps);
        Ok(profile)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grain_temperature(&self) -> &Measurement {
        &self.grain_temperature
    }

    pub fn sparge_temperature(&self) -> &Measurement {
        &self.sparge_temperature
    }

    /// Water to grist ratio in quarts per pound.
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn steps(&self) -> &[MashStep] {
        &self.steps
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.notify(MashField::Name, None);
    }

    pub fn set_grain_temperature(&mut self, temperature: impl Into<Quantity>) -> Result<(), RecipeError> {
        self.grain_temperature = Measurement::parse(temperature, DEFAULT_TEMPERATURE_UNIT)?;
        self.notify(MashField::GrainTemperature, Some(self.grain_temperature.amount()));
        Ok(())
    }

    pub fn set_sparge_temperature(&mut self, temperature: impl Into<Quantity>) -> Result<(), RecipeError> {
        self.sparge_temperature = Measurement::parse(temperature, DEFAULT_TEMPERATURE_UNIT)?;
        self.notify(MashField::SpargeTemperature, Some(self.sparge_temperature.amount()));
        Ok(())
    }

    pub fn set_thickness(&mut self, thickness: f64) -> Result<(), RecipeError> {
        if !(thickness.is_finite() && thickness > 0.0) {
            return Err(RecipeError::InvalidValue {
                field: "mash thickness",
                message: format!("must be a positive ratio, got {thickness}"),
            });
        }
        self.thickness = thickness;
        self.notify(MashField::Thickness, Some(thickness));
        Ok(())
    }

    pub fn set_steps(&mut self, steps: Vec<MashStep>) {
        self.steps = steps;
        self.notify(MashField::Steps, Some(self.steps.len() as f64));
    }

    pub fn add_step(&mut self, step: MashStep) {
        self.steps.push(step);
        self.notify(MashField::Steps, Some(self.steps.len() as f64));
    }

    pub fn subscribe(
        &mut self,
        fields: impl IntoIterator<Item = MashField>,
        callback: impl FnMut(&ChangeEvent<MashField>) + Send + 'static,
    ) -> SubscriptionHandle {
        self.channel.subscribe(fields, callback)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.channel.unsubscribe(handle)
    }

    /// Emit a change event on this profile's channel.
    pub(crate) fn notify(&mut self, field: MashField, value: Option<f64>) {
        tracing::trace!(?field, ?value, profile = %self.name, "mash changed");
        self.channel.emit(ChangeEvent::new(field, value));
    }

    /// Buffer this profile's events until the owning recipe commits or
    /// rolls back an edit.
    pub(crate) fn hold_events(&mut self) {
        self.channel.hold();
    }

    pub(crate) fn release_events(&mut self) {
        self.channel.release();
    }

    pub(crate) fn discard_events(&mut self) {
        let dropped = self.channel.discard();
        tracing::trace!(dropped, profile = %self.name, "mash events discarded");
    }

    pub(crate) fn state(&self) -> MashState {
        MashState {
            name: self.name.clone(),
            grain_temperature: self.grain_temperature.clone(),
            sparge_temperature: self.sparge_temperature.clone(),
            thickness: self.thickness,
            steps: self.steps.clone(),
        }
    }

    pub(crate) fn restore(&mut self, state: MashState) {
        self.name = state.name;
        self.grain_temperature = state.grain_temperature;
        self.sparge_temperature = state.sparge_temperature;
        self.thickness = state.thickness;
        self.steps = state.steps;
    }

    pub fn snapshot(&self) -> MashSnapshot {
        MashSnapshot {
            name: self.name.clone(),
            grain_temperature: self.grain_temperature.format(),
            sparge_temperature: self.sparge_temperature.format(),
            thickness: self.thickness,
            steps: self.steps.clone(),
        }
    }
}
