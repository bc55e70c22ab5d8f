//! End-to-end recipe scenarios.

use grain::{
    ChangeRecorder, EquipmentProfile, Fermentable, Hop, HopFormula, MashProfile, MashStep, Recipe, RecipeConfig,
    RecipeField, RecipeType, Yeast,
};

fn single_malt_pale_ale() -> Recipe {
    let malt = Fermentable::new("Pale Malt", 37.0, "10 SRM", "grain").unwrap();
    let hop = Hop::new("Northern Brewer", "Woody", 5.0, "bittering").unwrap();
    let mut equipment = EquipmentProfile::new("Kettle");
    equipment.set_efficiency(75.0).unwrap();

    Recipe::builder("Single Malt", "all grain")
        .target_batch_volume("5 gal")
        .equipment(equipment)
        .yeast(Yeast::new("US-05", "Fermentis", "dry", 0.75).unwrap())
        .fermentable(malt.create("10 lb").unwrap())
        .hop(hop.create("1 oz", None, "60 min", "pellet").unwrap())
        .build()
        .unwrap()
}

// =============================================================================
// All-grain pale ale
// =============================================================================

#[test]
fn test_all_grain_metrics() {
    let recipe = single_malt_pale_ale();

    assert_eq!(recipe.kind(), RecipeType::AllGrain);
    assert!(recipe.mash_profile().is_some());
    assert!((recipe.og() - 1.0555).abs() < 1e-9);
    assert!((recipe.fg() - 1.013_875).abs() < 1e-9);
    assert!((recipe.abv() - 0.041_625 * 131.25).abs() < 1e-9);
    assert_eq!(recipe.srm(), 10.0);
    assert!(recipe.ibu() > 15.0 && recipe.ibu() < 18.0, "ibu = {}", recipe.ibu());
    let ratio = recipe.ratio().unwrap();
    assert!((ratio - recipe.ibu() / 55.5).abs() < 1e-9);
    assert_eq!(recipe.target_boil_gallons(), 5.0);
    for value in [recipe.og(), recipe.fg(), recipe.ibu(), recipe.abv(), recipe.srm()] {
        assert!(value.is_finite());
    }
}

#[test]
fn test_raising_malt_weight() {
    let mut recipe = single_malt_pale_ale();
    let hops_mass = recipe.hops_mass();
    let ibu = recipe.ibu();
    let recorder = ChangeRecorder::new();
    recipe.subscribe([], recorder.listener());

    recipe.update_fermentable(0, |f| f.set_weight("12 lb")).unwrap();

    assert_eq!(
        recorder.fields(),
        vec![
            RecipeField::Fermentables,
            RecipeField::Og,
            RecipeField::Fg,
            RecipeField::Ibu,
            RecipeField::Abv,
            RecipeField::Srm,
            RecipeField::Ratio,
            RecipeField::FermentablesMass,
        ]
    );
    assert!((recipe.og() - 1.0666).abs() < 1e-9);
    assert_eq!(recipe.fermentables_mass(), 12.0);
    assert_eq!(recipe.hops_mass(), hops_mass);
    // higher gravity extracts less bitterness
    assert!(recipe.ibu() < ibu);
}

// =============================================================================
// Equipment
// =============================================================================

#[test]
fn test_boil_volume_follows_equipment() {
    let mut recipe = single_malt_pale_ale();
    let recorder = ChangeRecorder::new();
    recipe.subscribe([RecipeField::Equipment, RecipeField::TargetBoilVolume], recorder.listener());

    recipe
        .update_equipment(|equipment| {
            equipment.set_boil_off("1.5 gal")?;
            equipment.set_kettle_loss("2 qt")
        })
        .unwrap();

    assert!((recipe.target_boil_gallons() - 7.0).abs() < 1e-9);
    assert_eq!(
        recorder.fields(),
        vec![RecipeField::Equipment, RecipeField::TargetBoilVolume]
    );
}

#[test]
fn test_efficiency_changes_gravity() {
    let mut recipe = single_malt_pale_ale();
    recipe.update_equipment(|e| e.set_efficiency(60.0)).unwrap();
    assert!((recipe.og() - 1.0444).abs() < 1e-9);
}

#[test]
fn test_hop_formulas() {
    let mut recipe = single_malt_pale_ale();
    let tinseth = recipe.ibu();

    recipe.update_equipment(|e| {
        e.set_hop_formula(HopFormula::Rager);
        Ok(())
    })
    .unwrap();
    let rager = recipe.ibu();
    assert!(rager > tinseth);

    recipe
        .update_equipment(|e| {
            e.set_hop_formula(HopFormula::Garetz);
            e.set_boil_off("1 gal")
        })
        .unwrap();
    let sea_level = recipe.ibu();
    assert!(sea_level > 0.0 && sea_level.is_finite());

    recipe.update_equipment(|e| e.set_elevation("1600 m")).unwrap();
    assert!(recipe.ibu() < sea_level);
}

#[test]
fn test_default_hop_formula_from_config() {
    let hop = Hop::new("Magnum", "", 12.0, "bittering").unwrap();
    let malt = Fermentable::new("Pale Malt", 37.0, 3, "grain").unwrap();
    let recipe = Recipe::builder("Bitter", "extract")
        .config(RecipeConfig::default().with_default_hop_formula(HopFormula::Rager))
        .fermentable(malt.create(8).unwrap())
        .hop(hop.create(1, None, 60, "pellet").unwrap())
        .build()
        .unwrap();
    assert_eq!(recipe.equipment().hop_formula(), HopFormula::Rager);
}

#[test]
fn test_volumes_in_liters() {
    let mut equipment = EquipmentProfile::new("Metric kettle");
    equipment.set_volume_measure("l").unwrap();
    equipment.set_boil_off("4 l").unwrap();
    let recipe = Recipe::builder("Metric", "extract")
        .target_batch_volume("20 l")
        .equipment(equipment)
        .build()
        .unwrap();

    let batch = recipe.target_batch_volume().unwrap();
    assert_eq!(batch.unit(), "l");
    assert_eq!(batch.amount(), 20.0);
    assert_eq!(recipe.target_boil_volume().unwrap().format(), "24 l");
    assert!((recipe.target_batch_gallons() - 5.283_441).abs() < 1e-6);
}

#[test]
fn test_unknown_display_unit_is_a_conversion_error() {
    let mut recipe = single_malt_pale_ale();
    recipe.update_equipment(|e| e.set_volume_measure("firkin")).unwrap();
    assert!(recipe.target_batch_volume().is_err());
    assert_eq!(recipe.target_batch_gallons(), 5.0);
}

// =============================================================================
// Mash
// =============================================================================

#[test]
fn test_mash_profile_lifecycle() {
    let mut recipe = single_malt_pale_ale();
    let mut mash = MashProfile::new("Step mash");
    mash.add_step(MashStep::new("Protein rest", 122, 20).unwrap());
    recipe.set_mash_profile(mash).unwrap();

    let recorder = ChangeRecorder::new();
    recipe.subscribe([RecipeField::Mash, RecipeField::TargetBoilVolume], recorder.listener());
    recipe
        .update_mash(|m| {
            m.add_step(MashStep::new("Saccharification", "66 C", "45 min")?);
            Ok(())
        })
        .unwrap();
    assert_eq!(recipe.mash_profile().unwrap().steps().len(), 2);
    assert_eq!(
        recorder.fields(),
        vec![RecipeField::Mash, RecipeField::TargetBoilVolume]
    );

    recipe.on_mash_changed().unwrap();
    recipe.on_equipment_changed().unwrap();

    recipe.set_type("extract").unwrap();
    assert!(recipe.mash_profile().is_none());
    recipe.set_type(0usize).unwrap();
    assert_eq!(recipe.mash_profile().unwrap().name(), "Step mash");
}
