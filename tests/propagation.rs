//! Tests for staged propagation: ordering, isolation, idempotence and rollback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use grain::{
    ChangeEvent, ChangeRecorder, Fermentable, FormulaError, Formulas, Hop, HopAddition, Ingredient, InputCategory,
    LogTracer, Metric, Recipe, RecipeError, RecipeField, SpanId, StandardFormulas, Tracer, Yeast,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

fn two_row() -> Fermentable {
    Fermentable::new("2-Row", 36.0, 2, "grain").unwrap()
}

fn munich() -> Fermentable {
    Fermentable::new("Munich", 40.0, 9, "grain").unwrap()
}

fn cascade() -> Hop {
    Hop::new("Cascade", "Citrus", 5.5, "both").unwrap()
}

fn base_recipe() -> Recipe {
    Recipe::builder("Amber", "all grain")
        .target_batch_volume(5)
        .yeast(Yeast::new("US-05", "Fermentis", "dry", 0.75).unwrap())
        .build()
        .unwrap()
}

fn value_of(events: &[ChangeEvent<RecipeField>], field: RecipeField) -> f64 {
    events
        .iter()
        .find(|e| e.field == field)
        .and_then(|e| e.value)
        .unwrap_or_else(|| panic!("no value for {field:?}"))
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_fg_and_abv_read_fresh_og() {
    init_tracing();
    let mut recipe = base_recipe();
    let recorder = ChangeRecorder::new();
    recipe.subscribe([], recorder.listener());

    recipe
        .set_fermentables(vec![two_row().create(5).unwrap(), munich().create(3).unwrap()])
        .unwrap();

    let events = recorder.events();
    let og = value_of(&events, RecipeField::Og);
    let fg = value_of(&events, RecipeField::Fg);
    let abv = value_of(&events, RecipeField::Abv);

    assert!((og - 1.045).abs() < 1e-12);
    assert!((fg - (1.0 + (og - 1.0) * 0.25)).abs() < 1e-12);
    assert!((abv - (og - fg) * 131.25).abs() < 1e-12);
    assert_eq!(recipe.og(), og);
    assert_eq!(recipe.fg(), fg);
}

#[test]
fn test_fermentables_event_order() {
    let mut recipe = base_recipe();
    let recorder = ChangeRecorder::new();
    recipe.subscribe([], recorder.listener());

    recipe.add_fermentable(two_row().create("5 lb").unwrap()).unwrap();

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
}

#[test]
fn test_every_dependency_precedes_its_dependents_in_events() {
    let mut recipe = base_recipe();
    recipe.add_fermentable(two_row().create(10).unwrap()).unwrap();
    let recorder = ChangeRecorder::new();
    recipe.subscribe([], recorder.listener());

    recipe.set_target_batch_volume("6 gal").unwrap();

    let fields = recorder.fields();
    let graph = recipe.graph();
    for metric in graph.plan(InputCategory::TargetBatchVolume) {
        let at = fields.iter().position(|f| *f == RecipeField::from(*metric)).unwrap();
        for dependency in graph.dependencies(*metric) {
            if let Some(dep_at) = fields.iter().position(|f| *f == RecipeField::from(*dependency)) {
                assert!(dep_at < at, "{dependency} emitted after {metric}");
            }
        }
    }
    assert_eq!(fields[0], RecipeField::TargetBatchVolume);
}

// =============================================================================
// Isolation
// =============================================================================

#[test]
fn test_hop_change_leaves_grain_metrics_alone() {
    let mut recipe = base_recipe();
    recipe.add_fermentable(two_row().create(8).unwrap()).unwrap();
    let srm = recipe.srm();
    let mass = recipe.fermentables_mass();

    let recorder = ChangeRecorder::new();
    recipe.subscribe([], recorder.listener());
    recipe.add_hop(cascade().create(1, None, 60, "pellet").unwrap()).unwrap();

    assert_eq!(recipe.srm(), srm);
    assert_eq!(recipe.fermentables_mass(), mass);
    assert_eq!(
        recorder.fields(),
        vec![RecipeField::Hops, RecipeField::Ibu, RecipeField::Ratio, RecipeField::HopsMass]
    );
}

#[test]
fn test_field_filtered_subscription() {
    let mut recipe = base_recipe();
    let srm = ChangeRecorder::new();
    let handle = recipe.subscribe([RecipeField::Srm], srm.listener());

    recipe.add_hop(cascade().create(1, None, 60, "pellet").unwrap()).unwrap();
    assert!(srm.is_empty());

    recipe.add_fermentable(munich().create(1).unwrap()).unwrap();
    assert_eq!(srm.events(), vec![ChangeEvent::new(RecipeField::Srm, Some(9.0))]);

    assert!(recipe.unsubscribe(handle));
    recipe.add_fermentable(munich().create(1).unwrap()).unwrap();
    assert_eq!(srm.len(), 1);
}

#[test]
fn test_yeast_change_recomputes_fg_and_abv_only() {
    let mut recipe = base_recipe();
    recipe.add_fermentable(two_row().create(10).unwrap()).unwrap();
    let recorder = ChangeRecorder::new();
    recipe.subscribe([], recorder.listener());

    recipe
        .set_yeast(Some(Yeast::new("WLP001", "White Labs", "liquid", 0.8).unwrap()))
        .unwrap();
    assert_eq!(
        recorder.fields(),
        vec![RecipeField::Yeast, RecipeField::Fg, RecipeField::Abv]
    );

    recipe.set_yeast(None).unwrap();
    assert!((recipe.fg() - recipe.og()).abs() < 1e-12);
    assert!(recipe.abv().abs() < 1e-9);
}

// =============================================================================
// Idempotence
// =============================================================================

#[test]
fn test_recompute_all_is_idempotent() {
    let mut recipe = base_recipe();
    recipe.add_fermentable(two_row().create(9).unwrap()).unwrap();
    recipe.add_hop(cascade().create(1.5, None, 45, "leaf").unwrap()).unwrap();

    let first = *recipe.metrics();
    recipe.recompute_all().unwrap();
    let second = *recipe.metrics();
    recipe.recompute_all().unwrap();

    assert_eq!(first, second);
    assert_eq!(second, *recipe.metrics());
}

#[test]
fn test_mixed_unit_masses() {
    let mut recipe = base_recipe();
    recipe.add_fermentable(two_row().create("1 lb").unwrap()).unwrap();
    recipe.add_fermentable(munich().create("16 oz").unwrap()).unwrap();
    assert!((recipe.fermentables_mass() - 2.0).abs() < 1e-12);

    recipe.add_hop(cascade().create("28.349523125 g", None, 60, "pellet").unwrap()).unwrap();
    recipe.add_hop(cascade().create(1, None, 5, "pellet").unwrap()).unwrap();
    assert!((recipe.hops_mass() - 2.0).abs() < 1e-9);
}

// =============================================================================
// Rollback
// =============================================================================

/// Standard formulas that refuse strong beers.
struct SessionOnly;

impl Formulas for SessionOnly {
    fn og(&self, contributions: &[f64], efficiency: f64, volume_gal: f64) -> Result<f64, FormulaError> {
        StandardFormulas.og(contributions, efficiency, volume_gal)
    }

    fn fg(&self, og: f64, attenuation: f64) -> Result<f64, FormulaError> {
        StandardFormulas.fg(og, attenuation)
    }

    fn abv(&self, og: f64, fg: f64) -> Result<f64, FormulaError> {
        let abv = StandardFormulas.abv(og, fg)?;
        if abv > 5.0 {
            return Err(anyhow::anyhow!("{abv:.1}% is not a session beer").into());
        }
        Ok(abv)
    }

    fn tinseth(&self, hop: &HopAddition) -> Result<f64, FormulaError> {
        StandardFormulas.tinseth(hop)
    }

    fn rager(&self, hop: &HopAddition) -> Result<f64, FormulaError> {
        StandardFormulas.rager(hop)
    }

    fn garetz(
        &self,
        hop: &HopAddition,
        boil_gal: f64,
        ibu_estimate: f64,
        elevation_ft: f64,
    ) -> Result<f64, FormulaError> {
        StandardFormulas.garetz(hop, boil_gal, ibu_estimate, elevation_ft)
    }
}

#[derive(Default)]
struct RollbackCounter {
    rollbacks: AtomicUsize,
    commits: AtomicUsize,
}

impl Tracer for RollbackCounter {
    fn new_span_id(&self) -> SpanId {
        SpanId(0)
    }

    fn on_propagation_end(&self, _span: SpanId, _category: Option<InputCategory>) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    fn on_rollback(&self, _span: SpanId, category: Option<InputCategory>, _error: &RecipeError) {
        assert_eq!(category, Some(InputCategory::Fermentables));
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_failed_formula_rolls_back_input() {
    let tracer = Arc::new(RollbackCounter::default());
    let mut recipe = Recipe::builder("Session", "extract")
        .yeast(Yeast::new("US-05", "Fermentis", "dry", 0.75).unwrap())
        .fermentable(two_row().create(4).unwrap())
        .formulas(SessionOnly)
        .tracer(tracer.clone())
        .build()
        .unwrap();
    let before = *recipe.metrics();
    let recorder = ChangeRecorder::new();
    recipe.subscribe([], recorder.listener());

    let err = recipe.add_fermentable(two_row().create(10).unwrap()).unwrap_err();

    match &err {
        RecipeError::Formula {
            metric,
            source: FormulaError::External(_),
        } => assert_eq!(*metric, Metric::Abv),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("not a session beer"));
    assert_eq!(recipe.fermentables().len(), 1);
    assert_eq!(*recipe.metrics(), before);
    assert!(recorder.is_empty());
    assert_eq!(tracer.rollbacks.load(Ordering::Relaxed), 1);
    assert_eq!(tracer.commits.load(Ordering::Relaxed), 1);
}

#[test]
fn test_rejected_build_and_yeast_change() {
    let too_strong = Recipe::builder("Session", "extract")
        .yeast(Yeast::new("US-05", "Fermentis", "dry", 0.75).unwrap())
        .fermentable(two_row().create(4).unwrap())
        .fermentable(munich().create(10).unwrap())
        .formulas(SessionOnly)
        .build();
    assert!(matches!(too_strong, Err(RecipeError::Formula { metric: Metric::Abv, .. })));

    let mut recipe = Recipe::builder("Session", "extract")
        .yeast(Yeast::new("S-33", "Fermentis", "dry", 0.5).unwrap())
        .fermentable(two_row().create(4).unwrap())
        .fermentable(munich().create(4).unwrap())
        .formulas(SessionOnly)
        .build()
        .unwrap();

    let hungry = Yeast::new("Saison", "Wyeast", "liquid", 0.9).unwrap();
    assert!(recipe.set_yeast(Some(hungry)).is_err());
    assert_eq!(recipe.yeast().unwrap().name(), "S-33");

    recipe.remove_fermentable(0).unwrap();
    assert_eq!(recipe.fermentables()[0].fermentable().gu(), 40.0);
}

#[test]
fn test_log_tracer_propagation() {
    init_tracing();
    let mut recipe = Recipe::builder("Logged", "extract")
        .tracer(LogTracer::new())
        .build()
        .unwrap();
    recipe.add_hop(cascade().create(1, None, 60, "pellet").unwrap()).unwrap();
    assert_eq!(recipe.hops_mass(), 1.0);
}
