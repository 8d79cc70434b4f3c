#![deny(warnings)]

//! Core domain models and invariants for the quiz-gated clicker.
//!
//! This crate defines the purchasable-entity catalog, the economic game
//! state, the external question-set format with its shape validation, and
//! the clock abstraction the other crates use instead of ambient time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use thiserror::Error;

/// Base maximum energy before capacity upgrades.
pub const BASE_MAX_ENERGY: f64 = 100.0;

/// Unique identifier for a catalog entry, e.g. "grandma", "doubleClick".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new(id: &str) -> Self {
        EntryId(id.to_string())
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an upgrade does once owned. Effects stack linearly with `count`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeEffect {
    /// Adds `amount` to the value of every manual click.
    ClickBonus { amount: f64 },
    /// Adds `boost` to the production multiplier of all buildings.
    ProductionBoost { boost: f64 },
    /// Reduces the per-click energy cost by `fraction` of the base cost.
    EnergyCostReduction { fraction: f64 },
    /// Raises maximum energy by `amount`.
    MaxEnergyBonus { amount: f64 },
    /// Passively regenerates `per_second` energy.
    EnergyRegen { per_second: f64 },
}

/// Immutable definition of an upgrade kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpgradeDef {
    /// Entry identifier, unique across the catalog.
    pub id: EntryId,
    /// Display name.
    pub name: String,
    /// Short description for the shop listing.
    pub description: String,
    /// Initial purchase price (> 0).
    pub base_cost: f64,
    /// Price multiplier applied on each purchase (>= 1).
    pub cost_growth: f64,
    /// Effect per owned unit.
    pub effect: UpgradeEffect,
}

/// Immutable definition of a building kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildingDef {
    /// Entry identifier, unique across the catalog.
    pub id: EntryId,
    /// Display name.
    pub name: String,
    /// Short description for the shop listing.
    pub description: String,
    /// Initial purchase price (> 0).
    pub base_cost: f64,
    /// Price multiplier applied on each purchase (>= 1).
    pub cost_growth: f64,
    /// Currency produced per second per owned unit, before multipliers.
    pub base_cps: f64,
}

/// Validation errors for catalog data.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    /// An id appears more than once.
    #[error("duplicate entry id: {0}")]
    DuplicateId(String),
    /// An id or name is blank.
    #[error("blank id or name in entry {0}")]
    BlankField(String),
    /// Base cost must be strictly positive.
    #[error("non-positive base cost for {0}")]
    NonPositiveCost(String),
    /// Cost growth below 1 would make prices shrink.
    #[error("cost growth below 1 for {0}")]
    ShrinkingCost(String),
    /// Building production rate must be non-negative and finite.
    #[error("invalid production rate for {0}")]
    InvalidRate(String),
}

/// The full set of purchasable kinds. Pure data: one engine serves any
/// balance variant loaded into this structure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    upgrades: Vec<UpgradeDef>,
    buildings: Vec<BuildingDef>,
}

impl Catalog {
    /// Build a catalog from explicit entries. Validates invariants.
    pub fn new(upgrades: Vec<UpgradeDef>, buildings: Vec<BuildingDef>) -> Result<Self, CatalogError> {
        let catalog = Catalog { upgrades, buildings };
        catalog.validate()?;
        Ok(catalog)
    }

    /// All upgrade kinds, in shop order.
    pub fn upgrades(&self) -> &[UpgradeDef] {
        &self.upgrades
    }

    /// All building kinds, in shop order.
    pub fn buildings(&self) -> &[BuildingDef] {
        &self.buildings
    }

    /// Look up an upgrade definition by id.
    pub fn upgrade(&self, id: &EntryId) -> Option<&UpgradeDef> {
        self.upgrades.iter().find(|u| &u.id == id)
    }

    /// Look up a building definition by id.
    pub fn building(&self, id: &EntryId) -> Option<&BuildingDef> {
        self.buildings.iter().find(|b| &b.id == id)
    }

    /// Check catalog invariants: unique non-blank ids, positive base costs,
    /// non-shrinking growth, finite non-negative production rates.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen: std::collections::BTreeSet<&EntryId> = std::collections::BTreeSet::new();
        let entries = self
            .upgrades
            .iter()
            .map(|u| (&u.id, &u.name, u.base_cost, u.cost_growth, 0.0))
            .chain(
                self.buildings
                    .iter()
                    .map(|b| (&b.id, &b.name, b.base_cost, b.cost_growth, b.base_cps)),
            );
        for (id, name, base_cost, cost_growth, rate) in entries {
            if id.0.trim().is_empty() || name.trim().is_empty() {
                return Err(CatalogError::BlankField(id.0.clone()));
            }
            if !seen.insert(id) {
                return Err(CatalogError::DuplicateId(id.0.clone()));
            }
            if !(base_cost.is_finite() && base_cost > 0.0) {
                return Err(CatalogError::NonPositiveCost(id.0.clone()));
            }
            if !(cost_growth.is_finite() && cost_growth >= 1.0) {
                return Err(CatalogError::ShrinkingCost(id.0.clone()));
            }
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(CatalogError::InvalidRate(id.0.clone()));
            }
        }
        Ok(())
    }

    /// The built-in balance set.
    pub fn standard() -> Self {
        fn upgrade(
            id: &str,
            name: &str,
            description: &str,
            base_cost: f64,
            effect: UpgradeEffect,
        ) -> UpgradeDef {
            UpgradeDef {
                id: EntryId::new(id),
                name: name.to_string(),
                description: description.to_string(),
                base_cost,
                cost_growth: 1.5,
                effect,
            }
        }
        fn building(id: &str, name: &str, description: &str, base_cost: f64, base_cps: f64) -> BuildingDef {
            BuildingDef {
                id: EntryId::new(id),
                name: name.to_string(),
                description: description.to_string(),
                base_cost,
                cost_growth: 1.15,
                base_cps,
            }
        }

        Catalog {
            upgrades: vec![
                upgrade("doubleClick", "Double Click", "Increase click value by 1", 15.0, UpgradeEffect::ClickBonus { amount: 1.0 }),
                upgrade("megaClick", "Mega Click", "Increase click value by 2", 100.0, UpgradeEffect::ClickBonus { amount: 2.0 }),
                upgrade("goldFingers", "Golden Fingers", "Increase click value by 5", 500.0, UpgradeEffect::ClickBonus { amount: 5.0 }),
                upgrade("sugarRush", "Sugar Rush", "Increase click value by 10", 2000.0, UpgradeEffect::ClickBonus { amount: 10.0 }),
                upgrade("doubleProduction", "Double Production", "Buildings produce 100% more", 5000.0, UpgradeEffect::ProductionBoost { boost: 1.0 }),
                upgrade("cookieAlchemy", "Cookie Alchemy", "Increase click value by 50", 10000.0, UpgradeEffect::ClickBonus { amount: 50.0 }),
                upgrade("energyEfficiency", "Energy Efficiency", "Reduce energy cost per click by 10%", 75.0, UpgradeEffect::EnergyCostReduction { fraction: 0.1 }),
                upgrade("energyCapacity", "Energy Capacity", "Increase max energy by 20", 200.0, UpgradeEffect::MaxEnergyBonus { amount: 20.0 }),
                upgrade("energyRegen", "Energy Regeneration", "Regenerate 0.2 energy per second", 1000.0, UpgradeEffect::EnergyRegen { per_second: 0.2 }),
            ],
            buildings: vec![
                building("grandma", "Grandma", "A nice grandma to bake cookies", 50.0, 0.2),
                building("mine", "Cookie Mine", "Dig deep for cookie dough", 200.0, 1.0),
                building("farm", "Cookie Farm", "Grow cookie trees", 750.0, 4.0),
                building("factory", "Cookie Factory", "Mass produce cookies", 2500.0, 15.0),
                building("lab", "Cookie Lab", "Research better cookie production", 7500.0, 40.0),
                building("temple", "Cookie Temple", "Pray to the cookie gods", 15000.0, 100.0),
                building("wizard", "Cookie Wizard", "Magic cookie spells", 50000.0, 300.0),
                building("shipment", "Cookie Shipment", "Import cookies from the cookie planet", 150000.0, 1000.0),
                building("alchemy", "Cookie Alchemy Lab", "Transform matter into cookies", 500000.0, 3000.0),
                building("portal", "Cookie Portal", "Connect to the cookieverse", 1500000.0, 10000.0),
            ],
        }
    }
}

/// Mutable per-kind ownership record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Owned {
    /// Units owned.
    pub count: u64,
    /// Price of the next unit. Non-decreasing across purchases.
    pub current_cost: f64,
}

/// The economic aggregate root. Mutated only through the economy engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    /// Primary currency. Never negative; fractional accrual permitted.
    pub currency: f64,
    /// Secondary resource gating manual clicks, in `[0, max energy]`.
    pub energy: f64,
    /// Ownership records per upgrade kind.
    pub upgrades: BTreeMap<EntryId, Owned>,
    /// Ownership records per building kind.
    pub buildings: BTreeMap<EntryId, Owned>,
}

impl GameState {
    /// Fresh state for a catalog: nothing owned, prices at base cost,
    /// currency 0, energy full.
    pub fn new(catalog: &Catalog) -> Self {
        let seed = |base_cost: f64| Owned {
            count: 0,
            current_cost: base_cost,
        };
        GameState {
            currency: 0.0,
            energy: BASE_MAX_ENERGY,
            upgrades: catalog
                .upgrades()
                .iter()
                .map(|u| (u.id.clone(), seed(u.base_cost)))
                .collect(),
            buildings: catalog
                .buildings()
                .iter()
                .map(|b| (b.id.clone(), seed(b.base_cost)))
                .collect(),
        }
    }

    /// Owned count for an upgrade id, 0 when unknown.
    pub fn upgrade_count(&self, id: &EntryId) -> u64 {
        self.upgrades.get(id).map_or(0, |o| o.count)
    }

    /// Owned count for a building id, 0 when unknown.
    pub fn building_count(&self, id: &EntryId) -> u64 {
        self.buildings.get(id).map_or(0, |o| o.count)
    }
}

/// A single quiz question as exchanged with the outside world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Prompt text shown to the player.
    pub question: String,
    /// The answer counted as correct. Compared verbatim.
    pub correct_answer: String,
    /// Answer choices, one of which should equal `correct_answer`.
    pub options: Vec<String>,
}

/// Errors raised when accepting an external question set.
#[derive(Debug, Error, PartialEq)]
pub enum QuestionSetError {
    /// The payload is not valid JSON.
    #[error("invalid question file: {0}")]
    Parse(String),
    /// The payload has no `questions` array.
    #[error("invalid file format: missing questions array")]
    MissingQuestions,
    /// An item is missing a required field. Reports the first offender.
    #[error("invalid question format at index {index}")]
    InvalidQuestion { index: usize },
    /// Authoring rejected a question with a blank field.
    #[error("question fields must not be blank")]
    BlankField,
    /// Authoring or deletion referenced an index out of range.
    #[error("no question at index {0}")]
    IndexOutOfRange(usize),
}

// Lenient mirror of the external format so shape errors can name the
// offending item instead of failing inside the deserializer.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestionSet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    questions: Option<Vec<RawQuestion>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    question: String,
    #[serde(default)]
    correct_answer: String,
    options: Option<Vec<String>>,
}

/// An operator-authored question set, loadable from JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
    /// Set title, shown as the quiz heading.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// The questions themselves.
    pub questions: Vec<Question>,
}

impl QuestionSet {
    /// Parse and shape-check a question set.
    ///
    /// Each item must carry a non-empty `question`, a non-empty
    /// `correctAnswer`, and an `options` array; the first item failing the
    /// check is reported by index. No semantic validation beyond the shape
    /// check is performed.
    pub fn from_json(text: &str) -> Result<Self, QuestionSetError> {
        let raw: RawQuestionSet =
            serde_json::from_str(text).map_err(|e| QuestionSetError::Parse(e.to_string()))?;
        let raw_questions = raw.questions.ok_or(QuestionSetError::MissingQuestions)?;
        let mut questions = Vec::with_capacity(raw_questions.len());
        for (index, q) in raw_questions.into_iter().enumerate() {
            let options = match q.options {
                Some(options) if !q.question.is_empty() && !q.correct_answer.is_empty() => options,
                _ => return Err(QuestionSetError::InvalidQuestion { index }),
            };
            questions.push(Question {
                question: q.question,
                correct_answer: q.correct_answer,
                options,
            });
        }
        tracing::debug!(count = questions.len(), title = %raw.title, "question set accepted");
        Ok(QuestionSet {
            title: raw.title,
            description: raw.description,
            questions,
        })
    }

    /// Serialize in the external format.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Append an authored question. All fields must be non-blank and at
    /// least one option present.
    pub fn add_question(&mut self, question: Question) -> Result<(), QuestionSetError> {
        let blank = question.question.trim().is_empty()
            || question.correct_answer.trim().is_empty()
            || question.options.is_empty()
            || question.options.iter().any(|o| o.trim().is_empty());
        if blank {
            return Err(QuestionSetError::BlankField);
        }
        self.questions.push(question);
        Ok(())
    }

    /// Remove the question at `index`.
    pub fn remove_question(&mut self, index: usize) -> Result<Question, QuestionSetError> {
        if index >= self.questions.len() {
            return Err(QuestionSetError::IndexOutOfRange(index));
        }
        Ok(self.questions.remove(index))
    }

    /// Append all questions from another set.
    pub fn merge(&mut self, other: QuestionSet) {
        self.questions.extend(other.questions);
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }
}

/// Time source abstraction so simulation code never reads ambient time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and headless drivers. Clones share the
/// underlying instant, so a test can keep a handle while the component
/// under test owns another.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn standard_catalog_validates() {
        Catalog::standard().validate().unwrap();
    }

    #[test]
    fn standard_catalog_balance() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.upgrades().len(), 9);
        assert_eq!(catalog.buildings().len(), 10);
        let grandma = catalog.building(&EntryId::new("grandma")).unwrap();
        assert_eq!(grandma.base_cost, 50.0);
        assert_eq!(grandma.base_cps, 0.2);
        assert_eq!(grandma.cost_growth, 1.15);
        let double_click = catalog.upgrade(&EntryId::new("doubleClick")).unwrap();
        assert_eq!(double_click.base_cost, 15.0);
        assert_eq!(double_click.cost_growth, 1.5);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut catalog = Catalog::standard();
        let dup = catalog.upgrades[0].clone();
        catalog.upgrades.push(dup);
        assert_eq!(
            catalog.validate(),
            Err(CatalogError::DuplicateId("doubleClick".to_string()))
        );
    }

    #[test]
    fn shrinking_growth_rejected() {
        let mut catalog = Catalog::standard();
        catalog.buildings[0].cost_growth = 0.9;
        assert_eq!(
            catalog.validate(),
            Err(CatalogError::ShrinkingCost("grandma".to_string()))
        );
    }

    #[test]
    fn fresh_state_matches_catalog() {
        let catalog = Catalog::standard();
        let state = GameState::new(&catalog);
        assert_eq!(state.currency, 0.0);
        assert_eq!(state.energy, BASE_MAX_ENERGY);
        assert_eq!(state.upgrades.len(), catalog.upgrades().len());
        assert_eq!(state.buildings.len(), catalog.buildings().len());
        let grandma = &state.buildings[&EntryId::new("grandma")];
        assert_eq!(grandma.count, 0);
        assert_eq!(grandma.current_cost, 50.0);
    }

    #[test]
    fn catalog_serde_roundtrip() {
        let catalog = Catalog::standard();
        let text = serde_json::to_string(&catalog).unwrap();
        let back: Catalog = serde_json::from_str(&text).unwrap();
        back.validate().unwrap();
        assert_eq!(back.buildings().len(), catalog.buildings().len());
    }

    #[test]
    fn question_set_accepts_reference_format() {
        let text = r#"{
            "title": "Number Systems",
            "description": "Binary and friends",
            "questions": [
                {"question": "What is 0b10 in decimal?", "correctAnswer": "2",
                 "options": ["1", "2", "3", "4"]}
            ]
        }"#;
        let set = QuestionSet::from_json(text).unwrap();
        assert_eq!(set.title, "Number Systems");
        assert_eq!(set.len(), 1);
        assert_eq!(set.questions[0].correct_answer, "2");
    }

    #[test]
    fn question_set_reports_first_offending_index() {
        let text = r#"{"questions": [{"question": "x"}]}"#;
        assert_eq!(
            QuestionSet::from_json(text),
            Err(QuestionSetError::InvalidQuestion { index: 0 })
        );

        let text = r#"{"questions": [
            {"question": "ok", "correctAnswer": "1", "options": ["1", "2"]},
            {"question": "bad", "correctAnswer": ""}
        ]}"#;
        assert_eq!(
            QuestionSet::from_json(text),
            Err(QuestionSetError::InvalidQuestion { index: 1 })
        );
    }

    #[test]
    fn question_set_requires_questions_array() {
        assert_eq!(
            QuestionSet::from_json(r#"{"title": "t"}"#),
            Err(QuestionSetError::MissingQuestions)
        );
        assert!(matches!(
            QuestionSet::from_json("not json"),
            Err(QuestionSetError::Parse(_))
        ));
    }

    #[test]
    fn question_set_no_semantic_validation() {
        // correctAnswer absent from options is accepted; only shape counts.
        let text = r#"{"questions": [
            {"question": "q", "correctAnswer": "42", "options": ["1", "2"]}
        ]}"#;
        assert!(QuestionSet::from_json(text).is_ok());
    }

    #[test]
    fn authoring_rejects_blank_fields() {
        let mut set = QuestionSet::default();
        let bad = Question {
            question: "q".to_string(),
            correct_answer: "a".to_string(),
            options: vec!["a".to_string(), " ".to_string()],
        };
        assert_eq!(set.add_question(bad), Err(QuestionSetError::BlankField));
        assert!(set.is_empty());

        let good = Question {
            question: "q".to_string(),
            correct_answer: "a".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
        };
        set.add_question(good).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn authoring_remove_and_merge() {
        let mut set = QuestionSet::from_json(
            r#"{"questions": [
                {"question": "a", "correctAnswer": "1", "options": ["1"]},
                {"question": "b", "correctAnswer": "2", "options": ["2"]}
            ]}"#,
        )
        .unwrap();
        let removed = set.remove_question(0).unwrap();
        assert_eq!(removed.question, "a");
        assert_eq!(
            set.remove_question(5),
            Err(QuestionSetError::IndexOutOfRange(5))
        );

        let other = set.clone();
        set.merge(other);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn question_set_json_roundtrip_uses_camel_case() {
        let mut set = QuestionSet::default();
        set.add_question(Question {
            question: "q".to_string(),
            correct_answer: "a".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
        })
        .unwrap();
        let text = set.to_json();
        assert!(text.contains("correctAnswer"));
        let back = QuestionSet::from_json(&text).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::starting_at(start);
        clock.advance(Duration::milliseconds(2500));
        assert_eq!(clock.now() - start, Duration::milliseconds(2500));
    }

    proptest! {
        #[test]
        fn any_valid_entry_costs_accepted(base_cost in 0.01f64..1e9, growth in 1.0f64..3.0) {
            let upgrades = vec![UpgradeDef {
                id: EntryId::new("u"),
                name: "U".to_string(),
                description: String::new(),
                base_cost,
                cost_growth: growth,
                effect: UpgradeEffect::ClickBonus { amount: 1.0 },
            }];
            prop_assert!(Catalog::new(upgrades, vec![]).is_ok());
        }

        #[test]
        fn fresh_state_prices_equal_base_costs(seed_cost in 0.01f64..1e6) {
            let buildings = vec![BuildingDef {
                id: EntryId::new("b"),
                name: "B".to_string(),
                description: String::new(),
                base_cost: seed_cost,
                cost_growth: 1.15,
                base_cps: 1.0,
            }];
            let catalog = Catalog::new(vec![], buildings).unwrap();
            let state = GameState::new(&catalog);
            prop_assert_eq!(state.buildings[&EntryId::new("b")].current_cost, seed_cost);
        }
    }
}
