#![deny(warnings)]

//! Session orchestration: wires the economy engine, quiz controller, and
//! persisted profile behind a single facade, with all timing routed
//! through an injected [`Clock`].
//!
//! The session owns the offline-reconciliation handshake: `suspend`
//! records the moment play stopped, and the next `start` or `resume`
//! credits production for the gap, consuming the stored timestamp so the
//! same gap is never credited twice.

use clicker_core::{Catalog, Clock, EntryId, GameState};
use clicker_econ::{ClickOutcome, EconomyEngine, EntryKind, PurchaseOutcome};
use clicker_quiz::{AnswerOutcome, QuestionSource, QuizController, QuizPhase, StartOutcome};
use persistence::{KeyValueStore, Profile, StoreError};
use tracing::info;

/// Offline earnings credited when a session opens after time away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WelcomeBack {
    /// Currency credited for the gap.
    pub earned: u64,
    /// Whole seconds spent away.
    pub away_seconds: i64,
}

/// A running game session over a storage backend `S` and clock `C`.
pub struct Session<S: KeyValueStore, C: Clock> {
    engine: EconomyEngine,
    quiz: QuizController,
    profile: Profile<S>,
    clock: C,
}

impl<S: KeyValueStore, C: Clock> Session<S, C> {
    /// Open a session on a fresh game state.
    pub fn start(
        catalog: Catalog,
        store: S,
        clock: C,
        seed: u64,
    ) -> Result<(Self, Option<WelcomeBack>), StoreError> {
        let state = GameState::new(&catalog);
        Self::start_with_state(catalog, state, store, clock, seed)
    }

    /// Open a session on an existing game state, e.g. one carried over
    /// from a previous run. Loads the persisted question set and settles
    /// any recorded offline gap against the state's production rate.
    pub fn start_with_state(
        catalog: Catalog,
        state: GameState,
        store: S,
        clock: C,
        seed: u64,
    ) -> Result<(Self, Option<WelcomeBack>), StoreError> {
        let profile = Profile::new(store);
        let engine = EconomyEngine::from_state(catalog, state);
        let mut source = QuestionSource::from_seed(seed);
        if let Some(set) = profile.custom_questions()? {
            source.install(set);
        }
        let mut session = Session {
            engine,
            quiz: QuizController::new(source),
            profile,
            clock,
        };
        let welcome = session.settle_offline()?;
        Ok((session, welcome))
    }

    /// Record the current moment as the last point of activity. Called
    /// when play stops (the reference trigger is the tab going hidden).
    pub fn suspend(&mut self) -> Result<(), StoreError> {
        let now = self.clock.now();
        info!(timestamp = now.timestamp_millis(), "session suspended");
        self.profile.set_last_timestamp(now)
    }

    /// Settle the gap since the last `suspend`, if one was recorded.
    /// The stored timestamp is consumed either way.
    pub fn resume(&mut self) -> Result<Option<WelcomeBack>, StoreError> {
        self.settle_offline()
    }

    fn settle_offline(&mut self) -> Result<Option<WelcomeBack>, StoreError> {
        let Some(last_seen) = self.profile.last_timestamp()? else {
            return Ok(None);
        };
        self.profile.clear_last_timestamp()?;
        let now = self.clock.now();
        let away_seconds = ((now - last_seen).num_milliseconds() / 1000).max(0);
        let earned = self.engine.reconcile_offline(Some(last_seen), now);
        if earned == 0 {
            return Ok(None);
        }
        Ok(Some(WelcomeBack {
            earned,
            away_seconds,
        }))
    }

    /// Advance simulated time by `delta_seconds`.
    pub fn advance(&mut self, delta_seconds: f64) {
        self.engine.tick(delta_seconds);
    }

    pub fn click(&mut self) -> ClickOutcome {
        self.engine.click()
    }

    pub fn purchase(&mut self, kind: EntryKind, id: &EntryId) -> PurchaseOutcome {
        self.engine.purchase(kind, id)
    }

    pub fn start_quiz(&mut self) -> StartOutcome {
        let now = self.clock.now();
        self.quiz.start_quiz(now)
    }

    pub fn answer(&mut self, selected: &str) -> AnswerOutcome {
        let now = self.clock.now();
        self.quiz.answer(&mut self.engine, selected, now)
    }

    pub fn close_quiz(&mut self) {
        self.quiz.close_quiz();
    }

    pub fn quiz_phase(&self) -> QuizPhase {
        self.quiz.phase(self.clock.now())
    }

    /// Install a question set for this session only.
    pub fn install_questions(&mut self, set: clicker_core::QuestionSet) {
        self.quiz.source_mut().install(set);
    }

    /// Persist a question set and install it for this session.
    pub fn save_questions(&mut self, set: clicker_core::QuestionSet) -> Result<(), StoreError> {
        self.profile.set_custom_questions(&set)?;
        self.quiz.source_mut().install(set);
        Ok(())
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn engine(&self) -> &EconomyEngine {
        &self.engine
    }

    pub fn quiz(&self) -> &QuizController {
        &self.quiz
    }

    /// Tear down, handing back the game state and the storage backend.
    pub fn into_parts(self) -> (GameState, S) {
        (self.engine.into_state(), self.profile.into_inner())
    }
}
