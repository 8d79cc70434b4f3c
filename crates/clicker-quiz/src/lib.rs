#![deny(warnings)]

//! Quiz subsystem: question supply and the energy-regeneration mini-game.
//!
//! [`QuestionSource`] serves questions from an installed custom set or by
//! synthesizing arithmetic problems from a seeded RNG. [`QuizController`]
//! runs the Idle / AwaitingAnswer / Cooldown state machine that converts
//! answers into energy deltas on the economy engine, with streak-scaled
//! rewards and a rapid-guess cooldown.

use chrono::{DateTime, Duration, Utc};
use clicker_core::{Question, QuestionSet};
use clicker_econ::EconomyEngine;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Energy granted for any correct answer before the streak bonus.
pub const ENERGY_REWARD_BASE: f64 = 25.0;
/// Streak bonus per consecutive correct answer.
pub const STREAK_BONUS_STEP: f64 = 5.0;
/// Ceiling on the streak bonus (total gain caps at base + this).
pub const STREAK_BONUS_CAP: f64 = 25.0;
/// Energy penalty for a wrong answer.
pub const WRONG_PENALTY: f64 = 5.0;
/// Energy penalty for a wrong answer inside the rapid-guess window.
pub const RAPID_WRONG_PENALTY: f64 = 15.0;
/// Two wrong answers closer together than this trigger the cooldown.
pub const RAPID_WRONG_WINDOW_MS: i64 = 2000;
/// Quiz lockout length after rapid wrong answers.
pub const COOLDOWN_MS: i64 = 5000;

/// Supplies quiz questions: a custom set when installed and non-empty,
/// procedurally generated arithmetic otherwise.
#[derive(Clone, Debug)]
pub struct QuestionSource {
    custom: Option<QuestionSet>,
    rng: ChaCha8Rng,
}

impl QuestionSource {
    /// Source with no custom set, seeded for reproducible generation.
    pub fn from_seed(seed: u64) -> Self {
        QuestionSource {
            custom: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Install a custom question set. An empty set installs fine but
    /// generation falls back to arithmetic until it has questions.
    pub fn install(&mut self, set: QuestionSet) {
        debug!(count = set.len(), title = %set.title, "custom question set installed");
        self.custom = Some(set);
    }

    /// Drop the custom set, returning to arithmetic generation.
    pub fn clear(&mut self) {
        self.custom = None;
    }

    /// The installed set, if any.
    pub fn custom_set(&self) -> Option<&QuestionSet> {
        self.custom.as_ref()
    }

    /// Draw the next question.
    pub fn next(&mut self) -> Question {
        if let Some(set) = &self.custom {
            if !set.is_empty() {
                let index = self.rng.gen_range(0..set.len());
                return set.questions[index].clone();
            }
        }
        self.arithmetic()
    }

    fn arithmetic(&mut self) -> Question {
        let operators = ['+', '-', '*', '/'];
        let operator = operators[self.rng.gen_range(0..operators.len())];
        let (lhs, rhs, answer) = match operator {
            '+' => {
                let a = self.rng.gen_range(1..=10i64);
                let b = self.rng.gen_range(1..=10i64);
                (a, b, a + b)
            }
            '-' => {
                // Subtrahend bounded by the minuend keeps the result
                // non-negative.
                let a = self.rng.gen_range(1..=10i64);
                let b = self.rng.gen_range(1..=a);
                (a, b, a - b)
            }
            '*' => {
                let a = self.rng.gen_range(1..=10i64);
                let b = self.rng.gen_range(1..=10i64);
                (a, b, a * b)
            }
            _ => {
                // Dividend built from divisor x quotient keeps the result
                // integral.
                let divisor = self.rng.gen_range(1..=5i64);
                let quotient = self.rng.gen_range(1..=5i64);
                (divisor * quotient, divisor, quotient)
            }
        };

        let mut options = vec![answer];
        while options.len() < 4 {
            let offset = self.rng.gen_range(1..=5i64);
            let candidate = if self.rng.gen_bool(0.5) {
                answer + offset
            } else {
                answer - offset
            };
            if candidate >= 0 && !options.contains(&candidate) {
                options.push(candidate);
            }
        }
        options.shuffle(&mut self.rng);

        Question {
            question: format!("What is {lhs} {operator} {rhs}?"),
            correct_answer: answer.to_string(),
            options: options.iter().map(i64::to_string).collect(),
        }
    }
}

/// Where the quiz state machine currently sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizPhase {
    Idle,
    AwaitingAnswer,
    Cooldown,
}

/// Result of attempting to open the quiz.
#[derive(Clone, Debug, PartialEq)]
pub enum StartOutcome {
    /// Session opened with this question.
    Started(Question),
    /// Rejected: the rapid-guess cooldown is still running.
    OnCooldown,
}

/// Result of submitting an answer.
#[derive(Clone, Debug, PartialEq)]
pub enum AnswerOutcome {
    /// Correct: energy credited, streak advanced, session continues with
    /// `next`.
    Correct {
        energy_gained: f64,
        streak: u32,
        next: Question,
    },
    /// Wrong: energy debited. When the cooldown fired the session is
    /// closed and `next` is absent; otherwise the session continues.
    Wrong {
        energy_lost: f64,
        cooldown_started: bool,
        next: Option<Question>,
    },
    /// No open session to answer against; nothing changed.
    NotStarted,
}

/// Orchestrates the quiz mini-game and applies its energy effects to the
/// economy engine. All timing flows through the `now` arguments; the
/// cooldown is a stored deadline resolved lazily, so there is never more
/// than one pending expiry.
#[derive(Clone, Debug)]
pub struct QuizController {
    source: QuestionSource,
    current: Option<Question>,
    streak: u32,
    last_wrong: Option<DateTime<Utc>>,
    cooldown_until: Option<DateTime<Utc>>,
}

impl QuizController {
    pub fn new(source: QuestionSource) -> Self {
        QuizController {
            source,
            current: None,
            streak: 0,
            last_wrong: None,
            cooldown_until: None,
        }
    }

    /// Current phase as of `now`.
    pub fn phase(&self, now: DateTime<Utc>) -> QuizPhase {
        if self.cooldown_active(now) {
            QuizPhase::Cooldown
        } else if self.current.is_some() {
            QuizPhase::AwaitingAnswer
        } else {
            QuizPhase::Idle
        }
    }

    /// Whether the rapid-guess lockout is still running.
    pub fn cooldown_active(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Time left on the cooldown, if any.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Consecutive correct answers so far.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// The question awaiting an answer, if a session is open.
    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    /// Access the question source, e.g. to install a custom set.
    pub fn source_mut(&mut self) -> &mut QuestionSource {
        &mut self.source
    }

    pub fn source(&self) -> &QuestionSource {
        &self.source
    }

    /// Open a quiz session. Rejected without side effects while the
    /// cooldown deadline is in the future.
    pub fn start_quiz(&mut self, now: DateTime<Utc>) -> StartOutcome {
        if self.cooldown_active(now) {
            return StartOutcome::OnCooldown;
        }
        self.cooldown_until = None;
        let question = self.source.next();
        self.current = Some(question.clone());
        StartOutcome::Started(question)
    }

    /// Submit an answer for the open session. Correct answers credit
    /// `base + min(streak x step, cap)` energy (bonus from the streak
    /// before this answer) and keep the session open. Wrong answers reset
    /// the streak and debit energy; a second wrong answer within the
    /// rapid-guess window debits more and locks the quiz out.
    pub fn answer(
        &mut self,
        engine: &mut EconomyEngine,
        selected: &str,
        now: DateTime<Utc>,
    ) -> AnswerOutcome {
        let Some(question) = self.current.clone() else {
            return AnswerOutcome::NotStarted;
        };

        if selected == question.correct_answer {
            let bonus = (self.streak as f64 * STREAK_BONUS_STEP).min(STREAK_BONUS_CAP);
            let energy_gained = ENERGY_REWARD_BASE + bonus;
            engine.apply_energy_delta(energy_gained);
            self.streak += 1;
            let next = self.source.next();
            self.current = Some(next.clone());
            return AnswerOutcome::Correct {
                energy_gained,
                streak: self.streak,
                next,
            };
        }

        let rapid = self
            .last_wrong
            .is_some_and(|previous| now - previous < Duration::milliseconds(RAPID_WRONG_WINDOW_MS));
        self.last_wrong = Some(now);
        self.streak = 0;

        if rapid {
            engine.apply_energy_delta(-RAPID_WRONG_PENALTY);
            self.cooldown_until = Some(now + Duration::milliseconds(COOLDOWN_MS));
            self.current = None;
            debug!("rapid wrong answers, quiz cooling down");
            AnswerOutcome::Wrong {
                energy_lost: RAPID_WRONG_PENALTY,
                cooldown_started: true,
                next: None,
            }
        } else {
            engine.apply_energy_delta(-WRONG_PENALTY);
            let next = self.source.next();
            self.current = Some(next.clone());
            AnswerOutcome::Wrong {
                energy_lost: WRONG_PENALTY,
                cooldown_started: false,
                next: Some(next),
            }
        }
    }

    /// Close the session and discard the current question. The streak
    /// survives until a wrong answer resets it.
    pub fn close_quiz(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clicker_core::Catalog;
    use proptest::prelude::*;

    fn engine() -> EconomyEngine {
        EconomyEngine::new(Catalog::standard())
    }

    fn controller(seed: u64) -> QuizController {
        QuizController::new(QuestionSource::from_seed(seed))
    }

    fn set_of(questions: &[(&str, &str)]) -> QuestionSet {
        let mut set = QuestionSet::default();
        for (q, a) in questions {
            set.add_question(Question {
                question: q.to_string(),
                correct_answer: a.to_string(),
                options: vec![a.to_string(), "x".to_string()],
            })
            .unwrap();
        }
        set
    }

    #[test]
    fn arithmetic_questions_are_well_formed() {
        let mut source = QuestionSource::from_seed(7);
        for _ in 0..500 {
            let q = source.next();
            assert_eq!(q.options.len(), 4, "{q:?}");
            assert!(q.options.contains(&q.correct_answer), "{q:?}");
            let distinct: std::collections::BTreeSet<&String> = q.options.iter().collect();
            assert_eq!(distinct.len(), 4, "{q:?}");
            for option in &q.options {
                let value: i64 = option.parse().unwrap();
                assert!(value >= 0, "{q:?}");
            }
        }
    }

    #[test]
    fn arithmetic_generation_is_seed_deterministic() {
        let mut a = QuestionSource::from_seed(42);
        let mut b = QuestionSource::from_seed(42);
        for _ in 0..20 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn custom_set_served_when_non_empty() {
        let mut source = QuestionSource::from_seed(1);
        source.install(set_of(&[("only", "1")]));
        for _ in 0..10 {
            assert_eq!(source.next().question, "only");
        }
        source.clear();
        assert!(source.next().question.starts_with("What is"));
    }

    #[test]
    fn empty_custom_set_falls_back_to_arithmetic() {
        let mut source = QuestionSource::from_seed(1);
        source.install(QuestionSet::default());
        assert!(source.next().question.starts_with("What is"));
    }

    #[test]
    fn start_and_close_move_between_idle_and_awaiting() {
        let mut quiz = controller(3);
        let now = Utc::now();
        assert_eq!(quiz.phase(now), QuizPhase::Idle);
        let StartOutcome::Started(q) = quiz.start_quiz(now) else {
            panic!("should start");
        };
        assert_eq!(quiz.phase(now), QuizPhase::AwaitingAnswer);
        assert_eq!(quiz.current_question(), Some(&q));
        quiz.close_quiz();
        assert_eq!(quiz.phase(now), QuizPhase::Idle);
        assert_eq!(quiz.current_question(), None);
    }

    #[test]
    fn answer_without_session_is_rejected() {
        let mut quiz = controller(3);
        let mut engine = engine();
        let energy = engine.state().energy;
        assert_eq!(
            quiz.answer(&mut engine, "1", Utc::now()),
            AnswerOutcome::NotStarted
        );
        assert_eq!(engine.state().energy, energy);
    }

    #[test]
    fn correct_answer_rewards_scale_with_streak_and_cap() {
        let mut quiz = controller(5);
        let mut engine = engine();
        engine.apply_energy_delta(-100.0); // leave room below max
        let now = Utc::now();
        quiz.start_quiz(now);

        let mut gains = Vec::new();
        for _ in 0..8 {
            let correct = quiz.current_question().unwrap().correct_answer.clone();
            match quiz.answer(&mut engine, &correct, now) {
                AnswerOutcome::Correct { energy_gained, .. } => gains.push(energy_gained),
                other => panic!("expected correct, got {other:?}"),
            }
        }
        assert_eq!(gains, vec![25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 50.0, 50.0]);
        assert_eq!(quiz.streak(), 8);
        // Session stayed open throughout.
        assert!(quiz.current_question().is_some());
    }

    #[test]
    fn wrong_answer_penalizes_and_resets_streak() {
        let mut quiz = controller(5);
        let mut engine = engine();
        let now = Utc::now();
        quiz.start_quiz(now);
        let correct = quiz.current_question().unwrap().correct_answer.clone();
        quiz.answer(&mut engine, &correct, now);
        assert_eq!(quiz.streak(), 1);

        let energy = engine.state().energy;
        let outcome = quiz.answer(&mut engine, "<wrong>", now);
        assert_eq!(quiz.streak(), 0);
        match outcome {
            AnswerOutcome::Wrong {
                energy_lost,
                cooldown_started,
                next,
            } => {
                assert_eq!(energy_lost, WRONG_PENALTY);
                assert!(!cooldown_started);
                assert!(next.is_some());
            }
            other => panic!("expected wrong, got {other:?}"),
        }
        assert_eq!(engine.state().energy, energy - WRONG_PENALTY);
        assert_eq!(quiz.phase(now), QuizPhase::AwaitingAnswer);
    }

    #[test]
    fn rapid_wrong_answers_trigger_cooldown() {
        let mut quiz = controller(5);
        let mut engine = engine();
        let start = Utc::now();
        quiz.start_quiz(start);

        quiz.answer(&mut engine, "<wrong>", start);
        let energy = engine.state().energy;
        let second = start + Duration::milliseconds(500);
        let outcome = quiz.answer(&mut engine, "<wrong>", second);
        assert_eq!(
            outcome,
            AnswerOutcome::Wrong {
                energy_lost: RAPID_WRONG_PENALTY,
                cooldown_started: true,
                next: None,
            }
        );
        assert_eq!(engine.state().energy, energy - RAPID_WRONG_PENALTY);
        assert_eq!(quiz.phase(second), QuizPhase::Cooldown);
        assert_eq!(quiz.current_question(), None);

        // Start is rejected while the lockout runs, accepted after it.
        assert_eq!(quiz.start_quiz(second), StartOutcome::OnCooldown);
        let after = second + Duration::milliseconds(COOLDOWN_MS);
        assert!(matches!(quiz.start_quiz(after), StartOutcome::Started(_)));
        assert_eq!(quiz.phase(after), QuizPhase::AwaitingAnswer);
    }

    #[test]
    fn spaced_wrong_answers_do_not_trigger_cooldown() {
        let mut quiz = controller(5);
        let mut engine = engine();
        let start = Utc::now();
        quiz.start_quiz(start);

        quiz.answer(&mut engine, "<wrong>", start);
        let second = start + Duration::milliseconds(RAPID_WRONG_WINDOW_MS);
        let outcome = quiz.answer(&mut engine, "<wrong>", second);
        match outcome {
            AnswerOutcome::Wrong {
                energy_lost,
                cooldown_started,
                ..
            } => {
                assert_eq!(energy_lost, WRONG_PENALTY);
                assert!(!cooldown_started);
            }
            other => panic!("expected wrong, got {other:?}"),
        }
        assert_eq!(quiz.phase(second), QuizPhase::AwaitingAnswer);
    }

    #[test]
    fn cooldown_remaining_counts_down() {
        let mut quiz = controller(5);
        let mut engine = engine();
        let start = Utc::now();
        quiz.start_quiz(start);
        quiz.answer(&mut engine, "<wrong>", start);
        quiz.answer(&mut engine, "<wrong>", start + Duration::milliseconds(100));

        let mid = start + Duration::milliseconds(2100);
        let remaining = quiz.cooldown_remaining(mid).unwrap();
        assert_eq!(remaining, Duration::milliseconds(3000));
        assert_eq!(
            quiz.cooldown_remaining(start + Duration::milliseconds(5100)),
            None
        );
    }

    #[test]
    fn streak_survives_close_until_wrong_answer() {
        let mut quiz = controller(5);
        let mut engine = engine();
        let now = Utc::now();
        quiz.start_quiz(now);
        let correct = quiz.current_question().unwrap().correct_answer.clone();
        quiz.answer(&mut engine, &correct, now);
        quiz.close_quiz();
        assert_eq!(quiz.streak(), 1);
        quiz.start_quiz(now);
        let correct = quiz.current_question().unwrap().correct_answer.clone();
        match quiz.answer(&mut engine, &correct, now) {
            AnswerOutcome::Correct { energy_gained, .. } => assert_eq!(energy_gained, 30.0),
            other => panic!("expected correct, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_arithmetic_answers_non_negative(seed in 0u64..5_000) {
            let mut source = QuestionSource::from_seed(seed);
            let q = source.next();
            let answer: i64 = q.correct_answer.parse().unwrap();
            prop_assert!(answer >= 0);
            prop_assert!((0..=100).contains(&answer));
        }

        #[test]
        fn prop_energy_stays_clamped_through_quiz(seed in 0u64..500, answers in proptest::collection::vec(any::<bool>(), 1..40)) {
            let mut quiz = controller(seed);
            let mut engine = engine();
            let mut now = Utc::now();
            quiz.start_quiz(now);
            for answer_correctly in answers {
                now += Duration::milliseconds(300);
                if quiz.current_question().is_none() {
                    // Cooldown may be running; skip forward and reopen.
                    now += Duration::milliseconds(COOLDOWN_MS);
                    quiz.start_quiz(now);
                }
                let selected = if answer_correctly {
                    quiz.current_question().unwrap().correct_answer.clone()
                } else {
                    "<wrong>".to_string()
                };
                quiz.answer(&mut engine, &selected, now);
                prop_assert!(engine.state().energy >= 0.0);
                prop_assert!(engine.state().energy <= engine.max_energy());
            }
        }
    }
}
