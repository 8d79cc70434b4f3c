#![deny(warnings)]

//! Headless driver: runs a scripted session against the economy and quiz
//! engines at the 10 Hz reference cadence and prints a summary.

use anyhow::{Context, Result};
use clicker_core::{Catalog, EntryId, QuestionSet, SystemClock};
use clicker_econ::{ClickOutcome, EntryKind, PurchaseOutcome};
use clicker_quiz::{AnswerOutcome, StartOutcome};
use clicker_runtime::Session;
use persistence::JsonFileStore;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

const TICK_SECONDS: f64 = 0.1;

struct Args {
    seconds: u64,
    seed: u64,
    save: String,
    questions: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        seconds: 60,
        seed: 42,
        save: "clicker-save.json".to_string(),
        questions: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--seconds" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.seconds = v;
                }
            }
            "--seed" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.seed = v;
                }
            }
            "--save" => {
                if let Some(v) = it.next() {
                    args.save = v;
                }
            }
            "--questions" => args.questions = it.next(),
            _ => {}
        }
    }
    args
}

fn load_questions(path: &str) -> Option<QuestionSet> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path, error = %e, "cannot read question file, using arithmetic questions");
            return None;
        }
    };
    match QuestionSet::from_json(&text) {
        Ok(set) => Some(set),
        Err(e) => {
            warn!(path, error = %e, "rejected question file, using arithmetic questions");
            None
        }
    }
}

/// Buy the most expensive building we can afford, then any affordable
/// upgrade. Greedy but good enough for a demo run.
fn shopping_spree(session: &mut Session<JsonFileStore, SystemClock>) {
    let buildings: Vec<EntryId> = session
        .engine()
        .catalog()
        .buildings()
        .iter()
        .map(|b| b.id.clone())
        .rev()
        .collect();
    for id in &buildings {
        while let PurchaseOutcome::Purchased { paid, count, .. } =
            session.purchase(EntryKind::Building, id)
        {
            info!(id = %id, paid, count, "building purchased");
        }
    }
    let upgrades: Vec<EntryId> = session
        .engine()
        .catalog()
        .upgrades()
        .iter()
        .map(|u| u.id.clone())
        .collect();
    for id in &upgrades {
        if let PurchaseOutcome::Purchased { paid, count, .. } =
            session.purchase(EntryKind::Upgrade, id)
        {
            info!(id = %id, paid, count, "upgrade purchased");
        }
    }
}

/// Regain energy through the quiz, answering from the question itself.
fn quiz_break(session: &mut Session<JsonFileStore, SystemClock>) {
    let question = match session.start_quiz() {
        StartOutcome::Started(question) => question,
        StartOutcome::OnCooldown => return,
    };
    let mut correct = question.correct_answer;
    for _ in 0..5 {
        match session.answer(&correct) {
            AnswerOutcome::Correct {
                energy_gained,
                streak,
                next,
            } => {
                info!(energy_gained, streak, "quiz answer correct");
                correct = next.correct_answer;
            }
            AnswerOutcome::Wrong { .. } | AnswerOutcome::NotStarted => break,
        }
    }
    session.close_quiz();
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(
        seconds = args.seconds,
        seed = args.seed,
        save = %args.save,
        "starting session"
    );

    let store = JsonFileStore::open(&args.save)
        .with_context(|| format!("opening save file {}", args.save))?;
    let (mut session, welcome) =
        Session::start(Catalog::standard(), store, SystemClock, args.seed)?;

    if let Some(welcome) = welcome {
        println!(
            "Welcome back! {} cookies earned over {} seconds away.",
            welcome.earned, welcome.away_seconds
        );
    }
    if let Some(path) = &args.questions {
        if let Some(set) = load_questions(path) {
            println!("Loaded question set \"{}\" ({} questions).", set.title, set.len());
            session.save_questions(set)?;
        }
    }

    let ticks = args.seconds * 10;
    for tick in 0..ticks {
        session.advance(TICK_SECONDS);
        if tick % 10 != 0 {
            continue;
        }
        // Once a simulated second: click while energy allows, then shop,
        // and hit the quiz when energy runs low.
        for _ in 0..3 {
            if let ClickOutcome::InsufficientEnergy = session.click() {
                break;
            }
        }
        shopping_spree(&mut session);
        if session.state().energy < 30.0 {
            quiz_break(&mut session);
        }
    }

    let state = session.state();
    println!(
        "Session over | cookies: {:.0} | energy: {:.1}/{:.0} | cps: {:.1} | click value: {:.0} | streak: {}",
        state.currency,
        state.energy,
        session.engine().max_energy(),
        session.engine().total_cps(),
        session.engine().click_value(),
        session.quiz().streak()
    );
    let mut owned: Vec<String> = Vec::new();
    for building in session.engine().catalog().buildings() {
        let count = state.building_count(&building.id);
        if count > 0 {
            owned.push(format!("{} x{}", building.name, count));
        }
    }
    if !owned.is_empty() {
        println!("Buildings | {}", owned.join(" | "));
    }

    session.suspend()?;
    Ok(())
}
