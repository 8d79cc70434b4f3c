#![deny(warnings)]

//! Economy engine: all currency/energy state-transition rules.
//!
//! The engine owns the [`GameState`] and mutates it exclusively through its
//! command methods. Insufficient funds and insufficient energy are not
//! errors: commands return outcome enums and leave the state untouched on a
//! rejection, so callers can surface feedback without unwinding.

use chrono::{DateTime, Utc};
use clicker_core::{Catalog, EntryId, GameState, Owned, UpgradeEffect, BASE_MAX_ENERGY};
use serde::Serialize;
use tracing::{debug, info};

/// Energy cost of one click before efficiency upgrades.
pub const BASE_ENERGY_COST_PER_CLICK: f64 = 2.0;
/// Floor for the per-click energy cost, regardless of upgrades.
pub const MIN_ENERGY_COST_PER_CLICK: f64 = 0.2;

/// Which side of the catalog a purchase targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    Upgrade,
    Building,
}

/// Result of a manual click.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum ClickOutcome {
    /// Click accepted: `value` added to currency, `energy_spent` deducted.
    Clicked { value: f64, energy_spent: f64 },
    /// Not enough energy; nothing changed.
    InsufficientEnergy,
}

/// Result of a purchase attempt.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum PurchaseOutcome {
    /// Purchase applied: `paid` deducted, owned count now `count`, next
    /// unit priced at `next_cost`.
    Purchased { paid: f64, count: u64, next_cost: f64 },
    /// Not enough currency; nothing changed.
    InsufficientFunds,
    /// The id does not exist in the catalog; nothing changed.
    UnknownEntry,
}

/// Owns the game state and implements every state-transition rule.
#[derive(Clone, Debug)]
pub struct EconomyEngine {
    catalog: Catalog,
    state: GameState,
}

impl EconomyEngine {
    /// Engine over a fresh state for the given catalog.
    pub fn new(catalog: Catalog) -> Self {
        let state = GameState::new(&catalog);
        EconomyEngine { catalog, state }
    }

    /// Engine over a restored state, e.g. a persisted snapshot.
    pub fn from_state(catalog: Catalog, state: GameState) -> Self {
        EconomyEngine { catalog, state }
    }

    /// Read-only view of the current state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// The catalog this engine serves.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Consume the engine, yielding the state for persistence.
    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Maximum energy: base 100 plus capacity upgrades.
    pub fn max_energy(&self) -> f64 {
        BASE_MAX_ENERGY + self.sum_upgrades(|effect| match effect {
            UpgradeEffect::MaxEnergyBonus { amount } => Some(*amount),
            _ => None,
        })
    }

    /// Energy charged per click: base 2, reduced by efficiency upgrades,
    /// never below 0.2.
    pub fn energy_cost_per_click(&self) -> f64 {
        let reduction = self.sum_upgrades(|effect| match effect {
            UpgradeEffect::EnergyCostReduction { fraction } => Some(*fraction),
            _ => None,
        });
        (BASE_ENERGY_COST_PER_CLICK * (1.0 - reduction)).max(MIN_ENERGY_COST_PER_CLICK)
    }

    /// Currency granted per click: 1 plus click upgrades.
    pub fn click_value(&self) -> f64 {
        1.0 + self.sum_upgrades(|effect| match effect {
            UpgradeEffect::ClickBonus { amount } => Some(*amount),
            _ => None,
        })
    }

    /// Passive energy regeneration per second from regen upgrades.
    pub fn energy_regen_per_second(&self) -> f64 {
        self.sum_upgrades(|effect| match effect {
            UpgradeEffect::EnergyRegen { per_second } => Some(*per_second),
            _ => None,
        })
    }

    /// Total currency produced per second by all buildings, including the
    /// shared production multiplier from upgrades.
    pub fn total_cps(&self) -> f64 {
        let multiplier = 1.0
            + self.sum_upgrades(|effect| match effect {
                UpgradeEffect::ProductionBoost { boost } => Some(*boost),
                _ => None,
            });
        self.catalog
            .buildings()
            .iter()
            .map(|b| self.state.building_count(&b.id) as f64 * b.base_cps * multiplier)
            .sum()
    }

    /// Manual click. Rejected without any state change when energy is below
    /// the per-click cost.
    pub fn click(&mut self) -> ClickOutcome {
        let energy_cost = self.energy_cost_per_click();
        if self.state.energy < energy_cost {
            return ClickOutcome::InsufficientEnergy;
        }
        let value = self.click_value();
        self.state.currency += value;
        self.state.energy = (self.state.energy - energy_cost).max(0.0);
        ClickOutcome::Clicked {
            value,
            energy_spent: energy_cost,
        }
    }

    /// Buy one unit of an upgrade or building. On success the price of the
    /// next unit becomes `floor(current × growth)`, so prices never
    /// decrease.
    pub fn purchase(&mut self, kind: EntryKind, id: &EntryId) -> PurchaseOutcome {
        let (growth, base_cost) = match kind {
            EntryKind::Upgrade => match self.catalog.upgrade(id) {
                Some(def) => (def.cost_growth, def.base_cost),
                None => return PurchaseOutcome::UnknownEntry,
            },
            EntryKind::Building => match self.catalog.building(id) {
                Some(def) => (def.cost_growth, def.base_cost),
                None => return PurchaseOutcome::UnknownEntry,
            },
        };
        let owned_map = match kind {
            EntryKind::Upgrade => &mut self.state.upgrades,
            EntryKind::Building => &mut self.state.buildings,
        };
        // Snapshots restored from an older catalog may lack the entry.
        let owned = owned_map.entry(id.clone()).or_insert(Owned {
            count: 0,
            current_cost: base_cost,
        });
        if self.state.currency < owned.current_cost {
            return PurchaseOutcome::InsufficientFunds;
        }
        let paid = owned.current_cost;
        self.state.currency -= paid;
        owned.count += 1;
        owned.current_cost = (owned.current_cost * growth).floor();
        let outcome = PurchaseOutcome::Purchased {
            paid,
            count: owned.count,
            next_cost: owned.current_cost,
        };
        debug!(%id, ?kind, paid, count = owned.count, "purchase");
        outcome
    }

    /// Passive accrual for `delta_seconds` of elapsed time. Currency gain
    /// is linear in the delta, so any tick cadence accrues the same total.
    /// Also applies passive energy regeneration, clamped at max energy.
    pub fn tick(&mut self, delta_seconds: f64) {
        if !(delta_seconds.is_finite() && delta_seconds > 0.0) {
            return;
        }
        self.state.currency += self.total_cps() * delta_seconds;
        let regen = self.energy_regen_per_second();
        if regen > 0.0 {
            self.state.energy =
                (self.state.energy + regen * delta_seconds).min(self.max_energy());
        }
    }

    /// Credit production for time spent away: whole elapsed seconds times
    /// the CURRENT production rate, floored. Returns the amount credited
    /// (0 when nothing was earned or no timestamp was recorded).
    pub fn reconcile_offline(
        &mut self,
        last_seen: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> u64 {
        let Some(last_seen) = last_seen else {
            return 0;
        };
        let elapsed_ms = (now - last_seen).num_milliseconds();
        if elapsed_ms <= 0 {
            return 0;
        }
        let elapsed_seconds = elapsed_ms / 1000;
        let earnings = (self.total_cps() * elapsed_seconds as f64).floor();
        if earnings <= 0.0 {
            return 0;
        }
        self.state.currency += earnings;
        let earned = earnings as u64;
        info!(earned, elapsed_seconds, "offline earnings credited");
        earned
    }

    /// Apply a signed energy change, clamped to `[0, max energy]`.
    pub fn apply_energy_delta(&mut self, amount: f64) {
        if !amount.is_finite() {
            return;
        }
        self.state.energy = (self.state.energy + amount).clamp(0.0, self.max_energy());
    }

    fn sum_upgrades<F>(&self, per_unit: F) -> f64
    where
        F: Fn(&UpgradeEffect) -> Option<f64>,
    {
        self.catalog
            .upgrades()
            .iter()
            .filter_map(|u| per_unit(&u.effect).map(|v| self.state.upgrade_count(&u.id) as f64 * v))
            .sum()
    }
}
