//! Recency-weighted next-speaker selection.
//!
//! Every candidate gets weight `now - last_selected + 1`, where a persona that
//! was never selected counts as selected at the epoch. A candidate nobody has
//! addressed for a while therefore becomes proportionally more likely to be
//! picked, which spreads turns across the council without a fixed rotation.

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::persona::PersonaName;

use super::clock::SharedClock;

// ─────────────────────────────────────────────────────────────────
// Recency Selector
// ─────────────────────────────────────────────────────────────────

/// Last-selected timestamps for one session.
#[derive(Debug, Clone, Default)]
pub struct RecencySelector {
    last_selected: HashMap<PersonaName, u64>,
}

impl RecencySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `name` was last picked, if ever.
    pub fn last_selected(&self, name: PersonaName) -> Option<u64> {
        self.last_selected.get(&name).copied()
    }

    /// Stamp `name` as picked at `now_ms`.
    pub fn record(&mut self, name: PersonaName, now_ms: u64) {
        self.last_selected.insert(name, now_ms);
    }

    /// Selection weight of `name` at `now_ms`. Never zero.
    pub fn weight(&self, name: PersonaName, now_ms: u64) -> u64 {
        let last = self.last_selected(name).unwrap_or(0);
        now_ms.saturating_sub(last).saturating_add(1)
    }
}

// ─────────────────────────────────────────────────────────────────
// Turn Router
// ─────────────────────────────────────────────────────────────────

/// Picks who is addressed next.
#[derive(Clone)]
pub struct TurnRouter {
    clock: SharedClock,
}

impl TurnRouter {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// Choose the next speaker from `eligible`, never returning `exclude`.
    ///
    /// Candidates are walked in registry order regardless of the order of
    /// `eligible`, so a seeded RNG gives a reproducible sequence. The
    /// selection is stamped into `recency` before returning.
    pub fn select_next<R: Rng + ?Sized>(
        &self,
        eligible: &[PersonaName],
        exclude: PersonaName,
        recency: &mut RecencySelector,
        rng: &mut R,
    ) -> Result<PersonaName> {
        let candidates: Vec<PersonaName> = PersonaName::all()
            .iter()
            .copied()
            .filter(|name| *name != exclude && eligible.contains(name))
            .collect();

        let now = self.clock.now_ms();

        let selected = match candidates.as_slice() {
            [] => {
                return Err(Error::NoEligibleCandidates {
                    exclude: exclude.to_string(),
                })
            }
            [only] => *only,
            _ => {
                let weights: Vec<u64> = candidates.iter().map(|c| recency.weight(*c, now)).collect();
                let total = weights.iter().fold(0u64, |acc, w| acc.saturating_add(*w));
                debug!(exclude = %exclude, ?candidates, ?weights, "Routing weights");

                let mut r = rng.gen_range(1..=total);
                let mut picked = None;
                for (candidate, weight) in candidates.iter().zip(&weights) {
                    if r <= *weight {
                        picked = Some(*candidate);
                        break;
                    }
                    r -= weight;
                }
                // Saturated sums can leave `r` past the last weight.
                picked.unwrap_or(candidates[candidates.len() - 1])
            }
        };

        recency.record(selected, now);
        Ok(selected)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
