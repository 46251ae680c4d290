//! Who may still speak or be addressed in a session.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::persona::{PersonaName, SessionRoleSet};

/// Smallest active set an elimination may leave behind. The router needs at
/// least one candidate besides the current speaker.
const ACTIVE_FLOOR: usize = 2;

/// Result of one elimination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EliminationOutcome {
    /// The persona was moved from active to eliminated.
    Eliminated(PersonaName),
    /// Eliminating anyone would leave the router without a partner.
    SkippedFloor,
    /// Nobody except the impostor remains.
    NoneEligible,
}

/// Active and eliminated personas for one session.
///
/// The impostor is never a candidate for elimination.
#[derive(Debug, Clone)]
pub struct EligibilityState {
    active: Vec<PersonaName>,
    eliminated: Vec<PersonaName>,
    impostor: PersonaName,
}

impl EligibilityState {
    pub fn new(roles: &SessionRoleSet) -> Self {
        Self {
            active: roles.names(),
            eliminated: Vec::new(),
            impostor: roles.impostor(),
        }
    }

    /// Active personas in registry order.
    pub fn active(&self) -> &[PersonaName] {
        &self.active
    }

    /// Eliminated personas in elimination order.
    pub fn eliminated(&self) -> &[PersonaName] {
        &self.eliminated
    }

    pub fn is_active(&self, name: PersonaName) -> bool {
        self.active.contains(&name)
    }

    pub fn impostor(&self) -> PersonaName {
        self.impostor
    }

    /// Eliminate one non-impostor persona chosen uniformly at random.
    pub fn eliminate_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> EliminationOutcome {
        let candidates: Vec<PersonaName> = self
            .active
            .iter()
            .copied()
            .filter(|name| *name != self.impostor)
            .collect();

        if candidates.is_empty() {
            return EliminationOutcome::NoneEligible;
        }
        if self.active.len() <= ACTIVE_FLOOR {
            return EliminationOutcome::SkippedFloor;
        }

        let Some(victim) = candidates.choose(rng).copied() else {
            return EliminationOutcome::NoneEligible;
        };

        self.active.retain(|name| *name != victim);
        self.eliminated.push(victim);
        EliminationOutcome::Eliminated(victim)
    }

    /// Drop all state at session teardown.
    pub fn clear(&mut self) {
        self.active.clear();
        self.eliminated.clear();
    }
}
