//! Built-in persona catalog for the war council.

use crate::error::{Error, Result};

use super::types::{PersonaDefinition, PersonaName, SessionRoleSet};

/// Static catalog of council members.
///
/// The order of [`RoleRegistry::list_personas`] is the canonical index space
/// used for impostor selection and for router tie-breaking.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    personas: Vec<PersonaDefinition>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self {
            personas: PersonaName::all().iter().map(|name| bundled_definition(*name)).collect(),
        }
    }

    /// All persona definitions in registry order.
    pub fn list_personas(&self) -> &[PersonaDefinition] {
        &self.personas
    }

    /// Number of personas in the catalog.
    pub fn count(&self) -> usize {
        self.personas.len()
    }

    /// Look up a single definition.
    pub fn get(&self, name: PersonaName) -> Option<&PersonaDefinition> {
        self.personas.iter().find(|p| p.name == name)
    }

    /// Derive a session view with the persona at `index` flagged as impostor.
    pub fn with_impostor(&self, index: usize) -> Result<SessionRoleSet> {
        if index >= self.personas.len() {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.personas.len(),
            });
        }
        Ok(SessionRoleSet::new(&self.personas, index))
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn bundled_definition(name: PersonaName) -> PersonaDefinition {
    let (personality, impostor_prompt, help_text) = match name {
        PersonaName::General => (
            "You are fearless and battle-hardened, and you command with unwavering authority.",
            "Although you appear decisive, your secret aim is to sow confusion among the council.",
            "If you need military strategy, ask General.",
        ),
        PersonaName::Diplomat => (
            "You are charismatic and eloquent, skilled in negotiation and in building alliances.",
            "Though persuasive, your hidden agenda is to create discord between the members.",
            "If you need diplomatic advice, ask Diplomat.",
        ),
        PersonaName::Treasurer => (
            "You are meticulous and frugal, convinced that gold is the true power of the kingdom.",
            "While precise with resources, you quietly undermine confidence in the treasury.",
            "If you need economic insight, ask Treasurer.",
        ),
        PersonaName::Spymaster => (
            "You are secretive and cunning, adept at gathering intelligence and exposing hidden threats.",
            "Though covert, you deliberately distort information to breed uncertainty.",
            "If you need intelligence, ask Spymaster.",
        ),
        PersonaName::Blacksmith => (
            "You are practical and blunt, and you value action and tangible results.",
            "Though a master of the forge, you now and then suggest impractical measures that stall progress.",
            "If you need arms or tactical support, ask Blacksmith.",
        ),
        PersonaName::Mage => (
            "You are mysterious and scholarly, channeling ancient magic for insight.",
            "While enigmatic, you sometimes twist your visions to mislead the council.",
            "If you need arcane wisdom, ask Mage.",
        ),
        PersonaName::Healer => (
            "You are compassionate and wise, devoted to preserving life and morale.",
            "Though caring, your counsel tends to delay decisive action.",
            "If you need healing or support, ask Healer.",
        ),
        PersonaName::Strategist => (
            "You are analytical and precise, planning every move with calculated foresight.",
            "While methodical, you complicate plans to introduce delay.",
            "If you need strategic planning, ask Strategist.",
        ),
        PersonaName::Tactician => (
            "You are dynamic and decisive, adapting rapidly to the shifting battlefield.",
            "Though agile, you occasionally push hasty measures that muddle the overall strategy.",
            "If you need real-time tactics, ask Tactician.",
        ),
        PersonaName::Architect => (
            "You are methodical and inventive, devoted to designing defenses that last.",
            "At times your elaborate designs delay the immediate action the kingdom needs.",
            "If you need structural defenses, ask Architect.",
        ),
    };

    PersonaDefinition {
        name,
        personality,
        impostor_prompt,
        help_text,
    }
}
