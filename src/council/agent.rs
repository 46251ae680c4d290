//! One persona's turn: prompt, generate, record, route.

use tracing::debug;

use crate::backend::{ChatMessage, TextGenerator};
use crate::error::{Error, Result};
use crate::persona::{PersonaName, SessionRole, SessionRoleSet};

use super::message::{Message, NARRATOR};
use super::session::{SessionHandle, TurnCommit, TurnContext};

/// Hard cap on reply length, stated in every persona prompt.
pub const MAX_REPLY_WORDS: usize = 40;

/// Result of a dispatched turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResult {
    /// The reply was recorded and addresses `next`.
    Spoke { message: Message, next: PersonaName },
    /// The speaker was eliminated while its reply was being generated; the
    /// reply was dropped.
    Silenced,
    /// The session stopped before the reply could be recorded.
    Discarded,
}

/// Turn executor for a single persona.
#[derive(Debug, Clone)]
pub struct AgentNode {
    role: SessionRole,
    peers: Vec<(PersonaName, &'static str)>,
}

impl AgentNode {
    pub fn new(role: SessionRole, roles: &SessionRoleSet) -> Self {
        let peers = roles
            .roles()
            .iter()
            .filter(|peer| peer.name() != role.name())
            .map(|peer| (peer.name(), peer.definition.help_text))
            .collect();

        Self { role, peers }
    }

    pub fn name(&self) -> PersonaName {
        self.role.name()
    }

    /// System instruction for this persona given who is still in play.
    pub fn system_prompt(&self, eligible: &[PersonaName]) -> String {
        let definition = &self.role.definition;
        let mut prompt = format!("You are the {}. {}\n", definition.name, definition.personality);

        if self.role.is_impostor {
            prompt.push_str(definition.impostor_prompt);
            prompt.push(' ');
        }

        for (name, help) in &self.peers {
            if eligible.contains(name) {
                prompt.push_str(help);
                prompt.push(' ');
            }
        }

        prompt.push_str(&format!(
            "Do not repeat points that were already made. \
             Address exactly one other council member by name. \
             Raise one new concern. \
             Keep your answer clear, concise, and final (no more than {} words).",
            MAX_REPLY_WORDS
        ));
        prompt
    }

    /// Full prompt: instruction, opening scene, then recent turns. This
    /// persona's own lines come back as assistant turns.
    pub fn build_prompt(&self, context: &TurnContext) -> Vec<ChatMessage> {
        let mut prompt = Vec::with_capacity(context.history.len() + 2);
        prompt.push(ChatMessage::system(self.system_prompt(&context.eligible)));

        if let Some(ref narrative) = context.narrative {
            prompt.push(ChatMessage::user(format!("{}: {}", NARRATOR, narrative.content)));
        }

        for message in &context.history {
            if message.speaker().persona() == Some(self.name()) {
                prompt.push(ChatMessage::assistant(message.content.clone()));
            } else {
                prompt.push(ChatMessage::user(format!("{}: {}", message.name, message.content)));
            }
        }

        prompt
    }

    /// Run one turn against `session`.
    ///
    /// A failed generation is returned as-is; nothing is recorded and no
    /// replacement text is produced.
    pub async fn run_turn(
        &self,
        generator: &dyn TextGenerator,
        session: &SessionHandle,
        context_window: usize,
    ) -> Result<TurnResult> {
        let Some(context) = session.turn_context(context_window) else {
            return Ok(TurnResult::Discarded);
        };

        let prompt = self.build_prompt(&context);
        let generation = generator
            .generate(&prompt)
            .await
            .map_err(|e| self.attribute(e))?;

        let content = generation.content.trim();
        if content.is_empty() {
            return Err(Error::generation_failed(self.name(), "backend returned an empty reply"));
        }

        let message = Message::persona(self.name(), content);
        match session.commit_turn(message.clone(), self.name())? {
            TurnCommit::Recorded(next) => {
                debug!(session_id = %session.id(), speaker = %self.name(), next = %next, "Turn recorded");
                Ok(TurnResult::Spoke { message, next })
            }
            TurnCommit::Silenced => Ok(TurnResult::Silenced),
            TurnCommit::Inactive => {
                debug!(session_id = %session.id(), speaker = %self.name(), "Reply discarded after stop");
                Ok(TurnResult::Discarded)
            }
        }
    }

    fn attribute(&self, error: Error) -> Error {
        match error {
            Error::GenerationFailed { message, .. } => Error::generation_failed(self.name(), message),
            other => Error::generation_failed(self.name(), other.to_string()),
        }
    }
}
