//! LLM persona responder with per-session history.

use crate::llm::ChatClient;
use async_trait::async_trait;
use tracing::debug;
use urbanroute_core::{Conversation, Message, Responder, ResponderError};

pub const CULTURE_PROMPT: &str = "Réponds en expert du patrimoine et de l'histoire locale.";

pub const LEISURE_PROMPT: &str = "Réponds en guide des sorties et loisirs locaux : concerts, \
     expositions, festivals, spectacles et événements. Propose des idées concrètes.";

/// Answers with a chat model, keeping the whole exchange as context.
///
/// History starts with the system prompt and grows by one user and one
/// assistant turn per successful call. A failed call leaves it unchanged.
pub struct ChatResponder {
    name: String,
    client: ChatClient,
    model: String,
    conversation: Conversation,
}

impl ChatResponder {
    pub fn new(
        name: impl Into<String>,
        client: ChatClient,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            model: model.into(),
            conversation: Conversation::with_system(system_prompt),
        }
    }

    pub fn history(&self) -> &Conversation {
        &self.conversation
    }
}

#[async_trait]
impl Responder for ChatResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&mut self, text: &str) -> Result<String, ResponderError> {
        self.conversation.push(Message::user(text));

        match self
            .client
            .complete(&self.model, &self.conversation.messages, None)
            .await
        {
            Ok(reply) => {
                self.conversation.push(Message::assistant(reply.clone()));
                debug!(
                    responder = %self.name,
                    turns = self.conversation.user_turns(),
                    "Conversation extended"
                );
                Ok(reply)
            }
            Err(e) => {
                self.conversation.pop();
                Err(e)
            }
        }
    }
}
