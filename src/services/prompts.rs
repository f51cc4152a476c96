// ABOUTME: System prompt construction for the chat assistant
// ABOUTME: Pure and deterministic given the same identity context

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! System prompt builder. A pure function of the identity context so the
//! same user always gets the same instruction message.

use crate::llm::ChatMessage;

/// Who the request is for, as far as the prompt is concerned
#[derive(Debug, Clone, Default)]
pub struct IdentityContext {
    /// Display name supplied by the client, when present
    pub name: Option<String>,
    /// Whether an authenticated user id accompanied the request
    pub is_logged_in: bool,
}

impl IdentityContext {
    /// Build an identity context from optional request headers
    #[must_use]
    pub fn new(name: Option<String>, is_logged_in: bool) -> Self {
        Self { name, is_logged_in }
    }
}

/// Build the system instruction message for a request
///
/// Deterministic: identical identity input yields an identical message.
#[must_use]
pub fn generate_system_prompt(identity: &IdentityContext) -> ChatMessage {
    let mut prompt = String::from(
        "Você é a Aurora, uma assistente virtual simpática e prestativa. \
         Responda sempre em português do Brasil, de forma clara e objetiva. \
         Você pode consultar a previsão do tempo com a ferramenta getWeather \
         quando o usuário perguntar sobre o clima; use os dados retornados \
         pela ferramenta, nunca invente valores.",
    );

    if identity.is_logged_in {
        if let Some(name) = identity.name.as_deref().filter(|n| !n.trim().is_empty()) {
            prompt.push_str(&format!(
                " O usuário se chama {name}; cumprimente-o pelo nome quando fizer sentido."
            ));
        }
        prompt.push_str(" Esta conversa fica salva no histórico do usuário.");
    } else {
        prompt.push_str(
            " Esta conversa é temporária e não será salva; não prometa lembrar \
             de nada em conversas futuras.",
        );
    }

    ChatMessage::system(prompt)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_prompt_is_deterministic() {
        let identity = IdentityContext::new(Some("Ana".to_owned()), true);
        let a = generate_system_prompt(&identity);
        let b = generate_system_prompt(&identity);
        assert_eq!(a.content, b.content);
        assert_eq!(a.role, MessageRole::System);
    }

    #[test]
    fn test_logged_in_prompt_mentions_name() {
        let identity = IdentityContext::new(Some("Ana".to_owned()), true);
        let prompt = generate_system_prompt(&identity);
        assert!(prompt.content.contains("Ana"));
        assert!(prompt.content.contains("histórico"));
    }

    #[test]
    fn test_anonymous_prompt_notes_no_persistence() {
        let identity = IdentityContext::new(None, false);
        let prompt = generate_system_prompt(&identity);
        assert!(prompt.content.contains("não será salva"));
        assert!(!prompt.content.contains("histórico do usuário"));
    }

    #[test]
    fn test_blank_name_is_ignored() {
        let identity = IdentityContext::new(Some("   ".to_owned()), true);
        let prompt = generate_system_prompt(&identity);
        assert!(!prompt.content.contains("se chama"));
    }
}
