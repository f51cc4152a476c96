// ABOUTME: Presentation filter mapping pipeline errors to user-facing text
// ABOUTME: Applied on the persistent path only, ghost requests see raw errors

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! Maps internal errors to the Portuguese messages shown in the chat UI.

use crate::errors::{AppError, ErrorCode};

/// Translate a pipeline error into the message shown to the user
///
/// Validation messages are already user-facing and pass through unchanged;
/// everything else collapses to a small set of friendly strings so internal
/// detail never leaks into the chat window.
#[must_use]
pub fn error_handler(error: &AppError) -> String {
    match error.code {
        ErrorCode::ExternalRateLimited | ErrorCode::RateLimitExceeded => {
            "Muitas mensagens em pouco tempo. Aguarde um momento e tente novamente.".to_owned()
        }
        ErrorCode::AuthRequired | ErrorCode::AuthInvalid => {
            "Sua sessão expirou ou é inválida. Faça login novamente para continuar.".to_owned()
        }
        ErrorCode::InvalidInput => error.message.clone(),
        _ => "Ocorreu um erro ao processar sua mensagem. Por favor, tente novamente.".to_owned(),
    }
}
