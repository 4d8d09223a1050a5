//! Error types for the portal client core.
//!
//! # Design
//! One enum covers the whole taxonomy: requests that never completed, non-2xx
//! answers, undecodable 2xx bodies, records that cannot be normalized, and
//! user input rejected before any network call. `Transport` keeps the raw
//! body for debugging and a `detail` extracted with the rules of the backend
//! that produced it, since Java and Python shape their error bodies
//! differently.

use serde_json::Value;
use thiserror::Error;

use crate::backend::BackendVariant;

#[derive(Debug, Error)]
pub enum PortalError {
    /// The request could not be completed at all.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered outside the 200-299 range.
    #[error("HTTP {status}: {body}")]
    Transport {
        status: u16,
        body: String,
        detail: Option<String>,
    },

    /// 2xx response whose body is not the JSON we expected.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A record lacks an identity field under both naming conventions, or a
    /// field has the wrong JSON type.
    #[error("cannot normalize {entity}: {reason}")]
    Normalization { entity: &'static str, reason: String },

    /// User input failed a precondition; nothing was sent.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl PortalError {
    /// Build a `Transport` error, extracting a readable detail from `body`
    /// the way `variant` formats its error payloads.
    pub fn transport(variant: BackendVariant, status: u16, body: String) -> Self {
        let detail = error_detail(variant, &body);
        PortalError::Transport {
            status,
            body,
            detail,
        }
    }

    pub fn missing(entity: &'static str, field: &str) -> Self {
        PortalError::Normalization {
            entity,
            reason: format!("missing {field}"),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            PortalError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Message shown inline to the user.
    pub fn user_message(&self) -> String {
        match self {
            PortalError::Network(_) => "Erro de conexão. Tente novamente.".to_string(),
            PortalError::Transport {
                detail: Some(detail),
                ..
            } => detail.clone(),
            PortalError::Transport { status, .. } if *status == 401 || *status == 403 => {
                "Sessão expirada. Faça login novamente.".to_string()
            }
            PortalError::Transport { .. } => {
                "Erro ao comunicar com o servidor. Tente novamente mais tarde.".to_string()
            }
            PortalError::MalformedResponse(_) | PortalError::Normalization { .. } => {
                "Resposta inesperada do servidor.".to_string()
            }
            PortalError::Validation(msg) => msg.clone(),
            PortalError::Serialization(_) => "Erro interno ao preparar a requisição.".to_string(),
        }
    }
}

const MAX_TEXT_DETAIL: usize = 200;

/// Pull the human-readable part out of an error body.
///
/// Python (FastAPI) answers `{"detail": "..."}` or, for validation failures,
/// `{"detail": [{"loc": [...], "msg": "..."}]}`. Java (Spring) answers
/// `{"message": "..."}`, the portal's own `{"mensagem": "..."}`, or
/// `{"error": "..."}`. Short plain-text bodies are returned as-is; markup
/// and long text (proxy error pages) are not shown to the user.
pub fn error_detail(variant: BackendVariant, body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        let displayable = !trimmed.starts_with('<') && trimmed.chars().count() <= MAX_TEXT_DETAIL;
        return displayable.then(|| trimmed.to_string());
    };
    match variant {
        BackendVariant::Python => match value.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                (!msgs.is_empty()).then(|| msgs.join("; "))
            }
            _ => None,
        },
        BackendVariant::Java => ["message", "mensagem", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}
