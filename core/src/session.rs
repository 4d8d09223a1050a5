//! Authenticated session and the key-value store it lives in.
//!
//! The store is an external collaborator (browser local storage in the
//! original portal); `MemorySessionStore` backs tests and headless use.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PortalError;

pub const SESSION_KEY: &str = "userToken";
pub const USER_ID_KEY: &str = "userId";

/// Minimal get/set/remove contract of the session store.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "PACIENTE", alias = "PATIENT")]
    Patient,
    #[serde(rename = "COLABORADOR", alias = "STAFF")]
    Staff,
}

impl Role {
    /// Value sent as `tipoUsuario`.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::Patient => "PACIENTE",
            Role::Staff => "COLABORADOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PACIENTE" | "PATIENT" => Ok(Role::Patient),
            "COLABORADOR" | "STAFF" => Ok(Role::Staff),
            other => Err(PortalError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Login request body, identical for both backends.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub usuario: String,
    pub senha: String,
    #[serde(rename = "tipoUsuario")]
    pub tipo_usuario: Role,
}

impl Credentials {
    pub fn new(usuario: &str, senha: &str, role: Role) -> Self {
        Self {
            usuario: usuario.trim().to_string(),
            senha: senha.to_string(),
            tipo_usuario: role,
        }
    }

    /// Checked before any network call.
    pub fn validate(&self) -> Result<(), PortalError> {
        if self.usuario.is_empty() || self.senha.is_empty() {
            return Err(PortalError::Validation("RGHC e senha são obrigatórios".to_string()));
        }
        if self.usuario.chars().count() < 3 || self.senha.chars().count() < 6 {
            return Err(PortalError::Validation(
                "O usuário deve ter no mínimo 3 caracteres e a senha deve ter no mínimo 6 caracteres."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "idUsuario")]
    pub user_id: Option<i64>,
    #[serde(rename = "nomeUsuario")]
    pub user_name: Option<String>,
    #[serde(rename = "tipoUsuario")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(Session),
    /// The backend answered but refused; the message is shown inline.
    Rejected(String),
}

pub fn save_session(store: &dyn SessionStore, session: &Session) -> Result<(), PortalError> {
    let json = serde_json::to_string(session).map_err(|e| PortalError::Serialization(e.to_string()))?;
    store.set(SESSION_KEY, &json);
    store.set(
        USER_ID_KEY,
        &session.user_id.map(|id| id.to_string()).unwrap_or_default(),
    );
    Ok(())
}

/// The stored session, if any. A value that no longer parses is removed.
pub fn load_session(store: &dyn SessionStore) -> Option<Session> {
    let raw = store.get(SESSION_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(error = %e, "discarding unreadable stored session");
            clear_session(store);
            None
        }
    }
}

pub fn clear_session(store: &dyn SessionStore) {
    store.remove(SESSION_KEY);
    store.remove(USER_ID_KEY);
}
