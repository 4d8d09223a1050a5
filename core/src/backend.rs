//! Backend Selector: which of the two REST backends is active.
//!
//! # Design
//! The selector is the single piece of process-wide state. Everything
//! downstream receives a `Target` snapshot taken at call time instead of
//! reading the selector on its own, so a variant switch takes effect on the
//! next request and never changes a request already being built.
//!
//! Each switch bumps a generation counter. Fetches capture the generation in
//! a `FetchTicket` when issued; a result whose ticket is from an older
//! generation was built against the previous backend and must be discarded
//! by the caller (see `guard::ViewSlot`). In-flight requests are not
//! cancelled or retried.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::session::SessionStore;

/// Key under which the chosen variant is persisted.
pub const BACKEND_KEY: &str = "apiType";

/// The two interchangeable REST backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendVariant {
    /// camelCase payloads, denormalized fields not pre-joined.
    #[default]
    Java,
    /// snake_case payloads, appointments pre-joined with names.
    Python,
}

impl BackendVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendVariant::Java => "java",
            BackendVariant::Python => "python",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            BackendVariant::Java => 0,
            BackendVariant::Python => 1,
        }
    }

    fn from_u8(v: u8) -> Self {
        if v == 1 {
            BackendVariant::Python
        } else {
            BackendVariant::Java
        }
    }
}

impl fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendVariant {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "java" => Ok(BackendVariant::Java),
            "python" => Ok(BackendVariant::Python),
            other => Err(PortalError::Validation(format!("unknown backend variant: {other}"))),
        }
    }
}

/// A backend variant together with its base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub variant: BackendVariant,
    pub base_url: String,
}

impl Target {
    pub fn new(variant: BackendVariant, base_url: &str) -> Self {
        Self {
            variant,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn java(base_url: &str) -> Self {
        Self::new(BackendVariant::Java, base_url)
    }

    pub fn python(base_url: &str) -> Self {
        Self::new(BackendVariant::Python, base_url)
    }

    /// Absolute url for `path` (which starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Captured at the moment a fetch is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub seq: u64,
    pub target: Target,
}

/// The active backend variant, shared by every view.
///
/// Each real switch bumps a generation counter; a `FetchTicket` taken
/// before a request records the generation so late results can be
/// recognised as coming from the previous backend.
#[derive(Debug)]
pub struct BackendSelector {
    config: PortalConfig,
    variant: AtomicU8,
    generation: AtomicU64,
}

impl BackendSelector {
    /// Start on the configured default variant.
    pub fn new(config: PortalConfig) -> Self {
        let variant = config.default_backend;
        Self {
            config,
            variant: AtomicU8::new(variant.to_u8()),
            generation: AtomicU64::new(0),
        }
    }

    /// Start on the variant stored in `store`, or the configured default when
    /// nothing (or garbage) is stored.
    pub fn restore(config: PortalConfig, store: &dyn SessionStore) -> Self {
        let selector = Self::new(config);
        if let Some(stored) = store.get(BACKEND_KEY) {
            if let Ok(variant) = stored.parse() {
                selector.variant.store(BackendVariant::to_u8(variant), Ordering::SeqCst);
            }
        }
        selector
    }

    pub fn persist(&self, store: &dyn SessionStore) {
        store.set(BACKEND_KEY, self.variant().as_str());
    }

    pub fn variant(&self) -> BackendVariant {
        BackendVariant::from_u8(self.variant.load(Ordering::SeqCst))
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Switch variant. Returns `true` if the variant actually changed, in
    /// which case every outstanding ticket becomes stale.
    pub fn select(&self, variant: BackendVariant) -> bool {
        let previous = self.variant.swap(variant.to_u8(), Ordering::SeqCst);
        if previous == variant.to_u8() {
            return false;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(backend = %variant, generation, "backend variant switched");
        true
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Snapshot of the active variant and its base address.
    pub fn target(&self) -> Target {
        let variant = self.variant();
        Target::new(variant, self.config.base_url(variant))
    }

    pub fn ticket(&self, seq: u64) -> FetchTicket {
        // Generation first: a switch racing with this call leaves the ticket
        // stale rather than pairing the new target with the old generation.
        let generation = self.generation();
        FetchTicket {
            generation,
            seq,
            target: self.target(),
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn cold_start_defaults_to_java() {
        let selector = BackendSelector::new(PortalConfig::default());
        assert_eq!(selector.variant(), BackendVariant::Java);
        assert_eq!(selector.target().base_url, "http://localhost:8080");
        assert_eq!(selector.generation(), 0);
    }

    #[test]
    fn switching_changes_target_and_generation() {
        let selector = BackendSelector::new(PortalConfig::default());
        assert!(selector.select(BackendVariant::Python));
        assert_eq!(selector.target(), Target::python("http://localhost:8000/api/v1"));
        assert_eq!(selector.generation(), 1);

        // Re-selecting the same variant is a no-op.
        assert!(!selector.select(BackendVariant::Python));
        assert_eq!(selector.generation(), 1);
    }

    #[test]
    fn ticket_goes_stale_after_switch() {
        let selector = BackendSelector::new(PortalConfig::default());
        let ticket = selector.ticket(1);
        assert!(selector.is_current(&ticket));
        selector.select(BackendVariant::Python);
        assert!(!selector.is_current(&ticket));
        assert_eq!(ticket.target.variant, BackendVariant::Java);
    }

    #[test]
    fn persist_and_restore_round_trip_through_store() {
        let store = MemorySessionStore::default();
        let selector = BackendSelector::new(PortalConfig::default());
        selector.select(BackendVariant::Python);
        selector.persist(&store);

        let restored = BackendSelector::restore(PortalConfig::default(), &store);
        assert_eq!(restored.variant(), BackendVariant::Python);
    }

    #[test]
    fn restore_ignores_garbage() {
        let store = MemorySessionStore::default();
        store.set(BACKEND_KEY, "ruby");
        let restored = BackendSelector::restore(PortalConfig::default(), &store);
        assert_eq!(restored.variant(), BackendVariant::Java);
    }

    #[test]
    fn target_strips_trailing_slash() {
        let t = Target::java("http://localhost:8080/");
        assert_eq!(t.url("/consultas"), "http://localhost:8080/consultas");
    }

    #[test]
    fn variant_parses_case_insensitively() {
        assert_eq!("PYTHON".parse::<BackendVariant>().unwrap(), BackendVariant::Python);
        assert!(matches!("go".parse::<BackendVariant>(), Err(PortalError::Validation(_))));
    }
}
