//! Client core for the hospital scheduling portal.
//!
//! # Overview
//! The portal talks to one of two interchangeable REST backends: a Java
//! service with camelCase payloads and a Python service with snake_case
//! payloads, different paths for a few operations, and different write
//! bodies. This crate hides that difference behind one domain model.
//!
//! # Design
//! - `BackendSelector` holds the active variant; everything downstream gets
//!   a `Target` snapshot taken at call time.
//! - `PortalApi` splits each operation into `build_*` (produces an
//!   `HttpRequest`) and `parse_*` (consumes an `HttpResponse`), so the I/O
//!   boundary is explicit and the core is deterministic. `Transport`
//!   executes the round-trip; `UreqTransport` is the blocking network one.
//! - `raw` decodes records as tagged Java/Python/mixed variants and
//!   `normalize` maps them to canonical types. `enrich` joins appointments
//!   with professionals and specialties for display.
//! - `Portal` wires the flows together with a `SessionStore` and drops
//!   results that arrive after a backend switch.

pub mod backend;
pub mod client;
pub mod config;
pub mod enrich;
pub mod error;
pub mod guard;
pub mod http;
pub mod normalize;
pub mod raw;
pub mod report;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;

pub use backend::{BackendSelector, BackendVariant, FetchTicket, Target};
pub use client::PortalApi;
pub use config::PortalConfig;
pub use enrich::{enrich, DayGroups, EnrichmentJoin};
pub use error::PortalError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::{NormalizeWarning, Normalized};
pub use report::{Period, Report};
pub use service::{Board, BoardScope, Portal};
pub use session::{Credentials, LoginOutcome, MemorySessionStore, Role, Session, SessionStore};
pub use transport::{Transport, TransportClient, UreqTransport};
pub use types::{
    Appointment, AppointmentForm, AppointmentView, Patient, PatientRegistration, PatientUpdate,
    Professional, Specialty, Status, NOT_SPECIFIED,
};
