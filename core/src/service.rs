//! End-to-end portal flows over a `Transport` and a `SessionStore`.
//!
//! # Design
//! `Portal` owns the three pieces of state the portal has: the backend
//! selector, the session store, and the appointment board slot. Every
//! operation takes a fresh `PortalApi` snapshot (variant, base url, token),
//! builds the request, hands it to the transport, and parses the answer.
//!
//! The appointment board needs three independent reads. They run on scoped
//! threads and are joined through `EnrichmentJoin`, so the board is produced
//! only after all three settled; the first error fails the whole load. The
//! result then goes through the board's `ViewSlot`, which drops it if the
//! backend was switched or a newer load started meanwhile.

use std::thread;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{BackendSelector, BackendVariant, Target};
use crate::client::PortalApi;
use crate::config::PortalConfig;
use crate::enrich::{self, EnrichmentJoin};
use crate::error::PortalError;
use crate::guard::ViewSlot;
use crate::http::{HttpRequest, HttpResponse};
use crate::normalize::{NormalizeWarning, Normalized};
use crate::report::{self, Period, Report};
use crate::session::{self, Credentials, LoginOutcome, Session, SessionStore};
use crate::transport::Transport;
use crate::types::{
    Appointment, AppointmentForm, AppointmentView, Patient, PatientRegistration, PatientUpdate,
    Professional, Specialty, Status,
};

/// Which appointments the board shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardScope {
    /// Every appointment (staff).
    All,
    /// One patient's appointments.
    Patient(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub views: Vec<AppointmentView>,
    /// Appointments dropped, or fields ignored, during normalization.
    pub warnings: Vec<NormalizeWarning>,
}

/// Wait for a scoped fetch; a panic in it is re-raised here.
fn settle<R>(handle: thread::ScopedJoinHandle<'_, R>) -> R {
    handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// The portal client: backend selector, session store and appointment
/// board over a blocking `Transport`.
pub struct Portal<T, S> {
    transport: T,
    store: S,
    selector: BackendSelector,
    board: ViewSlot<Vec<AppointmentView>>,
}

impl<T: Transport, S: SessionStore> Portal<T, S> {
    /// Restores the backend choice from `store`, falling back to the
    /// configured default.
    pub fn new(config: PortalConfig, transport: T, store: S) -> Self {
        let selector = BackendSelector::restore(config, &store);
        Self {
            transport,
            store,
            selector,
            board: ViewSlot::new("appointment-board"),
        }
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Router snapshot for the active backend and the stored session token.
    pub fn api(&self) -> PortalApi {
        self.api_for(self.selector.target())
    }

    fn api_for(&self, target: Target) -> PortalApi {
        let token = self.current_session().and_then(|s| s.token);
        PortalApi::new(target).with_token(token)
    }

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PortalError> {
        self.transport.execute(request)
    }

    // -----------------------------------------------------------------------
    // Backend and session
    // -----------------------------------------------------------------------

    /// Switch backend and persist the choice. A real switch clears the
    /// board, since it was loaded from the other backend.
    pub fn switch_backend(&self, variant: BackendVariant) -> bool {
        let changed = self.selector.select(variant);
        self.selector.persist(&self.store);
        if changed {
            self.board.clear();
        }
        changed
    }

    pub fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, PortalError> {
        let api = self.api();
        let request = api.build_login(credentials)?;
        let outcome = api.parse_login(credentials, self.execute(&request)?)?;
        match &outcome {
            LoginOutcome::Authenticated(session) => {
                session::save_session(&self.store, session)?;
                info!(user_id = ?session.user_id, role = %session.role, backend = %api.target().variant, "logged in");
            }
            LoginOutcome::Rejected(message) => warn!(%message, "login rejected"),
        }
        Ok(outcome)
    }

    pub fn logout(&self) {
        session::clear_session(&self.store);
        self.board.clear();
        info!("logged out");
    }

    pub fn current_session(&self) -> Option<Session> {
        session::load_session(&self.store)
    }

    // -----------------------------------------------------------------------
    // Patients
    // -----------------------------------------------------------------------

    pub fn patients(&self) -> Result<Normalized<Patient>, PortalError> {
        let api = self.api();
        let out = api.parse_list_patients(self.execute(&api.build_list_patients())?)?;
        info!(count = out.records.len(), "patients loaded");
        Ok(out)
    }

    pub fn patient(&self, id: i64) -> Result<Patient, PortalError> {
        let api = self.api();
        api.parse_get_patient(self.execute(&api.build_get_patient(id))?)
    }

    pub fn update_patient(&self, id: i64, update: &PatientUpdate) -> Result<(), PortalError> {
        let api = self.api();
        let request = api.build_update_patient(id, update)?;
        api.parse_update_patient(self.execute(&request)?)?;
        info!(patient_id = id, "patient updated");
        Ok(())
    }

    pub fn register_patient(&self, registration: &PatientRegistration) -> Result<Patient, PortalError> {
        let api = self.api();
        let request = api.build_register_patient(registration)?;
        let patient = api.parse_register_patient(self.execute(&request)?)?;
        info!(patient_id = patient.patient_id, "patient registered");
        Ok(patient)
    }

    // -----------------------------------------------------------------------
    // Catalogue
    // -----------------------------------------------------------------------

    pub fn specialties(&self) -> Result<Vec<Specialty>, PortalError> {
        let api = self.api();
        api.parse_specialties(self.execute(&api.build_list_specialties())?)
    }

    pub fn professionals(&self) -> Result<Vec<Professional>, PortalError> {
        let api = self.api();
        api.parse_professionals(self.execute(&api.build_list_professionals())?)
    }

    /// Professionals offering `specialty_id`, for the booking form.
    pub fn professionals_for_specialty(&self, specialty_id: i64) -> Result<Vec<Professional>, PortalError> {
        Ok(enrich::professionals_for_specialty(&self.professionals()?, specialty_id))
    }

    pub fn availability(&self, specialty_id: i64, date: Option<NaiveDate>) -> Result<Vec<Value>, PortalError> {
        let api = self.api();
        api.parse_availability(self.execute(&api.build_availability(specialty_id, date))?)
    }

    // -----------------------------------------------------------------------
    // Appointments
    // -----------------------------------------------------------------------

    /// Fetch and enrich appointments against `api`. The three reads run
    /// concurrently and are joined before enrichment.
    fn fetch_board(&self, api: &PortalApi, scope: BoardScope) -> Result<Board, PortalError> {
        let appointments_request = match scope {
            BoardScope::All => api.build_list_appointments(),
            BoardScope::Patient(id) => api.build_appointments_by_patient(id),
        };
        let professionals_request = api.build_list_professionals();
        let specialties_request = api.build_list_specialties();

        let (appointments, professionals, specialties) = thread::scope(|s| {
            let appointments = s.spawn(|| -> Result<Normalized<Appointment>, PortalError> {
                api.parse_appointments(self.execute(&appointments_request)?)
            });
            let professionals = s.spawn(|| -> Result<Vec<Professional>, PortalError> {
                api.parse_professionals(self.execute(&professionals_request)?)
            });
            let specialties = s.spawn(|| -> Result<Vec<Specialty>, PortalError> {
                api.parse_specialties(self.execute(&specialties_request)?)
            });
            (settle(appointments), settle(professionals), settle(specialties))
        });
        let appointments = appointments?;
        let professionals = professionals?;
        let specialties = specialties?;

        let mut join = EnrichmentJoin::new();
        join.set_professionals(professionals);
        join.set_specialties(specialties);
        let views = join.set_appointments(appointments.records).unwrap_or_default();
        Ok(Board {
            views,
            warnings: appointments.warnings,
        })
    }

    /// Load the appointment board. `Ok(None)` means the load finished after
    /// a backend switch or a newer load and its outcome was discarded. This
    /// holds for failures too: a stale error is logged, not returned.
    pub fn appointment_board(&self, scope: BoardScope) -> Result<Option<Board>, PortalError> {
        let ticket = self.board.begin(&self.selector);
        let api = self.api_for(ticket.target.clone());
        let board = match self.fetch_board(&api, scope) {
            Ok(board) => board,
            Err(err) if !self.board.is_latest(&ticket) || !self.selector.is_current(&ticket) => {
                warn!(
                    view = "appointment-board",
                    backend = %ticket.target.variant,
                    error = %err,
                    "discarding failed load that was superseded"
                );
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        if !self.board.apply(&ticket, &self.selector, board.views.clone()) {
            return Ok(None);
        }
        info!(
            count = board.views.len(),
            dropped = board.warnings.len(),
            backend = %ticket.target.variant,
            "appointment board loaded"
        );
        Ok(Some(board))
    }

    /// Last board applied, if any.
    pub fn board(&self) -> Option<Vec<AppointmentView>> {
        self.board.get()
    }

    /// Create an appointment. On failure nothing is changed locally and the
    /// error carries the backend's message.
    pub fn create_appointment(&self, form: &AppointmentForm) -> Result<Option<Appointment>, PortalError> {
        let api = self.api();
        let request = api.build_create_appointment(form)?;
        let created = api.parse_create_appointment(self.execute(&request)?)?;
        info!(appointment_id = ?created.as_ref().map(|a| a.appointment_id), "appointment created");
        Ok(created)
    }

    /// Change an appointment's status. The local board is patched only after
    /// the backend acknowledged the change.
    pub fn update_status(&self, appointment_id: i64, status: Status) -> Result<(), PortalError> {
        let api = self.api();
        let request = api.build_update_status(appointment_id, status)?;
        api.parse_update_status(self.execute(&request)?)?;
        let patched = self
            .board
            .update(|views| enrich::apply_status(views, appointment_id, status))
            .unwrap_or(false);
        info!(appointment_id, status = status.label(), patched, "appointment status updated");
        Ok(())
    }

    /// Aggregate all appointments over `period` ending on `today`.
    pub fn report(&self, period: Period, today: NaiveDate) -> Result<Report, PortalError> {
        let board = self.fetch_board(&self.api(), BoardScope::All)?;
        Ok(report::build_report(&board.views, period, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::session::{MemorySessionStore, Role, SESSION_KEY};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Mutex};

    /// Answers from a fixed table keyed by `"METHOD url"`; 404 otherwise.
    #[derive(Default)]
    struct Canned {
        routes: HashMap<String, (u16, String)>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn route(mut self, method: HttpMethod, url: &str, status: u16, body: &str) -> Self {
            self.routes.insert(format!("{method} {url}"), (status, body.to_string()));
            self
        }

        fn seen(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PortalError> {
            self.seen.lock().unwrap().push(request.clone());
            let (status, body) = self
                .routes
                .get(&format!("{} {}", request.method, request.url))
                .cloned()
                .unwrap_or((404, String::new()));
            Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body,
            })
        }
    }

    /// Holds the first request to `gate` until released, after telling the
    /// test it arrived. The held request answers `held_status` if set.
    struct Gated {
        inner: Canned,
        gate: String,
        held_status: Option<u16>,
        held: AtomicBool,
        arrived: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Transport for Gated {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PortalError> {
            if request.url == self.gate && !self.held.swap(true, Ordering::SeqCst) {
                let _ = self.arrived.lock().unwrap().send(());
                let _ = self.release.lock().unwrap().recv();
                if let Some(status) = self.held_status {
                    return Ok(HttpResponse {
                        status,
                        headers: Vec::new(),
                        body: String::new(),
                    });
                }
            }
            self.inner.execute(request)
        }
    }

    /// Start a board load that stalls on `/consultas`, run `meanwhile` on
    /// the same portal, then let the load finish.
    fn stalled_load(
        held_status: Option<u16>,
        meanwhile: impl FnOnce(&Portal<Gated, MemorySessionStore>),
    ) -> (Result<Option<Board>, PortalError>, Option<Vec<AppointmentView>>) {
        let (arrived_tx, arrived_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let transport = Gated {
            inner: java_board(),
            gate: format!("{JAVA}/consultas"),
            held_status,
            held: AtomicBool::new(false),
            arrived: Mutex::new(arrived_tx),
            release: Mutex::new(release_rx),
        };
        let portal = Portal::new(PortalConfig::default(), transport, MemorySessionStore::default());
        let result = thread::scope(|s| {
            let release = release_tx;
            let load = s.spawn(|| portal.appointment_board(BoardScope::All));
            arrived_rx.recv().unwrap();
            meanwhile(&portal);
            release.send(()).unwrap();
            load.join().unwrap()
        });
        (result, portal.board())
    }

    const JAVA: &str = "http://localhost:8080";
    const PYTHON: &str = "http://localhost:8000/api/v1";

    fn java_board() -> Canned {
        Canned::default()
            .route(
                HttpMethod::Get,
                &format!("{JAVA}/consultas"),
                200,
                r#"[{"idConsulta":1,"idPaciente":7,"idProfissional":2,"idStatus":1,"dataHoraConsulta":"2025-10-01T09:00:00"},
                    {"idConsulta":2,"idPaciente":7,"idProfissional":2,"idStatus":4,"dataHoraConsulta":"2025-10-03T10:00:00"},
                    {"idConsulta":3,"idPaciente":7,"idProfissional":2,"idStatus":1,"dataHoraConsulta":"quando der"}]"#,
            )
            .route(
                HttpMethod::Get,
                &format!("{JAVA}/profissionais"),
                200,
                r#"[{"idProfissional":2,"idEspecialidade":3,"nomeProfissionalSaude":"Dra. Helena"}]"#,
            )
            .route(
                HttpMethod::Get,
                &format!("{JAVA}/especialidades"),
                200,
                r#"[{"idEspecialidade":3,"descricaoEspecialidade":"Cardiologia"}]"#,
            )
    }

    fn portal(transport: Canned) -> Portal<Canned, MemorySessionStore> {
        Portal::new(PortalConfig::default(), transport, MemorySessionStore::default())
    }

    #[test]
    fn board_is_enriched_sorted_and_reports_drops() {
        let portal = portal(java_board());
        let board = portal.appointment_board(BoardScope::All).unwrap().unwrap();
        let ids: Vec<i64> = board.views.iter().map(|v| v.appointment_id).collect();
        assert_eq!(ids, [2, 1]);
        assert_eq!(board.views[0].professional_name, "Dra. Helena");
        assert_eq!(board.views[0].specialty, "Cardiologia");
        assert_eq!(board.warnings.len(), 1);
        assert_eq!(portal.board().map(|v| v.len()), Some(2));
    }

    #[test]
    fn one_failed_read_fails_the_board() {
        let mut transport = java_board();
        transport
            .routes
            .insert(format!("GET {JAVA}/especialidades"), (500, String::new()));
        let portal = portal(transport);
        let err = portal.appointment_board(BoardScope::All).unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(portal.board(), None);
    }

    #[test]
    fn load_finishing_after_switch_is_discarded() {
        let (result, board) = stalled_load(None, |portal| {
            assert!(portal.switch_backend(BackendVariant::Python));
        });
        assert_eq!(result.unwrap(), None);
        assert_eq!(board, None);
    }

    #[test]
    fn failure_finishing_after_switch_is_discarded() {
        let (result, board) = stalled_load(Some(500), |portal| {
            assert!(portal.switch_backend(BackendVariant::Python));
        });
        assert_eq!(result.unwrap(), None);
        assert_eq!(board, None);
    }

    #[test]
    fn failure_finishing_after_newer_load_is_discarded() {
        // The newer load is not held and succeeds; the older one then fails.
        let (result, board) = stalled_load(Some(500), |portal| {
            let newer = portal.appointment_board(BoardScope::All).unwrap().unwrap();
            assert_eq!(newer.views.len(), 2);
        });
        assert_eq!(result.unwrap(), None);
        assert_eq!(board.map(|views| views.len()), Some(2));
    }

    #[test]
    fn status_update_patches_board_after_ack() {
        let transport = java_board().route(HttpMethod::Put, &format!("{JAVA}/consultas/1/status"), 200, "");
        let portal = portal(transport);
        portal.appointment_board(BoardScope::All).unwrap();
        portal.update_status(1, Status::Confirmed).unwrap();
        let board = portal.board().unwrap();
        let patched = board.iter().find(|v| v.appointment_id == 1).unwrap();
        assert_eq!(patched.status_label, "Confirmado");
    }

    #[test]
    fn rejected_status_update_leaves_board_alone() {
        let transport = java_board().route(
            HttpMethod::Put,
            &format!("{JAVA}/consultas/1/status"),
            409,
            r#"{"message":"Transição inválida"}"#,
        );
        let portal = portal(transport);
        portal.appointment_board(BoardScope::All).unwrap();
        let err = portal.update_status(1, Status::Completed).unwrap_err();
        assert_eq!(err.user_message(), "Transição inválida");
        let board = portal.board().unwrap();
        assert_eq!(board.iter().find(|v| v.appointment_id == 1).unwrap().status_label, "Agendado");
    }

    #[test]
    fn switch_routes_next_request_and_persists() {
        let transport = Canned::default().route(
            HttpMethod::Get,
            &format!("{PYTHON}/especialidades"),
            200,
            r#"[{"id_especialidade":1,"descricao_especialidade":"Pediatria"}]"#,
        );
        let portal = portal(transport);
        assert!(portal.switch_backend(BackendVariant::Python));
        let specs = portal.specialties().unwrap();
        assert_eq!(specs[0].description.as_deref(), Some("Pediatria"));
        assert_eq!(portal.store().get(crate::backend::BACKEND_KEY).as_deref(), Some("python"));
    }

    #[test]
    fn login_persists_only_authenticated_sessions() {
        let transport = Canned::default().route(
            HttpMethod::Post,
            &format!("{JAVA}/auth/login"),
            200,
            r#"{"sucesso":true,"idUsuario":7,"nomeUsuario":"Ana","tipoUsuario":"PACIENTE","token":"tok"}"#,
        );
        let portal = portal(transport);
        let bad = portal.login(&Credentials::new("ab", "x", Role::Patient));
        assert!(matches!(bad, Err(PortalError::Validation(_))));
        assert!(portal.transport.seen().is_empty());

        let outcome = portal.login(&Credentials::new("RG123", "secret1", Role::Patient)).unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
        assert_eq!(portal.current_session().and_then(|s| s.token).as_deref(), Some("tok"));
        assert_eq!(portal.api().build_list_patients().header("Authorization"), Some("Bearer tok"));

        portal.logout();
        assert_eq!(portal.store().get(SESSION_KEY), None);
    }

    #[test]
    fn create_appointment_surfaces_python_detail() {
        let transport = Canned::default().route(
            HttpMethod::Post,
            &format!("{PYTHON}/consultas"),
            400,
            r#"{"detail":"Horário indisponível"}"#,
        );
        let portal = portal(transport);
        portal.switch_backend(BackendVariant::Python);
        let form = AppointmentForm {
            id_paciente: "7".into(),
            id_profissional: "2".into(),
            data_hora_consulta: "2025-10-01T09:00".into(),
        };
        let err = portal.create_appointment(&form).unwrap_err();
        assert_eq!(err.user_message(), "Horário indisponível");
    }

    #[test]
    fn report_uses_fetched_data() {
        let portal = portal(java_board());
        let r = portal
            .report(Period::Week, NaiveDate::from_ymd_opt(2025, 10, 3).unwrap())
            .unwrap();
        assert_eq!(r.total, 2);
        assert_eq!(r.completed, 1);
        assert_eq!(r.attendance_rate, Some(100.0));
        assert_eq!(r.top_specialty.as_deref(), Some("Cardiologia"));
    }
}
