//! Operation Router: per-operation request builders and response parsers.
//!
//! # Design
//! `PortalApi` is stateless apart from the `Target` snapshot and session
//! token it was created with; the caller takes a fresh snapshot from the
//! `BackendSelector` for every operation, so the variant can never change
//! halfway through one request. Each operation is split into a `build_*`
//! method producing an `HttpRequest` and a `parse_*` method consuming the
//! `HttpResponse`; the caller executes the round-trip in between.
//!
//! Reads only differ in path. Writes branch on `Target::variant` because the
//! two backends expect different bodies:
//!
//! | operation             | Java                                   | Python                                   |
//! |-----------------------|----------------------------------------|------------------------------------------|
//! | create appointment    | `POST /consultas` camelCase            | `POST /consultas` snake_case             |
//! | update status         | `PUT /consultas/{id}/status`           | `PUT /consultas/status`, id in body      |
//! | by patient            | `GET /consultas/paciente/{id}`         | `GET /consultas/pacientes/{id}`          |
//! | availability          | `GET /agenda/disponibilidade`          | `GET /especialidades/disponibilidade`    |
//! | update patient        | `PUT /pacientes/{id}` camelCase        | `PUT /pacientes/{id}` snake_case         |

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::backend::{BackendVariant, Target};
use crate::error::PortalError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::normalize::{self, Normalized};
use crate::raw;
use crate::session::{Credentials, LoginOutcome};
use crate::transport::TransportClient;
use crate::types::{
    Appointment, AppointmentForm, Patient, PatientRegistration, PatientUpdate, Professional,
    Specialty, Status,
};

/// Operation router for one backend snapshot.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values for every
/// portal operation, choosing paths and body shapes by the target's
/// variant. It never touches the network; a `Transport` runs the round-trip
/// between `build_*` and `parse_*`.
#[derive(Debug, Clone)]
pub struct PortalApi {
    transport: TransportClient,
}

impl PortalApi {
    pub fn new(target: Target) -> Self {
        Self {
            transport: TransportClient::new(target),
        }
    }

    pub fn with_token(self, token: Option<String>) -> Self {
        Self {
            transport: self.transport.with_token(token),
        }
    }

    pub fn target(&self) -> &Target {
        self.transport.target()
    }

    fn variant(&self) -> BackendVariant {
        self.transport.target().variant
    }

    fn decode(&self, response: HttpResponse) -> Result<Value, PortalError> {
        self.transport.decode(response)
    }

    fn decode_items(&self, response: HttpResponse) -> Result<Vec<Value>, PortalError> {
        raw::items(self.decode(response)?)
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, PortalError> {
        credentials.validate()?;
        self.transport
            .request(HttpMethod::Post, "/auth/login", Some(credentials), &[])
    }

    /// A refused login arrives either as 2xx with `sucesso: false` or as
    /// 401/403; both become `LoginOutcome::Rejected`.
    pub fn parse_login(
        &self,
        credentials: &Credentials,
        response: HttpResponse,
    ) -> Result<LoginOutcome, PortalError> {
        match self.decode(response) {
            Ok(body) => normalize::login(&body, credentials.tipo_usuario),
            Err(err @ PortalError::Transport { status: 401 | 403, .. }) => {
                let message = match &err {
                    PortalError::Transport {
                        detail: Some(detail),
                        ..
                    } => detail.clone(),
                    _ => "Usuário ou senha inválidos".to_string(),
                };
                Ok(LoginOutcome::Rejected(message))
            }
            Err(err) => Err(err),
        }
    }

    pub fn build_register_patient(
        &self,
        registration: &PatientRegistration,
    ) -> Result<HttpRequest, PortalError> {
        registration.validate()?;
        self.transport.request(
            HttpMethod::Post,
            "/auth/pacientes/register",
            Some(registration),
            &[],
        )
    }

    /// The backend echoes the stored patient.
    pub fn parse_register_patient(&self, response: HttpResponse) -> Result<Patient, PortalError> {
        normalize::patient(&self.decode(response)?)
    }

    // -----------------------------------------------------------------------
    // Patients
    // -----------------------------------------------------------------------

    pub fn build_list_patients(&self) -> HttpRequest {
        self.transport.get("/pacientes")
    }

    pub fn parse_list_patients(&self, response: HttpResponse) -> Result<Normalized<Patient>, PortalError> {
        normalize::patients(&self.decode_items(response)?)
    }

    pub fn build_get_patient(&self, id: i64) -> HttpRequest {
        self.transport.get(&format!("/pacientes/{id}"))
    }

    pub fn parse_get_patient(&self, response: HttpResponse) -> Result<Patient, PortalError> {
        normalize::patient(&self.decode(response)?)
    }

    pub fn build_update_patient(&self, id: i64, update: &PatientUpdate) -> Result<HttpRequest, PortalError> {
        update.validate()?;
        let birth = update.birth_date.map(|d| d.format("%Y-%m-%d").to_string());
        let body = match self.variant() {
            BackendVariant::Java => json!({
                "id": id,
                "identificadorRghc": update.rghc,
                "cpfPaciente": update.cpf,
                "nomePaciente": update.name.trim(),
                "dataNascimento": birth,
                "tipoSanguineo": update.blood_type,
            }),
            BackendVariant::Python => json!({
                "id_paciente": id,
                "identificador_rghc": update.rghc,
                "cpf_paciente": update.cpf,
                "nome_paciente": update.name.trim(),
                "data_nascimento": birth,
                "tipo_sanguineo": update.blood_type,
            }),
        };
        self.transport
            .request(HttpMethod::Put, &format!("/pacientes/{id}"), Some(&body), &[])
    }

    pub fn parse_update_patient(&self, response: HttpResponse) -> Result<(), PortalError> {
        self.decode(response).map(drop)
    }

    // -----------------------------------------------------------------------
    // Appointments
    // -----------------------------------------------------------------------

    pub fn build_list_appointments(&self) -> HttpRequest {
        self.transport.get("/consultas")
    }

    pub fn build_appointments_by_patient(&self, patient_id: i64) -> HttpRequest {
        let path = match self.variant() {
            BackendVariant::Java => format!("/consultas/paciente/{patient_id}"),
            BackendVariant::Python => format!("/consultas/pacientes/{patient_id}"),
        };
        self.transport.get(&path)
    }

    /// Parses both the full list and the by-patient list.
    pub fn parse_appointments(&self, response: HttpResponse) -> Result<Normalized<Appointment>, PortalError> {
        normalize::appointments(&self.decode_items(response)?)
    }

    pub fn build_create_appointment(&self, form: &AppointmentForm) -> Result<HttpRequest, PortalError> {
        let patient_id = form.patient_id()?;
        let professional_id = form.professional_id()?;
        let scheduled_for = form.scheduled_for()?;
        let body = match self.variant() {
            BackendVariant::Java => json!({
                "idPaciente": patient_id,
                "idProfissional": professional_id,
                "dataHoraConsulta": scheduled_for,
            }),
            BackendVariant::Python => json!({
                "id_paciente": patient_id,
                "id_profissional": professional_id,
                "data_hora_consulta": scheduled_for,
            }),
        };
        self.transport
            .request(HttpMethod::Post, "/consultas", Some(&body), &[])
    }

    /// The created appointment when the backend echoes one, `None` when it
    /// acknowledges with an empty or non-record body.
    pub fn parse_create_appointment(&self, response: HttpResponse) -> Result<Option<Appointment>, PortalError> {
        let body = self.decode(response)?;
        if !body.is_object() {
            return Ok(None);
        }
        normalize::appointment(&body).map(Some)
    }

    pub fn build_update_status(&self, appointment_id: i64, status: Status) -> Result<HttpRequest, PortalError> {
        let (path, body) = match self.variant() {
            BackendVariant::Java => (
                format!("/consultas/{appointment_id}/status"),
                json!({ "novoStatus": status.code() }),
            ),
            BackendVariant::Python => (
                "/consultas/status".to_string(),
                json!({ "consulta_id": appointment_id, "id_status": status.code() }),
            ),
        };
        self.transport.request(HttpMethod::Put, &path, Some(&body), &[])
    }

    pub fn parse_update_status(&self, response: HttpResponse) -> Result<(), PortalError> {
        self.decode(response).map(drop)
    }

    // -----------------------------------------------------------------------
    // Catalogue
    // -----------------------------------------------------------------------

    pub fn build_list_specialties(&self) -> HttpRequest {
        self.transport.get("/especialidades")
    }

    pub fn parse_specialties(&self, response: HttpResponse) -> Result<Vec<Specialty>, PortalError> {
        normalize::specialties(&self.decode_items(response)?)
    }

    pub fn build_list_professionals(&self) -> HttpRequest {
        self.transport.get("/profissionais")
    }

    pub fn parse_professionals(&self, response: HttpResponse) -> Result<Vec<Professional>, PortalError> {
        normalize::professionals(&self.decode_items(response)?)
    }

    pub fn build_availability(&self, specialty_id: i64, date: Option<NaiveDate>) -> HttpRequest {
        let base = match self.variant() {
            BackendVariant::Java => "/agenda/disponibilidade",
            BackendVariant::Python => "/especialidades/disponibilidade",
        };
        let mut path = format!("{base}?especialidade={specialty_id}");
        if let Some(date) = date {
            path.push_str(&format!("&data={}", date.format("%Y-%m-%d")));
        }
        self.transport.get(&path)
    }

    /// Availability slots are passed through as the backend sent them.
    pub fn parse_availability(&self, response: HttpResponse) -> Result<Vec<Value>, PortalError> {
        self.decode_items(response)
    }
}
