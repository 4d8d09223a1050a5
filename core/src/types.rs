//! Canonical domain types, independent of backend naming.
//!
//! # Design
//! These are what the normalizer produces and the UI consumes. Identity and
//! reference ids are plain integers and always present; anything one backend
//! may omit is an `Option` here and is turned into the `NOT_SPECIFIED`
//! sentinel only at the view layer (`AppointmentView`, accessors), so a
//! missing value never reaches the UI as null or an empty string.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::PortalError;

/// Shown wherever a denormalized value could not be resolved.
pub const NOT_SPECIFIED: &str = "Não informado";

/// Label for status codes outside the known range.
pub const UNKNOWN_STATUS: &str = "Desconhecido";

pub const BLOOD_TYPES: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Status {
    Scheduled = 1,
    Confirmed = 2,
    InProgress = 3,
    Completed = 4,
    Cancelled = 5,
    NoShow = 6,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Scheduled,
        Status::Confirmed,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
        Status::NoShow,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        Status::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Scheduled => "Agendado",
            Status::Confirmed => "Confirmado",
            Status::InProgress => "Em Andamento",
            Status::Completed => "Concluído",
            Status::Cancelled => "Cancelado",
            Status::NoShow => "Não Compareceu",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled | Status::NoShow)
    }

    /// Transitions staff may trigger from this status.
    pub fn actions(self) -> &'static [StatusAction] {
        const FROM_SCHEDULED: &[StatusAction] = &[
            StatusAction { label: "Confirmar", target: Status::Confirmed },
            StatusAction { label: "Cancelar", target: Status::Cancelled },
        ];
        const FROM_CONFIRMED: &[StatusAction] = &[
            StatusAction { label: "Iniciar", target: Status::InProgress },
            StatusAction { label: "Cancelar", target: Status::Cancelled },
        ];
        const FROM_IN_PROGRESS: &[StatusAction] = &[
            StatusAction { label: "Concluir", target: Status::Completed },
            StatusAction { label: "Não Compareceu", target: Status::NoShow },
        ];
        const FROM_TERMINAL: &[StatusAction] = &[StatusAction {
            label: "Reagendar",
            target: Status::Scheduled,
        }];
        match self {
            Status::Scheduled => FROM_SCHEDULED,
            Status::Confirmed => FROM_CONFIRMED,
            Status::InProgress => FROM_IN_PROGRESS,
            Status::Completed | Status::Cancelled | Status::NoShow => FROM_TERMINAL,
        }
    }
}

impl From<Status> for i64 {
    fn from(status: Status) -> i64 {
        status.code()
    }
}

impl TryFrom<i64> for Status {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Status::from_code(code).ok_or_else(|| format!("unknown status code {code}"))
    }
}

/// Label for any status code. Total: unknown codes get `UNKNOWN_STATUS`.
pub fn status_label(code: i64) -> &'static str {
    Status::from_code(code).map_or(UNKNOWN_STATUS, Status::label)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusAction {
    pub label: &'static str,
    pub target: Status,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub patient_id: i64,
    pub rghc: Option<String>,
    pub cpf: Option<String>,
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub blood_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Patient {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(NOT_SPECIFIED)
    }

    /// Whole years completed on `today`.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        today.years_since(self.birth_date?)
    }

    pub fn formatted_cpf(&self) -> Option<String> {
        self.cpf.as_deref().map(format_cpf)
    }
}

/// `11122233344` -> `111.222.333-44`. Anything that is not exactly eleven
/// digits is returned unchanged.
pub fn format_cpf(cpf: &str) -> String {
    if cpf.len() != 11 || !cpf.bytes().all(|b| b.is_ascii_digit()) {
        return cpf.to_string();
    }
    format!("{}.{}.{}-{}", &cpf[0..3], &cpf[3..6], &cpf[6..9], &cpf[9..11])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Professional {
    pub professional_id: i64,
    pub specialty_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Specialty {
    pub specialty_id: i64,
    pub description: Option<String>,
}

/// An appointment as read from either backend.
///
/// The denormalized names are whatever the backend pre-joined (Python does,
/// Java does not); `enrich` resolves the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appointment {
    pub appointment_id: i64,
    pub patient_id: i64,
    pub professional_id: i64,
    pub status_code: Option<i64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub patient_name: Option<String>,
    pub professional_name: Option<String>,
    pub specialty: Option<String>,
    pub status_label: Option<String>,
}

impl Appointment {
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn status(&self) -> Option<Status> {
        self.status_code.and_then(Status::from_code)
    }

    /// Backend-provided label wins; otherwise the local mapping.
    pub fn status_text(&self) -> &str {
        match &self.status_label {
            Some(label) => label.as_str(),
            None => self.status_code.map_or(UNKNOWN_STATUS, status_label),
        }
    }

    /// The record in canonical form, carrying every field under both the
    /// snake_case and the camelCase name. Feeding it back through the
    /// normalizer yields this same appointment.
    pub fn to_record(&self) -> Value {
        let ts = self.scheduled_at().format("%Y-%m-%dT%H:%M:%S").to_string();
        json!({
            "id_consulta": self.appointment_id,
            "idConsulta": self.appointment_id,
            "id_paciente": self.patient_id,
            "idPaciente": self.patient_id,
            "id_profissional": self.professional_id,
            "idProfissional": self.professional_id,
            "id_status": self.status_code,
            "idStatus": self.status_code,
            "data_hora_consulta": ts,
            "dataHoraConsulta": ts,
            "nome_paciente": self.patient_name,
            "nomePaciente": self.patient_name,
            "nome_profissional_saude": self.professional_name,
            "nomeProfissionalSaude": self.professional_name,
            "descricao_especialidade": self.specialty,
            "descricaoEspecialidade": self.specialty,
            "descricao_status": self.status_label,
            "descricaoStatus": self.status_label,
        })
    }
}

/// Appointment ready for display: every text field resolved or sentineled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentView {
    pub appointment_id: i64,
    pub patient_id: i64,
    pub professional_id: i64,
    pub status_code: Option<i64>,
    pub status_label: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub patient_name: String,
    pub professional_name: String,
    pub specialty: String,
}

impl AppointmentView {
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn status(&self) -> Option<Status> {
        self.status_code.and_then(Status::from_code)
    }

    /// Record a server-acknowledged status change.
    pub fn set_status(&mut self, status: Status) {
        self.status_code = Some(status.code());
        self.status_label = status.label().to_string();
    }
}

// ---------------------------------------------------------------------------
// Form inputs
// ---------------------------------------------------------------------------

/// Booking form state. Ids arrive as strings from form controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentForm {
    pub id_paciente: String,
    pub id_profissional: String,
    pub data_hora_consulta: String,
}

impl AppointmentForm {
    pub fn patient_id(&self) -> Result<i64, PortalError> {
        parse_form_id("idPaciente", &self.id_paciente)
    }

    pub fn professional_id(&self) -> Result<i64, PortalError> {
        parse_form_id("idProfissional", &self.id_profissional)
    }

    pub fn scheduled_for(&self) -> Result<&str, PortalError> {
        let value = self.data_hora_consulta.trim();
        if value.is_empty() {
            return Err(PortalError::Validation("Data e horário são obrigatórios".to_string()));
        }
        Ok(value)
    }
}

fn parse_form_id(field: &str, raw: &str) -> Result<i64, PortalError> {
    raw.trim()
        .parse()
        .map_err(|_| PortalError::Validation(format!("{field} inválido: {raw:?}")))
}

/// Editable patient fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub rghc: String,
    pub cpf: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub blood_type: String,
}

impl PatientUpdate {
    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            rghc: patient.rghc.clone().unwrap_or_default(),
            cpf: patient.cpf.clone().unwrap_or_default(),
            name: patient.name.clone().unwrap_or_default(),
            birth_date: patient.birth_date,
            blood_type: patient.blood_type.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), PortalError> {
        if self.name.trim().is_empty() {
            return Err(PortalError::Validation("Nome do paciente é obrigatório".to_string()));
        }
        if self.birth_date.is_none() {
            return Err(PortalError::Validation("Data de nascimento é obrigatória".to_string()));
        }
        validate_blood_type(&self.blood_type)
    }
}

/// Self-registration form. Sent as-is to both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRegistration {
    pub identificador_rghc: String,
    pub cpf_paciente: String,
    pub nome_paciente: String,
    pub data_nascimento: NaiveDate,
    pub tipo_sanguineo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    pub senha: String,
}

impl PatientRegistration {
    pub fn validate(&self) -> Result<(), PortalError> {
        if self.identificador_rghc.trim().is_empty() {
            return Err(PortalError::Validation("RGHC é obrigatório".to_string()));
        }
        if self.nome_paciente.trim().is_empty() {
            return Err(PortalError::Validation("Nome do paciente é obrigatório".to_string()));
        }
        if self.senha.len() < 6 {
            return Err(PortalError::Validation(
                "A senha deve ter no mínimo 6 caracteres".to_string(),
            ));
        }
        validate_blood_type(&self.tipo_sanguineo)
    }
}

fn validate_blood_type(blood_type: &str) -> Result<(), PortalError> {
    if BLOOD_TYPES.contains(&blood_type) {
        Ok(())
    } else if blood_type.is_empty() {
        Err(PortalError::Validation("Tipo sanguíneo é obrigatório".to_string()))
    } else {
        Err(PortalError::Validation(format!("Tipo sanguíneo inválido: {blood_type}")))
    }
}
