//! Shape Normalizer: raw backend records to canonical domain types.
//!
//! Each entity has one mapping function over the resolved `RawRecord`. A
//! field is present when either naming variant is non-null; when both are,
//! the snake_case value wins. Missing or unreadable identity and reference
//! ids fail with `PortalError::Normalization`. Any other field holding a
//! value of the wrong type is left empty and reported as a
//! `NormalizeWarning`. An appointment whose timestamp cannot be parsed is
//! dropped from list results and reported the same way, so one bad record
//! never fails a whole fetch.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PortalError;
use crate::raw::{
    self, AppointmentFields, FieldIssue, Fields, LoginFields, PatientFields, ProfessionalFields,
    SpecialtyFields,
};
use crate::session::{LoginOutcome, Role, Session};
use crate::types::{Appointment, Patient, Professional, Specialty, NOT_SPECIFIED};

/// Records that survived normalization plus what was dropped or degraded.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub warnings: Vec<NormalizeWarning>,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeWarning {
    /// Position in the response list.
    pub index: usize,
    pub entity: &'static str,
    pub record_id: Option<i64>,
    pub reason: String,
}

enum RecordError {
    /// Fails the whole fetch.
    Fatal(PortalError),
    /// Drops this record only.
    Skip { record_id: Option<i64>, reason: String },
}

impl From<PortalError> for RecordError {
    fn from(err: PortalError) -> Self {
        RecordError::Fatal(err)
    }
}

/// A resolved field set plus the fields that could not be read.
struct Resolved<F> {
    fields: F,
    issues: Vec<FieldIssue>,
}

impl<F: Fields> Resolved<F> {
    /// An identity or reference id. Absent or unreadable is fatal.
    fn require(&self, value: Option<i64>, field: &str, keys: &str) -> Result<i64, PortalError> {
        value.ok_or_else(|| match self.issues.iter().find(|i| i.field == field) {
            Some(issue) => PortalError::Normalization {
                entity: F::ENTITY,
                reason: issue.to_string(),
            },
            None => PortalError::missing(F::ENTITY, keys),
        })
    }

    /// Reasons for every dropped field outside `identity`.
    fn degraded(&self, identity: &[&str]) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| !identity.contains(&i.field))
            .map(|i| format!("ignored malformed field {i}"))
            .collect()
    }
}

fn resolve<F: Fields>(value: &Value) -> Result<Resolved<F>, PortalError> {
    let decoded = raw::decode::<F>(value)?;
    debug!(
        entity = F::ENTITY,
        origin = ?decoded.raw.origin(),
        issues = decoded.issues.len(),
        "decoded record"
    );
    Ok(Resolved {
        fields: decoded.raw.resolve(),
        issues: decoded.issues,
    })
}

/// Log field issues for callers that have no warning list to fill.
fn log_degraded(entity: &'static str, record_id: i64, reasons: &[String]) {
    for reason in reasons {
        warn!(entity, record_id, %reason, "degrading record");
    }
}

/// A text value that is absent, or that is the sentinel echoed back by a
/// previous normalization, counts as missing.
fn text(value: Option<String>) -> Option<String> {
    value.filter(|s| s != NOT_SPECIFIED)
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp. Offsets are accepted and the wall-clock
/// time as written is kept.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Calendar day and wall-clock time truncated to the minute.
pub fn split_timestamp(raw: &str) -> Option<(NaiveDate, NaiveTime)> {
    let dt = parse_timestamp(raw)?;
    let time = NaiveTime::from_hms_opt(dt.hour(), dt.minute(), 0)?;
    Some((dt.date(), time))
}

/// Dates as `YYYY-MM-DD` (optionally followed by a time) or `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    s.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(s, "%d/%m/%Y").ok())
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

const APPOINTMENT_IDENTITY: &[&str] = &["id", "patient_id", "professional_id"];

/// The appointment and the reasons any of its fields were dropped.
fn map_appointment(value: &Value) -> Result<(Appointment, Vec<String>), RecordError> {
    if !value.is_object() {
        return Err(RecordError::Skip {
            record_id: None,
            reason: "record is not a JSON object".to_string(),
        });
    }
    let resolved: Resolved<AppointmentFields> = resolve(value)?;
    let fields = &resolved.fields;
    let appointment_id = resolved.require(fields.id, "id", "id_consulta/idConsulta")?;
    let patient_id = resolved.require(fields.patient_id, "patient_id", "id_paciente/idPaciente")?;
    let professional_id =
        resolved.require(fields.professional_id, "professional_id", "id_profissional/idProfissional")?;

    let (date, time) = match fields.scheduled_at.as_deref() {
        Some(ts) => split_timestamp(ts).ok_or_else(|| RecordError::Skip {
            record_id: Some(appointment_id),
            reason: format!("unparseable timestamp {ts:?}"),
        })?,
        None => {
            let reason = match resolved.issues.iter().find(|i| i.field == "scheduled_at") {
                Some(issue) => format!("unreadable timestamp {issue}"),
                None => "missing data_hora_consulta/dataHoraConsulta".to_string(),
            };
            return Err(RecordError::Skip {
                record_id: Some(appointment_id),
                reason,
            });
        }
    };

    let degraded = resolved.degraded(APPOINTMENT_IDENTITY);
    let fields = resolved.fields;
    let appointment = Appointment {
        appointment_id,
        patient_id,
        professional_id,
        status_code: fields.status_id,
        date,
        time,
        patient_name: text(fields.patient_name),
        professional_name: text(fields.professional_name),
        specialty: text(fields.specialty),
        status_label: text(fields.status_label),
    };
    Ok((appointment, degraded))
}

/// Normalize a single appointment record.
pub fn appointment(value: &Value) -> Result<Appointment, PortalError> {
    match map_appointment(value) {
        Ok((appointment, degraded)) => {
            log_degraded("appointment", appointment.appointment_id, &degraded);
            Ok(appointment)
        }
        Err(RecordError::Fatal(err)) => Err(err),
        Err(RecordError::Skip { reason, .. }) => Err(PortalError::Normalization {
            entity: "appointment",
            reason,
        }),
    }
}

/// Normalize a list of appointment records, dropping those with bad
/// timestamps or that are not objects at all.
pub fn appointments(values: &[Value]) -> Result<Normalized<Appointment>, PortalError> {
    let mut out = Normalized::default();
    for (index, value) in values.iter().enumerate() {
        match map_appointment(value) {
            Ok((appointment, degraded)) => {
                for reason in degraded {
                    warn!(index, appointment_id = appointment.appointment_id, %reason, "degrading appointment");
                    out.warnings.push(NormalizeWarning {
                        index,
                        entity: "appointment",
                        record_id: Some(appointment.appointment_id),
                        reason,
                    });
                }
                out.records.push(appointment);
            }
            Err(RecordError::Fatal(err)) => return Err(err),
            Err(RecordError::Skip { record_id, reason }) => {
                warn!(index, ?record_id, %reason, "dropping appointment");
                out.warnings.push(NormalizeWarning {
                    index,
                    entity: "appointment",
                    record_id,
                    reason,
                });
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Patients
// ---------------------------------------------------------------------------

fn map_patient(value: &Value) -> Result<(Patient, Vec<String>), PortalError> {
    let resolved: Resolved<PatientFields> = resolve(value)?;
    let patient_id = resolved.require(resolved.fields.id, "id", "id_paciente/idPaciente")?;
    let mut degraded = resolved.degraded(&["id"]);
    let fields = resolved.fields;
    let raw_birth = fields.birth_date;
    let birth_date = raw_birth.as_deref().and_then(parse_date);
    if let (Some(raw), None) = (&raw_birth, birth_date) {
        degraded.push(format!("unparseable birth date {raw:?}"));
    }
    let patient = Patient {
        patient_id,
        rghc: text(fields.rghc),
        cpf: text(fields.cpf),
        name: text(fields.name),
        birth_date,
        blood_type: text(fields.blood_type),
        email: text(fields.email),
        phone: text(fields.phone),
    };
    Ok((patient, degraded))
}

pub fn patient(value: &Value) -> Result<Patient, PortalError> {
    let (patient, degraded) = map_patient(value)?;
    log_degraded("patient", patient.patient_id, &degraded);
    Ok(patient)
}

/// Normalize a patient list, sorted by name. A bad birth date degrades that
/// patient (no birth date) and is reported as a warning.
pub fn patients(values: &[Value]) -> Result<Normalized<Patient>, PortalError> {
    let mut out = Normalized::default();
    for (index, value) in values.iter().enumerate() {
        let (patient, degraded) = map_patient(value)?;
        for reason in degraded {
            warn!(index, patient_id = patient.patient_id, %reason, "degrading patient");
            out.warnings.push(NormalizeWarning {
                index,
                entity: "patient",
                record_id: Some(patient.patient_id),
                reason,
            });
        }
        out.records.push(patient);
    }
    out.records
        .sort_by_cached_key(|p| (p.name.is_none(), p.display_name().to_lowercase(), p.patient_id));
    Ok(out)
}

// ---------------------------------------------------------------------------
// Professionals and specialties
// ---------------------------------------------------------------------------

pub fn professional(value: &Value) -> Result<Professional, PortalError> {
    let resolved: Resolved<ProfessionalFields> = resolve(value)?;
    let professional_id = resolved.require(resolved.fields.id, "id", "id_profissional/idProfissional")?;
    log_degraded("professional", professional_id, &resolved.degraded(&["id"]));
    let fields = resolved.fields;
    Ok(Professional {
        professional_id,
        specialty_id: fields.specialty_id,
        name: text(fields.name),
        email: text(fields.email),
    })
}

pub fn professionals(values: &[Value]) -> Result<Vec<Professional>, PortalError> {
    values.iter().map(professional).collect()
}

pub fn specialty(value: &Value) -> Result<Specialty, PortalError> {
    let resolved: Resolved<SpecialtyFields> = resolve(value)?;
    let specialty_id = resolved.require(resolved.fields.id, "id", "id_especialidade/idEspecialidade")?;
    log_degraded("specialty", specialty_id, &resolved.degraded(&["id"]));
    Ok(Specialty {
        specialty_id,
        description: text(resolved.fields.description),
    })
}

pub fn specialties(values: &[Value]) -> Result<Vec<Specialty>, PortalError> {
    values.iter().map(specialty).collect()
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Interpret a login response. `requested` is the role the user logged in
/// as, used when the backend does not echo one back.
pub fn login(value: &Value, requested: Role) -> Result<LoginOutcome, PortalError> {
    let resolved: Resolved<LoginFields> = resolve(value)?;
    for reason in resolved.degraded(&[]) {
        warn!(%reason, "degrading login response");
    }
    let fields = resolved.fields;
    let success = fields
        .success
        .unwrap_or(fields.token.is_some() || fields.user_id.is_some());
    if !success {
        let message = fields
            .message
            .unwrap_or_else(|| "Erro ao fazer login".to_string());
        return Ok(LoginOutcome::Rejected(message));
    }
    let role = fields
        .role
        .as_deref()
        .and_then(|r| r.parse().ok())
        .unwrap_or(requested);
    Ok(LoginOutcome::Authenticated(Session {
        user_id: fields.user_id,
        user_name: fields.user_name,
        role,
        token: fields.token,
    }))
}
