//! In-memory stand-in for both portal backends.
//!
//! # Design
//! One seeded `Store` backs two routers: the Java dialect (camelCase, no
//! pre-joined names) mounted at `/` and the Python dialect (snake_case,
//! appointments pre-joined) mounted at `/api/v1`. Writes through either
//! dialect are visible to the other. Rows are dialect-neutral; each dialect
//! module owns its wire DTOs.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub mod java;
pub mod python;

#[derive(Clone, Debug)]
pub struct PatientRow {
    pub id: i64,
    pub rghc: String,
    pub cpf: String,
    pub name: String,
    pub birth_date: String,
    pub blood_type: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ProfessionalRow {
    pub id: i64,
    pub specialty_id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct SpecialtyRow {
    pub id: i64,
    pub description: String,
}

#[derive(Clone, Debug)]
pub struct AppointmentRow {
    pub id: i64,
    pub patient_id: i64,
    pub professional_id: i64,
    pub status_id: i64,
    /// `YYYY-MM-DDTHH:MM:SS`, no offset.
    pub scheduled_at: String,
}

#[derive(Clone, Debug)]
pub struct UserRow {
    pub id: i64,
    pub login: String,
    pub password: String,
    pub name: String,
    pub role: String,
}

/// Status descriptions as the backends store them.
pub const STATUSES: [(i64, &str); 6] = [
    (1, "Agendado"),
    (2, "Confirmado"),
    (3, "Em Andamento"),
    (4, "Concluído"),
    (5, "Cancelado"),
    (6, "Não Compareceu"),
];

/// Bookable hours of every professional.
pub const SLOT_HOURS: [&str; 4] = ["08:00", "09:00", "10:00", "11:00"];

#[derive(Debug, Default)]
pub struct Store {
    pub patients: Vec<PatientRow>,
    pub professionals: Vec<ProfessionalRow>,
    pub specialties: Vec<SpecialtyRow>,
    pub appointments: Vec<AppointmentRow>,
    pub users: Vec<UserRow>,
}

pub type Db = Arc<RwLock<Store>>;

impl Store {
    pub fn seeded() -> Self {
        let specialties = vec![
            SpecialtyRow { id: 1, description: "Cardiologia".into() },
            SpecialtyRow { id: 2, description: "Pediatria".into() },
            SpecialtyRow { id: 3, description: "Dermatologia".into() },
        ];
        let professionals = vec![
            ProfessionalRow {
                id: 1,
                specialty_id: 1,
                name: "Dra. Helena Costa".into(),
                email: "helena.costa@hc.example".into(),
            },
            ProfessionalRow {
                id: 2,
                specialty_id: 2,
                name: "Dr. Paulo Mendes".into(),
                email: "paulo.mendes@hc.example".into(),
            },
            ProfessionalRow {
                id: 3,
                specialty_id: 3,
                name: "Dra. Marina Lopes".into(),
                email: "marina.lopes@hc.example".into(),
            },
        ];
        let patients = vec![
            PatientRow {
                id: 1,
                rghc: "RG001".into(),
                cpf: "11122233344".into(),
                name: "Ana Silva".into(),
                birth_date: "1985-03-15".into(),
                blood_type: "A+".into(),
                email: Some("ana.silva@mail.example".into()),
                phone: Some("(11) 98888-1111".into()),
            },
            PatientRow {
                id: 2,
                rghc: "RG002".into(),
                cpf: "55566677788".into(),
                name: "João Oliveira".into(),
                birth_date: "1990-07-22".into(),
                blood_type: "O-".into(),
                email: None,
                phone: None,
            },
        ];
        let appointments = vec![
            AppointmentRow {
                id: 1,
                patient_id: 1,
                professional_id: 1,
                status_id: 1,
                scheduled_at: "2025-10-20T09:00:00".into(),
            },
            AppointmentRow {
                id: 2,
                patient_id: 2,
                professional_id: 2,
                status_id: 4,
                scheduled_at: "2025-09-10T14:30:00".into(),
            },
            AppointmentRow {
                id: 3,
                patient_id: 1,
                professional_id: 3,
                status_id: 5,
                scheduled_at: "2025-08-05T10:00:00".into(),
            },
        ];
        let users = vec![
            UserRow {
                id: 1,
                login: "RG001".into(),
                password: "senha123".into(),
                name: "Ana Silva".into(),
                role: "PACIENTE".into(),
            },
            UserRow {
                id: 100,
                login: "admin".into(),
                password: "admin123".into(),
                name: "Equipe Recepção".into(),
                role: "COLABORADOR".into(),
            },
        ];
        Self {
            patients,
            professionals,
            specialties,
            appointments,
            users,
        }
    }

    pub fn patient(&self, id: i64) -> Option<&PatientRow> {
        self.patients.iter().find(|p| p.id == id)
    }

    pub fn professional(&self, id: i64) -> Option<&ProfessionalRow> {
        self.professionals.iter().find(|p| p.id == id)
    }

    pub fn specialty(&self, id: i64) -> Option<&SpecialtyRow> {
        self.specialties.iter().find(|s| s.id == id)
    }

    /// Check credentials; on success returns the user and a fresh token.
    pub fn authenticate(&self, login: &str, password: &str, role: &str) -> Option<(UserRow, String)> {
        let user = self
            .users
            .iter()
            .find(|u| u.login == login && u.password == password && u.role == role)?;
        Some((user.clone(), Uuid::new_v4().to_string()))
    }

    pub fn register_patient(&mut self, mut row: PatientRow, password: String) -> Result<PatientRow, String> {
        if self.patients.iter().any(|p| p.rghc == row.rghc) {
            return Err(format!("RGHC {} já cadastrado", row.rghc));
        }
        row.id = self.patients.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        self.users.push(UserRow {
            id: row.id,
            login: row.rghc.clone(),
            password,
            name: row.name.clone(),
            role: "PACIENTE".into(),
        });
        self.patients.push(row.clone());
        Ok(row)
    }

    pub fn update_patient(&mut self, id: i64, update: PatientRow) -> Option<PatientRow> {
        let patient = self.patients.iter_mut().find(|p| p.id == id)?;
        *patient = PatientRow {
            id,
            email: update.email.or_else(|| patient.email.take()),
            phone: update.phone.or_else(|| patient.phone.take()),
            ..update
        };
        Some(patient.clone())
    }

    /// Book a slot. Fails on unknown references or a taken slot.
    pub fn create_appointment(
        &mut self,
        patient_id: i64,
        professional_id: i64,
        scheduled_at: &str,
    ) -> Result<AppointmentRow, (StatusCode, String)> {
        if self.patient(patient_id).is_none() {
            return Err((StatusCode::NOT_FOUND, "Paciente não encontrado".into()));
        }
        if self.professional(professional_id).is_none() {
            return Err((StatusCode::NOT_FOUND, "Profissional não encontrado".into()));
        }
        let scheduled_at = normalize_timestamp(scheduled_at)
            .ok_or((StatusCode::BAD_REQUEST, "Data e horário inválidos".to_string()))?;
        let taken = self.appointments.iter().any(|a| {
            a.professional_id == professional_id && a.scheduled_at == scheduled_at && a.status_id != 5
        });
        if taken {
            return Err((StatusCode::CONFLICT, "Horário indisponível".into()));
        }
        let row = AppointmentRow {
            id: self.appointments.iter().map(|a| a.id).max().unwrap_or(0) + 1,
            patient_id,
            professional_id,
            status_id: 1,
            scheduled_at,
        };
        self.appointments.push(row.clone());
        Ok(row)
    }

    pub fn update_status(&mut self, id: i64, status_id: i64) -> Result<AppointmentRow, (StatusCode, String)> {
        if status_description(status_id).is_none() {
            return Err((StatusCode::BAD_REQUEST, format!("Status inválido: {status_id}")));
        }
        let row = self
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or((StatusCode::NOT_FOUND, "Consulta não encontrada".to_string()))?;
        row.status_id = status_id;
        Ok(row.clone())
    }

    /// Free `(professional, hour)` pairs for a specialty, optionally on one
    /// date. Without a date every hour is listed.
    pub fn availability(&self, specialty_id: i64, date: Option<&str>) -> Vec<(ProfessionalRow, &'static str)> {
        let mut slots = Vec::new();
        for pro in self.professionals.iter().filter(|p| p.specialty_id == specialty_id) {
            for hour in SLOT_HOURS {
                let booked = date.is_some_and(|d| {
                    let ts = format!("{d}T{hour}:00");
                    self.appointments
                        .iter()
                        .any(|a| a.professional_id == pro.id && a.scheduled_at == ts && a.status_id != 5)
                });
                if !booked {
                    slots.push((pro.clone(), hour));
                }
            }
        }
        slots
    }
}

pub fn status_description(id: i64) -> Option<&'static str> {
    STATUSES.iter().find(|(code, _)| *code == id).map(|(_, d)| *d)
}

/// Accept `YYYY-MM-DDTHH:MM[:SS]` and store it with seconds.
fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (date, time) = raw.split_once('T')?;
    if date.len() != 10 {
        return None;
    }
    match time.len() {
        5 => Some(format!("{date}T{time}:00")),
        8 => Some(raw.to_string()),
        _ => None,
    }
}

/// Which error body shape to answer with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Java,
    Python,
}

/// Error answered in the dialect's shape: Java `{"message"}`, Python
/// `{"detail"}`.
#[derive(Debug)]
pub struct ApiError {
    pub dialect: Dialect,
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(dialect: Dialect, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            dialect,
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.dialect {
            Dialect::Java => json!({ "message": self.message }),
            Dialect::Python => json!({ "detail": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .nest("/api/v1", python::router())
        .merge(java::router())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock portal backends listening (java at /, python at /api/v1)");
    }
    axum::serve(listener, app()).await
}
