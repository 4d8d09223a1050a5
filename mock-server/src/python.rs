//! Python dialect: snake_case bodies, appointments pre-joined with names,
//! errors as `{"detail": ...}`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::java::{Cadastro, DisponibilidadeQuery};
use crate::{
    status_description, ApiError, AppointmentRow, Db, Dialect, PatientRow, ProfessionalRow, SpecialtyRow,
    Store,
};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Paciente {
    #[serde(default)]
    pub id_paciente: i64,
    pub identificador_rghc: String,
    pub cpf_paciente: String,
    pub nome_paciente: String,
    pub data_nascimento: String,
    pub tipo_sanguineo: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
}

impl From<&PatientRow> for Paciente {
    fn from(row: &PatientRow) -> Self {
        Self {
            id_paciente: row.id,
            identificador_rghc: row.rghc.clone(),
            cpf_paciente: row.cpf.clone(),
            nome_paciente: row.name.clone(),
            data_nascimento: row.birth_date.clone(),
            tipo_sanguineo: row.blood_type.clone(),
            email: row.email.clone(),
            telefone: row.phone.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Profissional {
    pub id_profissional: i64,
    pub id_especialidade: i64,
    pub nome_profissional_saude: String,
    pub email_corporativo_profissional: String,
}

impl From<&ProfessionalRow> for Profissional {
    fn from(row: &ProfessionalRow) -> Self {
        Self {
            id_profissional: row.id,
            id_especialidade: row.specialty_id,
            nome_profissional_saude: row.name.clone(),
            email_corporativo_profissional: row.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Especialidade {
    pub id_especialidade: i64,
    pub descricao_especialidade: String,
}

impl From<&SpecialtyRow> for Especialidade {
    fn from(row: &SpecialtyRow) -> Self {
        Self {
            id_especialidade: row.id,
            descricao_especialidade: row.description.clone(),
        }
    }
}

/// Appointment joined with patient, professional, specialty and status.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Consulta {
    pub id_consulta: i64,
    pub id_paciente: i64,
    pub id_profissional: i64,
    pub id_status: i64,
    pub data_hora_consulta: String,
    pub nome_paciente: Option<String>,
    pub nome_profissional_saude: Option<String>,
    pub descricao_especialidade: Option<String>,
    pub descricao_status: Option<String>,
}

impl Consulta {
    fn joined(row: &AppointmentRow, store: &Store) -> Self {
        let professional = store.professional(row.professional_id);
        Self {
            id_consulta: row.id,
            id_paciente: row.patient_id,
            id_profissional: row.professional_id,
            id_status: row.status_id,
            data_hora_consulta: row.scheduled_at.clone(),
            nome_paciente: store.patient(row.patient_id).map(|p| p.name.clone()),
            nome_profissional_saude: professional.map(|p| p.name.clone()),
            descricao_especialidade: professional
                .and_then(|p| store.specialty(p.specialty_id))
                .map(|s| s.description.clone()),
            descricao_status: status_description(row.status_id).map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NovaConsulta {
    pub id_paciente: i64,
    pub id_profissional: i64,
    pub data_hora_consulta: String,
}

#[derive(Debug, Deserialize)]
pub struct NovoStatus {
    pub consulta_id: i64,
    pub id_status: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub usuario: String,
    pub senha: String,
    pub tipo_usuario: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResposta {
    pub sucesso: bool,
    pub mensagem: String,
    pub id_usuario: i64,
    pub nome_usuario: String,
    pub tipo_usuario: String,
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Horario {
    pub id_profissional: i64,
    pub nome_profissional_saude: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub horario: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    ApiError::new(Dialect::Python, status, message)
}

pub fn router() -> Router<Db> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/pacientes/register", post(register))
        .route("/pacientes", get(list_patients))
        .route("/pacientes/{id}", get(get_patient).put(update_patient))
        .route("/consultas", get(list_appointments).post(create_appointment))
        .route("/consultas/pacientes/{id}", get(appointments_by_patient))
        .route("/consultas/status", put(update_status))
        .route("/especialidades", get(list_specialties))
        .route("/especialidades/disponibilidade", get(availability))
        .route("/profissionais", get(list_professionals))
}

/// Refused logins are answered 401.
async fn login(State(db): State<Db>, Json(input): Json<Login>) -> Result<Json<LoginResposta>, ApiError> {
    let store = db.read().await;
    let (user, token) = store
        .authenticate(&input.usuario, &input.senha, &input.tipo_usuario)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Credenciais inválidas"))?;
    Ok(Json(LoginResposta {
        sucesso: true,
        mensagem: "Login realizado com sucesso".into(),
        id_usuario: user.id,
        nome_usuario: user.name,
        tipo_usuario: user.role,
        access_token: token,
        token_type: "bearer",
    }))
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<Cadastro>,
) -> Result<(StatusCode, Json<Paciente>), ApiError> {
    let (row, password) = input.into_row();
    let row = db
        .write()
        .await
        .register_patient(row, password)
        .map_err(|msg| error(StatusCode::BAD_REQUEST, msg))?;
    Ok((StatusCode::CREATED, Json(Paciente::from(&row))))
}

async fn list_patients(State(db): State<Db>) -> Json<Vec<Paciente>> {
    let store = db.read().await;
    Json(store.patients.iter().map(Paciente::from).collect())
}

async fn get_patient(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<Paciente>, ApiError> {
    let store = db.read().await;
    store
        .patient(id)
        .map(|p| Json(Paciente::from(p)))
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Paciente não encontrado"))
}

async fn update_patient(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<Paciente>,
) -> Result<Json<Paciente>, ApiError> {
    let row = PatientRow {
        id,
        rghc: input.identificador_rghc,
        cpf: input.cpf_paciente,
        name: input.nome_paciente,
        birth_date: input.data_nascimento,
        blood_type: input.tipo_sanguineo,
        email: input.email,
        phone: input.telefone,
    };
    db.write()
        .await
        .update_patient(id, row)
        .map(|p| Json(Paciente::from(&p)))
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Paciente não encontrado"))
}

async fn list_appointments(State(db): State<Db>) -> Json<Vec<Consulta>> {
    let store = db.read().await;
    Json(
        store
            .appointments
            .iter()
            .map(|a| Consulta::joined(a, &store))
            .collect(),
    )
}

async fn appointments_by_patient(State(db): State<Db>, Path(id): Path<i64>) -> Json<Vec<Consulta>> {
    let store = db.read().await;
    Json(
        store
            .appointments
            .iter()
            .filter(|a| a.patient_id == id)
            .map(|a| Consulta::joined(a, &store))
            .collect(),
    )
}

async fn create_appointment(
    State(db): State<Db>,
    Json(input): Json<NovaConsulta>,
) -> Result<(StatusCode, Json<Consulta>), ApiError> {
    let mut store = db.write().await;
    let row = store
        .create_appointment(input.id_paciente, input.id_profissional, &input.data_hora_consulta)
        .map_err(|(status, msg)| error(status, msg))?;
    Ok((StatusCode::CREATED, Json(Consulta::joined(&row, &store))))
}

async fn update_status(
    State(db): State<Db>,
    Json(input): Json<NovoStatus>,
) -> Result<Json<Consulta>, ApiError> {
    let mut store = db.write().await;
    let row = store
        .update_status(input.consulta_id, input.id_status)
        .map_err(|(status, msg)| error(status, msg))?;
    Ok(Json(Consulta::joined(&row, &store)))
}

async fn list_specialties(State(db): State<Db>) -> Json<Vec<Especialidade>> {
    let store = db.read().await;
    Json(store.specialties.iter().map(Especialidade::from).collect())
}

async fn list_professionals(State(db): State<Db>) -> Json<Vec<Profissional>> {
    let store = db.read().await;
    Json(store.professionals.iter().map(Profissional::from).collect())
}

async fn availability(
    State(db): State<Db>,
    Query(query): Query<DisponibilidadeQuery>,
) -> Json<Vec<Horario>> {
    let store = db.read().await;
    let slots = store
        .availability(query.especialidade, query.data.as_deref())
        .into_iter()
        .map(|(pro, hour)| Horario {
            id_profissional: pro.id,
            nome_profissional_saude: pro.name,
            data: query.data.clone(),
            horario: hour.to_string(),
        })
        .collect();
    Json(slots)
}
