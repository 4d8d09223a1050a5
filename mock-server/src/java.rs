//! Java dialect: camelCase bodies, appointments carry ids only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppointmentRow, Db, Dialect, PatientRow, ProfessionalRow, SpecialtyRow};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
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
#[serde(rename_all = "camelCase")]
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
#[serde(rename_all = "camelCase")]
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

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Consulta {
    pub id_consulta: i64,
    pub id_paciente: i64,
    pub id_profissional: i64,
    pub id_status: i64,
    pub data_hora_consulta: String,
}

impl From<&AppointmentRow> for Consulta {
    fn from(row: &AppointmentRow) -> Self {
        Self {
            id_consulta: row.id,
            id_paciente: row.patient_id,
            id_profissional: row.professional_id,
            id_status: row.status_id,
            data_hora_consulta: row.scheduled_at.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovaConsulta {
    pub id_paciente: i64,
    pub id_profissional: i64,
    pub data_hora_consulta: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovoStatus {
    pub novo_status: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub usuario: String,
    pub senha: String,
    pub tipo_usuario: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResposta {
    pub sucesso: bool,
    pub mensagem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_usuario: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome_usuario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_usuario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Self-registration body; both dialects accept this camelCase shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cadastro {
    pub identificador_rghc: String,
    pub cpf_paciente: String,
    pub nome_paciente: String,
    pub data_nascimento: String,
    pub tipo_sanguineo: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    pub senha: String,
}

impl Cadastro {
    pub fn into_row(self) -> (PatientRow, String) {
        let row = PatientRow {
            id: 0,
            rghc: self.identificador_rghc,
            cpf: self.cpf_paciente,
            name: self.nome_paciente,
            birth_date: self.data_nascimento,
            blood_type: self.tipo_sanguineo,
            email: self.email,
            phone: self.telefone,
        };
        (row, self.senha)
    }
}

#[derive(Debug, Deserialize)]
pub struct DisponibilidadeQuery {
    pub especialidade: i64,
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Horario {
    pub id_profissional: i64,
    pub nome_profissional_saude: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub horario: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    ApiError::new(Dialect::Java, status, message)
}

pub fn router() -> Router<Db> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/pacientes/register", post(register))
        .route("/pacientes", get(list_patients))
        .route("/pacientes/{id}", get(get_patient).put(update_patient))
        .route("/consultas", get(list_appointments).post(create_appointment))
        .route("/consultas/paciente/{id}", get(appointments_by_patient))
        .route("/consultas/{id}/status", put(update_status))
        .route("/especialidades", get(list_specialties))
        .route("/profissionais", get(list_professionals))
        .route("/agenda/disponibilidade", get(availability))
}

/// Refused logins are answered 200 with `sucesso: false`.
async fn login(State(db): State<Db>, Json(input): Json<Login>) -> Json<LoginResposta> {
    let store = db.read().await;
    let resposta = match store.authenticate(&input.usuario, &input.senha, &input.tipo_usuario) {
        Some((user, token)) => LoginResposta {
            sucesso: true,
            mensagem: "Login realizado com sucesso".into(),
            id_usuario: Some(user.id),
            nome_usuario: Some(user.name),
            tipo_usuario: Some(user.role),
            token: Some(token),
        },
        None => LoginResposta {
            sucesso: false,
            mensagem: "Usuário ou senha inválidos".into(),
            id_usuario: None,
            nome_usuario: None,
            tipo_usuario: None,
            token: None,
        },
    };
    Json(resposta)
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
        .map_err(|msg| error(StatusCode::CONFLICT, msg))?;
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
    Json(store.appointments.iter().map(Consulta::from).collect())
}

async fn appointments_by_patient(State(db): State<Db>, Path(id): Path<i64>) -> Json<Vec<Consulta>> {
    let store = db.read().await;
    Json(
        store
            .appointments
            .iter()
            .filter(|a| a.patient_id == id)
            .map(Consulta::from)
            .collect(),
    )
}

async fn create_appointment(
    State(db): State<Db>,
    Json(input): Json<NovaConsulta>,
) -> Result<(StatusCode, Json<Consulta>), ApiError> {
    let row = db
        .write()
        .await
        .create_appointment(input.id_paciente, input.id_profissional, &input.data_hora_consulta)
        .map_err(|(status, msg)| error(status, msg))?;
    Ok((StatusCode::CREATED, Json(Consulta::from(&row))))
}

async fn update_status(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<NovoStatus>,
) -> Result<Json<Consulta>, ApiError> {
    let row = db
        .write()
        .await
        .update_status(id, input.novo_status)
        .map_err(|(status, msg)| error(status, msg))?;
    Ok(Json(Consulta::from(&row)))
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
