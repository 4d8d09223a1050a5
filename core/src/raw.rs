//! Tagged decode of raw backend records.
//!
//! # Design
//! Every entity is described once by `dual_record!`: each field is listed
//! with its snake_case (Python) and camelCase (Java) key and, optionally, the
//! deserializer that reads it. The macro emits a plain field set of
//! `Option`s that can be read from either convention, so decoding never
//! guesses keys at runtime.
//!
//! Fields are decoded one at a time. A value of the wrong type leaves that
//! field empty and is reported as a `FieldIssue`; it never fails the record.
//! Callers decide which issues are fatal (identity ids) and which only
//! degrade the record.
//!
//! `decode` looks at which convention's keys a JSON object carries and
//! returns a `RawRecord` tagged with that origin. A record carrying both is
//! `Mixed` and keeps both decodes; `RawRecord::resolve` overlays them with
//! the Python value winning field by field. Keys spelled the same in both
//! conventions (`email`, `sucesso`) say nothing about origin and are ignored
//! when tagging.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::PortalError;

/// A field set described by `dual_record!`.
pub trait Fields: Sized {
    const ENTITY: &'static str;
    const SNAKE_KEYS: &'static [&'static str];
    const CAMEL_KEYS: &'static [&'static str];

    fn from_java(object: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Self;
    fn from_python(object: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Self;

    /// Field-wise `preferred.or(fallback)`.
    fn overlay(preferred: Self, fallback: Self) -> Self;

    /// Whether the named field holds a value.
    fn has(&self, field: &str) -> bool;
}

/// A value present under `key` that could not be read as `field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub key: &'static str,
    pub reason: String,
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

/// Which backend convention produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Java,
    Python,
    Mixed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord<F> {
    Java(F),
    Python(F),
    Mixed { java: F, python: F },
}

impl<F: Fields> RawRecord<F> {
    pub fn origin(&self) -> Origin {
        match self {
            RawRecord::Java(_) => Origin::Java,
            RawRecord::Python(_) => Origin::Python,
            RawRecord::Mixed { .. } => Origin::Mixed,
        }
    }

    /// Collapse to a single field set. Python wins where both are present.
    pub fn resolve(self) -> F {
        match self {
            RawRecord::Java(fields) | RawRecord::Python(fields) => fields,
            RawRecord::Mixed { java, python } => F::overlay(python, java),
        }
    }
}

/// A decoded record and the fields that were dropped while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<F> {
    pub raw: RawRecord<F>,
    pub issues: Vec<FieldIssue>,
}

/// Tag and decode one JSON object.
///
/// In a `Mixed` record an issue on one side is dropped when the other side
/// supplied that field, so an unreadable camelCase value never shadows a
/// valid snake_case one (and the reverse).
pub fn decode<F: Fields>(value: &Value) -> Result<Decoded<F>, PortalError> {
    let Some(object) = value.as_object() else {
        return Err(PortalError::Normalization {
            entity: F::ENTITY,
            reason: format!("expected a JSON object, got {}", json_kind(value)),
        });
    };

    let only_in = |keys: &[&str], other: &[&str]| {
        keys.iter()
            .any(|k| !other.contains(k) && object.get(*k).is_some_and(|v| !v.is_null()))
    };
    let has_snake = only_in(F::SNAKE_KEYS, F::CAMEL_KEYS);
    let has_camel = only_in(F::CAMEL_KEYS, F::SNAKE_KEYS);

    let mut issues = Vec::new();
    let raw = match (has_snake, has_camel) {
        (true, true) => {
            let mut java_issues = Vec::new();
            let mut python_issues = Vec::new();
            let java = F::from_java(object, &mut java_issues);
            let python = F::from_python(object, &mut python_issues);
            issues.extend(python_issues.into_iter().filter(|i| !java.has(i.field)));
            for issue in java_issues {
                if !python.has(issue.field) && !issues.iter().any(|i| i.field == issue.field) {
                    issues.push(issue);
                }
            }
            RawRecord::Mixed { java, python }
        }
        (true, false) => RawRecord::Python(F::from_python(object, &mut issues)),
        _ => RawRecord::Java(F::from_java(object, &mut issues)),
    };
    Ok(Decoded { raw, issues })
}

/// Read one key, recording a type mismatch instead of failing.
fn field<T>(
    object: &Map<String, Value>,
    field: &'static str,
    key: &'static str,
    issues: &mut Vec<FieldIssue>,
    read: impl FnOnce(&Value) -> Result<Option<T>, serde_json::Error>,
) -> Option<T> {
    let value = object.get(key)?;
    match read(value) {
        Ok(v) => v,
        Err(e) => {
            issues.push(FieldIssue {
                field,
                key,
                reason: e.to_string(),
            });
            None
        }
    }
}

/// The elements of a list response. A lone object counts as a one-element
/// list, `null` as an empty one.
pub fn items(value: Value) -> Result<Vec<Value>, PortalError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => Ok(vec![value]),
        Value::Null => Ok(Vec::new()),
        other => Err(PortalError::MalformedResponse(format!(
            "expected a list, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

macro_rules! dual_record {
    (@read $v:ident $ty:ty) => { Option::<$ty>::deserialize($v) };
    (@read $v:ident $ty:ty, $de:ident) => { $de($v) };
    (
        $(#[$meta:meta])*
        $name:ident ($entity:literal) {
            $( $field:ident : $ty:ty = $snake:literal / $camel:literal $(with $de:ident)? ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $( pub $field: Option<$ty>, )*
        }

        impl Fields for $name {
            const ENTITY: &'static str = $entity;
            const SNAKE_KEYS: &'static [&'static str] = &[$($snake),*];
            const CAMEL_KEYS: &'static [&'static str] = &[$($camel),*];

            fn from_java(object: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Self {
                Self {
                    $( $field: field(object, stringify!($field), $camel, issues, |v| {
                        dual_record!(@read v $ty $(, $de)?)
                    }), )*
                }
            }

            fn from_python(object: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Self {
                Self {
                    $( $field: field(object, stringify!($field), $snake, issues, |v| {
                        dual_record!(@read v $ty $(, $de)?)
                    }), )*
                }
            }

            fn overlay(preferred: Self, fallback: Self) -> Self {
                Self { $( $field: preferred.$field.or(fallback.$field), )* }
            }

            fn has(&self, field: &str) -> bool {
                $( if field == stringify!($field) { return self.$field.is_some(); } )*
                false
            }
        }
    };
}

dual_record! {
    AppointmentFields ("appointment") {
        id: i64 = "id_consulta" / "idConsulta" with lenient_i64,
        patient_id: i64 = "id_paciente" / "idPaciente" with lenient_i64,
        professional_id: i64 = "id_profissional" / "idProfissional" with lenient_i64,
        status_id: i64 = "id_status" / "idStatus" with lenient_i64,
        scheduled_at: String = "data_hora_consulta" / "dataHoraConsulta" with lenient_string,
        patient_name: String = "nome_paciente" / "nomePaciente" with lenient_string,
        professional_name: String = "nome_profissional_saude" / "nomeProfissionalSaude" with lenient_string,
        specialty: String = "descricao_especialidade" / "descricaoEspecialidade" with lenient_string,
        status_label: String = "descricao_status" / "descricaoStatus" with lenient_string,
    }
}

dual_record! {
    PatientFields ("patient") {
        id: i64 = "id_paciente" / "idPaciente" with lenient_i64,
        rghc: String = "identificador_rghc" / "identificadorRghc" with lenient_string,
        cpf: String = "cpf_paciente" / "cpfPaciente" with lenient_string,
        name: String = "nome_paciente" / "nomePaciente" with lenient_string,
        birth_date: String = "data_nascimento" / "dataNascimento" with lenient_string,
        blood_type: String = "tipo_sanguineo" / "tipoSanguineo" with lenient_string,
        email: String = "email" / "email" with lenient_string,
        phone: String = "telefone" / "telefone" with lenient_string,
    }
}

dual_record! {
    ProfessionalFields ("professional") {
        id: i64 = "id_profissional" / "idProfissional" with lenient_i64,
        specialty_id: i64 = "id_especialidade" / "idEspecialidade" with lenient_i64,
        name: String = "nome_profissional_saude" / "nomeProfissionalSaude" with lenient_string,
        email: String = "email_corporativo_profissional" / "emailCorporativoProfissional" with lenient_string,
    }
}

dual_record! {
    SpecialtyFields ("specialty") {
        id: i64 = "id_especialidade" / "idEspecialidade" with lenient_i64,
        description: String = "descricao_especialidade" / "descricaoEspecialidade" with lenient_string,
    }
}

dual_record! {
    LoginFields ("login response") {
        success: bool = "sucesso" / "sucesso",
        message: String = "mensagem" / "mensagem" with lenient_string,
        user_id: i64 = "id_usuario" / "idUsuario" with lenient_i64,
        user_name: String = "nome_usuario" / "nomeUsuario" with lenient_string,
        role: String = "tipo_usuario" / "tipoUsuario" with lenient_string,
        token: String = "access_token" / "token" with lenient_string,
    }
}

/// Integer ids arrive as numbers, occasionally as numeric strings.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => Ok(Some(v)),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Some(f as i64)),
                _ => Err(de::Error::custom(format!("{n} is not an integer id"))),
            },
        },
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("{s:?} is not an integer id"))),
        Some(other) => Err(de::Error::custom(format!("{} is not an integer id", json_kind(&other)))),
    }
}

/// Text fields; numbers are stringified, blanks count as absent.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("{} is not text", json_kind(&other)))),
    }
}
