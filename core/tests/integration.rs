//! End-to-end flows against the live mock server, over both dialects.
//!
//! # Design
//! Each test starts its own freshly seeded mock server on a random port in a
//! background tokio runtime, then drives `Portal` with the blocking
//! `UreqTransport` over real HTTP. The Java dialect lives at the server root
//! and the Python dialect under `/api/v1`, so one server covers both.

use std::net::SocketAddr;

use chrono::NaiveDate;
use portal_core::{
    AppointmentForm, BackendVariant, BoardScope, Credentials, LoginOutcome, MemorySessionStore,
    PatientRegistration, PatientUpdate, Period, Portal, PortalConfig, PortalError, Role, Status,
    UreqTransport, NOT_SPECIFIED,
};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn portal(variant: BackendVariant) -> Portal<UreqTransport, MemorySessionStore> {
    let addr = start_server();
    let config = PortalConfig {
        java_base_url: format!("http://{addr}"),
        python_base_url: format!("http://{addr}/api/v1"),
        default_backend: variant,
    };
    Portal::new(config, UreqTransport::new(), MemorySessionStore::default())
}

#[test]
fn both_dialects_produce_the_same_board() {
    let portal = portal(BackendVariant::Java);
    let java = portal.appointment_board(BoardScope::All).unwrap().unwrap();

    assert!(portal.switch_backend(BackendVariant::Python));
    let python = portal.appointment_board(BoardScope::All).unwrap().unwrap();

    let project = |views: &[portal_core::AppointmentView]| {
        views
            .iter()
            .map(|v| {
                (
                    v.appointment_id,
                    v.professional_name.clone(),
                    v.specialty.clone(),
                    v.status_label.clone(),
                    v.scheduled_at(),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(project(&java.views), project(&python.views));
    let ids: Vec<i64> = java.views.iter().map(|v| v.appointment_id).collect();
    assert_eq!(ids, [1, 2, 3]);
    assert_eq!(java.views[0].specialty, "Cardiologia");

    // Only Python pre-joins patient names.
    assert_eq!(java.views[0].patient_name, NOT_SPECIFIED);
    assert_eq!(python.views[0].patient_name, "Ana Silva");
}

#[test]
fn patient_scope_uses_variant_path() {
    for variant in [BackendVariant::Java, BackendVariant::Python] {
        let portal = portal(variant);
        let board = portal.appointment_board(BoardScope::Patient(1)).unwrap().unwrap();
        let ids: Vec<i64> = board.views.iter().map(|v| v.appointment_id).collect();
        assert_eq!(ids, [1, 3], "{variant}");
    }
}

#[test]
fn login_flow_per_dialect() {
    let portal = portal(BackendVariant::Java);
    let refused = portal
        .login(&Credentials::new("RG001", "errada1", Role::Patient))
        .unwrap();
    assert!(matches!(refused, LoginOutcome::Rejected(_)));
    assert!(portal.current_session().is_none());

    let ok = portal
        .login(&Credentials::new("RG001", "senha123", Role::Patient))
        .unwrap();
    assert!(matches!(ok, LoginOutcome::Authenticated(_)));
    let session = portal.current_session().unwrap();
    assert_eq!(session.user_id, Some(1));
    assert!(session.token.is_some());

    portal.logout();
    portal.switch_backend(BackendVariant::Python);
    let refused = portal
        .login(&Credentials::new("admin", "admin123", Role::Patient))
        .unwrap();
    assert_eq!(refused, LoginOutcome::Rejected("Credenciais inválidas".into()));
    let ok = portal
        .login(&Credentials::new("admin", "admin123", Role::Staff))
        .unwrap();
    match ok {
        LoginOutcome::Authenticated(session) => assert_eq!(session.role, Role::Staff),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn create_then_update_status_across_dialects() {
    let portal = portal(BackendVariant::Python);
    let form = AppointmentForm {
        id_paciente: "2".into(),
        id_profissional: "3".into(),
        data_hora_consulta: "2025-11-03T10:00".into(),
    };
    let created = portal.create_appointment(&form).unwrap().unwrap();
    assert_eq!(created.status(), Some(Status::Scheduled));
    assert_eq!(created.professional_name.as_deref(), Some("Dra. Marina Lopes"));

    portal.switch_backend(BackendVariant::Java);
    portal.appointment_board(BoardScope::Patient(2)).unwrap().unwrap();
    portal.update_status(created.appointment_id, Status::Confirmed).unwrap();

    let patched = portal.board().unwrap();
    let view = patched.iter().find(|v| v.appointment_id == created.appointment_id).unwrap();
    assert_eq!(view.status_label, "Confirmado");

    portal.switch_backend(BackendVariant::Python);
    let board = portal.appointment_board(BoardScope::Patient(2)).unwrap().unwrap();
    let view = board.views.iter().find(|v| v.appointment_id == created.appointment_id).unwrap();
    assert_eq!(view.status(), Some(Status::Confirmed));
}

#[test]
fn booking_conflict_surfaces_backend_message() {
    for variant in [BackendVariant::Java, BackendVariant::Python] {
        let portal = portal(variant);
        let form = AppointmentForm {
            id_paciente: "2".into(),
            id_profissional: "1".into(),
            data_hora_consulta: "2025-10-20T09:00:00".into(),
        };
        let err = portal.create_appointment(&form).unwrap_err();
        assert_eq!(err.status(), Some(409), "{variant}");
        assert_eq!(err.user_message(), "Horário indisponível", "{variant}");
    }
}

#[test]
fn unreachable_backend_is_a_network_error() {
    let config = PortalConfig {
        java_base_url: "http://127.0.0.1:1".into(),
        ..PortalConfig::default()
    };
    let portal = Portal::new(config, UreqTransport::new(), MemorySessionStore::default());
    let err = portal.specialties().unwrap_err();
    assert!(matches!(err, PortalError::Network(_)), "{err}");
}

#[test]
fn availability_per_dialect() {
    let date = NaiveDate::from_ymd_opt(2025, 10, 20);
    for variant in [BackendVariant::Java, BackendVariant::Python] {
        let portal = portal(variant);
        let slots = portal.availability(1, date).unwrap();
        assert_eq!(slots.len(), 3, "{variant}");
        let all = portal.availability(1, None).unwrap();
        assert_eq!(all.len(), 4, "{variant}");
    }
}

#[test]
fn patient_update_and_registration() {
    let portal = portal(BackendVariant::Java);
    let patients = portal.patients().unwrap();
    let names: Vec<&str> = patients.records.iter().map(|p| p.display_name()).collect();
    assert_eq!(names, ["Ana Silva", "João Oliveira"]);

    let mut update = PatientUpdate::from_patient(&patients.records[1]);
    update.blood_type = "B-".into();
    portal.update_patient(2, &update).unwrap();

    portal.switch_backend(BackendVariant::Python);
    let patient = portal.patient(2).unwrap();
    assert_eq!(patient.blood_type.as_deref(), Some("B-"));
    assert_eq!(patient.formatted_cpf().as_deref(), Some("555.666.777-88"));

    let registration = PatientRegistration {
        identificador_rghc: "RG321".into(),
        cpf_paciente: "32132132132".into(),
        nome_paciente: "Bruno Lima".into(),
        data_nascimento: NaiveDate::from_ymd_opt(2001, 5, 9).unwrap(),
        tipo_sanguineo: "O+".into(),
        email: None,
        telefone: None,
        senha: "segredo1".into(),
    };
    let created = portal.register_patient(&registration).unwrap();
    assert_eq!(created.name.as_deref(), Some("Bruno Lima"));

    let err = portal.patient(99).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn specialty_filter_and_report() {
    let portal = portal(BackendVariant::Python);
    let pediatrics = portal.professionals_for_specialty(2).unwrap();
    assert_eq!(pediatrics.len(), 1);
    assert_eq!(pediatrics[0].name.as_deref(), Some("Dr. Paulo Mendes"));

    let report = portal
        .report(Period::Quarter, NaiveDate::from_ymd_opt(2025, 10, 20).unwrap())
        .unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.completed, 1);
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.attendance_rate, Some(100.0));
}
