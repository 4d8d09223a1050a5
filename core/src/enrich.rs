//! Domain Enricher: joins appointments with professionals and specialties.
//!
//! # Design
//! Python pre-joins names into appointment records and Java does not, so the
//! enricher is the one place where the two converge. Pre-joined values are
//! kept; anything still missing is looked up by id in the reference lists;
//! anything still unresolved becomes `NOT_SPECIFIED`. Enrichment is pure and
//! total: a dangling reference is logged and sentineled, never an error.
//!
//! The three inputs are usually fetched concurrently. `EnrichmentJoin`
//! collects them and only produces views once all three have arrived, so a
//! partially joined list is never shown.

use std::collections::HashMap;

use chrono::{Local, NaiveDate};
use tracing::{debug, warn};

use crate::types::{
    Appointment, AppointmentView, Patient, Professional, Specialty, Status, NOT_SPECIFIED,
    UNKNOWN_STATUS,
};

/// Reference lists indexed by id.
struct Lookup<'a> {
    professionals: HashMap<i64, &'a Professional>,
    specialties: HashMap<i64, &'a Specialty>,
    patients: HashMap<i64, &'a Patient>,
}

impl<'a> Lookup<'a> {
    fn new(professionals: &'a [Professional], specialties: &'a [Specialty], patients: &'a [Patient]) -> Self {
        Self {
            professionals: professionals.iter().map(|p| (p.professional_id, p)).collect(),
            specialties: specialties.iter().map(|s| (s.specialty_id, s)).collect(),
            patients: patients.iter().map(|p| (p.patient_id, p)).collect(),
        }
    }

    fn professional_name(&self, id: i64) -> Option<String> {
        self.professionals.get(&id)?.name.clone()
    }

    fn specialty_of(&self, professional_id: i64) -> Option<String> {
        let specialty_id = self.professionals.get(&professional_id)?.specialty_id?;
        self.specialties.get(&specialty_id)?.description.clone()
    }

    fn patient_name(&self, id: i64) -> Option<String> {
        self.patients.get(&id)?.name.clone()
    }
}

fn view(appointment: Appointment, lookup: &Lookup<'_>) -> AppointmentView {
    let id = appointment.appointment_id;

    let professional_name = appointment
        .professional_name
        .clone()
        .or_else(|| lookup.professional_name(appointment.professional_id));
    if professional_name.is_none() {
        warn!(appointment_id = id, professional_id = appointment.professional_id, "professional not resolved");
    }

    let specialty = appointment
        .specialty
        .clone()
        .or_else(|| lookup.specialty_of(appointment.professional_id));
    if specialty.is_none() {
        warn!(appointment_id = id, professional_id = appointment.professional_id, "specialty not resolved");
    }

    let patient_name = appointment
        .patient_name
        .clone()
        .or_else(|| lookup.patient_name(appointment.patient_id));

    let status_label = appointment.status_text().to_string();
    if status_label == UNKNOWN_STATUS {
        debug!(appointment_id = id, status_code = ?appointment.status_code, "unknown status code");
    }

    AppointmentView {
        appointment_id: id,
        patient_id: appointment.patient_id,
        professional_id: appointment.professional_id,
        status_code: appointment.status_code,
        status_label,
        date: appointment.date,
        time: appointment.time,
        patient_name: patient_name.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        professional_name: professional_name.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        specialty: specialty.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
    }
}

/// Newest first; ties by appointment id so the order is stable.
fn sort_newest_first(views: &mut [AppointmentView]) {
    views.sort_by(|a, b| {
        b.scheduled_at()
            .cmp(&a.scheduled_at())
            .then(a.appointment_id.cmp(&b.appointment_id))
    });
}

/// Produce display-ready appointments.
pub fn enrich(
    appointments: Vec<Appointment>,
    professionals: &[Professional],
    specialties: &[Specialty],
) -> Vec<AppointmentView> {
    enrich_with_patients(appointments, professionals, specialties, &[])
}

/// As `enrich`, also resolving patient names (staff views).
pub fn enrich_with_patients(
    appointments: Vec<Appointment>,
    professionals: &[Professional],
    specialties: &[Specialty],
    patients: &[Patient],
) -> Vec<AppointmentView> {
    let lookup = Lookup::new(professionals, specialties, patients);
    let mut views: Vec<AppointmentView> = appointments.into_iter().map(|a| view(a, &lookup)).collect();
    sort_newest_first(&mut views);
    views
}

/// Fan-in point for the three concurrent fetches that feed `enrich`.
#[derive(Debug, Default)]
pub struct EnrichmentJoin {
    appointments: Option<Vec<Appointment>>,
    professionals: Option<Vec<Professional>>,
    specialties: Option<Vec<Specialty>>,
    done: bool,
}

impl EnrichmentJoin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_appointments(&mut self, appointments: Vec<Appointment>) -> Option<Vec<AppointmentView>> {
        self.appointments = Some(appointments);
        self.try_complete()
    }

    pub fn set_professionals(&mut self, professionals: Vec<Professional>) -> Option<Vec<AppointmentView>> {
        self.professionals = Some(professionals);
        self.try_complete()
    }

    pub fn set_specialties(&mut self, specialties: Vec<Specialty>) -> Option<Vec<AppointmentView>> {
        self.specialties = Some(specialties);
        self.try_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.done
    }

    fn try_complete(&mut self) -> Option<Vec<AppointmentView>> {
        if self.done || self.appointments.is_none() {
            return None;
        }
        let (Some(professionals), Some(specialties)) = (&self.professionals, &self.specialties) else {
            return None;
        };
        let appointments = self.appointments.take().unwrap_or_default();
        let views = enrich(appointments, professionals, specialties);
        self.done = true;
        Some(views)
    }
}

/// Appointments split relative to a calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayGroups {
    pub today: Vec<AppointmentView>,
    pub upcoming: Vec<AppointmentView>,
    pub past: Vec<AppointmentView>,
}

/// Group by calendar date only; the time of day is ignored. Each group keeps
/// the input order.
pub fn group_by_day(views: &[AppointmentView], today: NaiveDate) -> DayGroups {
    let mut groups = DayGroups::default();
    for v in views {
        let bucket = match v.date.cmp(&today) {
            std::cmp::Ordering::Equal => &mut groups.today,
            std::cmp::Ordering::Greater => &mut groups.upcoming,
            std::cmp::Ordering::Less => &mut groups.past,
        };
        bucket.push(v.clone());
    }
    groups
}

pub fn group_by_day_now(views: &[AppointmentView]) -> DayGroups {
    group_by_day(views, Local::now().date_naive())
}

/// Apply an acknowledged status change to the local list. Returns whether
/// the appointment was found.
pub fn apply_status(views: &mut [AppointmentView], appointment_id: i64, status: Status) -> bool {
    match views.iter_mut().find(|v| v.appointment_id == appointment_id) {
        Some(v) => {
            v.set_status(status);
            true
        }
        None => false,
    }
}

/// Professionals offering `specialty_id`, for the booking form.
pub fn professionals_for_specialty(professionals: &[Professional], specialty_id: i64) -> Vec<Professional> {
    professionals
        .iter()
        .filter(|p| p.specialty_id == Some(specialty_id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveTime};

    fn appointment(id: i64, professional_id: i64, day: u32, hour: u32) -> Appointment {
        Appointment {
            appointment_id: id,
            patient_id: 7,
            professional_id,
            status_code: Some(1),
            date: NaiveDate::from_ymd_opt(2025, 10, day).unwrap(),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            patient_name: None,
            professional_name: None,
            specialty: None,
            status_label: None,
        }
    }

    fn professionals() -> Vec<Professional> {
        vec![Professional {
            professional_id: 2,
            specialty_id: Some(3),
            name: Some("Dra. Helena".into()),
            email: None,
        }]
    }

    fn specialties() -> Vec<Specialty> {
        vec![Specialty {
            specialty_id: 3,
            description: Some("Cardiologia".into()),
        }]
    }

    #[test]
    fn joins_by_id() {
        let views = enrich(vec![appointment(1, 2, 1, 9)], &professionals(), &specialties());
        assert_eq!(views[0].professional_name, "Dra. Helena");
        assert_eq!(views[0].specialty, "Cardiologia");
        assert_eq!(views[0].status_label, "Agendado");
        assert_eq!(views[0].patient_name, NOT_SPECIFIED);
    }

    #[test]
    fn dangling_reference_is_sentineled() {
        let views = enrich(vec![appointment(1, 99, 1, 9)], &professionals(), &specialties());
        assert_eq!(views[0].professional_name, NOT_SPECIFIED);
        assert_eq!(views[0].specialty, NOT_SPECIFIED);
    }

    #[test]
    fn professional_without_specialty_is_sentineled() {
        let mut pros = professionals();
        pros[0].specialty_id = Some(42);
        let views = enrich(vec![appointment(1, 2, 1, 9)], &pros, &specialties());
        assert_eq!(views[0].professional_name, "Dra. Helena");
        assert_eq!(views[0].specialty, NOT_SPECIFIED);
    }

    #[test]
    fn pre_joined_values_win() {
        let mut a = appointment(1, 2, 1, 9);
        a.professional_name = Some("Dr. Paulo".into());
        a.specialty = Some("Pediatria".into());
        a.status_label = Some("Remarcado".into());
        let views = enrich(vec![a], &professionals(), &specialties());
        assert_eq!(views[0].professional_name, "Dr. Paulo");
        assert_eq!(views[0].specialty, "Pediatria");
        assert_eq!(views[0].status_label, "Remarcado");
    }

    #[test]
    fn unknown_status_code_is_labelled() {
        let mut a = appointment(1, 2, 1, 9);
        a.status_code = Some(42);
        let mut b = appointment(2, 2, 1, 9);
        b.status_code = None;
        let views = enrich(vec![a, b], &professionals(), &specialties());
        assert!(views.iter().all(|v| v.status_label == UNKNOWN_STATUS));
    }

    #[test]
    fn newest_first_with_stable_ties() {
        let list = vec![
            appointment(1, 2, 1, 9),
            appointment(3, 2, 5, 9),
            appointment(2, 2, 5, 9),
            appointment(4, 2, 5, 8),
        ];
        let ids: Vec<i64> = enrich(list, &professionals(), &specialties())
            .iter()
            .map(|v| v.appointment_id)
            .collect();
        assert_eq!(ids, [2, 3, 4, 1]);
    }

    #[test]
    fn patient_names_are_resolved_when_given() {
        let patients = vec![Patient {
            patient_id: 7,
            rghc: None,
            cpf: None,
            name: Some("Ana Silva".into()),
            birth_date: None,
            blood_type: None,
            email: None,
            phone: None,
        }];
        let views = enrich_with_patients(vec![appointment(1, 2, 1, 9)], &professionals(), &specialties(), &patients);
        assert_eq!(views[0].patient_name, "Ana Silva");
    }

    #[test]
    fn join_waits_for_all_three_inputs() {
        let mut join = EnrichmentJoin::new();
        assert!(join.set_specialties(specialties()).is_none());
        assert!(join.set_appointments(vec![appointment(1, 2, 1, 9)]).is_none());
        let views = join.set_professionals(professionals()).unwrap();
        assert_eq!(views[0].professional_name, "Dra. Helena");
        assert!(join.is_complete());
        // A late duplicate does not produce a second result.
        assert!(join.set_specialties(specialties()).is_none());
    }

    #[test]
    fn grouping_ignores_time_of_day() {
        let views = enrich(
            vec![appointment(1, 2, 1, 23), appointment(2, 2, 2, 0), appointment(3, 2, 3, 8)],
            &professionals(),
            &specialties(),
        );
        let groups = group_by_day(&views, NaiveDate::from_ymd_opt(2025, 10, 2).unwrap());
        assert_eq!(groups.today.len(), 1);
        assert_eq!(groups.today[0].appointment_id, 2);
        assert_eq!(groups.upcoming[0].appointment_id, 3);
        assert_eq!(groups.past[0].appointment_id, 1);
    }

    #[test]
    fn two_today_and_one_tomorrow() {
        let views = enrich(
            vec![appointment(1, 2, 2, 8), appointment(2, 2, 2, 17), appointment(3, 2, 3, 9)],
            &professionals(),
            &specialties(),
        );
        let groups = group_by_day(&views, NaiveDate::from_ymd_opt(2025, 10, 2).unwrap());
        assert_eq!(groups.today.len(), 2);
        assert_eq!(groups.upcoming.len(), 1);
        assert!(groups.past.is_empty());
        assert_eq!(groups.upcoming[0].appointment_id, 3);
    }

    #[test]
    fn grouping_against_the_local_clock() {
        let today = Local::now().date_naive();
        let on = |id: i64, date: NaiveDate| Appointment {
            date,
            ..appointment(id, 2, 1, 9)
        };
        let views = enrich(
            vec![
                on(1, today),
                on(2, today),
                on(3, today + Days::new(1)),
                on(4, today - Days::new(1)),
            ],
            &professionals(),
            &specialties(),
        );
        let groups = group_by_day_now(&views);
        let ids = |group: &[AppointmentView]| {
            let mut ids: Vec<i64> = group.iter().map(|v| v.appointment_id).collect();
            ids.sort_unstable();
            ids
        };
        assert_eq!(ids(&groups.today), [1, 2]);
        assert_eq!(ids(&groups.upcoming), [3]);
        assert_eq!(ids(&groups.past), [4]);
    }

    #[test]
    fn status_patch_only_touches_target() {
        let mut views = enrich(
            vec![appointment(1, 2, 1, 9), appointment(2, 2, 2, 9)],
            &professionals(),
            &specialties(),
        );
        assert!(apply_status(&mut views, 1, Status::Cancelled));
        assert!(!apply_status(&mut views, 99, Status::Cancelled));
        let first = views.iter().find(|v| v.appointment_id == 1).unwrap();
        assert_eq!(first.status_label, "Cancelado");
        assert_eq!(first.status_code, Some(5));
        let second = views.iter().find(|v| v.appointment_id == 2).unwrap();
        assert_eq!(second.status_label, "Agendado");
    }

    #[test]
    fn specialty_filter() {
        let mut pros = professionals();
        pros.push(Professional {
            professional_id: 5,
            specialty_id: None,
            name: None,
            email: None,
        });
        let matching = professionals_for_specialty(&pros, 3);
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].professional_id, 2);
        assert!(professionals_for_specialty(&pros, 9).is_empty());
    }
}
