//! Reporting aggregates over enriched appointments.
//!
//! Everything is computed from the appointments passed in; a period with no
//! data yields zero counts and no rate, never invented figures.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::types::{AppointmentView, Status, NOT_SPECIFIED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Quarter,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Day, Period::Week, Period::Month, Period::Quarter];

    pub fn days(self) -> u64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
            Period::Quarter => 90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Period::Day => "Diário (Hoje)",
            Period::Week => "Semanal",
            Period::Month => "Mensal",
            Period::Quarter => "Trimestral",
        }
    }

    /// Inclusive date range ending on `today`.
    pub fn range(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = today.checked_sub_days(Days::new(self.days() - 1)).unwrap_or(NaiveDate::MIN);
        (start, today)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub period: Period,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
    /// Percent of attended among completed plus no-show. `None` when neither
    /// occurred.
    pub attendance_rate: Option<f64>,
    pub top_specialty: Option<String>,
    pub top_patient: Option<String>,
}

impl Report {
    /// Average appointments per day over the period.
    pub fn daily_average(&self) -> f64 {
        self.total as f64 / self.period.days() as f64
    }
}

pub fn build_report(views: &[AppointmentView], period: Period, today: NaiveDate) -> Report {
    let (from, to) = period.range(today);
    let in_range: Vec<&AppointmentView> = views.iter().filter(|v| v.date >= from && v.date <= to).collect();

    let count = |status: Status| in_range.iter().filter(|v| v.status() == Some(status)).count();
    let completed = count(Status::Completed);
    let cancelled = count(Status::Cancelled);
    let no_show = count(Status::NoShow);

    let attended_base = completed + no_show;
    let attendance_rate = (attended_base > 0).then(|| completed as f64 * 100.0 / attended_base as f64);

    Report {
        period,
        from,
        to,
        total: in_range.len(),
        completed,
        cancelled,
        no_show,
        attendance_rate,
        top_specialty: most_frequent(in_range.iter().map(|v| v.specialty.as_str())),
        top_patient: most_frequent(in_range.iter().map(|v| v.patient_name.as_str())),
    }
}

/// Most frequent value, ignoring the sentinel. Ties go to the
/// alphabetically first value.
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.filter(|v| *v != NOT_SPECIFIED) {
        *counts.entry(v).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(v, _)| v.to_string())
}
