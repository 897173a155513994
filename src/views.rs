//! Queries behind the list screens: open activities, history, agenda and
//! forwarded requests.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

use crate::dates;
use crate::models::ActivityRecord;
use crate::store::{missing_last, ActivityFilter};

pub const AGENDA_CATEGORY: &str = "Agenda";
pub const FORWARDED_CATEGORY: &str = "Encaminhamento";
const UNDEFINED_PRIORITY: &str = "Não definida";

/// Activities still in progress, filtered and ordered by deadline, falling
/// back to the reference date and then the start date.
pub fn open_activities(records: &[ActivityRecord], filter: &ActivityFilter) -> Vec<ActivityRecord> {
    let mut open: Vec<ActivityRecord> = records
        .iter()
        .filter(|record| !record.status.is_completed() && filter.matches(record))
        .cloned()
        .collect();
    open.sort_by(|a, b| missing_last(due_date(a), due_date(b)));
    open
}

fn due_date(record: &ActivityRecord) -> Option<NaiveDate> {
    record
        .company_deadline
        .or(record.reference_date)
        .or_else(|| record.starts_at.map(|at| at.date_naive()))
}

/// Completed activities, most recent completion first.
pub fn history(records: &[ActivityRecord], responsible: Option<&str>) -> Vec<ActivityRecord> {
    let mut done: Vec<ActivityRecord> = records
        .iter()
        .filter(|record| record.status.is_completed())
        .filter(|record| {
            responsible.map_or(true, |id| {
                record.responsible.as_ref().is_some_and(|c| c.id == id)
            })
        })
        .cloned()
        .collect();
    done.sort_by(|a, b| match (a.completed_at, b.completed_at) {
        (Some(left), Some(right)) => right.cmp(&left),
        (left, right) => missing_last(left, right),
    });
    done
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaGroups {
    pub today: Vec<ActivityRecord>,
    pub tomorrow: Vec<ActivityRecord>,
    pub this_week: Vec<ActivityRecord>,
    pub upcoming: Vec<ActivityRecord>,
    pub past: Vec<ActivityRecord>,
}

/// Agenda items bucketed by how far their start date is from `today`.
/// Items without a start date are left out.
pub fn agenda(records: &[ActivityRecord], today: NaiveDate) -> AgendaGroups {
    let mut items: Vec<&ActivityRecord> = records
        .iter()
        .filter(|record| record.category == AGENDA_CATEGORY && record.starts_at.is_some())
        .collect();
    items.sort_by_key(|record| record.starts_at);

    let mut groups = AgendaGroups::default();
    for item in items {
        let Some(start) = item.starts_at else {
            continue;
        };
        let group = match dates::days_between(today, start.date_naive()) {
            0 => &mut groups.today,
            1 => &mut groups.tomorrow,
            2..=7 => &mut groups.this_week,
            days if days > 7 => &mut groups.upcoming,
            _ => &mut groups.past,
        };
        group.push(item.clone());
    }
    groups
}

/// Forwarded requests matching `search` on title, responsible or requester,
/// ordered by priority and then deadline.
pub fn forwarded_requests(records: &[ActivityRecord], search: Option<&str>) -> Vec<ActivityRecord> {
    let needle = search.map(str::to_lowercase).unwrap_or_default();
    let mut requests: Vec<ActivityRecord> = records
        .iter()
        .filter(|record| record.category == FORWARDED_CATEGORY)
        .filter(|record| {
            needle.is_empty()
                || record.title.to_lowercase().contains(&needle)
                || [&record.responsible, &record.requester]
                    .into_iter()
                    .flatten()
                    .any(|c| c.display_name().to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();
    requests.sort_by(|a, b| {
        let rank = |record: &ActivityRecord| record.priority.map_or(5, |p| p.rank());
        rank(a)
            .cmp(&rank(b))
            .then_with(|| missing_last(a.company_deadline, b.company_deadline))
    });
    requests
}

/// Request count per priority label, in first-seen order.
pub fn priority_summary(records: &[ActivityRecord]) -> IndexMap<String, usize> {
    let mut summary = IndexMap::new();
    for record in records {
        let label = record
            .priority
            .map_or(UNDEFINED_PRIORITY, |priority| priority.label());
        *summary.entry(label.to_string()).or_insert(0) += 1;
    }
    summary
}

/// Human countdown to a deadline as seen from `today`.
pub fn deadline_countdown(today: NaiveDate, deadline: NaiveDate) -> String {
    match dates::days_between(today, deadline) {
        0 => "today".to_string(),
        days if days < 0 => format!("{} day(s) overdue", -days),
        days => format!("in {days} day(s)"),
    }
}
