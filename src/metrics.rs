use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use indexmap::IndexMap;
use tracing::debug;

use crate::dates;
use crate::models::{ActivityRecord, ComplianceRate, DashboardMetrics, MonthlyBucket, Status};

pub const OBLIGATIONS_CATEGORY: &str = "Obrigações";
pub const DEFAULT_CRITICAL_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsOptions {
    /// Only records with this category are counted; `None` counts everything.
    pub category: Option<String>,
    pub critical_limit: usize,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            category: Some(OBLIGATIONS_CATEGORY.to_string()),
            critical_limit: DEFAULT_CRITICAL_LIMIT,
        }
    }
}

/// Computes the dashboard from scratch.
///
/// The evaluation date is the calendar date of `now` in its own timezone.
/// Deadlines are date-only, so a deadline equal to that date is never overdue
/// regardless of the hour or offset of `now`.
pub fn aggregate<Tz: TimeZone>(
    records: &[ActivityRecord],
    now: &DateTime<Tz>,
    options: &MetricsOptions,
) -> DashboardMetrics {
    let today = now.date_naive();
    let in_scope: Vec<&ActivityRecord> = records
        .iter()
        .filter(|record| {
            options
                .category
                .as_deref()
                .map_or(true, |category| record.category == category)
        })
        .collect();

    let total = in_scope.len();
    let mut pending_count = 0;
    let mut completed_count = 0;
    let mut on_time_count = 0;
    let mut overdue_or_at_risk_count = 0;
    let mut status_distribution = IndexMap::new();
    let mut months: BTreeMap<(i32, u32), MonthlyBucket> = BTreeMap::new();

    for record in &in_scope {
        *status_distribution.entry(record.status).or_insert(0) += 1;

        let completed = record.status.is_completed();
        let on_time = completed && delivered_on_time(record);
        let overdue = is_overdue(record, today);

        if completed {
            completed_count += 1;
            if on_time {
                on_time_count += 1;
            }
        } else {
            pending_count += 1;
        }
        if record.status == Status::CompletedLate || overdue {
            overdue_or_at_risk_count += 1;
        }

        if let Some(reference) = record.reference_date {
            let bucket = months
                .entry((reference.year(), reference.month()))
                .or_insert_with(|| MonthlyBucket {
                    month: dates::month_label(reference),
                    on_time: 0,
                    late: 0,
                    overdue_unfulfilled: 0,
                });
            if on_time {
                bucket.on_time += 1;
            } else if completed {
                bucket.late += 1;
            } else if overdue {
                bucket.overdue_unfulfilled += 1;
            }
        }
    }

    let compliance_rate = compliance_rate(on_time_count, completed_count);

    let mut critical_items: Vec<ActivityRecord> = in_scope
        .iter()
        .filter(|record| is_open(record) && record.company_deadline.is_some())
        .map(|record| (*record).clone())
        .collect();
    critical_items.sort_by_key(|record| record.company_deadline);
    critical_items.truncate(options.critical_limit);

    debug!(
        total,
        pending_count,
        completed_count,
        on_time_count,
        overdue_or_at_risk_count,
        %today,
        "aggregated dashboard metrics"
    );

    DashboardMetrics {
        total,
        pending_count,
        on_time_count,
        overdue_or_at_risk_count,
        compliance_rate,
        status_distribution,
        delivery_trend: months.into_values().collect(),
        critical_items,
    }
}

/// On time when the completion date is on or before the company deadline.
/// Without both dates the status decides: `Completed` counts as on time.
pub fn delivered_on_time(record: &ActivityRecord) -> bool {
    match (record.completed_at, record.company_deadline) {
        (Some(done), Some(deadline)) => done.date_naive() <= deadline,
        _ => record.status == Status::Completed,
    }
}

/// Not completed by status and not carrying a completion timestamp.
pub fn is_open(record: &ActivityRecord) -> bool {
    !record.status.is_completed() && record.completed_at.is_none()
}

pub fn is_overdue(record: &ActivityRecord, today: NaiveDate) -> bool {
    is_open(record)
        && record
            .company_deadline
            .is_some_and(|deadline| deadline < today)
}

pub fn compliance_rate(on_time: usize, completed: usize) -> ComplianceRate {
    if completed == 0 {
        return ComplianceRate::NotAvailable;
    }
    let percentage = on_time as f64 / completed as f64 * 100.0;
    ComplianceRate::Percentage((percentage * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    fn date(value: &str) -> NaiveDate {
        value.parse().unwrap()
    }

    fn obligation(id: &str, status: Status, deadline: Option<&str>) -> ActivityRecord {
        let mut record = ActivityRecord::new(format!("Obrigação {id}"), OBLIGATIONS_CATEGORY, status);
        record.id = id.to_string();
        record.company_deadline = deadline.map(date);
        record
    }

    fn completed_on(mut record: ActivityRecord, day: &str) -> ActivityRecord {
        record.completed_at = date(day).and_hms_opt(12, 0, 0).map(|at| at.and_utc());
        record
    }

    fn noon_utc(day: &str) -> DateTime<Utc> {
        date(day).and_hms_opt(12, 0, 0).unwrap().and_utc()
    }

    #[test]
    fn on_time_and_late_completions() {
        let records = vec![
            completed_on(obligation("a", Status::Completed, Some("2025-05-14")), "2025-05-10"),
            completed_on(
                obligation("b", Status::CompletedLate, Some("2025-06-17")),
                "2025-06-20",
            ),
        ];

        let metrics = aggregate(&records, &noon_utc("2025-07-01"), &MetricsOptions::default());
        assert_eq!(metrics.total, 2);
        assert_eq!(metrics.on_time_count, 1);
        assert_eq!(metrics.overdue_or_at_risk_count, 1);
        assert_eq!(metrics.compliance_rate, ComplianceRate::Percentage(50.0));
        assert_eq!(metrics.pending_count, 0);
    }

    #[test]
    fn empty_input_is_zero_valued() {
        let metrics = aggregate(&[], &noon_utc("2025-07-01"), &MetricsOptions::default());
        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.compliance_rate, ComplianceRate::NotAvailable);
        assert!(metrics.critical_items.is_empty());
        assert!(metrics.status_distribution.is_empty());
        assert!(metrics.delivery_trend.is_empty());
    }

    #[test]
    fn open_overdue_record_is_at_risk_and_critical() {
        let now = noon_utc("2025-07-10");
        let deadline = (now.date_naive() - Duration::days(3)).to_string();
        let records = vec![obligation("late", Status::InProgress, Some(&deadline))];

        let metrics = aggregate(&records, &now, &MetricsOptions::default());
        assert_eq!(metrics.overdue_or_at_risk_count, 1);
        assert_eq!(metrics.critical_items.len(), 1);
        assert_eq!(metrics.critical_items[0].id, "late");
    }

    #[test]
    fn deadline_day_is_never_overdue_in_any_timezone() {
        let records = vec![obligation("due", Status::Pending, Some("2025-06-17"))];
        let zones = [-12, -3, 0, 5, 14];

        for hours in zones {
            let offset = FixedOffset::east_opt(hours * 3600).unwrap();
            for hour in [0, 12, 23] {
                let now = offset
                    .with_ymd_and_hms(2025, 6, 17, hour, 59, 59)
                    .single()
                    .unwrap();
                let metrics = aggregate(&records, &now, &MetricsOptions::default());
                assert_eq!(
                    metrics.overdue_or_at_risk_count, 0,
                    "offset {hours}h at {hour}:59"
                );
            }
        }

        let next_day = noon_utc("2025-06-18");
        let metrics = aggregate(&records, &next_day, &MetricsOptions::default());
        assert_eq!(metrics.overdue_or_at_risk_count, 1);
    }

    #[test]
    fn completion_compares_dates_not_instants() {
        let mut record = obligation("edge", Status::Completed, Some("2025-05-14"));
        record.completed_at = Some(
            date("2025-05-14")
                .and_hms_opt(23, 59, 0)
                .unwrap()
                .and_utc(),
        );
        assert!(delivered_on_time(&record));

        record.completed_at = Some(date("2025-05-15").and_hms_opt(0, 0, 1).unwrap().and_utc());
        assert!(!delivered_on_time(&record));
    }

    #[test]
    fn status_decides_when_dates_are_missing() {
        assert!(delivered_on_time(&obligation("a", Status::Completed, None)));
        assert!(!delivered_on_time(&obligation("b", Status::CompletedLate, None)));
    }

    #[test]
    fn counts_partition_the_scope() {
        let records = vec![
            obligation("a", Status::Pending, Some("2025-07-01")),
            obligation("b", Status::Approved, None),
            obligation("c", Status::Rejected, Some("2025-09-01")),
            completed_on(obligation("d", Status::Completed, Some("2025-06-01")), "2025-06-10"),
            obligation("e", Status::CompletedLate, None),
            obligation("f", Status::InPreparation, Some("2025-06-30")),
        ];

        let metrics = aggregate(&records, &noon_utc("2025-07-15"), &MetricsOptions::default());
        assert_eq!(metrics.total, 6);
        assert_eq!(metrics.pending_count + metrics.completed_count(), metrics.total);
        assert_eq!(metrics.completed_count(), 2);
        assert_eq!(metrics.on_time_count, 0);
        assert_eq!(metrics.compliance_rate, ComplianceRate::Percentage(0.0));
        // e (late) + a and f (open, past deadline)
        assert_eq!(metrics.overdue_or_at_risk_count, 3);
    }

    #[test]
    fn category_scope_filters_records() {
        let mut agenda = obligation("meeting", Status::Pending, Some("2025-01-01"));
        agenda.category = "Agenda".to_string();
        let records = vec![agenda, obligation("ob", Status::Pending, None)];

        let scoped = aggregate(&records, &noon_utc("2025-07-01"), &MetricsOptions::default());
        assert_eq!(scoped.total, 1);
        assert_eq!(scoped.overdue_or_at_risk_count, 0);

        let everything = MetricsOptions {
            category: None,
            ..MetricsOptions::default()
        };
        let all = aggregate(&records, &noon_utc("2025-07-01"), &everything);
        assert_eq!(all.total, 2);
        assert_eq!(all.overdue_or_at_risk_count, 1);
    }

    #[test]
    fn distribution_keeps_first_seen_order() {
        let records = vec![
            obligation("a", Status::InProgress, None),
            obligation("b", Status::Pending, None),
            obligation("c", Status::InProgress, None),
        ];

        let metrics = aggregate(&records, &noon_utc("2025-07-01"), &MetricsOptions::default());
        let entries: Vec<(Status, usize)> = metrics
            .status_distribution
            .iter()
            .map(|(status, count)| (*status, *count))
            .collect();
        assert_eq!(entries, vec![(Status::InProgress, 2), (Status::Pending, 1)]);
    }

    #[test]
    fn trend_buckets_are_chronological() {
        let mut records = Vec::new();
        for (id, reference, status, deadline) in [
            ("jan", "2025-01-01", Status::Completed, Some("2025-02-20")),
            ("dec", "2024-12-01", Status::CompletedLate, Some("2025-01-20")),
            ("jul", "2025-07-01", Status::Pending, Some("2025-08-19")),
            ("jun", "2025-06-01", Status::Pending, Some("2025-07-20")),
            ("jun2", "2025-06-01", Status::Completed, Some("2025-07-24")),
        ] {
            let mut record = obligation(id, status, deadline);
            record.reference_date = Some(date(reference));
            records.push(record);
        }
        records.push(obligation("undated", Status::Completed, None));

        let metrics = aggregate(&records, &noon_utc("2025-08-01"), &MetricsOptions::default());
        let months: Vec<&str> = metrics
            .delivery_trend
            .iter()
            .map(|bucket| bucket.month.as_str())
            .collect();
        assert_eq!(months, vec!["dez/24", "jan/25", "jun/25", "jul/25"]);

        let june = &metrics.delivery_trend[2];
        assert_eq!(june.on_time, 1);
        assert_eq!(june.overdue_unfulfilled, 1);
        assert_eq!(metrics.delivery_trend[0].late, 1);
        assert_eq!(metrics.delivery_trend[3].overdue_unfulfilled, 0);
        assert_eq!(metrics.total, 6);
    }

    #[test]
    fn critical_items_are_sorted_and_capped() {
        let deadlines = [
            "2025-09-01", "2025-06-01", "2025-08-01", "2025-07-01", "2025-10-01", "2025-05-01",
        ];
        let mut records: Vec<ActivityRecord> = deadlines
            .iter()
            .enumerate()
            .map(|(i, d)| obligation(&format!("o{i}"), Status::Pending, Some(d)))
            .collect();
        records.push(obligation("no-deadline", Status::Pending, None));
        records.push(completed_on(
            obligation("done", Status::Completed, Some("2025-01-01")),
            "2025-01-01",
        ));

        let metrics = aggregate(&records, &noon_utc("2025-07-15"), &MetricsOptions::default());
        assert_eq!(metrics.critical_items.len(), 5);
        let ordered: Vec<NaiveDate> = metrics
            .critical_items
            .iter()
            .filter_map(|record| record.company_deadline)
            .collect();
        let mut sorted = ordered.clone();
        sorted.sort();
        assert_eq!(ordered, sorted);
        assert_eq!(ordered[0], date("2025-05-01"));
        assert!(metrics.critical_items.iter().all(|r| r.id != "done"));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let records = vec![
            obligation("a", Status::Pending, Some("2025-07-01")),
            completed_on(obligation("b", Status::Completed, Some("2025-06-01")), "2025-05-30"),
            completed_on(obligation("c", Status::Completed, Some("2025-06-01")), "2025-06-03"),
        ];
        let now = noon_utc("2025-07-15");
        let first = aggregate(&records, &now, &MetricsOptions::default());
        let second = aggregate(&records, &now, &MetricsOptions::default());
        assert_eq!(first, second);
        assert_eq!(first.compliance_rate, ComplianceRate::Percentage(50.0));
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn compliance_rounds_to_one_decimal() {
        assert_eq!(compliance_rate(2, 3), ComplianceRate::Percentage(66.7));
        assert_eq!(compliance_rate(1, 3), ComplianceRate::Percentage(33.3));
        assert_eq!(compliance_rate(0, 0), ComplianceRate::NotAvailable);
        assert_eq!(compliance_rate(4, 4), ComplianceRate::Percentage(100.0));
    }

    #[test]
    fn serialized_field_names_match_the_dashboard_contract() {
        let records = vec![obligation("a", Status::Pending, Some("2025-07-01"))];
        let metrics = aggregate(&records, &noon_utc("2025-07-15"), &MetricsOptions::default());
        let value = serde_json::to_value(&metrics).unwrap();
        for key in [
            "total",
            "pendingCount",
            "onTimeCount",
            "overdueOrAtRiskCount",
            "complianceRate",
            "statusDistribution",
            "deliveryTrend",
            "criticalItems",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["complianceRate"], "N/A");
        assert_eq!(value["statusDistribution"]["Pendente"], 1);
    }
}
