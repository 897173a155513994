use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::DashboardMetrics;
use crate::views;

pub fn build_report(scope: Option<&str>, today: NaiveDate, metrics: &DashboardMetrics) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all categories");

    let _ = writeln!(output, "# Obligations Dashboard");
    let _ = writeln!(output, "Generated for {} (as of {})", scope_label, today);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Indicators");
    let _ = writeln!(output, "- Total: {}", metrics.total);
    let _ = writeln!(output, "- Pending: {}", metrics.pending_count);
    let _ = writeln!(output, "- Completed on time: {}", metrics.on_time_count);
    let _ = writeln!(output, "- Late / at risk: {}", metrics.overdue_or_at_risk_count);
    let _ = writeln!(
        output,
        "- Compliance: {} ({} of {} completed on time)",
        metrics.compliance_rate,
        metrics.on_time_count,
        metrics.completed_count()
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Distribution");

    if metrics.status_distribution.is_empty() {
        let _ = writeln!(output, "No activities in scope.");
    } else {
        for (status, count) in &metrics.status_distribution {
            let share = *count as f64 / metrics.total as f64 * 100.0;
            let _ = writeln!(output, "- {}: {} ({:.1}%)", status, count, share);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Delivery Trend");

    if metrics.delivery_trend.is_empty() {
        let _ = writeln!(output, "No reference periods recorded.");
    } else {
        let _ = writeln!(output, "| Month | On time | Late | Overdue, not delivered |");
        let _ = writeln!(output, "|---|---|---|---|");
        for bucket in &metrics.delivery_trend {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                bucket.month, bucket.on_time, bucket.late, bucket.overdue_unfulfilled
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Critical Items");

    if metrics.critical_items.is_empty() {
        let _ = writeln!(output, "No critical items right now.");
    } else {
        for item in &metrics.critical_items {
            let Some(deadline) = item.company_deadline else {
                continue;
            };
            let _ = writeln!(
                output,
                "- {} (due {}, {}) owner {}",
                item.title,
                deadline,
                views::deadline_countdown(today, deadline),
                item.responsible_name()
            );
        }
    }

    output
}
