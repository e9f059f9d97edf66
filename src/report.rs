use std::fmt::Write;

use crate::models::RetentionRow;
use crate::retention::{RETENTION_STEPS, TOTAL};

/// Sums each catalog label across all cohort rows, in catalog order.
pub fn overall_counts(rows: &[RetentionRow]) -> Vec<(&'static str, u64)> {
    let mut totals: Vec<(&'static str, u64)> = std::iter::once(TOTAL)
        .chain(RETENTION_STEPS.iter().map(|(label, _)| *label))
        .map(|label| (label, 0))
        .collect();

    for row in rows {
        for (slot, (_, count)) in row.data.iter().enumerate() {
            totals[slot].1 += count;
        }
    }

    totals
}

pub fn build_report(rows: &[RetentionRow]) -> String {
    let totals = overall_counts(rows);
    let signups = totals[0].1;

    let mut output = String::new();
    let _ = writeln!(output, "# Onboarding Retention Report");
    let _ = writeln!(
        output,
        "Generated for {} signups across {} weekly cohorts.",
        signups,
        rows.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Onboarding Funnel");

    if signups == 0 {
        let _ = writeln!(output, "No signups in this export.");
    } else {
        for (label, count) in totals.iter().skip(1) {
            let share = *count as f64 * 100.0 / signups as f64;
            let _ = writeln!(output, "- {label}: {count} ({share:.1}% of signups)");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Cohorts");

    if rows.is_empty() {
        let _ = writeln!(output, "No cohorts in this export.");
    } else {
        for row in rows {
            let _ = writeln!(
                output,
                "- {}: {} signups, {} approved",
                row.title,
                row.data.total(),
                row.data.get("approval").unwrap_or(0)
            );
        }
    }

    output
}
