use chrono::{Datelike, Local, NaiveDate};

use crate::models::{AttendanceRecord, AttendanceStats, AttendanceStatus, MonthlySummary};

pub const DEFAULT_ALERT_THRESHOLD: u32 = 75;

#[derive(Debug, Clone, Default)]
pub struct StatsFilter {
    pub subject: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Late arrivals count as half a presence. Returns 0 for an empty window.
/// Rounds half away from zero, so 87.5 reports as 88.
pub(crate) fn weighted_percentage(present: u32, late: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let effective = f64::from(present) + 0.5 * f64::from(late);
    ((effective / f64::from(total)) * 100.0).round() as u32
}

/// Attendance summary for one student. Filters apply in order: student,
/// subject (exact match), then month and year together; a month without a
/// year is ignored. Returns `None` when nothing matches, which is distinct
/// from attending and sitting at 0%.
pub fn student_stats(
    student_id: &str,
    records: &[AttendanceRecord],
    filter: &StatsFilter,
) -> Option<AttendanceStats> {
    let mut filtered: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|record| record.student_id == student_id)
        .collect();

    if let Some(subject) = filter.subject.as_deref() {
        filtered.retain(|record| record.subject == subject);
    }

    if let (Some(month), Some(year)) = (filter.month, filter.year) {
        filtered.retain(|record| {
            parse_date(&record.date)
                .map_or(false, |date| date.month() == month && date.year() == year)
        });
    }

    if filtered.is_empty() {
        return None;
    }

    let total = filtered.len() as u32;
    let present = count_status(&filtered, AttendanceStatus::Present);
    let late = count_status(&filtered, AttendanceStatus::Late);
    let absent = count_status(&filtered, AttendanceStatus::Absent);

    // A record with an unrecognized status counts toward the total but lands
    // in no bucket; existing report consumers baseline on that.
    Some(AttendanceStats {
        student_id: student_id.to_string(),
        student_name: filtered[0].student_name.clone(),
        total_classes: total,
        present_classes: present,
        late_classes: late,
        absent_classes: absent,
        percentage: weighted_percentage(present, late, total),
        subject: filter
            .subject
            .clone()
            .unwrap_or_else(|| "All Subjects".to_string()),
        month: filter
            .month
            .map(|month| month.to_string())
            .unwrap_or_else(|| "All Months".to_string()),
        year: filter.year.unwrap_or_else(|| Local::now().year()),
    })
}

fn count_status(records: &[&AttendanceRecord], status: AttendanceStatus) -> u32 {
    records.iter().filter(|record| record.status == status).count() as u32
}

fn distinct_student_ids(records: &[AttendanceRecord]) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for record in records {
        if !ids.contains(&record.student_id.as_str()) {
            ids.push(&record.student_id);
        }
    }
    ids
}

/// Mean of the per-student percentages, rounded. Students with no matching
/// records are skipped; an empty class reports 0 rather than nothing.
pub fn class_average(records: &[AttendanceRecord], subject: Option<&str>) -> u32 {
    let filter = StatsFilter {
        subject: subject.map(str::to_string),
        ..StatsFilter::default()
    };

    let mut sum = 0u64;
    let mut counted = 0u32;
    for student_id in distinct_student_ids(records) {
        if let Some(stats) = student_stats(student_id, records, &filter) {
            sum += u64::from(stats.percentage);
            counted += 1;
        }
    }

    if counted == 0 {
        return 0;
    }
    (sum as f64 / f64::from(counted)).round() as u32
}

/// Students strictly below the cutoff, worst first. `sort_by` is stable, so
/// students tied on percentage keep their first-seen order.
pub fn threshold_alerts(records: &[AttendanceRecord], threshold: u32) -> Vec<AttendanceStats> {
    let unfiltered = StatsFilter::default();
    let mut alerts: Vec<AttendanceStats> = distinct_student_ids(records)
        .into_iter()
        .filter_map(|student_id| student_stats(student_id, records, &unfiltered))
        .filter(|stats| stats.percentage < threshold)
        .collect();

    alerts.sort_by(|a, b| a.percentage.cmp(&b.percentage));
    alerts
}

/// Month-by-month summary for one student, grouped by `YYYY-MM` in the order
/// each month is first seen in the input. Records whose date does not parse
/// are left out of every group.
pub fn monthly_trends(records: &[AttendanceRecord], student_id: &str) -> Vec<MonthlySummary> {
    let mut groups: Vec<MonthlySummary> = Vec::new();

    for record in records.iter().filter(|r| r.student_id == student_id) {
        let Some(date) = parse_date(&record.date) else {
            continue;
        };
        let key = format!("{}-{:02}", date.year(), date.month());

        let index = match groups.iter().position(|group| group.month == key) {
            Some(index) => index,
            None => {
                groups.push(MonthlySummary {
                    month: key,
                    total: 0,
                    present: 0,
                    late: 0,
                    absent: 0,
                    percentage: 0,
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[index];
        group.total += 1;
        match record.status {
            AttendanceStatus::Present => group.present += 1,
            AttendanceStatus::Late => group.late += 1,
            AttendanceStatus::Absent => group.absent += 1,
            AttendanceStatus::Unknown => {}
        }
    }

    for group in &mut groups {
        group.percentage = weighted_percentage(group.present, group.late, group.total);
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceBand {
    Good,
    Warning,
    Critical,
}

impl AttendanceBand {
    /// Report classification: 75% and up is Good, 60–74% Warning, below
    /// that Critical.
    pub fn from_percentage(percentage: u32) -> Self {
        if percentage >= 75 {
            AttendanceBand::Good
        } else if percentage >= 60 {
            AttendanceBand::Warning
        } else {
            AttendanceBand::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttendanceBand::Good => "Good",
            AttendanceBand::Warning => "Warning",
            AttendanceBand::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for AttendanceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
