use std::fmt::Write as _;

use anyhow::Context;
use chrono::Datelike;
use serde::Serialize;

use crate::models::{AttendanceRecord, AttendanceStatus, Student};
use crate::stats::{self, AttendanceBand};

#[derive(Debug, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Student ID")]
    pub student_id: String,
    #[serde(rename = "Student Name")]
    pub student_name: String,
    #[serde(rename = "Course")]
    pub course: String,
    #[serde(rename = "Semester")]
    pub semester: u32,
    #[serde(rename = "Total Classes")]
    pub total_classes: u32,
    #[serde(rename = "Present")]
    pub present: u32,
    #[serde(rename = "Late")]
    pub late: u32,
    #[serde(rename = "Absent")]
    pub absent: u32,
    #[serde(rename = "Attendance %")]
    pub percentage: u32,
    #[serde(rename = "Status")]
    pub status: &'static str,
}

/// One row per roster student, whether or not they have any records. The
/// month filter matches the month number in any year, matching how the
/// exported report has always been cut.
pub fn class_report_rows(
    records: &[AttendanceRecord],
    students: &[Student],
    subject: Option<&str>,
    month: Option<u32>,
) -> Vec<ReportRow> {
    students
        .iter()
        .map(|student| {
            let matching: Vec<&AttendanceRecord> = records
                .iter()
                .filter(|record| record.student_id == student.student_id)
                .filter(|record| subject.map_or(true, |s| record.subject == s))
                .filter(|record| {
                    month.map_or(true, |m| {
                        stats::parse_date(&record.date).map_or(false, |date| date.month() == m)
                    })
                })
                .collect();

            let total = matching.len() as u32;
            let present = matching
                .iter()
                .filter(|r| r.status == AttendanceStatus::Present)
                .count() as u32;
            let late = matching
                .iter()
                .filter(|r| r.status == AttendanceStatus::Late)
                .count() as u32;
            let absent = matching
                .iter()
                .filter(|r| r.status == AttendanceStatus::Absent)
                .count() as u32;
            let percentage = stats::weighted_percentage(present, late, total);

            ReportRow {
                student_id: student.student_id.clone(),
                student_name: student.name.clone(),
                course: student.course.clone(),
                semester: student.semester,
                total_classes: total,
                present,
                late,
                absent,
                percentage,
                status: AttendanceBand::from_percentage(percentage).label(),
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct HistoryRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Period")]
    pub period: u32,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Faculty")]
    pub faculty: String,
    #[serde(rename = "Remarks")]
    pub remarks: String,
}

pub fn student_history_rows(student_id: &str, records: &[AttendanceRecord]) -> Vec<HistoryRow> {
    records
        .iter()
        .filter(|record| record.student_id == student_id)
        .map(|record| HistoryRow {
            date: record.date.clone(),
            subject: record.subject.clone(),
            period: record.period,
            status: record.status.to_string(),
            faculty: record.faculty_name.clone(),
            remarks: record.remarks.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn render_csv<T: Serialize>(rows: &[T]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush CSV buffer: {err}"))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Self-contained printable sheet for taking attendance on paper: one row
/// per student with empty mark boxes and a signature line.
pub fn attendance_sheet_html(date: &str, subject: &str, students: &[Student]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "<html>");
    let _ = writeln!(output, "<head>");
    let _ = writeln!(output, "<title>Attendance Sheet - {subject}</title>");
    let _ = writeln!(output, "<style>");
    let _ = writeln!(output, "body {{ font-family: Arial, sans-serif; margin: 20px; }}");
    let _ = writeln!(output, ".header {{ text-align: center; margin-bottom: 30px; }}");
    let _ = writeln!(output, ".info {{ margin-bottom: 20px; }}");
    let _ = writeln!(output, "table {{ width: 100%; border-collapse: collapse; }}");
    let _ = writeln!(
        output,
        "th, td {{ border: 1px solid #000; padding: 8px; text-align: left; }}"
    );
    let _ = writeln!(output, "th {{ background-color: #f0f0f0; }}");
    let _ = writeln!(output, ".signature {{ margin-top: 50px; }}");
    let _ = writeln!(output, "</style>");
    let _ = writeln!(output, "</head>");
    let _ = writeln!(output, "<body>");
    let _ = writeln!(output, "<div class=\"header\">");
    let _ = writeln!(output, "<h1>College Attendance Management</h1>");
    let _ = writeln!(output, "<h2>Attendance Sheet</h2>");
    let _ = writeln!(output, "</div>");
    let _ = writeln!(output, "<div class=\"info\">");
    let _ = writeln!(output, "<p><strong>Date:</strong> {date}</p>");
    let _ = writeln!(output, "<p><strong>Subject:</strong> {subject}</p>");
    let _ = writeln!(
        output,
        "<p><strong>Total Students:</strong> {}</p>",
        students.len()
    );
    let _ = writeln!(output, "</div>");
    let _ = writeln!(output, "<table>");
    let _ = writeln!(
        output,
        "<tr><th>S.No.</th><th>Student ID</th><th>Student Name</th><th>Course</th>\
         <th>Present</th><th>Late</th><th>Absent</th><th>Remarks</th></tr>"
    );

    for (index, student) in students.iter().enumerate() {
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>&#9744;</td><td>&#9744;</td><td>&#9744;</td><td></td></tr>",
            index + 1,
            student.student_id,
            student.name,
            student.course
        );
    }

    let _ = writeln!(output, "</table>");
    let _ = writeln!(output, "<div class=\"signature\">");
    let _ = writeln!(
        output,
        "<p>Faculty Signature: ___________________ Date: ___________</p>"
    );
    let _ = writeln!(output, "</div>");
    let _ = writeln!(output, "</body>");
    let _ = writeln!(output, "</html>");

    output
}
