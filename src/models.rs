use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    /// Catch-all for unrecognized values found in stored or imported data.
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

impl AttendanceStatus {
    /// Lenient parse for ingestion seams. Anything unrecognized becomes
    /// `Unknown` rather than an error.
    pub fn parse_lenient(raw: &str) -> AttendanceStatus {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => AttendanceStatus::Present,
            "late" => AttendanceStatus::Late,
            "absent" => AttendanceStatus::Absent,
            _ => AttendanceStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attendance mark. Immutable once written; re-marking a class period
/// replaces every record sharing `(student_id, date, subject, period)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    /// Calendar date as `YYYY-MM-DD`. Kept as text so that a malformed value
    /// degrades to "matches no month filter" instead of failing a load.
    pub date: String,
    pub status: AttendanceStatus,
    pub subject: String,
    pub faculty_id: String,
    pub faculty_name: String,
    pub period: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceStats {
    pub student_id: String,
    pub student_name: String,
    pub total_classes: u32,
    pub present_classes: u32,
    pub late_classes: u32,
    pub absent_classes: u32,
    pub percentage: u32,
    pub subject: String,
    pub month: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// Group key as `YYYY-MM`.
    pub month: String,
    pub total: u32,
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub course: String,
    pub semester: u32,
    pub department: String,
    pub roll_number: String,
    pub phone_number: String,
    pub date_of_admission: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    pub department: String,
    pub semester: u32,
    pub credits: u32,
    pub faculty_id: String,
    pub faculty_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CircularCategory {
    Academic,
    Administrative,
    Events,
    Urgent,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CircularPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    All,
    Faculty,
    Students,
}

impl Audience {
    /// Advisory visibility filter, not an access control check.
    pub fn admits(&self, role: Role) -> bool {
        match self {
            Audience::All => true,
            Audience::Faculty => matches!(role, Role::Faculty | Role::Admin),
            Audience::Students => matches!(role, Role::Student | Role::Admin),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circular {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: CircularCategory,
    pub priority: CircularPriority,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub target_audience: Audience,
}

impl Circular {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expiry| expiry > now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Faculty,
    Student,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Students,
    Attendance,
    Reports,
    Circulars,
    Settings,
    MyAttendance,
    Performance,
}

impl View {
    pub fn label(&self) -> &'static str {
        match self {
            View::Dashboard => "Dashboard",
            View::Students => "Students",
            View::Attendance => "Mark Attendance",
            View::Reports => "Reports",
            View::Circulars => "Circulars",
            View::Settings => "Settings",
            View::MyAttendance => "My Attendance",
            View::Performance => "Performance",
        }
    }
}

impl Role {
    /// Navigation entries per role, one closed table instead of string
    /// comparisons at the call sites.
    pub fn views(&self) -> &'static [View] {
        match self {
            Role::Faculty | Role::Admin => &[
                View::Dashboard,
                View::Students,
                View::Attendance,
                View::Reports,
                View::Circulars,
                View::Settings,
            ],
            Role::Student => &[
                View::Dashboard,
                View::MyAttendance,
                View::Performance,
                View::Circulars,
            ],
        }
    }
}
