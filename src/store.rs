use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    AttendanceRecord, AttendanceStatus, Audience, Circular, CircularCategory, CircularPriority,
    Role, Student, Subject,
};

pub const STUDENTS_KEY: &str = "students";
pub const SUBJECTS_KEY: &str = "subjects";
pub const RECORDS_KEY: &str = "attendance_records";
pub const CIRCULARS_KEY: &str = "circulars";

/// Minimal persistence capability. Injected into [`DataStore`] so tests run
/// against an in-memory fake and the binary against a JSON file.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON object per file; the whole object is rewritten on every mutation.
/// A missing file is an empty store.
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("store file {} is not valid JSON", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read store file {}", path.display()))
            }
        };
        Ok(Self { path, entries })
    }

    fn persist(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write store file {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        self.persist()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<Student>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<Subject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_records: Option<Vec<AttendanceRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circulars: Option<Vec<Circular>>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

pub struct DataStore {
    store: Box<dyn KeyValueStore>,
}

impl DataStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(Box::new(JsonFileStore::open(path)?)))
    }

    // Lenient read: a missing or malformed section is an empty collection,
    // never an error.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.store
            .get(key)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    fn save<T: Serialize>(&mut self, key: &str, items: &[T]) -> anyhow::Result<()> {
        self.store.set(key, serde_json::to_value(items)?)
    }

    pub fn students(&self) -> Vec<Student> {
        self.load(STUDENTS_KEY)
    }

    pub fn save_students(&mut self, students: &[Student]) -> anyhow::Result<()> {
        self.save(STUDENTS_KEY, students)
    }

    pub fn subjects(&self) -> Vec<Subject> {
        self.load(SUBJECTS_KEY)
    }

    pub fn save_subjects(&mut self, subjects: &[Subject]) -> anyhow::Result<()> {
        self.save(SUBJECTS_KEY, subjects)
    }

    pub fn attendance_records(&self) -> Vec<AttendanceRecord> {
        self.load(RECORDS_KEY)
    }

    pub fn save_attendance_records(&mut self, records: &[AttendanceRecord]) -> anyhow::Result<()> {
        self.save(RECORDS_KEY, records)
    }

    pub fn circulars(&self) -> Vec<Circular> {
        self.load(CIRCULARS_KEY)
    }

    pub fn save_circulars(&mut self, circulars: &[Circular]) -> anyhow::Result<()> {
        self.save(CIRCULARS_KEY, circulars)
    }

    /// Record one class period. Every stored mark for the same
    /// `(date, subject, period)` is dropped first, so re-marking replaces the
    /// whole period instead of double-counting it.
    pub fn mark_period(
        &mut self,
        date: &str,
        subject: &str,
        period: u32,
        faculty_id: &str,
        faculty_name: &str,
        entries: &[(String, AttendanceStatus)],
    ) -> anyhow::Result<usize> {
        let roster = self.students();
        let mut records = self.attendance_records();
        records.retain(|record| {
            !(record.date == date && record.subject == subject && record.period == period)
        });

        for (student_id, status) in entries {
            let student_name = roster
                .iter()
                .find(|student| student.student_id == *student_id)
                .map(|student| student.name.clone())
                .unwrap_or_default();

            records.push(AttendanceRecord {
                id: format!("{date}-{student_id}-{subject}-{period}"),
                student_id: student_id.clone(),
                student_name,
                date: date.to_string(),
                status: *status,
                subject: subject.to_string(),
                faculty_id: faculty_id.to_string(),
                faculty_name: faculty_name.to_string(),
                period,
                remarks: None,
                timestamp: Utc::now(),
            });
        }

        self.save_attendance_records(&records)?;
        Ok(entries.len())
    }

    pub fn add_student(&mut self, student: Student) -> anyhow::Result<()> {
        let mut students = self.students();
        students.push(student);
        self.save_students(&students)
    }

    /// Soft delete: the student drops off the roster but their attendance
    /// history stays intact.
    pub fn deactivate_student(&mut self, student_id: &str) -> anyhow::Result<bool> {
        let mut students = self.students();
        let mut changed = false;
        for student in &mut students {
            if student.student_id == student_id && student.is_active {
                student.is_active = false;
                changed = true;
            }
        }
        if changed {
            self.save_students(&students)?;
        }
        Ok(changed)
    }

    pub fn roster(
        &self,
        course: Option<&str>,
        semester: Option<u32>,
        search: Option<&str>,
    ) -> Vec<Student> {
        let term = search.map(str::to_lowercase);
        self.students()
            .into_iter()
            .filter(|student| {
                student.is_active
                    && course.map_or(true, |c| student.course == c)
                    && semester.map_or(true, |s| student.semester == s)
                    && term.as_deref().map_or(true, |t| {
                        student.name.to_lowercase().contains(t)
                            || student.student_id.to_lowercase().contains(t)
                            || student.email.to_lowercase().contains(t)
                    })
            })
            .collect()
    }

    pub fn post_circular(&mut self, circular: Circular) -> anyhow::Result<()> {
        let mut circulars = self.circulars();
        circulars.push(circular);
        self.save_circulars(&circulars)
    }

    /// Active, unexpired circulars whose audience admits the role, newest
    /// first. Advisory filtering only.
    pub fn circulars_for(&self, role: Role) -> Vec<Circular> {
        let now = Utc::now();
        let mut visible: Vec<Circular> = self
            .circulars()
            .into_iter()
            .filter(|circular| circular.is_current(now) && circular.target_audience.admits(role))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        visible
    }

    pub fn export_bundle(&self) -> anyhow::Result<String> {
        let bundle = BackupBundle {
            students: Some(self.students()),
            subjects: Some(self.subjects()),
            attendance_records: Some(self.attendance_records()),
            circulars: Some(self.circulars()),
            exported_at: Some(Utc::now()),
        };
        Ok(serde_json::to_string_pretty(&bundle)?)
    }

    /// Overlay a bundle section by section; sections absent from the bundle
    /// leave the store untouched.
    pub fn import_bundle(&mut self, raw: &str) -> anyhow::Result<()> {
        let bundle: BackupBundle =
            serde_json::from_str(raw).context("backup bundle is not valid JSON")?;
        if let Some(students) = bundle.students {
            self.save_students(&students)?;
        }
        if let Some(subjects) = bundle.subjects {
            self.save_subjects(&subjects)?;
        }
        if let Some(records) = bundle.attendance_records {
            self.save_attendance_records(&records)?;
        }
        if let Some(circulars) = bundle.circulars {
            self.save_circulars(&circulars)?;
        }
        Ok(())
    }
}

pub fn import_csv(store: &mut DataStore, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(Deserialize)]
    struct CsvRow {
        student_id: String,
        student_name: String,
        date: String,
        status: String,
        subject: String,
        faculty_id: String,
        faculty_name: String,
        period: u32,
        remarks: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut records = store.attendance_records();
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        records.push(AttendanceRecord {
            id: format!("import-{}", Uuid::new_v4()),
            student_id: row.student_id,
            student_name: row.student_name,
            date: row.date,
            status: AttendanceStatus::parse_lenient(&row.status),
            subject: row.subject,
            faculty_id: row.faculty_id,
            faculty_name: row.faculty_name,
            period: row.period,
            remarks: row.remarks.filter(|remark| !remark.is_empty()),
            timestamp: Utc::now(),
        });
        inserted += 1;
    }

    store.save_attendance_records(&records)?;
    Ok(inserted)
}

fn student(
    id: &str,
    student_id: &str,
    name: &str,
    email: &str,
    roll_number: &str,
    phone_number: &str,
) -> Student {
    Student {
        id: id.to_string(),
        student_id: student_id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        course: "B.Tech Computer Science".to_string(),
        semester: 3,
        department: "Computer Science".to_string(),
        roll_number: roll_number.to_string(),
        phone_number: phone_number.to_string(),
        date_of_admission: "2022-08-15".to_string(),
        is_active: true,
    }
}

pub fn seed(store: &mut DataStore) -> anyhow::Result<()> {
    let students = vec![
        student(
            "1",
            "CS2024001",
            "John Doe",
            "john@student.college.edu",
            "001",
            "+91 9876543210",
        ),
        student(
            "2",
            "CS2024002",
            "Jane Smith",
            "jane@student.college.edu",
            "002",
            "+91 9876543211",
        ),
        student(
            "3",
            "CS2024003",
            "Mike Johnson",
            "mike@student.college.edu",
            "003",
            "+91 9876543212",
        ),
        student(
            "4",
            "CS2024004",
            "Sarah Williams",
            "sarah@student.college.edu",
            "004",
            "+91 9876543213",
        ),
    ];
    store.save_students(&students)?;

    let subjects = vec![
        Subject {
            id: "1".to_string(),
            name: "Data Structures and Algorithms".to_string(),
            code: "CS301".to_string(),
            department: "Computer Science".to_string(),
            semester: 3,
            credits: 4,
            faculty_id: "FAC001".to_string(),
            faculty_name: "Dr. Rajesh Sharma".to_string(),
        },
        Subject {
            id: "2".to_string(),
            name: "Database Management Systems".to_string(),
            code: "CS302".to_string(),
            department: "Computer Science".to_string(),
            semester: 3,
            credits: 3,
            faculty_id: "FAC001".to_string(),
            faculty_name: "Dr. Rajesh Sharma".to_string(),
        },
        Subject {
            id: "3".to_string(),
            name: "Computer Networks".to_string(),
            code: "CS303".to_string(),
            department: "Computer Science".to_string(),
            semester: 3,
            credits: 3,
            faculty_id: "FAC001".to_string(),
            faculty_name: "Dr. Rajesh Sharma".to_string(),
        },
    ];
    store.save_subjects(&subjects)?;

    // One marked period so stats and reports have data out of the box.
    let entries = vec![
        ("CS2024001".to_string(), AttendanceStatus::Present),
        ("CS2024002".to_string(), AttendanceStatus::Late),
        ("CS2024003".to_string(), AttendanceStatus::Absent),
        ("CS2024004".to_string(), AttendanceStatus::Present),
    ];
    store.mark_period(
        "2026-03-02",
        "Data Structures and Algorithms",
        1,
        "FAC001",
        "Dr. Rajesh Sharma",
        &entries,
    )?;

    let now = Utc::now();
    let circulars = vec![
        Circular {
            id: Uuid::new_v4().to_string(),
            title: "Mid-Semester Examination Schedule".to_string(),
            content: "Mid-semester examinations run March 15-25. Check the detailed \
                      timetable on the notice board."
                .to_string(),
            category: CircularCategory::Academic,
            priority: CircularPriority::High,
            created_by: "Dr. Rajesh Sharma".to_string(),
            created_at: now,
            expires_at: Some(now + Duration::days(30)),
            is_active: true,
            target_audience: Audience::All,
        },
        Circular {
            id: Uuid::new_v4().to_string(),
            title: "Library Renovation Notice".to_string(),
            content: "The library is closed for renovation March 1-10. Digital resources \
                      remain available through the portal."
                .to_string(),
            category: CircularCategory::Administrative,
            priority: CircularPriority::Medium,
            created_by: "Admin User".to_string(),
            created_at: now - Duration::days(2),
            expires_at: None,
            is_active: true,
            target_audience: Audience::All,
        },
        Circular {
            id: Uuid::new_v4().to_string(),
            title: "Technical Fest - Call for Participation".to_string(),
            content: "TechnoVision runs April 15-17. Sign up for competitions and \
                      workshops at the student office."
                .to_string(),
            category: CircularCategory::Events,
            priority: CircularPriority::Medium,
            created_by: "Dr. Rajesh Sharma".to_string(),
            created_at: now - Duration::days(5),
            expires_at: None,
            is_active: true,
            target_audience: Audience::Students,
        },
    ];
    store.save_circulars(&circulars)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_store() -> DataStore {
        DataStore::new(Box::new(MemoryStore::default()))
    }

    #[test]
    fn memory_store_round_trips_values() {
        let mut store = MemoryStore::default();
        store.set("key", json!({"a": 1})).unwrap();
        assert_eq!(store.get("key"), Some(json!({"a": 1})));
        store.remove("key").unwrap();
        assert_eq!(store.get("key"), None);
    }

    #[test]
    fn malformed_section_loads_as_empty() {
        let mut store = memory_store();
        store
            .store
            .set(STUDENTS_KEY, json!("definitely not a roster"))
            .unwrap();
        assert!(store.students().is_empty());
    }

    #[test]
    fn seed_populates_every_section() {
        let mut store = memory_store();
        seed(&mut store).unwrap();
        assert_eq!(store.students().len(), 4);
        assert_eq!(store.subjects().len(), 3);
        assert_eq!(store.attendance_records().len(), 4);
        assert_eq!(store.circulars().len(), 3);
    }

    #[test]
    fn mark_period_replaces_prior_marks_for_the_period() {
        let mut store = memory_store();
        seed(&mut store).unwrap();

        let first = vec![
            ("CS2024001".to_string(), AttendanceStatus::Absent),
            ("CS2024002".to_string(), AttendanceStatus::Absent),
        ];
        store
            .mark_period("2026-03-09", "Computer Networks", 2, "FAC001", "Dr. Rajesh Sharma", &first)
            .unwrap();

        let second = vec![("CS2024001".to_string(), AttendanceStatus::Present)];
        store
            .mark_period("2026-03-09", "Computer Networks", 2, "FAC001", "Dr. Rajesh Sharma", &second)
            .unwrap();

        let records = store.attendance_records();
        let period: Vec<_> = records
            .iter()
            .filter(|r| r.date == "2026-03-09" && r.subject == "Computer Networks" && r.period == 2)
            .collect();
        assert_eq!(period.len(), 1);
        assert_eq!(period[0].student_id, "CS2024001");
        assert_eq!(period[0].status, AttendanceStatus::Present);

        // the seeded period on another date is untouched
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn mark_period_resolves_names_from_the_roster() {
        let mut store = memory_store();
        seed(&mut store).unwrap();

        let entries = vec![
            ("CS2024002".to_string(), AttendanceStatus::Present),
            ("GHOST".to_string(), AttendanceStatus::Present),
        ];
        store
            .mark_period("2026-03-10", "CS302", 3, "FAC001", "Dr. Rajesh Sharma", &entries)
            .unwrap();

        let records = store.attendance_records();
        let jane = records.iter().find(|r| r.student_id == "CS2024002" && r.period == 3).unwrap();
        assert_eq!(jane.student_name, "Jane Smith");
        let ghost = records.iter().find(|r| r.student_id == "GHOST").unwrap();
        assert_eq!(ghost.student_name, "");
    }

    #[test]
    fn deactivate_student_keeps_history() {
        let mut store = memory_store();
        seed(&mut store).unwrap();

        assert!(store.deactivate_student("CS2024001").unwrap());
        assert!(!store.deactivate_student("CS2024001").unwrap());
        assert!(!store.deactivate_student("NOPE").unwrap());

        let roster = store.roster(None, None, None);
        assert!(roster.iter().all(|s| s.student_id != "CS2024001"));
        // attendance history survives the soft delete
        assert!(store
            .attendance_records()
            .iter()
            .any(|r| r.student_id == "CS2024001"));
    }

    #[test]
    fn roster_search_is_case_insensitive() {
        let mut store = memory_store();
        seed(&mut store).unwrap();

        let hits = store.roster(None, None, Some("JANE"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].student_id, "CS2024002");

        let by_id = store.roster(None, None, Some("cs2024003"));
        assert_eq!(by_id.len(), 1);

        let by_course = store.roster(Some("B.Tech Computer Science"), Some(3), None);
        assert_eq!(by_course.len(), 4);
        assert!(store.roster(Some("B.Sc Physics"), None, None).is_empty());
    }

    #[test]
    fn circulars_filter_by_audience_expiry_and_order() {
        let mut store = memory_store();
        let now = Utc::now();
        let circular = |title: &str, audience: Audience, active: bool, expires_at| Circular {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: String::new(),
            category: CircularCategory::General,
            priority: CircularPriority::Low,
            created_by: "Admin User".to_string(),
            created_at: now,
            expires_at,
            is_active: active,
            target_audience: audience,
        };

        let mut circulars = vec![
            circular("for everyone", Audience::All, true, None),
            circular("faculty only", Audience::Faculty, true, None),
            circular("expired", Audience::All, true, Some(now - Duration::days(1))),
            circular("retracted", Audience::All, false, None),
        ];
        circulars[0].created_at = now - Duration::days(3);
        store.save_circulars(&circulars).unwrap();

        let student_view = store.circulars_for(Role::Student);
        let titles: Vec<&str> = student_view.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["for everyone"]);

        let faculty_view = store.circulars_for(Role::Faculty);
        let titles: Vec<&str> = faculty_view.iter().map(|c| c.title.as_str()).collect();
        // newest first
        assert_eq!(titles, vec!["faculty only", "for everyone"]);
    }

    #[test]
    fn bundle_export_overlays_on_import() {
        let mut source = memory_store();
        seed(&mut source).unwrap();
        let bundle = source.export_bundle().unwrap();

        let mut target = memory_store();
        target.import_bundle(&bundle).unwrap();
        assert_eq!(target.students().len(), 4);
        assert_eq!(target.attendance_records().len(), 4);

        // a partial bundle only touches the sections it carries
        let partial = serde_json::to_string(&BackupBundle {
            students: Some(vec![]),
            subjects: None,
            attendance_records: None,
            circulars: None,
            exported_at: None,
        })
        .unwrap();
        target.import_bundle(&partial).unwrap();
        assert!(target.students().is_empty());
        assert_eq!(target.attendance_records().len(), 4);

        assert!(target.import_bundle("not json").is_err());
    }

    #[test]
    fn json_file_store_persists_across_reopen() {
        let path = std::env::temp_dir().join(format!("register-test-{}.json", Uuid::new_v4()));

        {
            let mut store = DataStore::open(&path).unwrap();
            seed(&mut store).unwrap();
        }
        {
            let store = DataStore::open(&path).unwrap();
            assert_eq!(store.students().len(), 4);
            assert_eq!(store.attendance_records().len(), 4);
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn csv_import_tolerates_unknown_status() {
        let path = std::env::temp_dir().join(format!("register-import-{}.csv", Uuid::new_v4()));
        std::fs::write(
            &path,
            "student_id,student_name,date,status,subject,faculty_id,faculty_name,period,remarks\n\
             CS2024001,John Doe,2026-03-05,present,CS301,FAC001,Dr. Rajesh Sharma,1,\n\
             CS2024002,Jane Smith,2026-03-05,excused,CS301,FAC001,Dr. Rajesh Sharma,1,medical leave\n",
        )
        .unwrap();

        let mut store = memory_store();
        let inserted = import_csv(&mut store, &path).unwrap();
        assert_eq!(inserted, 2);

        let records = store.attendance_records();
        assert_eq!(records.len(), 2);
        assert!(records[0].id.starts_with("import-"));
        assert_eq!(records[0].remarks, None);
        assert_eq!(records[1].status, AttendanceStatus::Unknown);
        assert_eq!(records[1].remarks.as_deref(), Some("medical leave"));

        let _ = std::fs::remove_file(&path);
    }
}
