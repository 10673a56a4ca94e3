use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveTime};
use clap::{Parser, Subcommand};
use uuid::Uuid;

mod models;
mod report;
mod stats;
mod store;

use models::{
    AttendanceStatus, Audience, Circular, CircularCategory, CircularPriority, Role, Student, View,
};
use stats::{AttendanceBand, StatsFilter};
use store::DataStore;

#[derive(Parser)]
#[command(name = "attendance-register")]
#[command(about = "Attendance and records register for a college portal", long_about = None)]
struct Cli {
    /// Path of the JSON store file
    #[arg(long, global = true, default_value = "register.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a demo roster, subjects, attendance and circulars
    Seed,
    /// Import attendance records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Mark one class period, replacing any previous marks for it
    Mark {
        #[arg(long)]
        date: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        period: u32,
        #[arg(long, default_value = "FAC001")]
        faculty_id: String,
        #[arg(long, default_value = "Dr. Rajesh Sharma")]
        faculty_name: String,
        /// Entries as STUDENT_ID=STATUS, e.g. CS2024001=present
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Attendance statistics for one student
    Stats {
        #[arg(long)]
        student: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Average attendance percentage across the class
    ClassAverage {
        #[arg(long)]
        subject: Option<String>,
    },
    /// Students whose attendance falls strictly below a cutoff
    Alerts {
        #[arg(long, default_value_t = stats::DEFAULT_ALERT_THRESHOLD)]
        threshold: u32,
    },
    /// Month-by-month attendance for one student
    Trends {
        #[arg(long)]
        student: String,
    },
    /// Export the class attendance report as CSV
    Report {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        #[arg(long, default_value = "attendance_report.csv")]
        out: PathBuf,
    },
    /// Export one student's attendance history as CSV
    StudentReport {
        #[arg(long)]
        student: String,
        #[arg(long, default_value = "student_report.csv")]
        out: PathBuf,
    },
    /// Write a printable attendance sheet for one class
    Sheet {
        #[arg(long)]
        date: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "attendance_sheet.html")]
        out: PathBuf,
    },
    /// List active students
    Roster {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        semester: Option<u32>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a student to the roster
    AddStudent {
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        course: String,
        #[arg(long, default_value_t = 1)]
        semester: u32,
        #[arg(long, default_value = "")]
        department: String,
        #[arg(long, default_value = "")]
        roll_number: String,
        #[arg(long, default_value = "")]
        phone_number: String,
    },
    /// Drop a student from the roster; attendance history is kept
    RemoveStudent {
        #[arg(long)]
        student_id: String,
    },
    /// Post a circular
    PostCircular {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, value_enum, default_value = "general")]
        category: CircularCategory,
        #[arg(long, value_enum, default_value = "medium")]
        priority: CircularPriority,
        #[arg(long, default_value = "Admin User")]
        author: String,
        #[arg(long, value_enum, default_value = "all")]
        audience: Audience,
        /// Expiry date as YYYY-MM-DD
        #[arg(long)]
        expires: Option<String>,
    },
    /// List circulars visible to a role
    Circulars {
        #[arg(long, value_enum, default_value = "student")]
        role: Role,
    },
    /// Role-appropriate portal summary
    Dashboard {
        #[arg(long, value_enum, default_value = "faculty")]
        role: Role,
        /// Required for the student dashboard
        #[arg(long)]
        student: Option<String>,
    },
    /// Export every stored section as one JSON bundle
    Backup {
        #[arg(long, default_value = "backup.json")]
        out: PathBuf,
    },
    /// Overlay a JSON bundle onto the store
    Restore {
        #[arg(long)]
        file: PathBuf,
    },
}

fn parse_mark_entry(raw: &str) -> anyhow::Result<(String, AttendanceStatus)> {
    let (student_id, status_raw) = raw
        .split_once('=')
        .with_context(|| format!("mark entry `{raw}` must look like STUDENT_ID=STATUS"))?;
    let status = AttendanceStatus::parse_lenient(status_raw);
    if status == AttendanceStatus::Unknown {
        anyhow::bail!("unknown status `{status_raw}` in `{raw}` (expected present, late or absent)");
    }
    Ok((student_id.to_string(), status))
}

fn print_stats(stats: &models::AttendanceStats) {
    println!(
        "Attendance for {} ({}) - {}, {}, {}:",
        stats.student_name, stats.student_id, stats.subject, stats.month, stats.year
    );
    println!(
        "- classes: {} ({} present, {} late, {} absent)",
        stats.total_classes, stats.present_classes, stats.late_classes, stats.absent_classes
    );
    println!(
        "- percentage: {}% ({})",
        stats.percentage,
        AttendanceBand::from_percentage(stats.percentage)
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut store = DataStore::open(&cli.store)?;

    match cli.command {
        Commands::Seed => {
            store::seed(&mut store)?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = store::import_csv(&mut store, &csv)?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Mark {
            date,
            subject,
            period,
            faculty_id,
            faculty_name,
            entries,
        } => {
            if stats::parse_date(&date).is_none() {
                anyhow::bail!("--date must be a calendar date like 2026-03-02");
            }
            let entries = entries
                .iter()
                .map(|raw| parse_mark_entry(raw))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let saved =
                store.mark_period(&date, &subject, period, &faculty_id, &faculty_name, &entries)?;
            println!("Marked {saved} students for {subject} period {period} on {date}.");
        }
        Commands::Stats {
            student,
            subject,
            month,
            year,
        } => {
            let records = store.attendance_records();
            let filter = StatsFilter {
                subject,
                month,
                year,
            };
            match stats::student_stats(&student, &records, &filter) {
                Some(stats) => print_stats(&stats),
                None => println!("No attendance recorded for this selection."),
            }
        }
        Commands::ClassAverage { subject } => {
            let records = store.attendance_records();
            let average = stats::class_average(&records, subject.as_deref());
            match subject {
                Some(subject) => println!("Class average for {subject}: {average}%"),
                None => println!("Class average: {average}%"),
            }
        }
        Commands::Alerts { threshold } => {
            let records = store.attendance_records();
            let alerts = stats::threshold_alerts(&records, threshold);

            if alerts.is_empty() {
                println!("No students below {threshold}%.");
            } else {
                println!("Students below {threshold}%:");
                for alert in &alerts {
                    println!(
                        "- {} ({}): {}% across {} classes ({})",
                        alert.student_name,
                        alert.student_id,
                        alert.percentage,
                        alert.total_classes,
                        AttendanceBand::from_percentage(alert.percentage)
                    );
                }
            }
        }
        Commands::Trends { student } => {
            let records = store.attendance_records();
            let trends = stats::monthly_trends(&records, &student);

            if trends.is_empty() {
                println!("No attendance recorded for {student}.");
            } else {
                println!("Monthly attendance for {student}:");
                for summary in &trends {
                    println!(
                        "- {}: {}% ({} classes, {} present, {} late, {} absent)",
                        summary.month,
                        summary.percentage,
                        summary.total,
                        summary.present,
                        summary.late,
                        summary.absent
                    );
                }
            }
        }
        Commands::Report {
            subject,
            month,
            out,
        } => {
            let records = store.attendance_records();
            let students = store.students();
            let rows =
                report::class_report_rows(&records, &students, subject.as_deref(), month);
            let csv = report::render_csv(&rows)?;
            std::fs::write(&out, csv)?;
            println!("Report for {} students written to {}.", rows.len(), out.display());
        }
        Commands::StudentReport { student, out } => {
            let records = store.attendance_records();
            let rows = report::student_history_rows(&student, &records);
            let csv = report::render_csv(&rows)?;
            std::fs::write(&out, csv)?;
            println!("History of {} records written to {}.", rows.len(), out.display());
        }
        Commands::Sheet { date, subject, out } => {
            let students = store.roster(None, None, None);
            let html = report::attendance_sheet_html(&date, &subject, &students);
            std::fs::write(&out, html)?;
            println!("Attendance sheet written to {}.", out.display());
        }
        Commands::Roster {
            course,
            semester,
            search,
        } => {
            let students = store.roster(course.as_deref(), semester, search.as_deref());
            if students.is_empty() {
                println!("No students match.");
            } else {
                for student in &students {
                    println!(
                        "- {} {} ({}, semester {}) {}",
                        student.student_id,
                        student.name,
                        student.course,
                        student.semester,
                        student.email
                    );
                }
            }
        }
        Commands::AddStudent {
            student_id,
            name,
            email,
            course,
            semester,
            department,
            roll_number,
            phone_number,
        } => {
            let student = Student {
                id: Uuid::new_v4().to_string(),
                student_id: student_id.clone(),
                name,
                email,
                course,
                semester,
                department,
                roll_number,
                phone_number,
                date_of_admission: Local::now().date_naive().to_string(),
                is_active: true,
            };
            store.add_student(student)?;
            println!("Added {student_id} to the roster.");
        }
        Commands::RemoveStudent { student_id } => {
            if store.deactivate_student(&student_id)? {
                println!("Removed {student_id} from the roster.");
            } else {
                println!("No active student {student_id} on the roster.");
            }
        }
        Commands::PostCircular {
            title,
            content,
            category,
            priority,
            author,
            audience,
            expires,
        } => {
            let expires_at = expires
                .map(|raw| {
                    stats::parse_date(&raw)
                        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
                        .with_context(|| format!("--expires `{raw}` must look like 2026-03-02"))
                })
                .transpose()?;

            let circular = Circular {
                id: Uuid::new_v4().to_string(),
                title: title.clone(),
                content,
                category,
                priority,
                created_by: author,
                created_at: chrono::Utc::now(),
                expires_at,
                is_active: true,
                target_audience: audience,
            };
            store.post_circular(circular)?;
            println!("Posted circular: {title}");
        }
        Commands::Circulars { role } => {
            let circulars = store.circulars_for(role);
            if circulars.is_empty() {
                println!("No circulars to show.");
            } else {
                for circular in &circulars {
                    println!(
                        "- {} [{:?}/{:?}] by {} on {}",
                        circular.title,
                        circular.category,
                        circular.priority,
                        circular.created_by,
                        circular.created_at.with_timezone(&Local).format("%Y-%m-%d")
                    );
                    println!("  {}", circular.content);
                }
            }
        }
        Commands::Dashboard { role, student } => {
            let views: Vec<&str> = role.views().iter().map(View::label).collect();
            println!("Views: {}", views.join(" | "));

            let records = store.attendance_records();
            match role {
                Role::Student => {
                    let student_id =
                        student.context("the student dashboard needs --student")?;
                    match stats::student_stats(&student_id, &records, &StatsFilter::default()) {
                        Some(stats) => print_stats(&stats),
                        None => println!("No attendance recorded yet."),
                    }
                }
                Role::Faculty | Role::Admin => {
                    println!("Active students: {}", store.roster(None, None, None).len());
                    println!("Class average: {}%", stats::class_average(&records, None));

                    let alerts =
                        stats::threshold_alerts(&records, stats::DEFAULT_ALERT_THRESHOLD);
                    println!(
                        "Below {}%: {} students",
                        stats::DEFAULT_ALERT_THRESHOLD,
                        alerts.len()
                    );
                    for alert in alerts.iter().take(5) {
                        println!(
                            "- {} ({}): {}%",
                            alert.student_name, alert.student_id, alert.percentage
                        );
                    }
                }
            }

            let circulars = store.circulars_for(role);
            if !circulars.is_empty() {
                println!("Recent circulars:");
                for circular in circulars.iter().take(3) {
                    println!("- {}", circular.title);
                }
            }
        }
        Commands::Backup { out } => {
            let bundle = store.export_bundle()?;
            std::fs::write(&out, bundle)?;
            println!("Backup written to {}.", out.display());
        }
        Commands::Restore { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            store.import_bundle(&raw)?;
            println!("Backup restored from {}.", file.display());
        }
    }

    Ok(())
}
