use chrono::SecondsFormat;

use crate::models::checkin::CheckInRecord;
use crate::models::event::Event;

use super::aggregator::AttendanceSnapshot;

/// Flat tabular export: one row per checked-in attendee. Pure function of
/// its input; the caller decides where the bytes go.
pub fn attendance_csv(records: &[CheckInRecord]) -> String {
    let mut out = String::from("Name,Department,Year,Checked In At\n");
    for record in records {
        out.push_str(&csv_field(&record.name));
        out.push(',');
        out.push_str(&csv_field(&record.department));
        out.push(',');
        out.push_str(&record.year.to_string());
        out.push(',');
        out.push_str(
            &record
                .checked_in_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Formatted report: event header, summary counts, then the same
/// per-attendee rows as the tabular export.
pub fn attendance_report(
    event: &Event,
    snapshot: &AttendanceSnapshot,
    records: &[CheckInRecord],
) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str(&format!(
        "<title>Attendance Report - {}</title>\n",
        html_escape(&event.title)
    ));
    out.push_str("<style>body{font-family:sans-serif}table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:4px 10px}</style>\n");
    out.push_str("</head>\n<body>\n");

    out.push_str(&format!("<h1>{}</h1>\n", html_escape(&event.title)));
    out.push_str(&format!(
        "<p>{} &mdash; {}</p>\n",
        event.start_at.format("%d %b %Y %H:%M"),
        event.end_at.format("%d %b %Y %H:%M"),
    ));
    out.push_str(&format!(
        "<p>Registered: {} | Checked in: {} | Rate: {}%</p>\n",
        snapshot.registered, snapshot.checked_in, snapshot.rate_percent
    ));

    out.push_str("<table>\n<tr><th>Name</th><th>Department</th><th>Year</th><th>Checked In At</th></tr>\n");
    for record in records {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(&record.name),
            html_escape(&record.department),
            record.year,
            record
                .checked_in_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{EventMetrics, EventStatus, EventTarget};
    use crate::models::participant::Participant;
    use crate::stats::aggregator;
    use chrono::{Duration, TimeZone, Utc};

    fn record(name: &str, dept: &str) -> CheckInRecord {
        let registration = Participant::new(
            "E1",
            "U1",
            name,
            "u@example.edu",
            dept,
            2,
            "UE-TESTCODE".to_string(),
        );
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        CheckInRecord::new(&registration, "operator", at)
    }

    #[test]
    fn csv_has_header_and_one_row_per_record() {
        let records = vec![record("Asha Rao", "CSE"), record("Ben Kim", "ECE")];
        let csv = attendance_csv(&records);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Name,Department,Year,Checked In At");
        assert_eq!(lines[1], "Asha Rao,CSE,2,2026-03-14T09:30:00Z");
    }

    #[test]
    fn csv_escapes_commas_and_quotes() {
        let records = vec![record("Rao, Asha \"AR\"", "CSE")];
        let csv = attendance_csv(&records);
        assert!(csv.contains("\"Rao, Asha \"\"AR\"\"\",CSE"));
    }

    #[test]
    fn escaping_is_safe_for_attribute_context_too() {
        assert_eq!(
            html_escape(r#"Tom & Jerry's "big" <show>"#),
            "Tom &amp; Jerry's &quot;big&quot; &lt;show&gt;"
        );
    }

    #[test]
    fn report_embeds_event_header_and_counts() {
        let start = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let event = crate::models::event::Event {
            id: None,
            title: "Tech <Summit>".to_string(),
            description: String::new(),
            category: "Tech".to_string(),
            start_at: start,
            end_at: start + Duration::hours(8),
            location: "Auditorium".to_string(),
            meeting_url: None,
            organization: None,
            status: EventStatus::Active,
            owner_id: "owner".to_string(),
            target: EventTarget::default(),
            is_paid: false,
            price: 0.0,
            metrics: EventMetrics::default(),
            notified_10min: false,
            feedback_requested: false,
        };
        let records = vec![record("Asha Rao", "CSE")];
        let snapshot = aggregator::compute(3, &records);

        let report = attendance_report(&event, &snapshot, &records);
        assert!(report.contains("Tech &lt;Summit&gt;"));
        assert!(report.contains("Registered: 3 | Checked in: 1 | Rate: 33%"));
        assert!(report.contains("<td>Asha Rao</td>"));
    }
}
