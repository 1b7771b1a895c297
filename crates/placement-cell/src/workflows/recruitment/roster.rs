//! Enrolled-student rosters handed to faculty as CSV downloads.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::domain::{ProgrammeId, Stream, StreamId};
use super::repository::{PlacementStore, RepositoryError, SessionTarget};

pub const ROSTER_COLUMNS: [&str; 7] = [
    "S.No.",
    "Enrollment No.",
    "First Name",
    "Last Name",
    "Email",
    "Stream",
    "Year",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRoster {
    /// `<Company> <job|internship> @ <College>`
    pub heading: String,
    /// `<Programme> - <Stream>, <Stream>`
    pub subheading: String,
    pub rows: Vec<RosterRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterRow {
    pub serial: usize,
    pub enrollment_no: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub stream: String,
    pub current_year: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to write roster: {0}")]
    Csv(#[from] csv::Error),
    #[error("roster output is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

impl SessionRoster {
    /// Two heading lines, the column header, then one line per student.
    pub fn to_csv(&self) -> Result<String, RosterError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record([self.heading.as_str()])?;
        writer.write_record([self.subheading.as_str()])?;
        writer.write_record(ROSTER_COLUMNS)?;
        for row in &self.rows {
            writer.write_record([
                row.serial.to_string(),
                row.enrollment_no.clone(),
                row.first_name.clone(),
                row.last_name.clone(),
                row.email.clone(),
                row.stream.clone(),
                row.current_year.to_string(),
            ])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Download name such as `acme-analytics-job.csv`.
    pub fn file_name(&self) -> String {
        let company = self.heading.split(" @ ").next().unwrap_or_default();
        let slug: Vec<String> = company
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if slug.is_empty() {
            "session-roster.csv".to_string()
        } else {
            format!("{}.csv", slug.join("-"))
        }
    }
}

/// Assemble the roster of the students currently enrolled in `target`, ordered by enrollment
/// number.
pub(crate) fn build_roster<S>(
    store: &S,
    target: &SessionTarget,
) -> Result<SessionRoster, RepositoryError>
where
    S: PlacementStore + ?Sized,
{
    let college = store.college(target.college)?.ok_or_else(|| {
        RepositoryError::Integrity(format!(
            "college {} of session {}",
            target.college, target.reference
        ))
    })?;

    let mut streams: BTreeMap<StreamId, Stream> = BTreeMap::new();
    for id in &target.streams {
        if let Some(stream) = store.stream(*id)? {
            streams.insert(*id, stream);
        }
    }

    let mut students = Vec::with_capacity(target.students.len());
    for id in &target.students {
        match store.student(*id)? {
            Some(student) => students.push(student),
            None => tracing::warn!(
                student = %id,
                session = %target.reference,
                "enrolled student missing from store"
            ),
        }
    }
    students.sort_by(|a, b| a.enrollment_no.cmp(&b.enrollment_no));

    let mut rows = Vec::with_capacity(students.len());
    for (index, student) in students.into_iter().enumerate() {
        let stream = match streams.get(&student.stream) {
            Some(stream) => stream.name.clone(),
            None => store
                .stream(student.stream)?
                .map(|stream| stream.name)
                .unwrap_or_default(),
        };
        rows.push(RosterRow {
            serial: index + 1,
            enrollment_no: student.enrollment_no,
            first_name: student.first_name,
            last_name: student.last_name,
            email: student.email,
            stream,
            current_year: student.current_year,
        });
    }

    let programme_ids: BTreeSet<ProgrammeId> =
        streams.values().map(|stream| stream.programme).collect();
    let mut programmes = Vec::with_capacity(programme_ids.len());
    for id in programme_ids {
        if let Some(programme) = store.programme(id)? {
            programmes.push(programme.name);
        }
    }
    let stream_names: Vec<&str> = streams.values().map(|stream| stream.name.as_str()).collect();

    Ok(SessionRoster {
        heading: format!(
            "{} {} @ {}",
            target.company_name,
            target.placement_type.label(),
            college.name
        ),
        subheading: format!("{} - {}", programmes.join(", "), stream_names.join(", ")),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> SessionRoster {
        SessionRoster {
            heading: "Acme Analytics, Inc. job @ Maharaja Agrasen Institute".to_string(),
            subheading: "B.Tech - Computer Science".to_string(),
            rows: vec![RosterRow {
                serial: 1,
                enrollment_no: "00116402720".to_string(),
                first_name: "Asha".to_string(),
                last_name: "Verma".to_string(),
                email: "asha.verma@example.edu".to_string(),
                stream: "Computer Science".to_string(),
                current_year: 3,
            }],
        }
    }

    #[test]
    fn csv_starts_with_headings_and_columns() {
        let csv = roster().to_csv().expect("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "\"Acme Analytics, Inc. job @ Maharaja Agrasen Institute\"");
        assert_eq!(lines[1], "B.Tech - Computer Science");
        assert_eq!(
            lines[2],
            "S.No.,Enrollment No.,First Name,Last Name,Email,Stream,Year"
        );
        assert_eq!(
            lines[3],
            "1,00116402720,Asha,Verma,asha.verma@example.edu,Computer Science,3"
        );
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn file_names_are_slugged_from_the_company() {
        assert_eq!(roster().file_name(), "acme-analytics-inc-job.csv");
        let untitled = SessionRoster {
            heading: String::new(),
            subheading: String::new(),
            rows: Vec::new(),
        };
        assert_eq!(untitled.file_name(), "session-roster.csv");
    }
}
