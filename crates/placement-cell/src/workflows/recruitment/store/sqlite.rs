use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, TransactionBehavior,
};

use super::super::domain::{
    Association, AssociationId, College, CollegeId, Company, CompanyId, DummyCompany,
    DummyCompanyId, DummySession, DummySessionId, Faculty, FacultyId, FacultyPermission,
    MembershipChange, PlacementSession, PlacementType, Programme, ProgrammeId, Qualifications,
    SessionId, SessionKind, SessionRef, Stream, StreamId, Student, StudentId, ToggleOutcome,
    Verification,
};
use super::super::eligibility::SelectionCriteria;
use super::super::query::{SessionPredicate, SessionQuery};
use super::super::repository::{
    CatalogStore, DummyListing, PlacementListing, PlacementStore, RepositoryError,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS programmes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    years INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS streams (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    programme_id INTEGER NOT NULL REFERENCES programmes(id)
);
CREATE TABLE IF NOT EXISTS colleges (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS college_streams (
    college_id INTEGER NOT NULL REFERENCES colleges(id) ON DELETE CASCADE,
    stream_id INTEGER NOT NULL REFERENCES streams(id),
    PRIMARY KEY (college_id, stream_id)
);
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS faculty (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    college_id INTEGER NOT NULL REFERENCES colleges(id),
    can_verify INTEGER NOT NULL DEFAULT 0,
    can_delete_students INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    enrollment_no TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL,
    college_id INTEGER NOT NULL REFERENCES colleges(id),
    stream_id INTEGER NOT NULL REFERENCES streams(id),
    programme_id INTEGER NOT NULL REFERENCES programmes(id),
    current_year INTEGER NOT NULL,
    salary_expected INTEGER,
    is_barred INTEGER NOT NULL DEFAULT 0,
    is_verified INTEGER,
    verified_by INTEGER
);
CREATE TABLE IF NOT EXISTS qualifications (
    student_id INTEGER PRIMARY KEY REFERENCES students(id) ON DELETE CASCADE,
    tenth REAL NOT NULL,
    twelfth REAL NOT NULL,
    graduation REAL,
    active_backlogs INTEGER NOT NULL DEFAULT 0,
    is_verified INTEGER,
    verified_by INTEGER
);
CREATE TABLE IF NOT EXISTS associations (
    id INTEGER PRIMARY KEY,
    company_id INTEGER NOT NULL REFERENCES companies(id),
    college_id INTEGER NOT NULL REFERENCES colleges(id),
    placement_type TEXT NOT NULL CHECK (placement_type IN ('J', 'I')),
    salary INTEGER NOT NULL,
    approved INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS association_streams (
    association_id INTEGER NOT NULL REFERENCES associations(id) ON DELETE CASCADE,
    stream_id INTEGER NOT NULL REFERENCES streams(id),
    PRIMARY KEY (association_id, stream_id)
);
CREATE TABLE IF NOT EXISTS placement_sessions (
    id INTEGER PRIMARY KEY,
    association_id INTEGER NOT NULL UNIQUE REFERENCES associations(id) ON DELETE CASCADE,
    application_deadline TEXT NOT NULL,
    selection_criteria TEXT NOT NULL,
    ended INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS dummy_companies (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    college_id INTEGER NOT NULL REFERENCES colleges(id)
);
CREATE TABLE IF NOT EXISTS dummy_sessions (
    id INTEGER PRIMARY KEY,
    dummy_company_id INTEGER NOT NULL REFERENCES dummy_companies(id) ON DELETE CASCADE,
    placement_type TEXT NOT NULL CHECK (placement_type IN ('J', 'I')),
    salary INTEGER NOT NULL,
    application_deadline TEXT NOT NULL,
    selection_criteria TEXT NOT NULL,
    ended INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS dummy_session_streams (
    dummy_session_id INTEGER NOT NULL REFERENCES dummy_sessions(id) ON DELETE CASCADE,
    stream_id INTEGER NOT NULL REFERENCES streams(id),
    PRIMARY KEY (dummy_session_id, stream_id)
);
CREATE TABLE IF NOT EXISTS enrollments (
    student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    session_kind TEXT NOT NULL CHECK (session_kind IN ('placement', 'dummy')),
    session_id INTEGER NOT NULL,
    PRIMARY KEY (student_id, session_kind, session_id)
);
CREATE TABLE IF NOT EXISTS applications (
    student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    session_kind TEXT NOT NULL CHECK (session_kind IN ('placement', 'dummy')),
    session_id INTEGER NOT NULL,
    PRIMARY KEY (student_id, session_kind, session_id)
);
CREATE INDEX IF NOT EXISTS idx_enrollments_session ON enrollments (session_kind, session_id);
CREATE INDEX IF NOT EXISTS idx_applications_session ON applications (session_kind, session_id);
"#;

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                let detail = message.unwrap_or_else(|| failure.to_string());
                if detail.contains("UNIQUE") || detail.contains("PRIMARY KEY") {
                    RepositoryError::Conflict(detail)
                } else {
                    RepositoryError::Integrity(detail)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => {
                RepositoryError::NotFound("query returned no rows".to_string())
            }
            other => RepositoryError::Unavailable(other.to_string()),
        }
    }
}

/// Column expressions for one session table, so a predicate tree compiles against either.
struct SessionColumns {
    kind: SessionKind,
    from: &'static str,
    id: &'static str,
    college: &'static str,
    salary: &'static str,
    placement_type: &'static str,
    deadline: &'static str,
    ended: &'static str,
    approved: Option<&'static str>,
    stream_subquery: &'static str,
}

const PLACEMENT_COLUMNS: SessionColumns = SessionColumns {
    kind: SessionKind::Placement,
    from: "placement_sessions s JOIN associations a ON a.id = s.association_id",
    id: "s.id",
    college: "a.college_id",
    salary: "a.salary",
    placement_type: "a.placement_type",
    deadline: "s.application_deadline",
    ended: "s.ended",
    approved: Some("a.approved"),
    stream_subquery: "SELECT 1 FROM association_streams x \
                      WHERE x.association_id = a.id AND x.stream_id = ?",
};

const DUMMY_COLUMNS: SessionColumns = SessionColumns {
    kind: SessionKind::Dummy,
    from: "dummy_sessions s JOIN dummy_companies d ON d.id = s.dummy_company_id",
    id: "s.id",
    college: "d.college_id",
    salary: "s.salary",
    placement_type: "s.placement_type",
    deadline: "s.application_deadline",
    ended: "s.ended",
    approved: None,
    stream_subquery: "SELECT 1 FROM dummy_session_streams x \
                      WHERE x.dummy_session_id = s.id AND x.stream_id = ?",
};

fn sql_id(id: u64) -> i64 {
    id as i64
}

fn compile_predicate(
    predicate: &SessionPredicate,
    columns: &SessionColumns,
    params: &mut Vec<Value>,
) -> String {
    match predicate {
        SessionPredicate::College(college) => {
            params.push(Value::Integer(sql_id(college.0)));
            format!("{} = ?", columns.college)
        }
        SessionPredicate::CoversStream(stream) => {
            params.push(Value::Integer(sql_id(stream.0)));
            format!("EXISTS ({})", columns.stream_subquery)
        }
        SessionPredicate::SalaryAtMost(limit) => {
            params.push(Value::Integer(i64::from(*limit)));
            format!("{} <= ?", columns.salary)
        }
        SessionPredicate::Approved => match columns.approved {
            Some(column) => format!("{column} = 1"),
            None => "1".to_string(),
        },
        SessionPredicate::OfType(kind) => {
            params.push(Value::Text(kind.code().to_string()));
            format!("{} = ?", columns.placement_type)
        }
        SessionPredicate::DeadlineOnOrAfter(date) => {
            params.push(Value::Text(date.format("%Y-%m-%d").to_string()));
            format!("{} >= ?", columns.deadline)
        }
        SessionPredicate::Ended => format!("{} = 1", columns.ended),
        SessionPredicate::EnrolledBy(student) => {
            params.push(Value::Integer(sql_id(student.0)));
            membership_subquery("enrollments", columns)
        }
        SessionPredicate::AppliedBy(student) => {
            params.push(Value::Integer(sql_id(student.0)));
            membership_subquery("applications", columns)
        }
        SessionPredicate::Not(inner) => {
            format!("NOT ({})", compile_predicate(inner, columns, params))
        }
        SessionPredicate::Any(options) => {
            if options.is_empty() {
                return "0".to_string();
            }
            let parts: Vec<String> = options
                .iter()
                .map(|option| compile_predicate(option, columns, params))
                .collect();
            format!("({})", parts.join(" OR "))
        }
        SessionPredicate::All(parts) => {
            if parts.is_empty() {
                return "1".to_string();
            }
            let parts: Vec<String> = parts
                .iter()
                .map(|part| compile_predicate(part, columns, params))
                .collect();
            format!("({})", parts.join(" AND "))
        }
    }
}

fn membership_subquery(table: &str, columns: &SessionColumns) -> String {
    format!(
        "EXISTS (SELECT 1 FROM {table} m WHERE m.session_kind = '{}' \
         AND m.session_id = {} AND m.student_id = ?)",
        columns.kind.label(),
        columns.id
    )
}

fn compile_query(query: &SessionQuery, columns: &SessionColumns) -> (String, Vec<Value>) {
    let mut params = Vec::new();
    let clauses: Vec<String> = query
        .predicates()
        .iter()
        .map(|predicate| compile_predicate(predicate, columns, &mut params))
        .collect();
    let filter = if clauses.is_empty() {
        "1".to_string()
    } else {
        clauses.join(" AND ")
    };

    let sql = format!(
        "SELECT {id} FROM {from} WHERE {filter} ORDER BY {deadline} ASC, {id} ASC",
        id = columns.id,
        from = columns.from,
        deadline = columns.deadline,
    );
    (sql, params)
}

fn parse_type(code: &str) -> Result<PlacementType, RepositoryError> {
    PlacementType::from_code(code)
        .ok_or_else(|| RepositoryError::Integrity(format!("unknown placement type '{code}'")))
}

fn parse_criteria(raw: &str) -> Result<SelectionCriteria, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|err| RepositoryError::Integrity(format!("invalid selection criteria: {err}")))
}

fn encode_criteria(criteria: &SelectionCriteria) -> Result<String, RepositoryError> {
    serde_json::to_string(criteria)
        .map_err(|err| RepositoryError::Integrity(format!("unserializable criteria: {err}")))
}

fn id_set<T, F>(
    conn: &Connection,
    sql: &str,
    owner: i64,
    wrap: F,
) -> Result<BTreeSet<T>, RepositoryError>
where
    T: Ord,
    F: Fn(u64) -> T,
{
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params![owner], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids.into_iter().map(|id| wrap(id as u64)).collect())
}

fn session_refs(
    conn: &Connection,
    table: &str,
    student: i64,
) -> Result<BTreeSet<SessionRef>, RepositoryError> {
    let sql = format!("SELECT session_kind, session_id FROM {table} WHERE student_id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![student], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(kind, id)| {
            SessionKind::from_label(&kind)
                .map(|kind| SessionRef::from_parts(kind, id as u64))
                .ok_or_else(|| RepositoryError::Integrity(format!("unknown session kind '{kind}'")))
        })
        .collect()
}

fn verification(verdict: Option<bool>, verified_by: Option<i64>) -> Verification {
    Verification {
        verdict,
        verified_by: verified_by.map(|id| FacultyId(id as u64)),
    }
}

const STUDENT_COLUMNS: &str = "id, enrollment_no, first_name, last_name, email, college_id, \
                               stream_id, programme_id, current_year, salary_expected, \
                               is_barred, is_verified, verified_by";

fn load_student(
    conn: &Connection,
    filter: &str,
    value: Value,
) -> Result<Option<Student>, RepositoryError> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE {filter} = ?1");
    let student = conn
        .query_row(&sql, params![value], |row| {
            Ok(Student {
                id: StudentId(row.get::<_, i64>(0)? as u64),
                enrollment_no: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                email: row.get(4)?,
                college: CollegeId(row.get::<_, i64>(5)? as u64),
                stream: StreamId(row.get::<_, i64>(6)? as u64),
                programme: ProgrammeId(row.get::<_, i64>(7)? as u64),
                current_year: row.get(8)?,
                salary_expected: row.get(9)?,
                is_barred: row.get(10)?,
                verification: verification(row.get(11)?, row.get(12)?),
                qualifications: None,
                sessions: BTreeSet::new(),
                sessions_applied_to: BTreeSet::new(),
            })
        })
        .optional()?;

    let Some(mut student) = student else {
        return Ok(None);
    };
    let id = sql_id(student.id.0);

    student.qualifications = conn
        .query_row(
            "SELECT tenth, twelfth, graduation, active_backlogs, is_verified, verified_by \
             FROM qualifications WHERE student_id = ?1",
            params![id],
            |row| {
                Ok(Qualifications {
                    tenth_percentage: row.get::<_, f64>(0)? as f32,
                    twelfth_percentage: row.get::<_, f64>(1)? as f32,
                    graduation_percentage: row.get::<_, Option<f64>>(2)?.map(|value| value as f32),
                    active_backlogs: row.get(3)?,
                    verification: verification(row.get(4)?, row.get(5)?),
                })
            },
        )
        .optional()?;
    student.sessions = session_refs(conn, "enrollments", id)?;
    student.sessions_applied_to = session_refs(conn, "applications", id)?;

    Ok(Some(student))
}

fn write_qualifications(conn: &Connection, student: &Student) -> Result<(), RepositoryError> {
    let id = sql_id(student.id.0);
    match &student.qualifications {
        Some(qualifications) => {
            conn.execute(
                "INSERT INTO qualifications \
                     (student_id, tenth, twelfth, graduation, active_backlogs, is_verified, verified_by) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT (student_id) DO UPDATE SET \
                     tenth = excluded.tenth, twelfth = excluded.twelfth, \
                     graduation = excluded.graduation, active_backlogs = excluded.active_backlogs, \
                     is_verified = excluded.is_verified, verified_by = excluded.verified_by",
                params![
                    id,
                    f64::from(qualifications.tenth_percentage),
                    f64::from(qualifications.twelfth_percentage),
                    qualifications.graduation_percentage.map(f64::from),
                    qualifications.active_backlogs,
                    qualifications.verification.verdict,
                    qualifications.verification.verified_by.map(|id| sql_id(id.0)),
                ],
            )?;
        }
        None => {
            conn.execute(
                "DELETE FROM qualifications WHERE student_id = ?1",
                params![id],
            )?;
        }
    }
    Ok(())
}

struct PlacementRow {
    id: i64,
    association_id: i64,
    deadline: NaiveDate,
    criteria: String,
    ended: bool,
    company_id: i64,
    college_id: i64,
    placement_type: String,
    salary: u32,
    approved: bool,
    company_name: String,
}

fn load_placement(conn: &Connection, id: i64) -> Result<Option<PlacementListing>, RepositoryError> {
    let row = conn
        .query_row(
            "SELECT s.id, s.association_id, s.application_deadline, s.selection_criteria, \
                    s.ended, a.company_id, a.college_id, a.placement_type, a.salary, \
                    a.approved, c.name \
             FROM placement_sessions s \
             JOIN associations a ON a.id = s.association_id \
             JOIN companies c ON c.id = a.company_id \
             WHERE s.id = ?1",
            params![id],
            |row| {
                Ok(PlacementRow {
                    id: row.get(0)?,
                    association_id: row.get(1)?,
                    deadline: row.get(2)?,
                    criteria: row.get(3)?,
                    ended: row.get(4)?,
                    company_id: row.get(5)?,
                    college_id: row.get(6)?,
                    placement_type: row.get(7)?,
                    salary: row.get(8)?,
                    approved: row.get(9)?,
                    company_name: row.get(10)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let session_id = SessionId(row.id as u64);
    let streams = id_set(
        conn,
        "SELECT stream_id FROM association_streams WHERE association_id = ?1",
        row.association_id,
        StreamId,
    )?;
    let students = id_set(
        conn,
        "SELECT student_id FROM enrollments WHERE session_kind = 'placement' AND session_id = ?1",
        row.id,
        StudentId,
    )?;
    let applicants = id_set(
        conn,
        "SELECT student_id FROM applications WHERE session_kind = 'placement' AND session_id = ?1",
        row.id,
        StudentId,
    )?;

    Ok(Some(PlacementListing {
        session: PlacementSession {
            id: session_id,
            association: AssociationId(row.association_id as u64),
            application_deadline: row.deadline,
            selection_criteria: parse_criteria(&row.criteria)?,
            ended: row.ended,
            students,
            applicants,
        },
        association: Association {
            id: AssociationId(row.association_id as u64),
            company: CompanyId(row.company_id as u64),
            college: CollegeId(row.college_id as u64),
            placement_type: parse_type(&row.placement_type)?,
            salary: row.salary,
            streams,
            approved: row.approved,
            session: Some(session_id),
        },
        company: Company {
            id: CompanyId(row.company_id as u64),
            name: row.company_name,
        },
    }))
}

struct DummyRow {
    id: i64,
    company_id: i64,
    placement_type: String,
    salary: u32,
    deadline: NaiveDate,
    criteria: String,
    ended: bool,
    company_name: String,
    college_id: i64,
}

fn load_dummy(conn: &Connection, id: i64) -> Result<Option<DummyListing>, RepositoryError> {
    let row = conn
        .query_row(
            "SELECT s.id, s.dummy_company_id, s.placement_type, s.salary, \
                    s.application_deadline, s.selection_criteria, s.ended, d.name, d.college_id \
             FROM dummy_sessions s \
             JOIN dummy_companies d ON d.id = s.dummy_company_id \
             WHERE s.id = ?1",
            params![id],
            |row| {
                Ok(DummyRow {
                    id: row.get(0)?,
                    company_id: row.get(1)?,
                    placement_type: row.get(2)?,
                    salary: row.get(3)?,
                    deadline: row.get(4)?,
                    criteria: row.get(5)?,
                    ended: row.get(6)?,
                    company_name: row.get(7)?,
                    college_id: row.get(8)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let streams = id_set(
        conn,
        "SELECT stream_id FROM dummy_session_streams WHERE dummy_session_id = ?1",
        row.id,
        StreamId,
    )?;
    let students = id_set(
        conn,
        "SELECT student_id FROM enrollments WHERE session_kind = 'dummy' AND session_id = ?1",
        row.id,
        StudentId,
    )?;
    let applicants = id_set(
        conn,
        "SELECT student_id FROM applications WHERE session_kind = 'dummy' AND session_id = ?1",
        row.id,
        StudentId,
    )?;

    Ok(Some(DummyListing {
        session: DummySession {
            id: DummySessionId(row.id as u64),
            dummy_company: DummyCompanyId(row.company_id as u64),
            placement_type: parse_type(&row.placement_type)?,
            salary: row.salary,
            streams,
            application_deadline: row.deadline,
            selection_criteria: parse_criteria(&row.criteria)?,
            ended: row.ended,
            students,
            applicants,
        },
        company: DummyCompany {
            id: DummyCompanyId(row.company_id as u64),
            name: row.company_name,
            college: CollegeId(row.college_id as u64),
        },
    }))
}

fn matching_ids(
    conn: &Connection,
    query: &SessionQuery,
    columns: &SessionColumns,
) -> Result<Vec<i64>, RepositoryError> {
    let (sql, values) = compile_query(query, columns);
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

fn session_exists(conn: &Connection, session: SessionRef) -> Result<bool, RepositoryError> {
    let sql = match session {
        SessionRef::Placement(_) => "SELECT EXISTS (SELECT 1 FROM placement_sessions WHERE id = ?1)",
        SessionRef::Dummy(_) => "SELECT EXISTS (SELECT 1 FROM dummy_sessions WHERE id = ?1)",
    };
    Ok(conn.query_row(sql, params![sql_id(session.raw_id())], |row| row.get(0))?)
}

/// SQLite-backed store. One connection behind a mutex; membership flips run inside an
/// `IMMEDIATE` transaction.
pub struct SqlitePlacementStore {
    conn: Mutex<Connection>,
}

impl SqlitePlacementStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Enable foreign keys and apply the schema to an existing connection.
    pub fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("connection mutex poisoned".to_string()))
    }

    fn college_where(
        conn: &Connection,
        filter: &str,
        value: Value,
    ) -> Result<Option<College>, RepositoryError> {
        let sql = format!("SELECT id, code, name FROM colleges WHERE {filter} = ?1");
        let college = conn
            .query_row(&sql, params![value], |row| {
                Ok(College {
                    id: CollegeId(row.get::<_, i64>(0)? as u64),
                    code: row.get(1)?,
                    name: row.get(2)?,
                    streams: BTreeSet::new(),
                })
            })
            .optional()?;

        match college {
            Some(mut college) => {
                college.streams = id_set(
                    conn,
                    "SELECT stream_id FROM college_streams WHERE college_id = ?1",
                    sql_id(college.id.0),
                    StreamId,
                )?;
                Ok(Some(college))
            }
            None => Ok(None),
        }
    }

    fn stream_where(
        conn: &Connection,
        filter: &str,
        value: Value,
    ) -> Result<Option<Stream>, RepositoryError> {
        let sql = format!("SELECT id, code, name, programme_id FROM streams WHERE {filter} = ?1");
        Ok(conn
            .query_row(&sql, params![value], |row| {
                Ok(Stream {
                    id: StreamId(row.get::<_, i64>(0)? as u64),
                    code: row.get(1)?,
                    name: row.get(2)?,
                    programme: ProgrammeId(row.get::<_, i64>(3)? as u64),
                })
            })
            .optional()?)
    }
}

impl PlacementStore for SqlitePlacementStore {
    fn college(&self, id: CollegeId) -> Result<Option<College>, RepositoryError> {
        let conn = self.conn()?;
        Self::college_where(&conn, "id", Value::Integer(sql_id(id.0)))
    }

    fn college_by_code(&self, code: &str) -> Result<Option<College>, RepositoryError> {
        let conn = self.conn()?;
        Self::college_where(&conn, "code", Value::Text(code.to_string()))
    }

    fn stream(&self, id: StreamId) -> Result<Option<Stream>, RepositoryError> {
        let conn = self.conn()?;
        Self::stream_where(&conn, "id", Value::Integer(sql_id(id.0)))
    }

    fn stream_by_code(&self, code: &str) -> Result<Option<Stream>, RepositoryError> {
        let conn = self.conn()?;
        Self::stream_where(&conn, "code", Value::Text(code.to_string()))
    }

    fn programme(&self, id: ProgrammeId) -> Result<Option<Programme>, RepositoryError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT id, name, years FROM programmes WHERE id = ?1",
                params![sql_id(id.0)],
                |row| {
                    Ok(Programme {
                        id: ProgrammeId(row.get::<_, i64>(0)? as u64),
                        name: row.get(1)?,
                        years: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, RepositoryError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT id, username, college_id, can_verify, can_delete_students \
                 FROM faculty WHERE id = ?1",
                params![sql_id(id.0)],
                |row| {
                    let mut permissions = BTreeSet::new();
                    if row.get::<_, bool>(3)? {
                        permissions.insert(FacultyPermission::Verifier);
                    }
                    if row.get::<_, bool>(4)? {
                        permissions.insert(FacultyPermission::StudentDeletion);
                    }
                    Ok(Faculty {
                        id: FacultyId(row.get::<_, i64>(0)? as u64),
                        username: row.get(1)?,
                        college: CollegeId(row.get::<_, i64>(2)? as u64),
                        permissions,
                    })
                },
            )
            .optional()?)
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError> {
        let conn = self.conn()?;
        load_student(&conn, "id", Value::Integer(sql_id(id.0)))
    }

    fn student_by_enrollment(
        &self,
        enrollment_no: &str,
    ) -> Result<Option<Student>, RepositoryError> {
        let conn = self.conn()?;
        load_student(&conn, "enrollment_no", Value::Text(enrollment_no.to_string()))
    }

    fn insert_student(&self, mut student: Student) -> Result<Student, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO students (enrollment_no, first_name, last_name, email, college_id, \
                 stream_id, programme_id, current_year, salary_expected, is_barred, \
                 is_verified, verified_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                student.enrollment_no,
                student.first_name,
                student.last_name,
                student.email,
                sql_id(student.college.0),
                sql_id(student.stream.0),
                sql_id(student.programme.0),
                student.current_year,
                student.salary_expected,
                student.is_barred,
                student.verification.verdict,
                student.verification.verified_by.map(|id| sql_id(id.0)),
            ],
        )?;
        student.id = StudentId(tx.last_insert_rowid() as u64);
        student.sessions.clear();
        student.sessions_applied_to.clear();
        write_qualifications(&tx, &student)?;
        tx.commit()?;
        Ok(student)
    }

    fn update_student(&self, student: &Student) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE students SET enrollment_no = ?2, first_name = ?3, last_name = ?4, \
                 email = ?5, college_id = ?6, stream_id = ?7, programme_id = ?8, \
                 current_year = ?9, salary_expected = ?10, is_barred = ?11, \
                 is_verified = ?12, verified_by = ?13 \
             WHERE id = ?1",
            params![
                sql_id(student.id.0),
                student.enrollment_no,
                student.first_name,
                student.last_name,
                student.email,
                sql_id(student.college.0),
                sql_id(student.stream.0),
                sql_id(student.programme.0),
                student.current_year,
                student.salary_expected,
                student.is_barred,
                student.verification.verdict,
                student.verification.verified_by.map(|id| sql_id(id.0)),
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(format!("student {}", student.id)));
        }
        write_qualifications(&tx, student)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_student(&self, id: StudentId) -> Result<bool, RepositoryError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM students WHERE id = ?1", params![sql_id(id.0)])?;
        Ok(removed > 0)
    }

    fn placement_session(
        &self,
        id: SessionId,
    ) -> Result<Option<PlacementListing>, RepositoryError> {
        let conn = self.conn()?;
        load_placement(&conn, sql_id(id.0))
    }

    fn dummy_session(&self, id: DummySessionId) -> Result<Option<DummyListing>, RepositoryError> {
        let conn = self.conn()?;
        load_dummy(&conn, sql_id(id.0))
    }

    fn query_placement_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<PlacementListing>, RepositoryError> {
        let conn = self.conn()?;
        let mut listings = Vec::new();
        for id in matching_ids(&conn, query, &PLACEMENT_COLUMNS)? {
            let listing = load_placement(&conn, id)?.ok_or_else(|| {
                RepositoryError::Integrity(format!("placement session {id} vanished mid-query"))
            })?;
            listings.push(listing);
        }
        Ok(listings)
    }

    fn query_dummy_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<DummyListing>, RepositoryError> {
        let conn = self.conn()?;
        let mut listings = Vec::new();
        for id in matching_ids(&conn, query, &DUMMY_COLUMNS)? {
            let listing = load_dummy(&conn, id)?.ok_or_else(|| {
                RepositoryError::Integrity(format!("dummy session {id} vanished mid-query"))
            })?;
            listings.push(listing);
        }
        Ok(listings)
    }

    fn change_membership(
        &self,
        student: StudentId,
        session: SessionRef,
        change: MembershipChange,
    ) -> Result<ToggleOutcome, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let student_exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM students WHERE id = ?1)",
            params![sql_id(student.0)],
            |row| row.get(0),
        )?;
        if !student_exists {
            return Err(RepositoryError::NotFound(format!("student {student}")));
        }
        if !session_exists(&tx, session)? {
            return Err(RepositoryError::NotFound(format!("session {session}")));
        }

        let student_key = sql_id(student.0);
        let kind = session.kind().label();
        let session_key = sql_id(session.raw_id());
        let key = params![student_key, kind, session_key];
        let enrolled: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM enrollments \
             WHERE student_id = ?1 AND session_kind = ?2 AND session_id = ?3)",
            key,
            |row| row.get(0),
        )?;
        if enrolled != change.expects_enrolled() {
            return Err(RepositoryError::Stale(format!(
                "student {student} in session {session}"
            )));
        }

        match change {
            MembershipChange::Join => {
                tx.execute(
                    "INSERT INTO enrollments (student_id, session_kind, session_id) \
                     VALUES (?1, ?2, ?3)",
                    key,
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO applications (student_id, session_kind, session_id) \
                     VALUES (?1, ?2, ?3)",
                    key,
                )?;
            }
            MembershipChange::Leave => {
                tx.execute(
                    "DELETE FROM enrollments \
                     WHERE student_id = ?1 AND session_kind = ?2 AND session_id = ?3",
                    key,
                )?;
            }
        }

        tx.commit()?;
        Ok(change.outcome())
    }
}

impl CatalogStore for SqlitePlacementStore {
    fn insert_college(&self, college: College) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO colleges (id, code, name) VALUES (?1, ?2, ?3)",
            params![sql_id(college.id.0), college.code, college.name],
        )?;
        for stream in &college.streams {
            tx.execute(
                "INSERT INTO college_streams (college_id, stream_id) VALUES (?1, ?2)",
                params![sql_id(college.id.0), sql_id(stream.0)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_programme(&self, programme: Programme) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO programmes (id, name, years) VALUES (?1, ?2, ?3)",
            params![sql_id(programme.id.0), programme.name, programme.years],
        )?;
        Ok(())
    }

    fn insert_stream(&self, stream: Stream) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO streams (id, code, name, programme_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                sql_id(stream.id.0),
                stream.code,
                stream.name,
                sql_id(stream.programme.0)
            ],
        )?;
        Ok(())
    }

    fn insert_company(&self, company: Company) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO companies (id, name) VALUES (?1, ?2)",
            params![sql_id(company.id.0), company.name],
        )?;
        Ok(())
    }

    fn insert_faculty(&self, faculty: Faculty) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO faculty (id, username, college_id, can_verify, can_delete_students) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sql_id(faculty.id.0),
                faculty.username,
                sql_id(faculty.college.0),
                faculty.can(FacultyPermission::Verifier),
                faculty.can(FacultyPermission::StudentDeletion),
            ],
        )?;
        Ok(())
    }

    fn insert_association(&self, association: Association) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO associations (id, company_id, college_id, placement_type, salary, approved) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sql_id(association.id.0),
                sql_id(association.company.0),
                sql_id(association.college.0),
                association.placement_type.code(),
                association.salary,
                association.approved,
            ],
        )?;
        for stream in &association.streams {
            tx.execute(
                "INSERT INTO association_streams (association_id, stream_id) VALUES (?1, ?2)",
                params![sql_id(association.id.0), sql_id(stream.0)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_placement_session(&self, session: PlacementSession) -> Result<(), RepositoryError> {
        let criteria = encode_criteria(&session.selection_criteria)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO placement_sessions \
                 (id, association_id, application_deadline, selection_criteria, ended) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sql_id(session.id.0),
                sql_id(session.association.0),
                session.application_deadline,
                criteria,
                session.ended,
            ],
        )?;
        Ok(())
    }

    fn insert_dummy_company(&self, company: DummyCompany) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO dummy_companies (id, name, college_id) VALUES (?1, ?2, ?3)",
            params![sql_id(company.id.0), company.name, sql_id(company.college.0)],
        )?;
        Ok(())
    }

    fn insert_dummy_session(&self, session: DummySession) -> Result<(), RepositoryError> {
        let criteria = encode_criteria(&session.selection_criteria)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO dummy_sessions (id, dummy_company_id, placement_type, salary, \
                 application_deadline, selection_criteria, ended) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sql_id(session.id.0),
                sql_id(session.dummy_company.0),
                session.placement_type.code(),
                session.salary,
                session.application_deadline,
                criteria,
                session.ended,
            ],
        )?;
        for stream in &session.streams {
            tx.execute(
                "INSERT INTO dummy_session_streams (dummy_session_id, stream_id) VALUES (?1, ?2)",
                params![sql_id(session.id.0), sql_id(stream.0)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn set_session_ended(&self, session: SessionRef, ended: bool) -> Result<(), RepositoryError> {
        let sql = match session {
            SessionRef::Placement(_) => "UPDATE placement_sessions SET ended = ?2 WHERE id = ?1",
            SessionRef::Dummy(_) => "UPDATE dummy_sessions SET ended = ?2 WHERE id = ?1",
        };
        let conn = self.conn()?;
        let changed = conn.execute(sql, params![sql_id(session.raw_id()), ended])?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(format!("session {session}")));
        }
        Ok(())
    }
}
