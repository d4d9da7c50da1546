use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::core::timestamp::format_timestamp;
use crate::core::SessionError;
use crate::store::{
    helpers::{parse_datetime, parse_optional_datetime, to_i64, to_u64},
    models::SessionRecord,
};

const SESSION_COLUMNS: &str =
    "id, patient_id, clinician_id, note, start_time, end_time, sample_count, max_pressure_kpa";

fn row_to_session(row: &Row) -> Result<SessionRecord, SessionError> {
    let start_time: String = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let sample_count: i64 = row.get("sample_count")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        patient_id: row.get("patient_id")?,
        clinician_id: row.get("clinician_id")?,
        note: row.get("note")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_optional_datetime(end_time, "end_time")?,
        sample_count: to_u64(sample_count, "sample_count")?,
        max_pressure_kpa: row.get("max_pressure_kpa")?,
    })
}

/// Insert a new session.
///
/// Violating the one-open-session index reports `InvalidState`.
pub fn insert(conn: &Connection, session: &SessionRecord) -> Result<(), SessionError> {
    let result = conn.execute(
        "INSERT INTO sessions (id, patient_id, clinician_id, note, start_time, end_time, sample_count, max_pressure_kpa)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session.id,
            session.patient_id,
            session.clinician_id,
            session.note,
            format_timestamp(&session.start_time),
            session.end_time.as_ref().map(format_timestamp),
            to_i64(session.sample_count)?,
            session.max_pressure_kpa,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation && session.end_time.is_none() =>
        {
            Err(SessionError::InvalidState(
                "Patient already has a session in progress".to_string(),
            ))
        }
        Err(err) => Err(err.into()),
    }
}

pub fn get(conn: &Connection, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
    ))?;

    stmt.query_row(params![session_id], |row| Ok(row_to_session(row)))
        .optional()?
        .transpose()
}

/// The patient's open session, if any.
pub fn find_open(conn: &Connection, patient_id: &str) -> Result<Option<SessionRecord>, SessionError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions
         WHERE patient_id = ?1 AND end_time IS NULL
         LIMIT 1"
    ))?;

    stmt.query_row(params![patient_id], |row| Ok(row_to_session(row)))
        .optional()?
        .transpose()
}

/// Sessions of one patient, most recent start first.
pub fn list_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<SessionRecord>, SessionError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions
         WHERE patient_id = ?1
         ORDER BY start_time DESC, rowid DESC"
    ))?;

    let mut rows = stmt.query(params![patient_id])?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }
    Ok(sessions)
}

/// Persist the running sample count and peak pressure.
pub fn update_statistics(conn: &Connection, session: &SessionRecord) -> Result<(), SessionError> {
    conn.execute(
        "UPDATE sessions
         SET sample_count = ?1,
             max_pressure_kpa = ?2
         WHERE id = ?3",
        params![
            to_i64(session.sample_count)?,
            session.max_pressure_kpa,
            session.id,
        ],
    )?;
    Ok(())
}

/// Set the end time. Only an open session is touched.
pub fn close(conn: &Connection, session: &SessionRecord) -> Result<(), SessionError> {
    let Some(end_time) = session.end_time.as_ref() else {
        return Err(SessionError::InvalidState(
            "cannot close a session without an end time".to_string(),
        ));
    };

    conn.execute(
        "UPDATE sessions
         SET end_time = ?1
         WHERE id = ?2 AND end_time IS NULL",
        params![format_timestamp(end_time), session.id],
    )?;
    Ok(())
}
