use rusqlite::{params, Connection, Row};

use crate::core::timestamp::format_timestamp;
use crate::core::SessionError;
use crate::store::{helpers::parse_datetime, models::SampleRecord};

fn row_to_sample(row: &Row) -> Result<SampleRecord, SessionError> {
    let timestamp: String = row.get("timestamp")?;
    let frame: String = row.get("frame")?;

    Ok(SampleRecord {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        frame: serde_json::from_str(&frame)?,
    })
}

pub fn insert(conn: &Connection, sample: &SampleRecord) -> Result<(), SessionError> {
    conn.execute(
        "INSERT INTO pressure_samples (id, session_id, timestamp, frame)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            sample.id,
            sample.session_id,
            format_timestamp(&sample.timestamp),
            serde_json::to_string(&sample.frame)?,
        ],
    )?;
    Ok(())
}

/// Samples of one session in timestamp order.
pub fn list_for_session(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<SampleRecord>, SessionError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, timestamp, frame
         FROM pressure_samples
         WHERE session_id = ?1
         ORDER BY timestamp ASC, rowid ASC",
    )?;

    let mut rows = stmt.query(params![session_id])?;
    let mut samples = Vec::new();
    while let Some(row) = rows.next()? {
        samples.push(row_to_sample(row)?);
    }
    Ok(samples)
}
