use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::timestamp::format_timestamp;
use crate::core::SessionError;
use crate::store::{helpers::parse_datetime, models::Patient};

const PATIENT_COLUMNS: &str = "id, clinician_id, name, identifier, age, created_at";

fn row_to_patient(row: &Row) -> Result<Patient, SessionError> {
    let created_at: String = row.get("created_at")?;
    let age: Option<i64> = row.get("age")?;

    Ok(Patient {
        id: row.get("id")?,
        clinician_id: row.get("clinician_id")?,
        name: row.get("name")?,
        identifier: row.get("identifier")?,
        age: age
            .map(|a| {
                u32::try_from(a)
                    .map_err(|_| SessionError::Store(format!("age contains invalid value {a}")))
            })
            .transpose()?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

pub fn insert(conn: &Connection, patient: &Patient) -> Result<(), SessionError> {
    conn.execute(
        "INSERT INTO patients (id, clinician_id, name, identifier, age, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id,
            patient.clinician_id,
            patient.name,
            patient.identifier,
            patient.age,
            format_timestamp(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, patient_id: &str) -> Result<Option<Patient>, SessionError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"
    ))?;

    stmt.query_row(params![patient_id], |row| Ok(row_to_patient(row)))
        .optional()?
        .transpose()
}

/// All patients, newest first.
pub fn list(conn: &Connection) -> Result<Vec<Patient>, SessionError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC, rowid DESC"
    ))?;

    let mut rows = stmt.query([])?;
    let mut patients = Vec::new();
    while let Some(row) = rows.next()? {
        patients.push(row_to_patient(row)?);
    }
    Ok(patients)
}
