use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::core::timestamp::format_timestamp;
use crate::core::SessionError;
use crate::store::{helpers::parse_datetime, models::Clinician};

/// Identifier of the clinician every patient is assigned to.
pub const DEFAULT_CLINICIAN_EMAIL: &str = "fisioterapeuta@pbl2025.com";
pub const DEFAULT_CLINICIAN_NAME: &str = "Fisioterapeuta PBL";

/// Return the default clinician, creating the row on first use.
///
/// The insert is a no-op when the email already exists, so concurrent
/// first calls converge on a single row.
pub fn ensure_default(conn: &Connection) -> Result<Clinician, SessionError> {
    ensure(conn, DEFAULT_CLINICIAN_EMAIL, DEFAULT_CLINICIAN_NAME)
}

fn ensure(conn: &Connection, email: &str, name: &str) -> Result<Clinician, SessionError> {
    conn.execute(
        "INSERT OR IGNORE INTO clinicians (id, email, name, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            Uuid::new_v4().to_string(),
            email,
            name,
            format_timestamp(&Utc::now()),
        ],
    )?;

    let (id, email, name, created_at): (String, String, String, String) = conn.query_row(
        "SELECT id, email, name, created_at FROM clinicians WHERE email = ?1",
        params![email],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    Ok(Clinician {
        id,
        email,
        name,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;

    #[tokio::test]
    async fn test_ensure_default_is_idempotent() {
        let db = Database::open_in_memory().unwrap();

        let first = db.transaction(|tx| ensure_default(tx)).await.unwrap();
        let second = db.transaction(|tx| ensure_default(tx)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.email, DEFAULT_CLINICIAN_EMAIL);

        let count: i64 = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM clinicians", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
