//! Patient and session operations over the store.
//!
//! Each public method is one logical unit: input is validated first, then
//! a single store transaction either applies every change or none.

use crate::collector::Frame;
use crate::core::error::SessionError;
use crate::core::patients::{validate_note, NewPatient};
use crate::core::pressure::frame_peak_kpa;
use crate::core::summary::{detail, summarize, SessionDetail, SessionSummary};
use crate::core::timestamp::{now_utc, parse_timestamp};
use crate::store::repositories::{clinicians, patients, samples, sessions};
use crate::store::{Database, Patient, SampleRecord, SessionRecord};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionAggregator {
    db: Database,
}

impl SessionAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a patient under the default clinician.
    pub async fn create_patient(&self, request: NewPatient) -> Result<Patient, SessionError> {
        let valid = request.validate()?;

        let patient = self
            .db
            .transaction(move |tx| {
                let clinician = clinicians::ensure_default(tx)?;
                let patient = Patient {
                    id: Uuid::new_v4().to_string(),
                    clinician_id: clinician.id,
                    name: valid.name,
                    identifier: valid.identifier,
                    age: valid.age,
                    created_at: now_utc(),
                };
                patients::insert(tx, &patient)?;
                Ok(patient)
            })
            .await?;

        info!(patient_id = %patient.id, "Patient created");
        Ok(patient)
    }

    pub async fn list_patients(&self) -> Result<Vec<Patient>, SessionError> {
        self.db.execute(|conn| patients::list(conn)).await
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Patient, SessionError> {
        let patient_id = patient_id.to_string();
        self.db
            .execute(move |conn| require_patient(conn, &patient_id))
            .await
    }

    /// Open a new session for a patient with no session in progress.
    pub async fn start_session(
        &self,
        patient_id: &str,
        note: Option<String>,
    ) -> Result<SessionSummary, SessionError> {
        let note = validate_note(note)?;
        let patient_id = patient_id.to_string();

        let summary = self
            .db
            .transaction(move |tx| {
                let patient = require_patient(tx, &patient_id)?;
                if sessions::find_open(tx, &patient.id)?.is_some() {
                    return Err(SessionError::InvalidState(
                        "Patient already has a session in progress".to_string(),
                    ));
                }

                let session = SessionRecord {
                    id: Uuid::new_v4().to_string(),
                    patient_id: patient.id,
                    clinician_id: patient.clinician_id,
                    note,
                    start_time: now_utc(),
                    end_time: None,
                    sample_count: 0,
                    max_pressure_kpa: 0.0,
                };
                sessions::insert(tx, &session)?;
                Ok(summarize(&session, &[]))
            })
            .await?;

        info!(session_id = %summary.id, patient_id = %summary.patient_id, "Session started");
        Ok(summary)
    }

    /// Store one frame and fold it into the session's running statistics.
    ///
    /// `timestamp` is parsed before the store is touched; when absent the
    /// current time is used.
    pub async fn append_sample(
        &self,
        session_id: &str,
        frame: Frame,
        timestamp: Option<String>,
    ) -> Result<SessionSummary, SessionError> {
        let timestamp = parse_timestamp(timestamp.as_deref())?;
        let session_id = session_id.to_string();

        let summary = self
            .db
            .transaction(move |tx| {
                let mut session = require_session(tx, &session_id)?;
                if !session.is_open() {
                    return Err(SessionError::InvalidState(
                        "Session has already ended".to_string(),
                    ));
                }

                let peak = frame_peak_kpa(&frame);
                let sample = SampleRecord {
                    id: Uuid::new_v4().to_string(),
                    session_id: session.id.clone(),
                    timestamp,
                    frame,
                };
                samples::insert(tx, &sample)?;

                session.sample_count += 1;
                session.max_pressure_kpa = session.max_pressure_kpa.max(peak);
                sessions::update_statistics(tx, &session)?;

                let stored = samples::list_for_session(tx, &session.id)?;
                Ok(summarize(&session, &stored))
            })
            .await?;

        debug!(
            session_id = %summary.id,
            sample_count = summary.sample_count,
            "Sample appended"
        );
        Ok(summary)
    }

    /// Close a session. Ending an already closed session changes nothing.
    pub async fn end_session(&self, session_id: &str) -> Result<SessionSummary, SessionError> {
        let session_id = session_id.to_string();

        self.db
            .transaction(move |tx| {
                let mut session = require_session(tx, &session_id)?;
                if session.is_open() {
                    session.end_time = Some(now_utc().max(session.start_time));
                    sessions::close(tx, &session)?;
                    info!(session_id = %session.id, "Session ended");
                }

                let stored = samples::list_for_session(tx, &session.id)?;
                Ok(summarize(&session, &stored))
            })
            .await
    }

    /// Summaries of a patient's sessions, most recent first.
    ///
    /// An unknown patient simply has no sessions.
    pub async fn list_sessions(
        &self,
        patient_id: &str,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        let patient_id = patient_id.to_string();

        self.db
            .execute(move |conn| {
                let conn: &Connection = conn;
                sessions::list_for_patient(conn, &patient_id)?
                    .iter()
                    .map(|session| -> Result<SessionSummary, SessionError> {
                        let stored = samples::list_for_session(conn, &session.id)?;
                        Ok(summarize(session, &stored))
                    })
                    .collect()
            })
            .await
    }

    pub async fn summarize(&self, session_id: &str) -> Result<SessionSummary, SessionError> {
        Ok(self.session_detail(session_id).await?.summary)
    }

    /// Summary plus every stored sample in timestamp order.
    pub async fn session_detail(&self, session_id: &str) -> Result<SessionDetail, SessionError> {
        let session_id = session_id.to_string();

        self.db
            .execute(move |conn| {
                let session = require_session(conn, &session_id)?;
                let stored = samples::list_for_session(conn, &session.id)?;
                Ok(detail(&session, &stored))
            })
            .await
    }
}

fn require_patient(conn: &Connection, patient_id: &str) -> Result<Patient, SessionError> {
    patients::get(conn, patient_id)?
        .ok_or_else(|| SessionError::NotFound(format!("Patient {patient_id} not found")))
}

fn require_session(conn: &Connection, session_id: &str) -> Result<SessionRecord, SessionError> {
    sessions::get(conn, session_id)?
        .ok_or_else(|| SessionError::NotFound(format!("Session {session_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pressure::{volts_to_kpa, Region};

    fn aggregator() -> SessionAggregator {
        SessionAggregator::new(Database::open_in_memory().unwrap())
    }

    fn frame(entries: &[(&str, f64)]) -> Frame {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    async fn patient(agg: &SessionAggregator, name: &str) -> Patient {
        agg.create_patient(NewPatient::new(name).with_age(30))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_clinical_scenario() {
        let agg = aggregator();
        let ana = patient(&agg, "Ana").await;
        assert_eq!(ana.age, Some(30));

        let started = agg.start_session(&ana.id, None).await.unwrap();
        assert_eq!(started.sample_count, 0);

        let summary = agg
            .append_sample(&started.id, frame(&[("fsr5", 1.0), ("fsr6", 1.0)]), None)
            .await
            .unwrap();
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.max_pressure_kpa, 100.0);
        assert_eq!(summary.region_averages[&Region::Heel], 100.0);
        assert_eq!(summary.duration_seconds, None);

        let ended = agg.end_session(&started.id).await.unwrap();
        let duration = ended.duration_seconds.unwrap();
        assert!(duration >= 0.0);
    }

    #[tokio::test]
    async fn test_patients_share_default_clinician() {
        let agg = aggregator();
        let a = patient(&agg, "Ana").await;
        let b = patient(&agg, "Bruno").await;
        assert_eq!(a.clinician_id, b.clinician_id);

        let listed = agg.list_patients().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, b.id);

        assert_eq!(agg.get_patient(&a.id).await.unwrap(), a);
        assert!(matches!(
            agg.get_patient("missing").await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_patient_is_rejected() {
        let agg = aggregator();
        let result = agg.create_patient(NewPatient::new(" ").with_age(30)).await;
        assert!(matches!(result, Err(SessionError::Validation(_))));
        assert!(agg.list_patients().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_one_open_session_per_patient() {
        let agg = aggregator();
        let ana = patient(&agg, "Ana").await;

        let first = agg.start_session(&ana.id, Some("baseline".into())).await.unwrap();
        let second = agg.start_session(&ana.id, None).await;
        assert!(matches!(second, Err(SessionError::InvalidState(_))));

        let sessions = agg.list_sessions(&ana.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, first.id);
        assert_eq!(sessions[0].note.as_deref(), Some("baseline"));

        agg.end_session(&first.id).await.unwrap();
        let third = agg.start_session(&ana.id, None).await.unwrap();
        let sessions = agg.list_sessions(&ana.id).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, third.id);
    }

    #[tokio::test]
    async fn test_start_session_unknown_patient() {
        let agg = aggregator();
        assert!(matches!(
            agg.start_session("nobody", None).await,
            Err(SessionError::NotFound(_))
        ));
        assert!(agg.list_sessions("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_to_closed_session_changes_nothing() {
        let agg = aggregator();
        let ana = patient(&agg, "Ana").await;
        let session = agg.start_session(&ana.id, None).await.unwrap();

        agg.append_sample(&session.id, frame(&[("fsr0", 2.0)]), None)
            .await
            .unwrap();
        let closed = agg.end_session(&session.id).await.unwrap();

        let result = agg
            .append_sample(&session.id, frame(&[("fsr0", 5.0)]), None)
            .await;
        assert!(matches!(result, Err(SessionError::InvalidState(_))));

        let after = agg.summarize(&session.id).await.unwrap();
        assert_eq!(after.sample_count, closed.sample_count);
        assert_eq!(after.max_pressure_kpa, closed.max_pressure_kpa);
        assert_eq!(agg.session_detail(&session.id).await.unwrap().samples.len(), 1);
    }

    #[tokio::test]
    async fn test_append_unknown_session_and_bad_timestamp() {
        let agg = aggregator();
        assert!(matches!(
            agg.append_sample("missing", frame(&[]), None).await,
            Err(SessionError::NotFound(_))
        ));

        let ana = patient(&agg, "Ana").await;
        let session = agg.start_session(&ana.id, None).await.unwrap();
        let result = agg
            .append_sample(&session.id, frame(&[("fsr0", 1.0)]), Some("not-a-time".into()))
            .await;
        assert!(matches!(result, Err(SessionError::Validation(_))));

        let result = agg
            .append_sample(
                &session.id,
                frame(&[("fsr0", 1.0)]),
                Some("+10000-01-01T00:00:00Z".into()),
            )
            .await;
        assert!(matches!(result, Err(SessionError::Validation(_))));
        assert_eq!(agg.summarize(&session.id).await.unwrap().sample_count, 0);
    }

    #[tokio::test]
    async fn test_end_session_is_idempotent() {
        let agg = aggregator();
        let ana = patient(&agg, "Ana").await;
        let session = agg.start_session(&ana.id, None).await.unwrap();

        let first = agg.end_session(&session.id).await.unwrap();
        let second = agg.end_session(&session.id).await.unwrap();
        assert!(first.end_time.is_some());
        assert_eq!(first.end_time, second.end_time);
        assert_eq!(first.duration_seconds, second.duration_seconds);

        assert!(matches!(
            agg.end_session("missing").await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_running_max_tracks_true_maximum() {
        let agg = aggregator();
        let ana = patient(&agg, "Ana").await;
        let session = agg.start_session(&ana.id, None).await.unwrap();

        let voltages = [1.0, 3.0, 0.5, -2.0, 2.5, 3.0];
        let mut previous = 0.0;
        let mut true_max: f64 = 0.0;
        for v in voltages {
            let summary = agg
                .append_sample(&session.id, frame(&[("fsr3", v), ("fsr9", 5.0)]), None)
                .await
                .unwrap();
            true_max = true_max.max(volts_to_kpa(v));
            assert!(summary.max_pressure_kpa >= previous);
            assert_eq!(summary.max_pressure_kpa, (true_max * 100.0).round() / 100.0);
            previous = summary.max_pressure_kpa;
        }
        assert_eq!(
            agg.summarize(&session.id).await.unwrap().sample_count,
            voltages.len() as u64
        );
    }

    #[tokio::test]
    async fn test_samples_are_ordered_by_timestamp() {
        let agg = aggregator();
        let ana = patient(&agg, "Ana").await;
        let session = agg.start_session(&ana.id, None).await.unwrap();

        agg.append_sample(
            &session.id,
            frame(&[("fsr0", 2.0)]),
            Some("2025-03-01T10:00:05Z".into()),
        )
        .await
        .unwrap();
        agg.append_sample(
            &session.id,
            frame(&[("fsr0", 1.0)]),
            Some("2025-03-01T09:00:00-03:00".into()),
        )
        .await
        .unwrap();

        let detail = agg.session_detail(&session.id).await.unwrap();
        assert_eq!(detail.samples.len(), 2);
        assert_eq!(detail.samples[0].pressures["fsr0"], 2.0);
        assert_eq!(detail.samples[1].pressures["fsr0"], 1.0);
        assert!(detail.samples[0].timestamp < detail.samples[1].timestamp);
    }
}
