//! Input validation for patients and session notes.

use crate::core::error::SessionError;
use serde::Deserialize;

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_IDENTIFIER_LEN: usize = 60;
pub const MAX_AGE: i64 = 120;
pub const MAX_NOTE_LEN: usize = 240;

/// Patient registration request, as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPatient {
    pub name: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
}

/// Patient fields that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPatient {
    pub name: String,
    pub identifier: Option<String>,
    pub age: Option<u32>,
}

impl NewPatient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    /// Trim and bound-check every field.
    pub fn validate(self) -> Result<ValidPatient, SessionError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(SessionError::Validation("patient name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(SessionError::Validation(format!(
                "patient name exceeds {MAX_NAME_LEN} characters"
            )));
        }

        let identifier = self
            .identifier
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if identifier
            .as_ref()
            .is_some_and(|id| id.chars().count() > MAX_IDENTIFIER_LEN)
        {
            return Err(SessionError::Validation(format!(
                "patient identifier exceeds {MAX_IDENTIFIER_LEN} characters"
            )));
        }

        let age = match self.age {
            None => None,
            Some(age) if (1..=MAX_AGE).contains(&age) => Some(age as u32),
            Some(age) => {
                return Err(SessionError::Validation(format!(
                    "patient age must be between 1 and {MAX_AGE}, got {age}"
                )))
            }
        };

        Ok(ValidPatient {
            name,
            identifier,
            age,
        })
    }
}

/// Check a session note's length.
pub fn validate_note(note: Option<String>) -> Result<Option<String>, SessionError> {
    match note {
        Some(note) if note.chars().count() > MAX_NOTE_LEN => Err(SessionError::Validation(
            format!("session note exceeds {MAX_NOTE_LEN} characters"),
        )),
        other => Ok(other),
    }
}
