use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Registry entry for a student. Profile fields beyond what the engine
/// needs live with the external registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn new(name: String, email: String) -> Result<Self, CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("student name must not be empty".into()));
        }
        if !email.contains('@') {
            return Err(CoreError::Validation(format!("invalid email: {}", email)));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            email,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_name_and_email() {
        assert!(Student::new("Ada".into(), "ada@example.com".into()).is_ok());
        assert!(Student::new("".into(), "ada@example.com".into()).is_err());
        assert!(Student::new("Ada".into(), "nope".into()).is_err());
    }
}
