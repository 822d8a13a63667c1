//! Account profile model

use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::util::{is_plausible_email, is_ten_digit_phone};

/// Profile of the signed-in user as stored by the backend.
///
/// `EditUser` takes the whole record back, so edits are made on a fetched copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl UserProfile {
    /// Same rules the signup form applies.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidField("Name is required"));
        }
        if !is_plausible_email(self.email.trim()) {
            return Err(ValidationError::InvalidField("Invalid email format."));
        }
        match self.phone.as_deref().map(str::trim) {
            Some(phone) if !phone.is_empty() && !is_ten_digit_phone(phone) => Err(
                ValidationError::InvalidField("Phone number must be 10 digits."),
            ),
            _ => Ok(()),
        }
    }
}
