//! Ride post models

use serde::{Deserialize, Serialize};

use super::{Timestamp, UserId, ValidationError};

/// A ride offered on the marketplace. Conversations may point at one through `post_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RidePost {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub poster_id: Option<UserId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub origin_name: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_name: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub departure_date: Timestamp,
    pub price: f64,
    pub seats_available: u32,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// Body of a `SavePost` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRidePost {
    pub name: String,
    pub description: String,
    pub origin_name: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_name: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub departure_date: Timestamp,
    pub price: f64,
    pub seats_available: u32,
}

impl NewRidePost {
    /// Every field is required; coordinates must be on the globe.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            (&self.name, "Post name is required"),
            (&self.description, "Description is required"),
            (&self.origin_name, "Origin is required"),
            (&self.destination_name, "Destination is required"),
        ];
        for (value, message) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField(message));
            }
        }

        if !is_latitude(self.origin_lat) || !is_latitude(self.destination_lat) {
            return Err(ValidationError::InvalidField(
                "Latitude must be between -90 and 90",
            ));
        }
        if !is_longitude(self.origin_lng) || !is_longitude(self.destination_lng) {
            return Err(ValidationError::InvalidField(
                "Longitude must be between -180 and 180",
            ));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ValidationError::InvalidField("Price must be greater than 0"));
        }
        if self.seats_available == 0 {
            return Err(ValidationError::InvalidField(
                "Seats available must be at least 1",
            ));
        }
        Ok(())
    }
}

fn is_latitude(value: f64) -> bool {
    (-90.0..=90.0).contains(&value)
}

fn is_longitude(value: f64) -> bool {
    (-180.0..=180.0).contains(&value)
}
