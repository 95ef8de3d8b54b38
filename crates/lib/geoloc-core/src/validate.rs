//! Validation gate run before any record is persisted.

use std::fmt;

use geoloc_store::{LocationRecord, LocationType};
use serde::Serialize;

/// One failed check, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    /// Errors joined for display, e.g. `name: is required; lat: out of range`.
    #[must_use]
    pub fn joined(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Runs every check independently and collects all failures.
#[must_use]
pub fn validate(record: &LocationRecord) -> ValidationReport {
    let mut errors = Vec::new();

    if record.name.trim().is_empty() {
        errors.push(FieldError::new("name", "is required"));
    }

    let (lat, lon) = record
        .coordinates
        .map_or((None, None), |coords| (Some(coords.lat), Some(coords.lon)));
    check_coordinate(&mut errors, "lat", lat, 90.0);
    check_coordinate(&mut errors, "lon", lon, 180.0);

    let kind = record.location_type.trim();
    if kind.is_empty() {
        errors.push(FieldError::new("type", "is required"));
    } else if kind.parse::<LocationType>().is_err() {
        errors.push(FieldError::new("type", format!("unknown location type \"{kind}\"")));
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn check_coordinate(errors: &mut Vec<FieldError>, field: &'static str, value: Option<f64>, bound: f64) {
    match value {
        None => errors.push(FieldError::new(field, "is required")),
        Some(value) if !value.is_finite() => {
            errors.push(FieldError::new(field, "must be a number"));
        }
        Some(value) if value < -bound || value > bound => errors.push(FieldError::new(
            field,
            format!("{value} is outside [-{bound}, {bound}]"),
        )),
        Some(_) => {}
    }
}
