//! Clinic reference data
//!
//! Loaded once at startup from a JSON document and shared read-only.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A practitioner offered in the "by professional" flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professional {
    pub name: String,
    #[serde(default)]
    pub specialties: Vec<String>,
}

impl Professional {
    #[allow(dead_code)] // Used in tests
    pub fn new(name: impl Into<String>, specialties: &[&str]) -> Self {
        Self {
            name: name.into(),
            specialties: specialties.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Clinic-wide booking defaults, in minutes
///
/// Carried for the future slot search; no transition reads them yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentOptions {
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub interval_between_appointments: u32,
}

fn default_duration() -> u32 {
    30
}

impl Default for AppointmentOptions {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            interval_between_appointments: 0,
        }
    }
}

/// On-disk shape of the clinic document
#[derive(Debug, Deserialize)]
struct ClinicDocument {
    clinic_name: Option<String>,
    #[serde(default)]
    professionals: Vec<Professional>,
    #[serde(default)]
    specialties: Vec<String>,
    #[serde(default)]
    appointment_options: AppointmentOptions,
}

/// Immutable clinic directory
#[derive(Debug, Clone)]
pub struct ClinicDirectory {
    clinic_name: String,
    professionals: Vec<Professional>,
    specialties: Vec<String>,
    appointment_options: AppointmentOptions,
}

impl ClinicDirectory {
    #[allow(dead_code)] // Used in tests
    pub fn new(
        clinic_name: impl Into<String>,
        professionals: Vec<Professional>,
        specialties: Vec<String>,
    ) -> Self {
        Self {
            clinic_name: clinic_name.into(),
            professionals,
            specialties,
            appointment_options: AppointmentOptions::default(),
        }
    }

    /// Read and validate the clinic document at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = Self::from_json(&raw)?;

        tracing::info!(
            path = %path.display(),
            clinic = %directory.clinic_name,
            professionals = directory.professionals.len(),
            specialties = directory.specialties.len(),
            duration = directory.appointment_options.duration,
            "Clinic configuration loaded"
        );

        Ok(directory)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let doc: ClinicDocument = serde_json::from_str(raw)?;
        let clinic_name = doc
            .clinic_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigError::MissingClinicName)?;

        Ok(Self {
            clinic_name,
            professionals: doc.professionals,
            specialties: doc.specialties,
            appointment_options: doc.appointment_options,
        })
    }

    pub fn clinic_name(&self) -> &str {
        &self.clinic_name
    }

    pub fn professionals(&self) -> &[Professional] {
        &self.professionals
    }

    pub fn specialties(&self) -> &[String] {
        &self.specialties
    }

    #[allow(dead_code)] // Reserved for slot search
    pub fn appointment_options(&self) -> AppointmentOptions {
        self.appointment_options
    }

    /// Look up a professional by its 1-based menu position
    pub fn professional(&self, position: i64) -> Option<&Professional> {
        menu_index(position).and_then(|i| self.professionals.get(i))
    }

    /// Look up a specialty by its 1-based menu position
    pub fn specialty(&self, position: i64) -> Option<&String> {
        menu_index(position).and_then(|i| self.specialties.get(i))
    }
}

/// Convert a 1-based menu position into a vector index
fn menu_index(position: i64) -> Option<usize> {
    usize::try_from(position).ok()?.checked_sub(1)
}
