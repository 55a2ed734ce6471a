//! Application-level configuration loading: club rules, courts and the instructor roster.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/club.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PADEL_CLUB_CONFIG_PATH";

/// Court of the club.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Court {
    /// Stable identifier.
    pub id: Uuid,
    /// Number painted on the court; lower numbers are allocated first.
    pub number: u8,
    /// Display name.
    pub name: String,
}

/// Instructor giving classes at the club.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Instructor {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Fee added to the court rate for each hour of class.
    pub rate_cents_per_hour: i64,
    /// First hour (UTC) the instructor gives classes.
    pub available_from_hour: u8,
    /// Hour (UTC) by which the instructor's last class ends.
    pub available_to_hour: u8,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Club display name.
    pub club_name: String,
    /// Opening hour (UTC).
    pub open_hour: u8,
    /// Closing hour (UTC).
    pub close_hour: u8,
    /// Court rental price per hour.
    pub court_rate_cents_per_hour: i64,
    /// Exchange rate between credits and points.
    pub cents_per_point: i64,
    /// Granularity of slot start times.
    pub slot_step_minutes: u16,
    /// Period of the lifecycle sweeper.
    pub sweep_interval: Duration,
    /// Courts, sorted by number.
    pub courts: Vec<Court>,
    /// Instructor roster.
    pub instructors: Vec<Instructor>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in club.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents)
                .map_err(|err| err.to_string())
                .and_then(AppConfig::try_from)
            {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        courts = app_config.courts.len(),
                        instructors = app_config.instructors.len(),
                        "loaded club configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Look up an instructor of the roster.
    pub fn instructor(&self, id: Uuid) -> Option<&Instructor> {
        self.instructors.iter().find(|instructor| instructor.id == id)
    }

    /// Look up a court.
    pub fn court(&self, id: Uuid) -> Option<&Court> {
        self.courts.iter().find(|court| court.id == id)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let raw: RawConfig = serde_json::from_str(BUILTIN_CONFIG).unwrap_or_default();
        AppConfig::try_from(raw).unwrap_or_else(|_| Self {
            club_name: "Padel Club".into(),
            open_hour: 8,
            close_hour: 22,
            court_rate_cents_per_hour: 2_000,
            cents_per_point: 100,
            slot_step_minutes: 30,
            sweep_interval: Duration::from_secs(60),
            courts: Vec::new(),
            instructors: Vec::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default = "default_club_name")]
    club_name: String,
    #[serde(default = "default_open_hour")]
    open_hour: u8,
    #[serde(default = "default_close_hour")]
    close_hour: u8,
    #[serde(default = "default_court_rate")]
    court_rate_cents_per_hour: i64,
    #[serde(default = "default_cents_per_point")]
    cents_per_point: i64,
    #[serde(default = "default_slot_step")]
    slot_step_minutes: u16,
    #[serde(default = "default_sweep_interval")]
    sweep_interval_secs: u64,
    courts: Vec<Court>,
    instructors: Vec<Instructor>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            club_name: default_club_name(),
            open_hour: default_open_hour(),
            close_hour: default_close_hour(),
            court_rate_cents_per_hour: default_court_rate(),
            cents_per_point: default_cents_per_point(),
            slot_step_minutes: default_slot_step(),
            sweep_interval_secs: default_sweep_interval(),
            courts: Vec::new(),
            instructors: Vec::new(),
        }
    }
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = String;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        if value.open_hour >= value.close_hour || value.close_hour > 24 {
            return Err(format!(
                "opening hours {}..{} are not a valid range",
                value.open_hour, value.close_hour
            ));
        }
        if value.courts.is_empty() {
            return Err("at least one court is required".into());
        }
        if value.cents_per_point <= 0 || value.court_rate_cents_per_hour < 0 {
            return Err("rates must be positive".into());
        }
        if value.slot_step_minutes == 0 || 60 % value.slot_step_minutes != 0 {
            return Err(format!(
                "slot step of {} minutes must divide an hour",
                value.slot_step_minutes
            ));
        }
        if let Some(instructor) = value.instructors.iter().find(|instructor| {
            instructor.available_from_hour >= instructor.available_to_hour
                || instructor.rate_cents_per_hour < 0
        }) {
            return Err(format!("instructor `{}` is misconfigured", instructor.name));
        }

        let mut courts = value.courts;
        courts.sort_by_key(|court| court.number);

        Ok(Self {
            club_name: value.club_name,
            open_hour: value.open_hour,
            close_hour: value.close_hour,
            court_rate_cents_per_hour: value.court_rate_cents_per_hour,
            cents_per_point: value.cents_per_point,
            slot_step_minutes: value.slot_step_minutes,
            sweep_interval: Duration::from_secs(value.sweep_interval_secs.max(1)),
            courts,
            instructors: value.instructors,
        })
    }
}

fn default_club_name() -> String {
    "Padel Club".into()
}

fn default_open_hour() -> u8 {
    8
}

fn default_close_hour() -> u8 {
    22
}

fn default_court_rate() -> i64 {
    2_000
}

fn default_cents_per_point() -> i64 {
    100
}

fn default_slot_step() -> u16 {
    30
}

fn default_sweep_interval() -> u64 {
    60
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in club shipped with the binary: four courts and two instructors.
const BUILTIN_CONFIG: &str = r#"{
    "club_name": "Padel Club",
    "courts": [
        { "id": "6f1c0a5e-0000-4000-8000-000000000001", "number": 1, "name": "Court 1" },
        { "id": "6f1c0a5e-0000-4000-8000-000000000002", "number": 2, "name": "Court 2" },
        { "id": "6f1c0a5e-0000-4000-8000-000000000003", "number": 3, "name": "Court 3" },
        { "id": "6f1c0a5e-0000-4000-8000-000000000004", "number": 4, "name": "Court 4" }
    ],
    "instructors": [
        {
            "id": "1b7e2d40-0000-4000-8000-000000000001",
            "name": "Alex",
            "rate_cents_per_hour": 2000,
            "available_from_hour": 9,
            "available_to_hour": 14
        },
        {
            "id": "1b7e2d40-0000-4000-8000-000000000002",
            "name": "Sam",
            "rate_cents_per_hour": 2500,
            "available_from_hour": 16,
            "available_to_hour": 21
        }
    ]
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_club_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.courts.len(), 4);
        assert_eq!(config.instructors.len(), 2);
        assert_eq!(config.cents_per_point, 100);
        assert_eq!(config.courts[0].number, 1);
    }

    #[test]
    fn courts_are_sorted_by_number() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "courts": [
                    { "id": "00000000-0000-4000-8000-000000000002", "number": 2, "name": "B" },
                    { "id": "00000000-0000-4000-8000-000000000001", "number": 1, "name": "A" }
                ],
                "instructors": []
            }"#,
        )
        .unwrap();
        let config = AppConfig::try_from(raw).unwrap();
        assert_eq!(config.courts[0].name, "A");
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn config_without_courts_is_rejected() {
        let raw = RawConfig::default();
        assert!(AppConfig::try_from(raw).is_err());
    }

    #[test]
    fn uneven_slot_step_is_rejected() {
        let mut raw: RawConfig = serde_json::from_str(BUILTIN_CONFIG).unwrap();
        raw.slot_step_minutes = 25;
        assert!(AppConfig::try_from(raw).is_err());
    }
}
