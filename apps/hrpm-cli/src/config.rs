// config.rs - Where hrpm keeps its state, plus optional tuning from config.toml.
//
// `HrpmConfig::for_project()` lays everything out under `.hrpm/` in the
// project root. `HrpmConfig::load()` additionally reads
// `.hrpm/config.toml` when present.

use std::path::{Path, PathBuf};

use hrpm_goal::DEFAULT_SWEEP_COOLDOWN_SECS;
use hrpm_schedule::DEFAULT_JOIN_LEAD_MINUTES;
use serde::{Deserialize, Serialize};

/// Resolved paths and settings for one project.
#[derive(Debug, Clone)]
pub struct HrpmConfig {
    pub project_root: PathBuf,
    /// Root of the goal store (`goals/` and `sweep.json` live here).
    pub goal_store_dir: PathBuf,
    /// Rules, exceptions and meetings in one document.
    pub schedule_file: PathBuf,
    /// Append-only transition event log.
    pub events_log: PathBuf,
    pub config_file: PathBuf,
    pub settings: Settings,
}

/// Contents of `.hrpm/config.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub sweep: SweepSettings,
    #[serde(default)]
    pub meetings: MeetingSettings,
    #[serde(default)]
    pub events: EventSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Minimum seconds between two sweeps of the same scope.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSettings {
    /// How many minutes before the start the join link opens.
    #[serde(default = "default_join_lead_minutes")]
    pub join_lead_minutes: i64,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            join_lead_minutes: default_join_lead_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSettings {
    /// Append transition events to `.hrpm/events.jsonl`.
    #[serde(default = "default_log_enabled")]
    pub log_enabled: bool,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            log_enabled: default_log_enabled(),
        }
    }
}

fn default_cooldown_secs() -> i64 {
    DEFAULT_SWEEP_COOLDOWN_SECS
}

fn default_join_lead_minutes() -> i64 {
    DEFAULT_JOIN_LEAD_MINUTES
}

fn default_log_enabled() -> bool {
    true
}

impl HrpmConfig {
    /// Standard `.hrpm/` layout with default settings.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let hrpm_dir = root.join(".hrpm");
        Self {
            project_root: root,
            goal_store_dir: hrpm_dir.clone(),
            schedule_file: hrpm_dir.join("schedule.json"),
            events_log: hrpm_dir.join("events.jsonl"),
            config_file: hrpm_dir.join("config.toml"),
            settings: Settings::default(),
        }
    }

    /// Standard layout plus overrides from `.hrpm/config.toml`.
    ///
    /// A missing file means defaults; a malformed one is an error.
    pub fn load(project_root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut config = Self::for_project(project_root);
        if config.config_file.exists() {
            let content = std::fs::read_to_string(&config.config_file)?;
            config.settings = toml::from_str(&content).map_err(|e| {
                anyhow::anyhow!("invalid {}: {}", config.config_file.display(), e)
            })?;
            tracing::debug!(path = %config.config_file.display(), "loaded settings");
        }
        if config.settings.sweep.cooldown_secs < 0 {
            anyhow::bail!("[sweep] cooldown_secs must not be negative");
        }
        if config.settings.meetings.join_lead_minutes < 0 {
            anyhow::bail!("[meetings] join_lead_minutes must not be negative");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_lives_under_dot_hrpm() {
        let config = HrpmConfig::for_project("/tmp/acme");
        assert_eq!(config.goal_store_dir, PathBuf::from("/tmp/acme/.hrpm"));
        assert_eq!(config.schedule_file, PathBuf::from("/tmp/acme/.hrpm/schedule.json"));
        assert_eq!(config.events_log, PathBuf::from("/tmp/acme/.hrpm/events.jsonl"));
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn missing_file_means_defaults() {
        let project = TempDir::new().unwrap();
        let config = HrpmConfig::load(project.path()).unwrap();
        assert_eq!(config.settings.sweep.cooldown_secs, 60);
        assert_eq!(config.settings.meetings.join_lead_minutes, 15);
        assert!(config.settings.events.log_enabled);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let project = TempDir::new().unwrap();
        std::fs::create_dir_all(project.path().join(".hrpm")).unwrap();
        std::fs::write(
            project.path().join(".hrpm/config.toml"),
            "[sweep]\ncooldown_secs = 5\n\n[events]\nlog_enabled = false\n",
        )
        .unwrap();

        let config = HrpmConfig::load(project.path()).unwrap();
        assert_eq!(config.settings.sweep.cooldown_secs, 5);
        assert_eq!(config.settings.meetings.join_lead_minutes, 15);
        assert!(!config.settings.events.log_enabled);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let project = TempDir::new().unwrap();
        std::fs::create_dir_all(project.path().join(".hrpm")).unwrap();
        std::fs::write(project.path().join(".hrpm/config.toml"), "[sweep\ncooldown").unwrap();
        assert!(HrpmConfig::load(project.path()).is_err());

        std::fs::write(
            project.path().join(".hrpm/config.toml"),
            "[meetings]\njoin_lead_minutes = -1\n",
        )
        .unwrap();
        assert!(HrpmConfig::load(project.path()).is_err());
    }
}
