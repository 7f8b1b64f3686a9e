//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Report sections used when no catalogue file is configured.
const DEFAULT_SECTIONS: &[&str] = &[
    "Patient Information:",
    "LMP",
    "Gestational Age:",
    "Type of Scan:",
    "Uterine Position:",
    "Endometrial Thickness:",
    "Fetal Pole:",
    "Crown Rump Length",
    "Fetal Heart Rate:",
    "Amniotic Fluid:",
    "Placental Position:",
    "Adnexal Region:",
    "Cervical Length:",
    "Nuchal Translucency",
    "Additional Findings:",
    "Impression:",
    "Recommendations:",
];

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Path of the persisted report document
    pub document_path: PathBuf,

    /// Ordered, immutable section catalogue
    pub sections: Vec<String>,

    /// Fragments retained for split-command recovery
    pub history_capacity: usize,

    /// Inactivity window before command suspicion is abandoned
    pub suspicion_timeout: Duration,

    /// Timeout monitor tick interval
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("report-scribe");

        let socket_path = data_dir.join("daemon.sock");
        let document_path = data_dir.join("report.json");

        let sections = match std::env::var("REPORT_SCRIBE_SECTIONS") {
            Ok(path) => Self::load_sections(&PathBuf::from(path))?,
            Err(_) => DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect(),
        };

        let suspicion_timeout = std::env::var("REPORT_SCRIBE_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3));

        Ok(Self {
            socket_path,
            data_dir,
            document_path,
            sections,
            history_capacity: 3,
            suspicion_timeout,
            poll_interval: Duration::from_millis(500),
        })
    }

    /// Read a catalogue from a JSON file holding an array of names.
    fn load_sections(path: &PathBuf) -> Result<Vec<String>> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read sections file {}", path.display()))?;
        let sections: Vec<String> =
            serde_json::from_str(&raw).context("sections file must be a JSON array of names")?;
        anyhow::ensure!(!sections.is_empty(), "sections file is empty");
        Ok(sections)
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
