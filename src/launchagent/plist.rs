//! Plist document for the wakeup LaunchAgent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::Result;

/// LaunchAgent plist for `wakeup daemon`.
///
/// `KeepAlive` makes launchd resurrect the daemon if it exits, so pending
/// alarms are restored without the user doing anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct WakeupLaunchAgent {
    /// Service label (reverse domain format)
    pub label: String,

    pub program_arguments: Vec<String>,

    pub run_at_load: bool,

    pub keep_alive: bool,

    /// `Interactive` keeps launchd from throttling timer wakeups.
    pub process_type: String,

    pub standard_out_path: String,

    pub standard_error_path: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub environment_variables: BTreeMap<String, String>,
}

impl WakeupLaunchAgent {
    /// Service label of the wakeup daemon.
    pub const LABEL: &'static str = "com.wakeup.daemon";

    /// Creates the agent definition for `binary_path`, logging to `log_dir`.
    pub fn new(binary_path: impl Into<String>, log_dir: &str) -> Self {
        Self {
            label: Self::LABEL.to_string(),
            program_arguments: vec![binary_path.into(), "daemon".to_string()],
            run_at_load: true,
            keep_alive: true,
            process_type: "Interactive".to_string(),
            standard_out_path: format!("{}/daemon.out.log", log_dir),
            standard_error_path: format!("{}/daemon.err.log", log_dir),
            environment_variables: BTreeMap::new(),
        }
    }

    /// Sets `RUST_LOG` for the daemon.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.environment_variables
            .insert("RUST_LOG".to_string(), filter.into());
        self
    }

    /// Renders the plist as XML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        plist::to_writer_xml(&mut buf, self)?;
        Ok(buf)
    }
}
