//! Built-in configuration defaults.
//!
//! Operator settings are constants with an optional file overlay; none
//! of them is a runtime flag.

use serde::{Deserialize, Serialize};

/// Built-in default configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Base job name; class and port are appended to it.
    pub base_name: String,

    /// Submission parameters for CPU-class jobs.
    pub cpu_params: String,

    /// Submission parameters for GPU-class jobs.
    pub gpu_params: String,

    /// Placeholder script submitted as the job body; it generates the
    /// host key and keeps a listener bound for the job's lifetime.
    pub bootstrap_script: String,

    /// Scheduler query command.
    pub qstat_cmd: String,

    /// Scheduler submission command.
    pub qsub_cmd: String,

    /// Scheduler cancellation command.
    pub qdel_cmd: String,

    /// Maximum wall-clock seconds to wait for the session to come up.
    pub start_timeout_seconds: u64,

    /// Seconds between scheduler queries while the job is pending.
    pub job_poll_seconds: u64,

    /// Seconds between TCP probes while the listener comes up.
    pub probe_poll_seconds: u64,

    /// Seconds between sweeps of the administrative cancel loop.
    pub cancel_poll_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            base_name: "vscode-remote".to_string(),
            cpu_params: "-cwd -l h_rt=08:00:00".to_string(),
            gpu_params: "-cwd -l gpu=1 -l h_rt=08:00:00".to_string(),
            bootstrap_script: "~/.local/libexec/grid-tunnel/bootstrap.sh".to_string(),
            qstat_cmd: "qstat".to_string(),
            qsub_cmd: "qsub".to_string(),
            qdel_cmd: "qdel".to_string(),
            start_timeout_seconds: 300,
            job_poll_seconds: 5,
            probe_poll_seconds: 1,
            cancel_poll_seconds: 2,
        }
    }
}
