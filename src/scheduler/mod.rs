//! Scheduler client for a Sun-Grid-Engine-family batch system.
//!
//! The `Scheduler` trait seats the seam between the lifecycle controller
//! and the external system; `GridEngine` spawns the real commands and
//! [`crate::mock::MockScheduler`] scripts them for tests.
//!
//! Query and cancel fail soft: a spawn failure or non-zero exit reads as
//! an empty listing and is never surfaced as a distinct error kind.
//! Submission failures are surfaced, because a lost id would orphan the
//! job with no handle left to cancel it.

mod listing;

pub use listing::{JobRecord, JobState, ListingParser};

use std::path::Path;
use std::process::Command;

use crate::config::TunnelConfig;
use crate::error::TunnelError;

/// Query/submit/cancel surface of the batch scheduler.
pub trait Scheduler {
    /// All jobs owned by `user`, in scheduler-reported order. Empty on
    /// query failure.
    fn list_jobs(&self, user: &str) -> Vec<JobRecord>;

    /// Submit a job and return the scheduler-assigned id.
    fn submit_job(
        &self,
        name: &str,
        params: &str,
        script: &Path,
        args: &[String],
    ) -> Result<String, TunnelError>;

    /// Request termination. Cancelling an unknown or already-finished id
    /// is not an error.
    fn cancel_job(&self, id: &str);
}

/// Production client spawning `qstat`, `qsub`, and `qdel`.
pub struct GridEngine {
    qstat: String,
    qsub: String,
    qdel: String,
}

impl GridEngine {
    pub fn new(config: &TunnelConfig) -> Self {
        Self {
            qstat: config.qstat_cmd.clone(),
            qsub: config.qsub_cmd.clone(),
            qdel: config.qdel_cmd.clone(),
        }
    }
}

impl Scheduler for GridEngine {
    fn list_jobs(&self, user: &str) -> Vec<JobRecord> {
        let output = Command::new(&self.qstat)
            .args(["-u", user, "-xml"])
            .output();
        match output {
            Ok(out) if out.status.success() => {
                ListingParser::parse(&String::from_utf8_lossy(&out.stdout))
            }
            _ => Vec::new(),
        }
    }

    fn submit_job(
        &self,
        name: &str,
        params: &str,
        script: &Path,
        args: &[String],
    ) -> Result<String, TunnelError> {
        let mut command = Command::new(&self.qsub);
        command.arg("-terse").arg("-N").arg(name);
        command.args(params.split_whitespace());
        command.arg(script);
        command.args(args);

        let out = command.output()?;
        let stdout = String::from_utf8_lossy(&out.stdout);
        match parse_terse_id(&stdout) {
            Some(id) if out.status.success() => Ok(id),
            _ => Err(TunnelError::Submit {
                output: stdout.trim().to_string(),
            }),
        }
    }

    fn cancel_job(&self, id: &str) {
        // Output and exit status deliberately ignored.
        let _ = Command::new(&self.qdel).arg(id).output();
    }
}

/// Extract the job id from `qsub -terse` output: a single line holding
/// the id, or `<id>.<range>` for array submissions.
fn parse_terse_id(output: &str) -> Option<String> {
    let line = output.lines().next()?.trim();
    let id = line.split('.').next()?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terse_id_plain() {
        assert_eq!(parse_terse_id("3141\n"), Some("3141".to_string()));
    }

    #[test]
    fn test_terse_id_array_range() {
        assert_eq!(parse_terse_id("3141.1-10:1\n"), Some("3141".to_string()));
    }

    #[test]
    fn test_terse_id_rejects_garbage() {
        assert_eq!(parse_terse_id(""), None);
        assert_eq!(parse_terse_id("\n"), None);
        assert_eq!(parse_terse_id("Unable to run job\n"), None);
        assert_eq!(parse_terse_id("job 3141 submitted\n"), None);
    }
}
