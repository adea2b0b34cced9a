//! Error taxonomy for the tunnel components.
//!
//! Components return `Result` values; only `main` maps errors to process
//! exit codes. Scheduler query and cancel failures are deliberately not
//! represented here: the client treats them as an empty listing.

use std::io;

use crate::job::EndpointError;

/// Errors surfaced by the tunnel components.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    /// The session job did not reach the running state in time.
    #[error("timed out after {seconds}s waiting for the session job to start")]
    JobStartTimeout { seconds: u64 },

    /// The job is running but its port never accepted a connection.
    #[error("timed out after {seconds}s waiting for {node}:{port} to accept connections")]
    ReachabilityTimeout {
        node: String,
        port: u16,
        seconds: u64,
    },

    /// Session jobs were still live when the cancel deadline elapsed.
    #[error("timed out after {seconds}s with session jobs still queued")]
    CancelTimeout { seconds: u64 },

    /// The submission tool did not hand back a usable job id.
    #[error("job submission returned no usable id: {output:?}")]
    Submit { output: String },

    /// Direct-shell request with no running session job in any class.
    #[error("no running session job")]
    NoRunningJob,

    /// Disambiguation input other than the offered numeric choices.
    #[error("invalid choice {input:?} (expected 1 or 2)")]
    InvalidChoice { input: String },

    /// SIGINT/SIGTERM received before the tunnel was established.
    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
