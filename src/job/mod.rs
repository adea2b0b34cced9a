//! Session job naming and endpoint decoding.
//!
//! A session job is named `<base>-<class>_<port>`; the port doubles as
//! the wire contract with the in-job bootstrap, which binds a listener
//! on it. The assigned node comes from the listing's `queue@host.domain`
//! field.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::scheduler::JobRecord;

/// Job family targeted by one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobClass {
    Cpu,
    Gpu,
}

impl JobClass {
    pub const ALL: [JobClass; 2] = [JobClass::Cpu, JobClass::Gpu];
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobClass::Cpu => write!(f, "cpu"),
            JobClass::Gpu => write!(f, "gpu"),
        }
    }
}

/// Immutable description of the job family one invocation targets.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub class: JobClass,
    pub name_prefix: String,
}

impl SessionRequest {
    pub fn new(base: &str, class: JobClass) -> Self {
        Self {
            class,
            name_prefix: format!("{base}-{class}"),
        }
    }

    /// Full job name for a chosen port.
    pub fn job_name(&self, port: u16) -> String {
        format!("{}_{}", self.name_prefix, port)
    }
}

/// True when `full_name` is exactly `prefix` followed by `_` and a
/// non-empty numeric suffix. A prefix occurring mid-string never
/// matches.
pub fn matches_prefix(full_name: &str, prefix: &str) -> bool {
    full_name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// First record whose name matches the prefix convention. Scheduler
/// order is preserved, so the result is deterministic for a fixed
/// listing; one active job per class is assumed.
pub fn find_by_prefix<'a>(records: &'a [JobRecord], prefix: &str) -> Option<&'a JobRecord> {
    records
        .iter()
        .find(|record| matches_prefix(&record.full_name, prefix))
}

/// Errors decoding an endpoint out of a job record.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("job name {name:?} has no usable port suffix")]
    BadPort { name: String },
}

/// Node and port a running session job is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEndpoint {
    pub node: String,
    pub port: u16,
}

impl ResolvedEndpoint {
    /// Decode the endpoint encoded in a job record: the port is the
    /// numeric suffix after the last `_` in the name, the node is the
    /// `queue@host` field with queue and domain stripped (empty while no
    /// node is assigned).
    pub fn from_record(record: &JobRecord) -> Result<Self, EndpointError> {
        let suffix = record.full_name.rsplit('_').next().unwrap_or("");
        let port = suffix
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| EndpointError::BadPort {
                name: record.full_name.clone(),
            })?;
        let node = record
            .queue_at_node
            .as_deref()
            .map(node_of)
            .unwrap_or_default();
        Ok(Self { node, port })
    }
}

/// Host part of `queue@host.domain`.
fn node_of(queue_at_node: &str) -> String {
    let host = queue_at_node.split('@').nth(1).unwrap_or("");
    host.split('.').next().unwrap_or("").to_string()
}
