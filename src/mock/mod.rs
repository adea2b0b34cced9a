//! Scripted scheduler for tests.
//!
//! Listings are served in order; the final scripted listing repeats once
//! the script runs dry, so a "stays pending forever" scenario is a
//! single trailing entry. Calls and cancelled ids are recorded for
//! exactly-once assertions.

use std::path::Path;
use std::sync::Mutex;

use crate::error::TunnelError;
use crate::scheduler::{JobRecord, JobState, Scheduler};

/// One recorded submission.
#[derive(Debug, Clone)]
pub struct SubmitCall {
    pub name: String,
    pub params: String,
    pub script: String,
    pub args: Vec<String>,
}

#[derive(Default)]
struct MockStateInner {
    listings: Vec<Vec<JobRecord>>,
    next_listing: usize,
    submit_ids: Vec<String>,
    next_submit: usize,
    list_calls: usize,
    submits: Vec<SubmitCall>,
    cancelled: Vec<String>,
}

/// In-process `Scheduler` with scripted responses.
#[derive(Default)]
pub struct MockScheduler {
    state: Mutex<MockStateInner>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next listing response.
    pub fn push_listing(&self, records: Vec<JobRecord>) {
        self.state.lock().unwrap().listings.push(records);
    }

    /// Queue the id returned by the next submission.
    pub fn push_submit_id(&self, id: &str) {
        self.state.lock().unwrap().submit_ids.push(id.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn submit_calls(&self) -> usize {
        self.state.lock().unwrap().submits.len()
    }

    pub fn submitted(&self) -> Vec<SubmitCall> {
        self.state.lock().unwrap().submits.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

impl Scheduler for MockScheduler {
    fn list_jobs(&self, _user: &str) -> Vec<JobRecord> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.listings.is_empty() {
            return Vec::new();
        }
        let index = state.next_listing.min(state.listings.len() - 1);
        if state.next_listing + 1 < state.listings.len() {
            state.next_listing += 1;
        }
        state.listings[index].clone()
    }

    fn submit_job(
        &self,
        name: &str,
        params: &str,
        script: &Path,
        args: &[String],
    ) -> Result<String, TunnelError> {
        let mut state = self.state.lock().unwrap();
        let id = state
            .submit_ids
            .get(state.next_submit)
            .cloned()
            .unwrap_or_else(|| format!("{}", 4200 + state.submits.len()));
        state.next_submit += 1;
        state.submits.push(SubmitCall {
            name: name.to_string(),
            params: params.to_string(),
            script: script.display().to_string(),
            args: args.to_vec(),
        });
        Ok(id)
    }

    fn cancel_job(&self, id: &str) {
        self.state.lock().unwrap().cancelled.push(id.to_string());
    }
}

/// Convenience constructor for scripted listings.
pub fn record(id: &str, full_name: &str, state: JobState, queue_at_node: Option<&str>) -> JobRecord {
    JobRecord {
        id: id.to_string(),
        full_name: full_name.to_string(),
        state,
        queue_at_node: queue_at_node.map(str::to_string),
    }
}
