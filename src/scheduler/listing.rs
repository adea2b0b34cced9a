//! Parser for the scheduler's XML job listing.
//!
//! The listing is treated as a stream of job records delimited by the
//! `<job_list>` start and end markers, each carrying a small fixed set of
//! tagged fields. The parser keeps an explicit in-record state and emits
//! a record only when its closing marker is observed; partial or
//! malformed records are skipped, never fatal.

use std::fmt;

use regex_lite::Regex;
use serde::Serialize;

/// Coarse job lifecycle state as reported by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Queued, waiting, or held.
    Pending,
    /// Actively executing on an assigned node.
    Running,
    /// Anything else (error, deletion, migration).
    Other,
}

impl JobState {
    /// Map an SGE state code to the coarse lifecycle state.
    pub fn from_code(code: &str) -> Self {
        match code {
            "r" | "t" | "Rr" | "Rt" => JobState::Running,
            c if c.contains(['q', 'w', 'h']) => JobState::Pending,
            _ => JobState::Other,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Other => write!(f, "other"),
        }
    }
}

/// One job as reported by the scheduler's listing.
///
/// Constructed fresh on every query, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub full_name: String,
    pub state: JobState,
    /// `queue@host.domain`, absent while the job has no assigned node.
    pub queue_at_node: Option<String>,
}

const RECORD_START: &str = "<job_list";
const RECORD_END: &str = "</job_list>";

/// Fields accumulated between a record's start and end markers.
#[derive(Default)]
struct PartialRecord {
    id: Option<String>,
    name: Option<String>,
    state: Option<String>,
    queue: Option<String>,
}

impl PartialRecord {
    /// A record is usable only when id, name, and state were all seen.
    fn build(self) -> Option<JobRecord> {
        Some(JobRecord {
            id: self.id?,
            full_name: self.name?,
            state: JobState::from_code(&self.state?),
            queue_at_node: self.queue,
        })
    }
}

/// Incremental listing parser with an explicit in-record flag.
pub struct ListingParser {
    tag: Regex,
    pending: String,
    current: Option<PartialRecord>,
    jobs: Vec<JobRecord>,
}

impl ListingParser {
    pub fn new() -> Self {
        Self {
            tag: Regex::new(r"<([A-Za-z_]+)>([^<]*)</").unwrap(),
            pending: String::new(),
            current: None,
            jobs: Vec::new(),
        }
    }

    /// Parse a complete listing in one call.
    pub fn parse(text: &str) -> Vec<JobRecord> {
        let mut parser = Self::new();
        parser.feed(text);
        parser.finish()
    }

    /// Feed a chunk of listing text. Chunks may split lines and records
    /// arbitrarily.
    pub fn feed(&mut self, chunk: &str) {
        self.pending.push_str(chunk);
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            self.line(line.trim_end());
        }
    }

    /// Flush any final unterminated line and return the parsed records.
    /// A record left open at end of input is dropped.
    pub fn finish(mut self) -> Vec<JobRecord> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.line(line.trim_end());
        }
        self.jobs
    }

    fn line(&mut self, line: &str) {
        if line.contains(RECORD_END) {
            if let Some(record) = self.current.take().and_then(PartialRecord::build) {
                self.jobs.push(record);
            }
            return;
        }
        if line.contains(RECORD_START) {
            // A new start marker discards any unclosed record.
            self.current = Some(PartialRecord::default());
            return;
        }
        let field = self
            .tag
            .captures(line)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()));
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let Some((tag, value)) = field else {
            return;
        };
        match tag.as_str() {
            "JB_job_number" => current.id = Some(value),
            "JB_name" => current.name = Some(value),
            "state" => current.state = Some(value),
            "queue_name" => {
                if !value.is_empty() {
                    current.queue = Some(value);
                }
            }
            _ => {}
        }
    }
}

impl Default for ListingParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "<?xml version='1.0'?>\n\
        <job_info>\n\
        <queue_info>\n\
        <job_list state=\"running\">\n\
        <JB_job_number>3141</JB_job_number>\n\
        <JB_name>vscode-remote-gpu_54213</JB_name>\n\
        <state>r</state>\n\
        <queue_name>gpu.q@node07.cluster.example</queue_name>\n\
        </job_list>\n\
        </queue_info>\n\
        <job_info>\n\
        <job_list state=\"pending\">\n\
        <JB_job_number>3142</JB_job_number>\n\
        <JB_name>vscode-remote-cpu_41870</JB_name>\n\
        <state>qw</state>\n\
        <queue_name></queue_name>\n\
        </job_list>\n\
        </job_info>\n\
        </job_info>\n";

    #[test]
    fn test_parses_running_and_pending_records() {
        let jobs = ListingParser::parse(LISTING);
        assert_eq!(jobs.len(), 2);

        assert_eq!(jobs[0].id, "3141");
        assert_eq!(jobs[0].full_name, "vscode-remote-gpu_54213");
        assert_eq!(jobs[0].state, JobState::Running);
        assert_eq!(
            jobs[0].queue_at_node.as_deref(),
            Some("gpu.q@node07.cluster.example")
        );

        assert_eq!(jobs[1].id, "3142");
        assert_eq!(jobs[1].state, JobState::Pending);
        assert_eq!(jobs[1].queue_at_node, None, "empty queue tag reads as absent");
    }

    #[test]
    fn test_chunked_input_parses_identically() {
        let mut parser = ListingParser::new();
        // One byte at a time, the worst possible read pattern.
        for chunk in LISTING.split_inclusive(|_: char| true) {
            parser.feed(chunk);
        }
        let jobs = parser.finish();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, "3141");
    }

    #[test]
    fn test_record_missing_a_field_is_skipped() {
        let listing = "<job_list>\n\
            <JB_job_number>7</JB_job_number>\n\
            <state>qw</state>\n\
            </job_list>\n\
            <job_list>\n\
            <JB_job_number>8</JB_job_number>\n\
            <JB_name>vscode-remote-cpu_40000</JB_name>\n\
            <state>qw</state>\n\
            </job_list>\n";
        let jobs = ListingParser::parse(listing);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "8");
    }

    #[test]
    fn test_unclosed_record_is_dropped() {
        let listing = "<job_list>\n\
            <JB_job_number>7</JB_job_number>\n\
            <JB_name>vscode-remote-cpu_40000</JB_name>\n\
            <state>qw</state>\n";
        assert!(ListingParser::parse(listing).is_empty());
    }

    #[test]
    fn test_new_start_marker_discards_unclosed_record() {
        let listing = "<job_list>\n\
            <JB_job_number>7</JB_job_number>\n\
            <job_list>\n\
            <JB_job_number>9</JB_job_number>\n\
            <JB_name>vscode-remote-gpu_50000</JB_name>\n\
            <state>r</state>\n\
            </job_list>\n";
        let jobs = ListingParser::parse(listing);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "9");
    }

    #[test]
    fn test_fields_outside_a_record_are_ignored() {
        let listing = "<JB_name>stray</JB_name>\n<state>r</state>\n";
        assert!(ListingParser::parse(listing).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(ListingParser::parse("").is_empty());
    }

    #[test]
    fn test_state_code_mapping() {
        assert_eq!(JobState::from_code("r"), JobState::Running);
        assert_eq!(JobState::from_code("t"), JobState::Running);
        assert_eq!(JobState::from_code("Rr"), JobState::Running);
        assert_eq!(JobState::from_code("Rt"), JobState::Running);
        assert_eq!(JobState::from_code("qw"), JobState::Pending);
        assert_eq!(JobState::from_code("hqw"), JobState::Pending);
        assert_eq!(JobState::from_code("w"), JobState::Pending);
        assert_eq!(JobState::from_code("Eqw"), JobState::Pending);
        assert_eq!(JobState::from_code("dr"), JobState::Other);
        assert_eq!(JobState::from_code(""), JobState::Other);
    }
}
