//! Direct-shell session selection.
//!
//! The `ssh` operation resolves a running session job per class
//! independently and, when more than one class is live, asks for a
//! numeric choice. The prompt reads from an injected input so tests can
//! drive it without a terminal.

use std::io::{BufRead, Write};
use std::process::{Command, ExitStatus};

use crate::error::TunnelError;
use crate::job::{find_by_prefix, JobClass, ResolvedEndpoint, SessionRequest};
use crate::scheduler::{JobState, Scheduler};

/// A running session job eligible for a direct shell.
#[derive(Debug, Clone)]
pub struct ShellCandidate {
    pub class: JobClass,
    pub endpoint: ResolvedEndpoint,
}

/// Resolve a candidate per class. Absence of a class is not an error;
/// records that fail to decode or carry no node are skipped.
pub fn resolve_candidates(scheduler: &dyn Scheduler, user: &str, base: &str) -> Vec<ShellCandidate> {
    let records = scheduler.list_jobs(user);
    let mut candidates = Vec::new();
    for class in JobClass::ALL {
        let request = SessionRequest::new(base, class);
        let Some(record) = find_by_prefix(&records, &request.name_prefix) else {
            continue;
        };
        if record.state != JobState::Running {
            continue;
        }
        if let Ok(endpoint) = ResolvedEndpoint::from_record(record) {
            if !endpoint.node.is_empty() {
                candidates.push(ShellCandidate { class, endpoint });
            }
        }
    }
    candidates
}

/// Pick one candidate, prompting on `prompt` and reading one line from
/// `input` when more than one class is running (1 = cpu, 2 = gpu). Any
/// other input is an error.
pub fn choose<R: BufRead, W: Write>(
    mut candidates: Vec<ShellCandidate>,
    input: &mut R,
    prompt: &mut W,
) -> Result<ShellCandidate, TunnelError> {
    if candidates.is_empty() {
        return Err(TunnelError::NoRunningJob);
    }
    if candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }

    for (index, candidate) in candidates.iter().enumerate() {
        writeln!(
            prompt,
            "{}) {} session on {}",
            index + 1,
            candidate.class,
            candidate.endpoint.node
        )?;
    }
    write!(prompt, "select session [1-{}]: ", candidates.len())?;
    prompt.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let trimmed = line.trim();
    match trimmed.parse::<usize>() {
        Ok(choice) if (1..=candidates.len()).contains(&choice) => Ok(candidates.remove(choice - 1)),
        _ => Err(TunnelError::InvalidChoice {
            input: trimmed.to_string(),
        }),
    }
}

/// Open the interactive shell to the chosen node with inherited stdio.
pub fn open_shell(node: &str) -> Result<ExitStatus, TunnelError> {
    Ok(Command::new("ssh").arg(node).status()?)
}
