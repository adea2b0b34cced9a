//! Job lifecycle controller.
//!
//! One `connect` invocation drives a session request through
//! `NoJob -> Submitting -> Pending -> Running`, bounded by a wall-clock
//! deadline. The context owns the cleanup obligation: a job submitted
//! here is cancelled exactly once if the session never reaches Running.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

use crate::error::TunnelError;
use crate::job::{find_by_prefix, JobClass, ResolvedEndpoint, SessionRequest};
use crate::scheduler::{JobState, Scheduler};
use crate::signal::Interrupt;
use crate::timeout::{Deadline, PollIntervals};

/// Ephemeral port range handed to the in-job listener.
const PORT_RANGE: std::ops::RangeInclusive<u16> = 10_000..=65_000;

/// Controller phase for one session request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoJob,
    Submitting,
    Pending,
    Running,
    Connected,
    Cancelled,
    TimedOut,
}

impl Phase {
    /// Valid phase transitions.
    pub fn can_transition_to(self, target: Phase) -> bool {
        matches!(
            (self, target),
            (Phase::NoJob, Phase::Submitting)
                | (Phase::NoJob, Phase::Cancelled)
                | (Phase::Submitting, Phase::Pending)
                | (Phase::Submitting, Phase::Cancelled)
                | (Phase::Submitting, Phase::TimedOut)
                | (Phase::Pending, Phase::Pending)
                | (Phase::Pending, Phase::Running)
                | (Phase::Pending, Phase::Cancelled)
                | (Phase::Pending, Phase::TimedOut)
                | (Phase::Running, Phase::Connected)
                | (Phase::Running, Phase::Cancelled)
                | (Phase::Running, Phase::TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Connected | Phase::Cancelled | Phase::TimedOut)
    }
}

/// Per-invocation bookkeeping. Owns the cancel-once obligation for a job
/// submitted on its watch; the obligation is discharged once the job
/// reaches Running.
#[derive(Debug)]
pub struct LifecycleContext {
    deadline: Deadline,
    submitted_job_id: Option<String>,
    reached_running: bool,
    cancel_issued: bool,
}

impl LifecycleContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Deadline::new(timeout),
            submitted_job_id: None,
            reached_running: false,
            cancel_issued: false,
        }
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    pub fn record_submission(&mut self, id: String) {
        self.submitted_job_id = Some(id);
    }

    pub fn submitted_job_id(&self) -> Option<&str> {
        self.submitted_job_id.as_deref()
    }

    pub fn mark_running(&mut self) {
        self.reached_running = true;
    }

    /// Cancel the job submitted during this invocation, at most once and
    /// only while it never reached Running. Returns whether a cancel was
    /// issued.
    pub fn cancel_submitted(&mut self, scheduler: &dyn Scheduler) -> bool {
        if self.cancel_issued || self.reached_running {
            return false;
        }
        let Some(id) = self.submitted_job_id.as_deref() else {
            return false;
        };
        scheduler.cancel_job(id);
        self.cancel_issued = true;
        true
    }
}

/// What to hand the scheduler when a job has to be created.
#[derive(Debug, Clone)]
pub struct SubmitPlan {
    pub params: String,
    pub script: PathBuf,
}

/// Drives one session request against the scheduler.
pub struct Controller<'a> {
    scheduler: &'a dyn Scheduler,
    user: String,
    submit: SubmitPlan,
    intervals: PollIntervals,
    interrupt: Interrupt,
    phase: Phase,
}

impl<'a> Controller<'a> {
    pub fn new(
        scheduler: &'a dyn Scheduler,
        user: &str,
        submit: SubmitPlan,
        intervals: PollIntervals,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            scheduler,
            user: user.to_string(),
            submit,
            intervals,
            interrupt,
            phase: Phase::NoJob,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drive the request until its job is running and return the resolved
    /// endpoint. On timeout or interrupt the job submitted through `ctx`
    /// is cancelled before the error is returned.
    pub fn wait_for_running(
        &mut self,
        request: &SessionRequest,
        ctx: &mut LifecycleContext,
    ) -> Result<ResolvedEndpoint, TunnelError> {
        if self.interrupt.is_raised() {
            return Err(TunnelError::Interrupted);
        }

        let records = self.scheduler.list_jobs(&self.user);
        match find_by_prefix(&records, &request.name_prefix) {
            Some(record) if record.state == JobState::Running => {
                self.phase = Phase::Running;
                ctx.mark_running();
                return Ok(ResolvedEndpoint::from_record(record)?);
            }
            Some(_) => {
                self.phase = Phase::Pending;
            }
            None => {
                self.advance(Phase::Submitting);
                let port = rand::thread_rng().gen_range(PORT_RANGE);
                let name = request.job_name(port);
                eprintln!("submitting {} session job {}", request.class, name);
                let id = self.scheduler.submit_job(
                    &name,
                    &self.submit.params,
                    &self.submit.script,
                    &[port.to_string()],
                )?;
                ctx.record_submission(id);
                self.advance(Phase::Pending);
            }
        }

        loop {
            if self.interrupt.is_raised() {
                return Err(self.abort(ctx, Phase::Cancelled, TunnelError::Interrupted));
            }
            if ctx.deadline().expired() {
                let seconds = ctx.deadline().budget_seconds();
                return Err(self.abort(
                    ctx,
                    Phase::TimedOut,
                    TunnelError::JobStartTimeout { seconds },
                ));
            }
            self.interrupt.sleep(self.intervals.job_state);

            let records = self.scheduler.list_jobs(&self.user);
            if let Some(record) = find_by_prefix(&records, &request.name_prefix) {
                if record.state == JobState::Running {
                    self.advance(Phase::Running);
                    ctx.mark_running();
                    return Ok(ResolvedEndpoint::from_record(record)?);
                }
            }
            // A vanished record or failed query reads as "still waiting".
            self.advance(Phase::Pending);
        }
    }

    fn advance(&mut self, target: Phase) {
        debug_assert!(
            self.phase.can_transition_to(target),
            "phase {:?} cannot reach {:?}",
            self.phase,
            target
        );
        self.phase = target;
    }

    fn abort(&mut self, ctx: &mut LifecycleContext, phase: Phase, error: TunnelError) -> TunnelError {
        self.advance(phase);
        if ctx.cancel_submitted(self.scheduler) {
            if let Some(id) = ctx.submitted_job_id() {
                eprintln!("cancelled pending session job {}", id);
            }
        }
        error
    }
}

/// Administrative drain of all session jobs under `base`, requesting
/// cancellation every `interval` until none remains or the deadline
/// elapses. Each attempt is reported on stderr; the total number of
/// cancel requests is returned.
pub fn cancel_all(
    scheduler: &dyn Scheduler,
    base: &str,
    user: &str,
    deadline: &Deadline,
    interval: Duration,
    interrupt: &Interrupt,
) -> Result<usize, TunnelError> {
    let prefixes: Vec<String> = JobClass::ALL
        .iter()
        .map(|class| format!("{base}-{class}"))
        .collect();

    let mut requested = 0usize;
    loop {
        if interrupt.is_raised() {
            return Err(TunnelError::Interrupted);
        }

        let records = scheduler.list_jobs(user);
        let live: Vec<_> = prefixes
            .iter()
            .filter_map(|prefix| find_by_prefix(&records, prefix))
            .collect();
        if live.is_empty() {
            return Ok(requested);
        }
        for record in live {
            eprintln!("cancelling session job {} ({})", record.id, record.full_name);
            scheduler.cancel_job(&record.id);
            requested += 1;
        }

        if deadline.expired() {
            return Err(TunnelError::CancelTimeout {
                seconds: deadline.budget_seconds(),
            });
        }
        interrupt.sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Phase::NoJob.can_transition_to(Phase::Submitting));
        assert!(Phase::Submitting.can_transition_to(Phase::Pending));
        assert!(Phase::Pending.can_transition_to(Phase::Pending));
        assert!(Phase::Pending.can_transition_to(Phase::Running));
        assert!(Phase::Running.can_transition_to(Phase::Connected));
    }

    #[test]
    fn test_abort_transitions() {
        assert!(Phase::Pending.can_transition_to(Phase::TimedOut));
        assert!(Phase::Pending.can_transition_to(Phase::Cancelled));
        assert!(Phase::Submitting.can_transition_to(Phase::TimedOut));
    }

    #[test]
    fn test_terminal_phases_do_not_transition() {
        for phase in [Phase::Connected, Phase::Cancelled, Phase::TimedOut] {
            assert!(phase.is_terminal());
            for target in [Phase::NoJob, Phase::Pending, Phase::Running, Phase::Connected] {
                assert!(!phase.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_running_does_not_regress() {
        assert!(!Phase::Running.can_transition_to(Phase::Pending));
        assert!(!Phase::Running.can_transition_to(Phase::Submitting));
    }

    #[test]
    fn test_port_range_bounds() {
        for _ in 0..100 {
            let port = rand::thread_rng().gen_range(PORT_RANGE);
            assert!((10_000..=65_000).contains(&port));
        }
    }
}
