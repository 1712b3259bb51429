use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Risk,
    Trim,
}

impl JobKind {
    pub fn name(self) -> &'static str {
        match self {
            JobKind::Risk => "risk",
            JobKind::Trim => "trim",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
}

#[derive(Debug, Clone)]
struct Job {
    kind: JobKind,
    interval: Duration,
    next_due: Instant,
    state: JobState,
}

/// Two independent periodic jobs driven from one control loop.
///
/// A job is never started while it is already running; ticks that come due in the meantime are
/// dropped, and the next run is scheduled one interval after the previous run finished.
#[derive(Debug, Clone)]
pub struct Scheduler {
    jobs: Vec<Job>,
}

impl Scheduler {
    /// Both jobs are due immediately at `start`.
    pub fn new(risk_interval: Duration, trim_interval: Duration, start: Instant) -> Self {
        let job = |kind, interval| Job {
            kind,
            interval,
            next_due: start,
            state: JobState::Idle,
        };
        Self {
            jobs: vec![job(JobKind::Risk, risk_interval), job(JobKind::Trim, trim_interval)],
        }
    }

    pub fn due_jobs(&self, now: Instant) -> Vec<JobKind> {
        self.jobs
            .iter()
            .filter(|j| j.next_due <= now)
            .map(|j| j.kind)
            .collect()
    }

    /// Earliest instant at which any job becomes due.
    pub fn next_due(&self) -> Instant {
        self.jobs
            .iter()
            .map(|j| j.next_due)
            .min()
            .unwrap_or_else(Instant::now)
    }

    pub fn state(&self, kind: JobKind) -> JobState {
        self.job(kind).map(|j| j.state).unwrap_or(JobState::Idle)
    }

    /// Idle → Running. `false` when the job is not due or already running; such a tick is dropped.
    pub fn try_begin(&mut self, kind: JobKind, now: Instant) -> bool {
        let Some(job) = self.job_mut(kind) else {
            return false;
        };
        if job.state == JobState::Running || job.next_due > now {
            return false;
        }
        job.state = JobState::Running;
        true
    }

    /// Running → Idle, next run one interval from `finished_at`.
    pub fn finish(&mut self, kind: JobKind, finished_at: Instant) {
        if let Some(job) = self.job_mut(kind) {
            job.state = JobState::Idle;
            job.next_due = finished_at + job.interval;
        }
    }

    fn job(&self, kind: JobKind) -> Option<&Job> {
        self.jobs.iter().find(|j| j.kind == kind)
    }

    fn job_mut(&mut self, kind: JobKind) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.kind == kind)
    }
}
