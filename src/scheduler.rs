//! Periodic job scheduler for long-running agents
//!
//! Drives repeated catalog application: each job wraps a caller-supplied
//! callback (typically "run one transaction") with a run interval and an
//! optional splay, a randomized first-run delay that decorrelates fleets
//! of agents started at the same moment. The loop is single-threaded and
//! cooperative: it sleeps until the soonest job is due, runs every job that
//! is ready, and repeats while any job remains enabled. Sleeping is the
//! only suspension point; one job's callback fully completes before the
//! next is considered.

use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Handle passed to a job's callback
///
/// Lets the callback disable its own job, e.g. on a fatal error; the
/// change takes effect on the next loop iteration.
#[derive(Debug, Default)]
pub struct JobControl {
    disable_requested: bool,
}

impl JobControl {
    /// Disable this job after the current run completes
    pub fn disable(&mut self) {
        self.disable_requested = true;
    }
}

/// A periodically runnable task
pub struct Job {
    name: String,
    run_interval: Duration,
    splay: Option<Duration>,
    splay_offset: Duration,
    enabled: bool,
    start: Option<Instant>,
    last_run: Option<Instant>,
    task: Box<dyn FnMut(&mut JobControl)>,
}

impl Job {
    /// Create an enabled job with the given interval and callback
    pub fn new(
        name: impl Into<String>,
        run_interval: Duration,
        task: impl FnMut(&mut JobControl) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run_interval,
            splay: None,
            splay_offset: Duration::ZERO,
            enabled: true,
            start: None,
            last_run: None,
            task: Box::new(task),
        }
    }

    /// Delay the first run by a random offset in `0..=limit`
    pub fn with_splay(mut self, limit: Duration) -> Self {
        self.splay = Some(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// The splay offset drawn for this job's first run
    pub fn splay_offset(&self) -> Duration {
        self.splay_offset
    }

    /// Record the scheduling baseline and draw the splay offset
    ///
    /// Called once by the scheduler before its first iteration. The first
    /// run becomes due one interval after `now`, plus the splay offset if
    /// that is later.
    pub fn start(&mut self, now: Instant) {
        self.start = Some(now);
        if let Some(limit) = self.splay {
            self.splay_offset = random_splay(limit);
            log::debug!(
                "job {}: splaying first run by {:?}",
                self.name,
                self.splay_offset
            );
        }
    }

    /// Whether the job is due at `now`
    pub fn ready(&self, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }
        match (self.last_run, self.start) {
            (Some(last), _) => now.saturating_duration_since(last) >= self.run_interval,
            (None, Some(start)) => {
                let elapsed = now.saturating_duration_since(start);
                elapsed >= self.run_interval && elapsed >= self.splay_offset
            }
            // Never started and never run: due immediately
            (None, None) => true,
        }
    }

    /// Time remaining until the job is next due; zero when ready
    pub fn interval_to_next(&self, now: Instant) -> Duration {
        match (self.last_run, self.start) {
            (Some(last), _) => self
                .run_interval
                .saturating_sub(now.saturating_duration_since(last)),
            (None, Some(start)) => self
                .run_interval
                .max(self.splay_offset)
                .saturating_sub(now.saturating_duration_since(start)),
            (None, None) => Duration::ZERO,
        }
    }

    /// Invoke the callback and stamp `last_run`
    pub fn run(&mut self, now: Instant) {
        let mut control = JobControl::default();
        (self.task)(&mut control);
        self.last_run = Some(now);
        if control.disable_requested {
            log::debug!("job {}: disabled itself", self.name);
            self.enabled = false;
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("run_interval", &self.run_interval)
            .field("splay", &self.splay)
            .field("enabled", &self.enabled)
            .field("last_run", &self.last_run)
            .finish_non_exhaustive()
    }
}

/// Cooperative driver for a set of jobs
#[derive(Debug, Default)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Run jobs until every one of them is disabled
    pub fn run_loop(&self, jobs: &mut [Job]) {
        let now = Instant::now();
        for job in jobs.iter_mut() {
            job.start(now);
        }
        while jobs.iter().any(Job::enabled) {
            let wait = Self::min_wait(jobs, Instant::now());
            if !wait.is_zero() {
                log::debug!("sleeping {wait:?} until next job");
                thread::sleep(wait);
            }
            self.run_ready(jobs, Instant::now());
        }
    }

    /// Run every enabled job that is due at `now`; one pass, no sleeping
    pub fn run_ready(&self, jobs: &mut [Job], now: Instant) {
        for job in jobs.iter_mut() {
            if job.enabled() && job.ready(now) {
                job.run(now);
            }
        }
    }

    /// Shortest time until any enabled job is due
    fn min_wait(jobs: &[Job], now: Instant) -> Duration {
        jobs.iter()
            .filter(|job| job.enabled())
            .map(|job| job.interval_to_next(now))
            .min()
            .unwrap_or(Duration::ZERO)
    }
}

/// Draw a uniform offset in `0..=limit` from UUIDv4 bits
fn random_splay(limit: Duration) -> Duration {
    let limit_ns = limit.as_nanos();
    if limit_ns == 0 {
        return Duration::ZERO;
    }
    let draw = Uuid::new_v4().as_u128() % (limit_ns + 1);
    Duration::from_nanos(draw as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn ready_counts_from_start_then_from_last_run() {
        let t0 = Instant::now();
        let mut job = Job::new("agent", secs(10), |_| {});
        job.start(t0);

        assert!(!job.ready(t0 + secs(5)));
        assert!(job.ready(t0 + secs(10)));

        job.run(t0 + secs(10));
        assert!(!job.ready(t0 + secs(15)));
        assert!(job.ready(t0 + secs(20)));
    }

    #[test]
    fn interval_to_next_is_zero_when_ready() {
        let t0 = Instant::now();
        let mut job = Job::new("agent", secs(10), |_| {});
        job.start(t0);

        assert_eq!(job.interval_to_next(t0 + secs(4)), secs(6));
        assert_eq!(job.interval_to_next(t0 + secs(10)), Duration::ZERO);

        job.run(t0 + secs(10));
        assert_eq!(job.interval_to_next(t0 + secs(13)), secs(7));
    }

    #[test]
    fn disabled_job_is_never_ready() {
        let t0 = Instant::now();
        let mut job = Job::new("agent", secs(1), |_| {});
        job.start(t0);
        job.disable();
        assert!(!job.ready(t0 + secs(100)));
    }

    #[test]
    fn splay_offset_stays_within_limit() {
        for _ in 0..50 {
            let mut job = Job::new("agent", secs(10), |_| {}).with_splay(secs(30));
            job.start(Instant::now());
            assert!(job.splay_offset() <= secs(30));
        }
    }

    #[test]
    fn splay_delays_only_the_first_run() {
        let t0 = Instant::now();
        let mut job = Job::new("agent", secs(10), |_| {}).with_splay(secs(30));
        job.start(t0);
        let offset = job.splay_offset();

        // Not ready before both the interval and the offset have elapsed
        let first_due = secs(10).max(offset);
        if !first_due.is_zero() {
            assert!(!job.ready(t0 + first_due - Duration::from_millis(1)));
        }
        assert!(job.ready(t0 + first_due));

        // After the first run, only the interval matters
        job.run(t0 + first_due);
        assert!(job.ready(t0 + first_due + secs(10)));
    }

    #[test]
    fn zero_splay_limit_draws_zero_offset() {
        let mut job = Job::new("agent", secs(10), |_| {}).with_splay(Duration::ZERO);
        job.start(Instant::now());
        assert_eq!(job.splay_offset(), Duration::ZERO);
    }

    #[test]
    fn run_ready_runs_only_due_jobs() {
        let t0 = Instant::now();
        let fast_runs = Arc::new(AtomicUsize::new(0));
        let slow_runs = Arc::new(AtomicUsize::new(0));

        let fast_counter = Arc::clone(&fast_runs);
        let slow_counter = Arc::clone(&slow_runs);
        let mut jobs = vec![
            Job::new("fast", secs(1), move |_| {
                fast_counter.fetch_add(1, Ordering::SeqCst);
            }),
            Job::new("slow", secs(60), move |_| {
                slow_counter.fetch_add(1, Ordering::SeqCst);
            }),
        ];
        for job in &mut jobs {
            job.start(t0);
        }

        Scheduler::new().run_ready(&mut jobs, t0 + secs(2));
        assert_eq!(fast_runs.load(Ordering::SeqCst), 1);
        assert_eq!(slow_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn run_loop_exits_when_jobs_disable_themselves() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut jobs = vec![Job::new(
            "agent",
            Duration::from_millis(1),
            move |control| {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                    control.disable();
                }
            },
        )];

        Scheduler::new().run_loop(&mut jobs);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(!jobs[0].enabled());
    }

    #[test]
    fn callback_disable_takes_effect_after_the_run() {
        let mut job = Job::new("agent", secs(1), |control| {
            control.disable();
        });
        let t0 = Instant::now();
        job.start(t0);
        assert!(job.enabled());
        job.run(t0 + secs(1));
        assert!(!job.enabled());
    }
}
