//! RecurringActionScheduler - ユーザーの action を重ならないように定期実行する
//!
//! # 状態遷移
//! ```text
//! Idle -> Scheduled -> Running -> { Scheduled | Stopping } -> Idle
//! ```
//!
//! # 制御値 `interval_ms`
//! - `> 0`: その周期で繰り返す（sleep 中の deadline は変えず、次のサイクルから新しい周期）
//! - `0`: 実行中のサイクルが終わったら止まる
//! - `-1`: あと 1 回だけ実行して止まる（latch されるので、同時に 0 にされても 1 回は走る）
//! - `< -1`（`STOP_NOW`）: 次のサイクルは始めない。latch も捨てる
//!
//! # 方針
//! - キャンセルは協調的。実行中の action は絶対に中断しない
//! - ループは専用スレッド 1 本で回す（共有プールを長時間塞がないため）
//! - サイクル間の sleep は current-thread の tokio runtime 上で
//!   `sleep_until` と `Notify` を競合させて、停止要求ですぐ起きる
//! - action の panic は捕まえない。ループは終わり、Idle に戻る
//! - `dispose` は in-flight のサイクルが終わるまでポーリングで待つ。タイムアウトは無い

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::sync::Notify;

use crate::config::{IntervalCommand, STOP_NOW, SchedulerConfig};
use crate::ids::SchedulerId;

type Action = dyn Fn() + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulerState {
    /// No worker thread.
    Idle,
    /// Waiting for the next cycle.
    Scheduled,
    /// `action` is executing.
    Running,
    /// Leaving the loop.
    Stopping,
}

impl SchedulerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SchedulerState::Scheduled,
            2 => SchedulerState::Running,
            3 => SchedulerState::Stopping,
            _ => SchedulerState::Idle,
        }
    }
}

/// State shared between the handle and the worker thread.
struct Shared {
    id: SchedulerId,
    action: Box<Action>,
    interval_ms: AtomicI64,
    one_shot: AtomicBool,
    running: AtomicBool,
    disposing: AtomicBool,
    disposed: AtomicBool,
    phase: AtomicU8,
    runs: AtomicU64,
    wake: Notify,
    worker_thread: Mutex<Option<ThreadId>>,
}

impl Shared {
    fn set_phase(&self, state: SchedulerState) {
        self.phase.store(state as u8, Ordering::SeqCst);
    }

    fn wants_run(&self) -> bool {
        !self.disposing.load(Ordering::SeqCst)
            && (self.interval_ms.load(Ordering::SeqCst) > 0
                || self.one_shot.load(Ordering::SeqCst))
    }

    fn periodic_interval(&self) -> Option<Duration> {
        if self.disposing.load(Ordering::SeqCst) {
            return None;
        }
        match IntervalCommand::from_ms(self.interval_ms.load(Ordering::SeqCst)) {
            IntervalCommand::Every(period) => Some(period),
            _ => None,
        }
    }

    fn invoke(&self) {
        self.set_phase(SchedulerState::Running);
        (self.action)();
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.set_phase(SchedulerState::Scheduled);
    }

    /// Wait until `started + interval`. A period change only affects the next
    /// wait; `wake` cuts the sleep short only when the loop should end.
    /// Returns false in that case.
    async fn wait_next_cycle(&self, started: Instant) -> bool {
        let Some(period) = self.periodic_interval() else {
            return false;
        };
        let deadline = started + period;
        loop {
            if Instant::now() >= deadline {
                return true;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline.into()) => return true,
                _ = self.wake.notified() => {
                    if self.periodic_interval().is_none() {
                        return false;
                    }
                }
            }
        }
    }
}

/// Runs `action` on a repeating, non-overlapping schedule.
///
/// Dormant until `set_interval` receives a non-zero value. Dropping the
/// scheduler disposes it.
pub struct RecurringActionScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: SchedulerConfig,
}

impl RecurringActionScheduler {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_config(action, SchedulerConfig::default())
    }

    pub fn with_config<F>(action: F, config: SchedulerConfig) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            id: SchedulerId::generate(),
            action: Box::new(action),
            interval_ms: AtomicI64::new(0),
            one_shot: AtomicBool::new(false),
            running: AtomicBool::new(false),
            disposing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            phase: AtomicU8::new(SchedulerState::Idle as u8),
            runs: AtomicU64::new(0),
            wake: Notify::new(),
            worker_thread: Mutex::new(None),
        });
        Self {
            shared,
            worker: Mutex::new(None),
            config,
        }
    }

    pub fn id(&self) -> SchedulerId {
        self.shared.id
    }

    pub fn interval_ms(&self) -> i64 {
        self.shared.interval_ms.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_disposing(&self) -> bool {
        self.shared.disposing.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.shared.phase.load(Ordering::SeqCst))
    }

    /// How many times `action` has returned normally.
    pub fn run_count(&self) -> u64 {
        self.shared.runs.load(Ordering::SeqCst)
    }

    /// Change the schedule. Never interrupts an execution already in flight.
    ///
    /// A new period is used from the next scheduling decision: a loop that is
    /// already sleeping keeps its current deadline, so changing the period
    /// never triggers an extra run. Stop requests wake it immediately.
    ///
    /// No-op once `dispose` has started.
    pub fn set_interval(&self, ms: i64) {
        if self.is_disposing() {
            debug!("scheduler {}: set_interval({ms}) after dispose ignored", self.shared.id);
            return;
        }

        let command = IntervalCommand::from_ms(ms);
        match command {
            IntervalCommand::RunOnce => self.shared.one_shot.store(true, Ordering::SeqCst),
            IntervalCommand::StopNow => self.shared.one_shot.store(false, Ordering::SeqCst),
            IntervalCommand::Every(_) | IntervalCommand::StopAfterCycle => {}
        }
        let stored = if command == IntervalCommand::StopNow { STOP_NOW } else { ms };
        self.shared.interval_ms.store(stored, Ordering::SeqCst);
        self.shared.wake.notify_one();

        debug!("scheduler {}: interval -> {command:?}", self.shared.id);

        if matches!(command, IntervalCommand::Every(_) | IntervalCommand::RunOnce) {
            self.ensure_worker();
        }
    }

    /// Stop scheduling and block until the in-flight cycle (if any) has
    /// returned. Idempotent.
    ///
    /// There is no timeout: an `action` that never returns hangs this call.
    /// Called from inside `action` it returns without waiting.
    pub fn dispose(&self) {
        if self.shared.disposing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.one_shot.store(false, Ordering::SeqCst);
        self.shared.interval_ms.store(STOP_NOW, Ordering::SeqCst);
        self.shared.wake.notify_one();

        if self.is_worker_thread() {
            warn!(
                "scheduler {}: dispose called from its own action; not waiting for the cycle",
                self.shared.id
            );
        } else {
            let poll = self.config.dispose_poll();
            while self.shared.running.load(Ordering::SeqCst) {
                thread::sleep(poll);
            }
            let handle = self.worker.lock().take();
            if let Some(handle) = handle
                && handle.join().is_err()
            {
                debug!("scheduler {}: worker thread ended by panic", self.shared.id);
            }
        }

        self.shared.disposed.store(true, Ordering::SeqCst);
        info!(
            "scheduler {}: disposed after {} runs",
            self.shared.id,
            self.run_count()
        );
    }

    fn is_worker_thread(&self) -> bool {
        *self.shared.worker_thread.lock() == Some(thread::current().id())
    }

    fn ensure_worker(&self) {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // the live loop will observe the new interval
            return;
        }
        if self.is_disposing() {
            self.shared.running.store(false, Ordering::SeqCst);
            return;
        }
        self.shared.set_phase(SchedulerState::Scheduled);

        let shared = Arc::clone(&self.shared);
        let name = format!("{}-{}", self.config.thread_name, self.shared.id.short());
        let spawned = thread::Builder::new()
            .name(name)
            .spawn(move || run_worker(shared));

        match spawned {
            Ok(handle) => {
                let previous = self.worker.lock().replace(handle);
                // the previous worker already left its loop before `running` went false
                if let Some(previous) = previous {
                    let _ = previous.join();
                }
                debug!("scheduler {}: worker started", self.shared.id);
            }
            Err(err) => {
                error!("scheduler {}: failed to spawn worker: {err}", self.shared.id);
                self.shared.set_phase(SchedulerState::Idle);
                self.shared.running.store(false, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for RecurringActionScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for RecurringActionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringActionScheduler")
            .field("id", &self.shared.id)
            .field("interval_ms", &self.interval_ms())
            .field("state", &self.state())
            .field("runs", &self.run_count())
            .finish()
    }
}

/// Resets the scheduler to Idle if `action` panics on the worker thread.
struct PanicGuard<'a> {
    shared: &'a Shared,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(
                "scheduler {}: action panicked; recurring loop stopped",
                self.shared.id
            );
            *self.shared.worker_thread.lock() = None;
            self.shared.one_shot.store(false, Ordering::SeqCst);
            self.shared.set_phase(SchedulerState::Idle);
            self.shared.running.store(false, Ordering::SeqCst);
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    *shared.worker_thread.lock() = Some(thread::current().id());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("scheduler {}: cannot build timer runtime: {err}", shared.id);
            *shared.worker_thread.lock() = None;
            shared.set_phase(SchedulerState::Idle);
            shared.running.store(false, Ordering::SeqCst);
            return;
        }
    };

    let _guard = PanicGuard { shared: &*shared };
    loop {
        run_cycles(&shared, &runtime);

        shared.set_phase(SchedulerState::Stopping);
        if shared.one_shot.swap(false, Ordering::SeqCst)
            && !shared.disposing.load(Ordering::SeqCst)
        {
            shared.invoke();
        }

        *shared.worker_thread.lock() = None;
        shared.set_phase(SchedulerState::Idle);
        shared.running.store(false, Ordering::SeqCst);

        // set_interval may have raced with our exit; take the loop back if so.
        // Both sides store then load (`running` here, `interval_ms` there): SeqCst.
        if !shared.wants_run()
            || shared
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            break;
        }
        *shared.worker_thread.lock() = Some(thread::current().id());
        shared.set_phase(SchedulerState::Scheduled);
    }
    debug!("scheduler {}: worker idle", shared.id);
}

fn run_cycles(shared: &Shared, runtime: &Runtime) {
    while shared.periodic_interval().is_some() {
        let started = Instant::now();
        shared.invoke();
        if !runtime.block_on(shared.wait_next_cycle(started)) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RUN_ONCE, STOP_AFTER_CYCLE};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    fn counting() -> (Arc<AtomicUsize>, RecurringActionScheduler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let scheduler = RecurringActionScheduler::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, scheduler)
    }

    #[test]
    fn new_scheduler_is_dormant() {
        let (count, scheduler) = counting();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn run_once_on_idle_runs_exactly_once() {
        let (count, scheduler) = counting();
        scheduler.set_interval(RUN_ONCE);

        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()
            && count.load(Ordering::SeqCst) > 0));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.run_count(), 1);
    }

    #[test]
    fn periodic_runs_repeat_until_stopped() {
        let (count, scheduler) = counting();
        scheduler.set_interval(10);

        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 3));

        scheduler.set_interval(STOP_AFTER_CYCLE);
        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()));
        let settled = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn executions_never_overlap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));
        let (f, o, r) = (in_flight.clone(), overlaps.clone(), runs.clone());
        let scheduler = RecurringActionScheduler::new(move || {
            if f.fetch_add(1, Ordering::SeqCst) > 0 {
                o.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(5));
            f.fetch_sub(1, Ordering::SeqCst);
            r.fetch_add(1, Ordering::SeqCst);
        });

        // period shorter than the action itself
        scheduler.set_interval(1);
        for _ in 0..20 {
            scheduler.set_interval(1);
            scheduler.set_interval(RUN_ONCE);
            scheduler.set_interval(1);
        }
        assert!(wait_until(Duration::from_secs(2), || runs.load(Ordering::SeqCst) >= 5));
        scheduler.dispose();

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_after_cycle_lets_inflight_finish_and_dispose_waits() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let f = finished.clone();
        let scheduler = RecurringActionScheduler::new(move || {
            let _ = entered_tx.send(());
            thread::sleep(Duration::from_millis(150));
            f.store(true, Ordering::SeqCst);
        });

        scheduler.set_interval(20);
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        scheduler.set_interval(STOP_AFTER_CYCLE);
        assert!(!finished.load(Ordering::SeqCst));
        scheduler.dispose();

        assert!(finished.load(Ordering::SeqCst));
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.run_count(), 1);
    }

    #[test]
    fn stop_now_discards_latched_one_shot() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let scheduler = RecurringActionScheduler::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            let _ = entered_tx.send(());
            thread::sleep(Duration::from_millis(60));
        });

        scheduler.set_interval(1_000);
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        scheduler.set_interval(RUN_ONCE);
        scheduler.set_interval(STOP_NOW);

        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.interval_ms(), STOP_NOW);
    }

    #[test]
    fn one_shot_survives_concurrent_graceful_stop() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let scheduler = RecurringActionScheduler::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            let _ = entered_tx.send(());
            thread::sleep(Duration::from_millis(40));
        });

        scheduler.set_interval(1_000);
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        scheduler.set_interval(RUN_ONCE);
        scheduler.set_interval(STOP_AFTER_CYCLE);

        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()
            && count.load(Ordering::SeqCst) == 2));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn period_change_does_not_trigger_extra_run() {
        let (count, scheduler) = counting();
        scheduler.set_interval(10_000);
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1));

        scheduler.set_interval(5_000);
        scheduler.set_interval(8_000);
        thread::sleep(Duration::from_millis(80));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_running());
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
    }

    #[test]
    fn shortened_period_waits_for_current_deadline() {
        let (count, scheduler) = counting();
        scheduler.set_interval(60_000);
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1));

        scheduler.set_interval(5);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);

        // a stop request still cuts the 60s sleep short
        let started = Instant::now();
        scheduler.set_interval(STOP_NOW);
        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_once_right_after_previous_run_is_not_lost() {
        let (count, scheduler) = counting();
        for expected in 1..=200 {
            scheduler.set_interval(RUN_ONCE);
            assert!(
                wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= expected),
                "run {expected} never happened"
            );
        }
        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()));
        assert_eq!(count.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn restart_after_stop() {
        let (count, scheduler) = counting();
        scheduler.set_interval(RUN_ONCE);
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1
            && !scheduler.is_running()));

        scheduler.set_interval(RUN_ONCE);
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 2
            && !scheduler.is_running()));
    }

    #[test]
    fn dispose_is_idempotent_and_inert() {
        let (count, scheduler) = counting();
        scheduler.set_interval(5);
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 1));

        scheduler.dispose();
        scheduler.dispose();
        assert!(scheduler.is_disposed());
        assert!(scheduler.is_disposing());
        assert!(!scheduler.is_running());

        let settled = count.load(Ordering::SeqCst);
        scheduler.set_interval(5);
        scheduler.set_interval(RUN_ONCE);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn panicking_action_ends_the_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let scheduler = RecurringActionScheduler::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            panic!("action blew up");
        });

        scheduler.set_interval(5);
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1
            && !scheduler.is_running()));
        thread::sleep(Duration::from_millis(40));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.run_count(), 0);
        scheduler.dispose();
    }

    #[test]
    fn panic_discards_latched_one_shot() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let scheduler = RecurringActionScheduler::new(move || {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                let _ = entered_tx.send(());
                let _ = release_rx.lock().recv();
                panic!("first run fails");
            }
        });

        scheduler.set_interval(RUN_ONCE);
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        // latched while the failing run is in flight
        scheduler.set_interval(RUN_ONCE);
        release_tx.send(()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // a later periodic session must not pick up the stale one-shot
        scheduler.set_interval(60_000);
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 2));
        scheduler.set_interval(STOP_AFTER_CYCLE);
        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispose_from_inside_action_does_not_hang() {
        let slot: Arc<Mutex<Option<Arc<RecurringActionScheduler>>>> = Arc::new(Mutex::new(None));
        let s = slot.clone();
        let scheduler = Arc::new(RecurringActionScheduler::new(move || {
            if let Some(me) = s.lock().take() {
                me.dispose();
            }
        }));
        *slot.lock() = Some(Arc::clone(&scheduler));

        scheduler.set_interval(5);
        assert!(wait_until(Duration::from_secs(2), || scheduler.is_disposed()));
        assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()));
        assert_eq!(scheduler.run_count(), 1);
    }

    #[test]
    fn drop_disposes() {
        let (count, scheduler) = counting();
        scheduler.set_interval(5);
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 1));
        drop(scheduler);

        let settled = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }
}
