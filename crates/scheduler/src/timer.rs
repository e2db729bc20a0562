// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-group switch timers.
//!
//! Each registered network group gets one background timer task. Arming it
//! schedules a single wakeup at the switch-timeout deadline; when the
//! deadline passes, the timer invokes its callback (which takes the
//! scheduler lock, re-runs the scheduling step, and broadcasts) and goes
//! back to sleep. The timer sleeps outside the scheduler lock and is
//! cancellable by re-arming or disarming at any time.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerCommand {
    /// Nothing scheduled; wait for an arm.
    Idle,
    /// Fire once the deadline passes.
    Armed(Instant),
    /// Tear down the timer thread.
    Shutdown,
}

struct TimerShared {
    command: Mutex<TimerCommand>,
    cv: Condvar,
}

/// A cancellable one-shot wakeup keyed to one network group.
pub(crate) struct SwitchTimer {
    shared: Arc<TimerShared>,
    thread: Option<JoinHandle<()>>,
}

impl SwitchTimer {
    /// Spawns the timer thread. `on_fire` runs on that thread every time
    /// an armed deadline passes.
    pub fn spawn(on_fire: impl Fn() + Send + 'static) -> Self {
        let shared = Arc::new(TimerShared {
            command: Mutex::new(TimerCommand::Idle),
            cv: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::spawn(move || run(&thread_shared, &on_fire));

        Self {
            shared,
            thread: Some(thread),
        }
    }

    /// Schedules (or reschedules) the wakeup.
    pub fn arm(&self, deadline: Instant) {
        *lock(&self.shared.command) = TimerCommand::Armed(deadline);
        self.shared.cv.notify_all();
    }

    /// Cancels a pending wakeup, if any.
    pub fn disarm(&self) {
        let mut cmd = lock(&self.shared.command);
        if matches!(*cmd, TimerCommand::Armed(_)) {
            *cmd = TimerCommand::Idle;
            self.shared.cv.notify_all();
        }
    }
}

fn run(shared: &TimerShared, on_fire: &(impl Fn() + Send)) {
    let mut cmd = lock(&shared.command);
    loop {
        match *cmd {
            TimerCommand::Shutdown => return,
            TimerCommand::Idle => {
                cmd = shared
                    .cv
                    .wait(cmd)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            TimerCommand::Armed(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    *cmd = TimerCommand::Idle;
                    drop(cmd);
                    // The callback takes the scheduler lock; ours is
                    // released first.
                    on_fire();
                    cmd = lock(&shared.command);
                } else {
                    cmd = shared
                        .cv
                        .wait_timeout(cmd, deadline - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0;
                }
            }
        }
    }
}

fn lock(mutex: &Mutex<TimerCommand>) -> MutexGuard<'_, TimerCommand> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Drop for SwitchTimer {
    fn drop(&mut self) {
        *lock(&self.shared.command) = TimerCommand::Shutdown;
        self.shared.cv.notify_all();
        if let Some(thread) = self.thread.take() {
            // A timer torn down from its own callback (the firing thread
            // can be the scheduler's last owner) must not join itself;
            // the thread exits on the shutdown command regardless.
            if thread.thread().id() != std::thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_fires_after_deadline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = SwitchTimer::spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.arm(Instant::now() + Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disarm_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = SwitchTimer::spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.arm(Instant::now() + Duration::from_millis(50));
        timer.disarm();
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = SwitchTimer::spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.arm(Instant::now() + Duration::from_secs(60));
        timer.arm(Instant::now() + Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_joins_cleanly() {
        let timer = SwitchTimer::spawn(|| {});
        timer.arm(Instant::now() + Duration::from_secs(60));
        drop(timer); // must not hang on the armed deadline
    }
}
