/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::{thread_rng, Rng};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    async fn sleep(&self, dur: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    async fn sleep(&self, dur: Duration) {
        tokio::time::sleep(dur).await;
    }
}

/// Test clock: a fixed date and a log of requested sleeps, never actually waits.
#[derive(Clone)]
pub struct ManualClock {
    today: NaiveDate,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    async fn sleep(&self, dur: Duration) {
        if let Ok(mut s) = self.sleeps.lock() {
            s.push(dur);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaceSettings {
    pub min: Duration,
    pub max: Duration,
}

impl PaceSettings {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            min: interval,
            max: interval,
        }
    }

    pub fn between(min: Duration, max: Duration) -> Self {
        if max < min {
            return Self { min: max, max: min };
        }
        Self { min, max }
    }

    fn pick(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(thread_rng().gen_range(lo..=hi))
    }
}

/// Enforces a delay between consecutive remote calls of one worker.
/// The first `acquire` passes immediately.
pub struct Pacer {
    clock: Arc<dyn Clock>,
    settings: PaceSettings,
    primed: bool,
}

impl Pacer {
    pub fn new(clock: Arc<dyn Clock>, settings: PaceSettings) -> Self {
        Self {
            clock,
            settings,
            primed: false,
        }
    }

    pub fn settings(&self) -> PaceSettings {
        self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn acquire(&mut self) {
        if !self.primed {
            self.primed = true;
            return;
        }
        let wait = self.settings.pick();
        if !wait.is_zero() {
            self.clock.sleep(wait).await;
        }
    }
}
