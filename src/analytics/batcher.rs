//! Queue-and-flush analytics delivery.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Notify};
use tokio::time;
use uuid::Uuid;

use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::governor::Governor;
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub name: String,
    pub properties: Value,
    pub occurred_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, properties: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            properties,
            occurred_at: Utc::now(),
        }
    }
}

/// Batches analytics events and ships them through the governor.
///
/// Events flush when `batch_size` are queued, on every interval tick, and
/// once more on shutdown. Failed batches go back to the front of the queue;
/// an id already queued is never queued twice.
pub struct AnalyticsBatcher {
    governor: Governor,
    config: AnalyticsConfig,
    queue: Mutex<VecDeque<AnalyticsEvent>>,
    flush_now: Notify,
}

impl AnalyticsBatcher {
    pub fn new(governor: Governor, config: AnalyticsConfig) -> Arc<Self> {
        Arc::new(Self {
            governor,
            config,
            queue: Mutex::new(VecDeque::new()),
            flush_now: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AnalyticsEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a named event; returns its id.
    pub fn track(&self, name: &str, properties: Value) -> Uuid {
        let event = AnalyticsEvent::new(name, properties);
        let id = event.id;
        self.enqueue(event);
        id
    }

    /// Queue an event; returns false if an event with the same id is queued.
    pub fn enqueue(&self, event: AnalyticsEvent) -> bool {
        let len = {
            let mut queue = self.lock();
            if queue.iter().any(|e| e.id == event.id) {
                return false;
            }
            queue.push_back(event);
            let dropped = trim_to(&mut queue, self.config.max_queue);
            if dropped > 0 {
                tracing::warn!(dropped, "Analytics queue full, dropping oldest events");
                metrics::record_analytics("dropped", dropped);
            }
            queue.len()
        };

        if len >= self.config.batch_size {
            self.flush_now.notify_one();
        }
        true
    }

    pub fn queued(&self) -> usize {
        self.lock().len()
    }

    /// Send everything queued, one batch at a time.
    ///
    /// Stops at the first failed batch, puts it back and returns the error.
    pub async fn flush(&self) -> Result<usize> {
        let mut sent = 0;
        loop {
            let batch: Vec<AnalyticsEvent> = {
                let mut queue = self.lock();
                let n = queue.len().min(self.config.batch_size);
                queue.drain(..n).collect()
            };
            if batch.is_empty() {
                return Ok(sent);
            }

            let body = json!({ "events": batch });
            match self.governor.post(&self.config.endpoint, body).await {
                Ok(_) => {
                    sent += batch.len();
                    metrics::record_analytics("sent", batch.len());
                }
                Err(e) => {
                    let count = batch.len();
                    self.requeue(batch);
                    metrics::record_analytics("requeued", count);
                    tracing::warn!(error = %e, events = count, "Analytics flush failed, events requeued");
                    return Err(e);
                }
            }
        }
    }

    fn requeue(&self, batch: Vec<AnalyticsEvent>) {
        let mut queue = self.lock();
        let mut seen: HashSet<Uuid> = queue.iter().map(|e| e.id).collect();

        for event in batch.into_iter().rev() {
            if seen.insert(event.id) {
                queue.push_front(event);
            }
        }

        let dropped = trim_to(&mut queue, self.config.max_queue);
        if dropped > 0 {
            tracing::warn!(dropped, "Analytics queue full after requeue, dropping oldest events");
            metrics::record_analytics("dropped", dropped);
        }
    }

    async fn flush_logged(&self) {
        match self.flush().await {
            Ok(0) => {}
            Ok(sent) => tracing::debug!(sent, "Analytics flushed"),
            Err(_) => {} // already logged and requeued
        }
    }

    /// Flush loop; exits after a final flush when `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            endpoint = %self.config.endpoint,
            batch_size = self.config.batch_size,
            interval_secs = self.config.flush_interval_secs,
            "Analytics batcher starting"
        );

        let mut ticker = time::interval(self.config.flush_interval());
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.flush_logged().await,
                _ = self.flush_now.notified() => self.flush_logged().await,
                _ = shutdown.recv() => {
                    tracing::info!(queued = self.queued(), "Analytics batcher shutting down, final flush");
                    self.flush_logged().await;
                    break;
                }
            }
        }
    }
}

/// Drop from the front until `queue` fits; returns how many were dropped.
fn trim_to(queue: &mut VecDeque<AnalyticsEvent>, max: usize) -> usize {
    let excess = queue.len().saturating_sub(max);
    queue.drain(..excess);
    excess
}
