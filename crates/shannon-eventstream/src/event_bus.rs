//! Per-workflow event log (spec §4.3, C3).
//!
//! Generalizes a `Vec<flume::Sender<T>>` fan-out guarded by a single
//! mutex into one log per workflow: a retained, bounded `VecDeque<Event>`
//! for replay plus the same `flume::Sender` fan-out for the live push
//! side. Sequence assignment and the retained append happen under one
//! lock (the "per-workflow lock" of spec §5); live delivery keeps the same
//! `publish` shape unchanged.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use shannon_core::model::{Event, EventKind};

/// Retention bounds: whichever limit is reached first evicts the oldest
/// retained event. Defaults match the deployment choice recorded in
/// DESIGN.md (10,000 events or 24 hours per workflow).
#[derive(Debug, Clone, Copy)]
pub struct EventStreamConfig {
    pub max_events: usize,
    pub max_age: Duration,
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self {
            max_events: 10_000,
            max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

struct Inner {
    retained: VecDeque<Event>,
    next_seq: u64,
    subscribers: Vec<flume::Sender<Event>>,
}

/// One append-only, strictly-ordered log for a single workflow.
pub struct WorkflowLog {
    workflow_id: Uuid,
    config: EventStreamConfig,
    inner: tokio::sync::Mutex<Inner>,
}

impl WorkflowLog {
    fn new(workflow_id: Uuid, config: EventStreamConfig) -> Self {
        Self {
            workflow_id,
            config,
            inner: tokio::sync::Mutex::new(Inner {
                retained: VecDeque::new(),
                next_seq: 1,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Assign the next `seq`, append to the retained buffer, evict by
    /// count/age, then fan out to live subscribers — all under one lock so
    /// a concurrent `subscribe` never observes a torn state (spec property
    /// 1: strictly ordered, no duplicates, starts at 1, increments by 1).
    pub async fn publish(&self, mut event: Event) -> Event {
        let mut inner = self.inner.lock().await;
        event.workflow_id = self.workflow_id;
        event.seq = inner.next_seq;
        inner.next_seq += 1;

        inner.retained.push_back(event.clone());
        self.evict(&mut inner);

        inner.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        event
    }

    fn evict(&self, inner: &mut Inner) {
        while inner.retained.len() > self.config.max_events {
            inner.retained.pop_front();
        }
        let cutoff = Utc::now() - chrono::Duration::from_std(self.config.max_age).unwrap_or_default();
        while matches!(inner.retained.front(), Some(e) if e.timestamp < cutoff) {
            inner.retained.pop_front();
        }
    }

    /// Replay retained events with `seq > last_seen_seq` (or everything, if
    /// `None`), emit a synthetic `Gap` event if retention no longer covers
    /// the request, then attach the caller to the live fan-out — all under
    /// the same lock so nothing published mid-replay is missed or
    /// duplicated (spec property 2: replay gap-freeness).
    pub async fn subscribe(&self, last_seen_seq: Option<u64>) -> flume::Receiver<Event> {
        let (tx, rx) = flume::unbounded();
        let mut inner = self.inner.lock().await;

        if let Some(last_seen) = last_seen_seq {
            let oldest_retained = inner.retained.front().map(|e| e.seq);
            let covers_request = match oldest_retained {
                Some(oldest) => last_seen + 1 >= oldest,
                None => true,
            };
            if !covers_request {
                let gap = Event {
                    workflow_id: self.workflow_id,
                    seq: last_seen,
                    stream_id: Uuid::new_v4(),
                    kind: EventKind::Gap,
                    agent_id: None,
                    message: "retention window no longer covers requested last_seen_seq".into(),
                    payload: Default::default(),
                    timestamp: Utc::now(),
                };
                let _ = tx.send(gap);
            }
            for event in inner.retained.iter().filter(|e| e.seq > last_seen) {
                let _ = tx.send(event.clone());
            }
        }

        inner.subscribers.push(tx);
        rx
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }
}

/// Owns one `WorkflowLog` per live workflow.
#[derive(Clone)]
pub struct EventStreamRegistry {
    logs: Arc<DashMap<Uuid, Arc<WorkflowLog>>>,
    config: EventStreamConfig,
}

impl EventStreamRegistry {
    pub fn new(config: EventStreamConfig) -> Self {
        Self {
            logs: Arc::new(DashMap::new()),
            config,
        }
    }

    fn log_for(&self, workflow_id: Uuid) -> Arc<WorkflowLog> {
        self.logs
            .entry(workflow_id)
            .or_insert_with(|| Arc::new(WorkflowLog::new(workflow_id, self.config)))
            .clone()
    }

    pub async fn publish(&self, workflow_id: Uuid, event: Event) -> Event {
        self.log_for(workflow_id).publish(event).await
    }

    pub async fn subscribe(&self, workflow_id: Uuid, last_seen_seq: Option<u64>) -> flume::Receiver<Event> {
        self.log_for(workflow_id).subscribe(last_seen_seq).await
    }

    /// Drop logs for workflows with no retained events newer than the
    /// configured retention window and no live subscribers.
    pub async fn evict_idle(&self) {
        let mut to_remove = Vec::new();
        for entry in self.logs.iter() {
            let log = entry.value();
            let inner = log.inner.lock().await;
            if inner.subscribers.is_empty() && inner.retained.is_empty() {
                to_remove.push(*entry.key());
            }
        }
        for id in to_remove {
            self.logs.remove(&id);
        }
    }
}

impl Default for EventStreamRegistry {
    fn default() -> Self {
        Self::new(EventStreamConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, message: &str) -> Event {
        Event {
            workflow_id: Uuid::nil(),
            seq: 0,
            stream_id: Uuid::new_v4(),
            kind,
            agent_id: None,
            message: message.to_string(),
            payload: Default::default(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn seq_is_strictly_increasing_from_one() {
        let registry = EventStreamRegistry::default();
        let workflow_id = Uuid::new_v4();

        let e1 = registry
            .publish(workflow_id, event(EventKind::WorkflowStarted, "started"))
            .await;
        let e2 = registry
            .publish(workflow_id, event(EventKind::AgentStarted, "agent"))
            .await;
        assert_eq!(e1.seq, 1);
        assert_eq!(e2.seq, 2);
    }

    #[tokio::test]
    async fn subscribe_with_last_seen_seq_replays_then_goes_live() {
        let registry = EventStreamRegistry::default();
        let workflow_id = Uuid::new_v4();

        for i in 0..5 {
            registry
                .publish(workflow_id, event(EventKind::Progress, &format!("p{i}")))
                .await;
        }

        let rx = registry.subscribe(workflow_id, Some(2)).await;
        let replayed: Vec<Event> = rx.drain().collect();
        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[0].seq, 3);
        assert_eq!(replayed[2].seq, 5);

        registry
            .publish(workflow_id, event(EventKind::WorkflowCompleted, "done"))
            .await;
        let live = rx.recv_async().await.unwrap();
        assert_eq!(live.seq, 6);
    }

    #[tokio::test]
    async fn subscribe_past_retention_emits_gap_marker() {
        let config = EventStreamConfig {
            max_events: 2,
            max_age: Duration::from_secs(3600),
        };
        let registry = EventStreamRegistry::new(config);
        let workflow_id = Uuid::new_v4();

        for i in 0..5 {
            registry
                .publish(workflow_id, event(EventKind::Progress, &format!("p{i}")))
                .await;
        }

        let rx = registry.subscribe(workflow_id, Some(1)).await;
        let first = rx.recv_async().await.unwrap();
        assert_eq!(first.kind, EventKind::Gap);
    }

    #[tokio::test]
    async fn subscribe_without_last_seen_only_gets_live_events() {
        let registry = EventStreamRegistry::default();
        let workflow_id = Uuid::new_v4();
        registry
            .publish(workflow_id, event(EventKind::WorkflowStarted, "started"))
            .await;

        let rx = registry.subscribe(workflow_id, None).await;
        registry
            .publish(workflow_id, event(EventKind::AgentStarted, "agent"))
            .await;
        let live = rx.recv_async().await.unwrap();
        assert_eq!(live.kind, EventKind::AgentStarted);
        assert!(rx.try_recv().is_err());
    }
}
