//! Adapts `EventStreamRegistry` to `shannon_harness::ports::EventSink`.

use async_trait::async_trait;
use uuid::Uuid;

use shannon_core::error::ShannonResult;
use shannon_core::model::Event;
use shannon_harness::ports::EventSink;

use crate::event_bus::EventStreamRegistry;

#[async_trait]
impl EventSink for EventStreamRegistry {
    async fn publish(&self, workflow_id: Uuid, event: Event) -> ShannonResult<()> {
        self.publish(workflow_id, event).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shannon_core::model::EventKind;

    #[tokio::test]
    async fn port_publish_delegates_to_registry() {
        let registry = EventStreamRegistry::default();
        let workflow_id = Uuid::new_v4();
        let event = Event {
            workflow_id,
            seq: 0,
            stream_id: Uuid::new_v4(),
            kind: EventKind::WorkflowStarted,
            agent_id: None,
            message: "started".into(),
            payload: Default::default(),
            timestamp: Utc::now(),
        };

        EventSink::publish(&registry, workflow_id, event).await.unwrap();
        let rx = registry.subscribe(workflow_id, Some(0)).await;
        let replayed = rx.try_recv().unwrap();
        assert_eq!(replayed.seq, 1);
    }
}
