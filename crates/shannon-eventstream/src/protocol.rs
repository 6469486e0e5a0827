//! Wire framing for the Subscribe external interface (spec §6): one SSE
//! frame per `Event`, `id:` carrying `seq` so a reconnecting client can
//! resume with `Last-Event-ID`.

use shannon_core::model::Event;

fn kind_label(event: &Event) -> String {
    match serde_json::to_value(&event.kind) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "unknown".to_string(),
    }
}

/// Render one `Event` as a complete SSE frame (`id:`/`event:`/`data:` lines
/// terminated by a blank line).
pub fn to_sse_frame(event: &Event) -> String {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    format!(
        "id: {}\nevent: {}\ndata: {}\n\n",
        event.seq,
        kind_label(event),
        data
    )
}

/// Parse a client-supplied `Last-Event-ID` header into the `seq` to resume
/// from. Returns `None` for a missing or malformed header, which callers
/// treat as "no replay, live events only".
pub fn parse_last_event_id(header: Option<&str>) -> Option<u64> {
    header.and_then(|value| value.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shannon_core::model::EventKind;
    use uuid::Uuid;

    #[test]
    fn sse_frame_carries_seq_as_id() {
        let event = Event {
            workflow_id: Uuid::new_v4(),
            seq: 42,
            stream_id: Uuid::new_v4(),
            kind: EventKind::Progress,
            agent_id: None,
            message: "working".into(),
            payload: Default::default(),
            timestamp: Utc::now(),
        };
        let frame = to_sse_frame(&event);
        assert!(frame.starts_with("id: 42\n"));
        assert!(frame.contains("event: PROGRESS\n"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn last_event_id_parses_and_rejects_garbage() {
        assert_eq!(parse_last_event_id(Some("7")), Some(7));
        assert_eq!(parse_last_event_id(Some("nope")), None);
        assert_eq!(parse_last_event_id(None), None);
    }
}
