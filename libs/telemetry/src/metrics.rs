use crate::context::TelemetryLabels;
use tracing::Span;

/// Records the identifying fields of an event on a span declared with
/// `event_id`, `event_type` and `chat_id` as empty fields.
pub fn with_event_fields(
    span: &Span,
    event_id: Option<&str>,
    event_type: Option<&str>,
    chat_id: Option<&str>,
) {
    if let Some(event_id) = event_id {
        span.record("event_id", tracing::field::display(event_id));
    }
    if let Some(event_type) = event_type {
        span.record("event_type", tracing::field::display(event_type));
    }
    if let Some(chat_id) = chat_id {
        span.record("chat_id", tracing::field::display(chat_id));
    }
}

pub fn record_counter(name: &'static str, value: u64, labels: &TelemetryLabels) {
    let tags = labels.tags();
    metrics::counter!(name, &tags).increment(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn event_fields_are_recorded_on_span() {
        let span = tracing::info_span!(
            "webhook.handle",
            event_id = tracing::field::Empty,
            event_type = tracing::field::Empty,
            chat_id = tracing::field::Empty
        );
        with_event_fields(&span, Some("ev-1"), Some("im.chat.member.user.added_v1"), None);
        span.in_scope(|| tracing::info!("inside"));
        assert!(logs_contain("ev-1"));
        assert!(logs_contain("im.chat.member.user.added_v1"));
    }

    #[test]
    fn record_counter_without_recorder_is_noop() {
        record_counter("events_received", 1, &TelemetryLabels::for_event(None));
    }
}
