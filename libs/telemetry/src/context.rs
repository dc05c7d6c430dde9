/// Labels attached to every counter emitted for a webhook event.
#[derive(Debug, Clone, Default)]
pub struct TelemetryLabels {
    pub event_type: Option<String>,
    pub outcome: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl TelemetryLabels {
    pub fn for_event(event_type: Option<&str>) -> Self {
        Self {
            event_type: event_type.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn tags(&self) -> Vec<(String, String)> {
        let mut tags = Vec::with_capacity(2 + self.extra.len());
        tags.push((
            "event_type".into(),
            self.event_type.clone().unwrap_or_else(|| "unknown".into()),
        ));
        if let Some(outcome) = &self.outcome {
            tags.push(("outcome".into(), outcome.clone()));
        }
        for (key, value) in &self.extra {
            tags.push((key.clone(), value.clone()));
        }
        tags
    }
}
