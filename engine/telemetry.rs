use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::Handle;

/// Builder for pipeline telemetry sinks.
pub struct PipelineTelemetryBuilder {
    component: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl PipelineTelemetryBuilder {
    /// Creates the builder for a named component.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            log_path: None,
            min_level: LogLevel::Debug,
            publisher: None,
        }
    }

    /// Sets the JSON-lines log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops log records below this level.
    #[must_use]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<PipelineTelemetry> {
        let logger = match self.log_path {
            Some(path) => Some(JsonLogger::with_min_level(path, self.min_level)?),
            None => None,
        };
        Ok(PipelineTelemetry {
            inner: Arc::new(TelemetryInner {
                component: self.component,
                logger,
                publisher: self.publisher,
            }),
        })
    }
}

/// Telemetry handle shared across pipeline stages. Cheap to clone.
#[derive(Clone)]
pub struct PipelineTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    component: String,
    logger: Option<JsonLogger>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl fmt::Debug for PipelineTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineTelemetry")
            .field("component", &self.inner.component)
            .finish()
    }
}

impl PipelineTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(component: impl Into<String>) -> PipelineTelemetryBuilder {
        PipelineTelemetryBuilder::new(component)
    }

    /// Writes one structured log record, if a logger is configured.
    pub fn log(&self, level: LogLevel, message: &str, fields: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            logger.append(&LogRecord::new(&self.inner.component, level, message, fields))?;
        }
        Ok(())
    }

    /// Emits a bus event, if a publisher is configured. Publishing happens
    /// on the current runtime; events are dropped when no runtime exists.
    pub fn event(&self, event_type: &str, payload: Value) {
        if let Some(publisher) = &self.inner.publisher {
            if let Ok(handle) = Handle::try_current() {
                let publisher = Arc::clone(publisher);
                let record = EventRecord::new(self.inner.component.clone(), event_type, payload);
                handle.spawn(async move {
                    if let Err(err) = publisher.publish(record).await {
                        eprintln!("telemetry event publish failed: {err:?}");
                    }
                });
            }
        }
    }
}
