use crate::outcome::{RunStatus, SkipReason};
use crate::{RunId, UnitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted during an orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrchestrationEvent {
    RunStarted {
        run_id: RunId,
        unit_count: usize,
        wave_count: usize,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        status: RunStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    WaveStarted {
        run_id: RunId,
        wave: usize,
        units: Vec<UnitId>,
        timestamp: DateTime<Utc>,
    },
    WaveCompleted {
        run_id: RunId,
        wave: usize,
        completed: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    UnitStarted {
        run_id: RunId,
        unit_id: UnitId,
        wave: usize,
        timestamp: DateTime<Utc>,
    },
    UnitCompleted {
        run_id: RunId,
        unit_id: UnitId,
        confidence: f64,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    UnitFailed {
        run_id: RunId,
        unit_id: UnitId,
        error: String,
        timed_out: bool,
        timestamp: DateTime<Utc>,
    },
    UnitSkipped {
        run_id: RunId,
        unit_id: UnitId,
        reason: SkipReason,
        timestamp: DateTime<Utc>,
    },
    UnitEvent {
        run_id: RunId,
        unit_id: UnitId,
        event: UnitEvent,
        timestamp: DateTime<Utc>,
    },
}

/// Events a unit reports about itself while running
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum UnitEvent {
    Info { message: String },
    Warning { message: String },
    Progress { percent: f64, message: Option<String> },
}

/// Event emitter handed to units through their context
#[derive(Clone)]
pub struct EventEmitter {
    run_id: RunId,
    unit_id: UnitId,
    sender: broadcast::Sender<OrchestrationEvent>,
}

impl EventEmitter {
    pub fn new(run_id: RunId, unit_id: UnitId, sender: broadcast::Sender<OrchestrationEvent>) -> Self {
        Self {
            run_id,
            unit_id,
            sender,
        }
    }

    /// Emitter with no subscribers, for units driven outside an orchestrator
    pub fn detached(run_id: RunId, unit_id: impl Into<UnitId>) -> Self {
        let (sender, _) = broadcast::channel(1);
        Self::new(run_id, unit_id.into(), sender)
    }

    pub fn emit(&self, event: UnitEvent) {
        let _ = self.sender.send(OrchestrationEvent::UnitEvent {
            run_id: self.run_id,
            unit_id: self.unit_id.clone(),
            event,
            timestamp: Utc::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(UnitEvent::Info {
            message: message.into(),
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(UnitEvent::Warning {
            message: message.into(),
        });
    }

    pub fn progress(&self, percent: f64, message: Option<String>) {
        self.emit(UnitEvent::Progress { percent, message });
    }
}

/// Broadcast bus for orchestration events
pub struct EventBus {
    sender: broadcast::Sender<OrchestrationEvent>,
}

impl EventBus {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestrationEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Lagging or absent subscribers never fail the sender.
    pub fn emit(&self, event: OrchestrationEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, run_id: RunId, unit_id: UnitId) -> EventEmitter {
        EventEmitter::new(run_id, unit_id, self.sender.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
