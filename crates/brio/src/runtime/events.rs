use std::sync::Arc;

/// What an observability event describes. Reporting has no semantic effect;
/// hooks cannot change what the runtime does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TriggerFired,
    TriggerError,
    ConstraintViolation,
    HealingInvoked,
    HealingFailed,
    MomentBudgetExceeded,
}

#[derive(Debug, Clone)]
pub struct RuntimeEvent {
    /// Index of the moment during which the event occurred.
    pub moment_index: u64,
    pub kind: EventKind,
    /// Name of the trigger, constraint, or variable the event is about.
    pub subject_name: String,
    pub payload: Option<String>,
}

pub type EventHook = Arc<dyn Fn(&RuntimeEvent) + Send + Sync>;
