//! Session lifecycle counters.
//!
//! Recorded through the global OpenTelemetry meter provider. Until a provider
//! is installed the instruments are no-ops.

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, UpDownCounter};

/// Instrumentation scope for every chatvault instrument.
pub const METER_NAME: &str = "chatvault";

#[derive(Clone)]
pub struct SessionCounters {
    created: Counter<u64>,
    ended: Counter<u64>,
    active: UpDownCounter<i64>,
}

impl SessionCounters {
    pub fn new(meter: &Meter) -> Self {
        Self {
            created: meter
                .u64_counter("chatvault.sessions.created")
                .with_description("Sessions written by CreateSession")
                .build(),
            ended: meter
                .u64_counter("chatvault.sessions.ended")
                .with_description("Sessions moved from active to ended")
                .build(),
            active: meter
                .i64_up_down_counter("chatvault.sessions.active")
                .with_description("Sessions created and not yet ended")
                .build(),
        }
    }

    /// Counters on the global `chatvault` meter.
    pub fn global() -> Self {
        Self::new(&global::meter(METER_NAME))
    }

    pub fn session_created(&self, active: bool) {
        self.created.add(1, &[]);
        if active {
            self.active.add(1, &[]);
        }
    }

    /// Record an end. Only a transition out of the active state moves the
    /// gauge, so ending a session twice counts once.
    pub fn session_ended(&self, was_active: bool, via: &'static str) {
        if was_active {
            self.ended.add(1, &[KeyValue::new("operation", via)]);
            self.active.add(-1, &[]);
        }
    }
}

impl Default for SessionCounters {
    fn default() -> Self {
        Self::global()
    }
}

impl std::fmt::Debug for SessionCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCounters").finish_non_exhaustive()
    }
}
