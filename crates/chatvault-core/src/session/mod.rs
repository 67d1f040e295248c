//! Session persistence abstractions for chatvault.
//!
//! This module defines the repository traits the infrastructure layer
//! implements: lifecycle writes (`SessionStore`), listings (`SessionQuery`)
//! and windowed statistics (`SessionMetrics`).

pub mod repository;
