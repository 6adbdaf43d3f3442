//! Orchestration gateway.
//!
//! Validates requests, forwards them to the right worker and records every
//! request and outcome in the audit log. The clarify path always answers:
//! an unreachable intent worker degrades to the static clarification.

pub mod audit;
pub mod error;
pub mod gateway;

pub use audit::{AuditEntry, AuditRole, AuditSink, JsonlAuditLog, MemoryAuditLog};
pub use error::{GatewayError, Result};
pub use gateway::{directive_from_reply, Action, Gateway, InvocationResult, WorkerSet};
