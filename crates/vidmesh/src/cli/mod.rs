//! CLI module for vidmesh
//!
//! `worker` runs a worker process; the remaining commands act as a client of
//! the running workers through the gateway.

pub mod error;
pub mod gateway;
pub mod history;
pub mod worker;
