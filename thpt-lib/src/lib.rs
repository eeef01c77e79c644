//! Core of the eventing throughput benchmark.
//!
//! Turns a pace descriptor into timed traffic phases, drives them at the
//! requested rate through a pluggable transport, and defines the control
//! signals (gc, end-of-run) sender and receiver use to coordinate.
//!
//! Transports, the metrics endpoint and process bootstrap live
//! in the `eventing-thpt` binary.

#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

pub mod collect;
pub mod config;
pub mod dispatch;
pub mod metrics;
pub mod pace;
pub mod receiver;
pub mod schedule;
pub mod signal;
pub mod utils;

#[cfg(test)]
mod test;
