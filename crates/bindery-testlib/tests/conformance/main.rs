//! Conformance suite
//!
//! Drives the test library through the public runtime surface the way a
//! host language binding would: construct, call, pass through every
//! reference kind, override, subscribe and let go.

mod harness;

mod dispatch;
mod enums;
mod events;
mod lifecycle;
mod ownership;
