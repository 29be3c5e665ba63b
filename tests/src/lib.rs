// Integration test support for ByeBlock end-to-end tests
//
// This crate provides a local forward proxy and scripted transports used to
// drive the monitor through realistic probe cycles without external network.

pub mod test_harness;

pub use test_harness::{init_tracing, FakeProxy, ScriptStep, ScriptedTransport};
