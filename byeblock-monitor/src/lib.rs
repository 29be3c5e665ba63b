#![forbid(unsafe_code)]

//! byeblock-monitor: proxy-routed latency monitoring.
//!
//! [`ProbeScheduler`] runs one background task that repeatedly asks a
//! [`byeblock_core::ProxyConfigProvider`] for the selected proxy, times a GET
//! through it with a [`Probe`] (normally [`LatencyProbe`]), pushes the result
//! into a rolling [`SampleBuffer`] and publishes it to subscribers.
//! [`SettingsWatcher`] keeps a shared proxy store in step with its file.

pub mod buffer;
pub mod probe;
pub mod scheduler;
pub mod stats;
pub mod watch;

pub use buffer::SampleBuffer;
pub use probe::{HttpTransport, LatencyProbe, Probe, ProbeError, UreqTransport};
pub use scheduler::{ProbeScheduler, SchedulerConfig};
pub use stats::{format_sample, WindowStats};
pub use watch::SettingsWatcher;
