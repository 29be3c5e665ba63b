// Test harness for ByeBlock integration tests
//
// Provides:
// - A loopback forward proxy answering every request with a fixed status
// - A scripted HttpTransport replaying delays and failures in order
// - Tracing setup honouring RUST_LOG

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use byeblock_core::ProxyEndpoint;
use byeblock_monitor::{HttpTransport, ProbeError};
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Loopback HTTP forward proxy.
///
/// Accepts connections on a background thread for the rest of the test
/// process. A `CONNECT` is acknowledged and the tunnelled request is then
/// answered like a plain absolute-form request.
pub struct FakeProxy {
    port: u16,
    hits: Arc<AtomicUsize>,
}

impl FakeProxy {
    /// Start a proxy answering every request with `status`.
    pub fn start(status: u16) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").context("bind fake proxy")?;
        let port = listener.local_addr()?.port();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || serve(stream, status, &counter));
            }
        });
        debug!(port, status, "fake proxy listening");
        Ok(Self { port, hits })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Requests answered so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => head.push(byte[0]),
            _ => return None,
        }
    }
    Some(String::from_utf8_lossy(&head).into_owned())
}

fn serve(mut stream: TcpStream, status: u16, hits: &AtomicUsize) {
    let Some(mut head) = read_head(&mut stream) else { return };
    if head.starts_with("CONNECT") {
        if stream.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n").is_err() {
            return;
        }
        match read_head(&mut stream) {
            Some(next) => head = next,
            None => return,
        }
    }
    debug!(request = head.lines().next().unwrap_or_default(), "fake proxy request");
    hits.fetch_add(1, Ordering::SeqCst);
    let body = "ok";
    let resp = format!(
        "HTTP/1.1 {status} Status\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(resp.as_bytes());
}

/// One scripted transport outcome.
#[derive(Debug, Clone, Copy)]
pub enum ScriptStep {
    /// Succeed after the given delay.
    Respond(Duration),
    /// Fail with a transport error.
    Fail,
}

/// Transport replaying a fixed script, failing once the script runs out.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<ScriptStep>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self { steps: Mutex::new(steps.into_iter().collect()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, _: &Url, _: &ProxyEndpoint, _: Duration) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().pop_front();
        match step {
            Some(ScriptStep::Respond(delay)) => {
                std::thread::sleep(delay);
                Ok(())
            }
            Some(ScriptStep::Fail) | None => Err(ProbeError::Transport("scripted failure".into())),
        }
    }
}
