//! End-to-end: settings-backed provider -> LatencyProbe -> ProbeScheduler.

use std::sync::Arc;
use std::time::Duration;

use byeblock_core::{LatencySample, ProxyKind, ProxyStore, SettingsProxyProvider, StaticProxyProvider};
use byeblock_integration_tests::{init_tracing, FakeProxy, ScriptStep, ScriptedTransport};
use byeblock_monitor::{LatencyProbe, ProbeScheduler, SchedulerConfig, SettingsWatcher, UreqTransport, WindowStats};
use parking_lot::RwLock;
use url::Url;

const TOLERANCE_MS: f64 = 400.0;

fn target() -> Url {
    Url::parse("http://monitor-target.invalid/").unwrap()
}

// The loop parks in its post-probe wait after the first sample, so each
// start/stop pair below yields exactly one sample.
fn one_shot(window: usize) -> SchedulerConfig {
    SchedulerConfig { interval: Duration::from_secs(60), window, event_capacity: 16 }
}

async fn collect(sched: &ProbeScheduler, n: usize) -> Vec<LatencySample> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut rx = sched.subscribe();
        sched.start().await;
        let sample = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("sample within timeout")
            .expect("channel open");
        sched.stop().await;
        out.push(sample);
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scripted_outage_shows_in_window() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::new([
        ScriptStep::Respond(Duration::from_millis(100)),
        ScriptStep::Fail,
        ScriptStep::Fail,
        ScriptStep::Fail,
        ScriptStep::Respond(Duration::from_millis(80)),
    ]));
    let probe = LatencyProbe::new(target(), Duration::from_secs(5), transport.clone());
    let mut store = ProxyStore::default();
    store.add("office", "10.0.0.1", 8080, ProxyKind::Http).unwrap();
    store.select("office").unwrap();
    let provider = SettingsProxyProvider::new(Arc::new(RwLock::new(store)));
    let sched = ProbeScheduler::new(one_shot(5), Arc::new(provider), Arc::new(probe)).unwrap();

    let published = collect(&sched, 5).await;
    let snap = sched.snapshot();
    assert_eq!(snap, published);
    assert_eq!(transport.calls(), 5);

    let ok: Vec<bool> = snap.iter().map(|s| s.ok).collect();
    assert_eq!(ok, [true, false, false, false, true]);
    for failed in &snap[1..4] {
        assert_eq!(*failed, LatencySample::failure());
    }
    assert!(snap[0].value >= 100.0 && snap[0].value < 100.0 + TOLERANCE_MS, "{:?}", snap[0]);
    assert!(snap[4].value >= 80.0 && snap[4].value < 80.0 + TOLERANCE_MS, "{:?}", snap[4]);

    let stats = WindowStats::from_samples(&snap);
    assert_eq!(stats.ok_count, 2);
    assert!((stats.loss_ratio - 0.6).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unset_proxy_never_touches_transport() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::new([ScriptStep::Respond(Duration::ZERO); 3]));
    let probe = LatencyProbe::new(target(), Duration::from_secs(5), transport.clone());
    let sched = ProbeScheduler::new(one_shot(3), Arc::new(StaticProxyProvider::unset()), Arc::new(probe)).unwrap();

    let published = collect(&sched, 3).await;
    assert!(published.iter().all(|s| *s == LatencySample::failure()));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn real_transport_through_local_proxy() {
    init_tracing();
    let up = FakeProxy::start(200).unwrap();
    let broken = FakeProxy::start(500).unwrap();

    let mut store = ProxyStore::default();
    store.add("up", "127.0.0.1", up.port(), ProxyKind::Http).unwrap();
    store.add("broken", "127.0.0.1", broken.port(), ProxyKind::Http).unwrap();
    store.select("up").unwrap();
    let store = Arc::new(RwLock::new(store));

    let probe = LatencyProbe::new(target(), Duration::from_secs(2), Arc::new(UreqTransport::new()));
    let sched = ProbeScheduler::new(
        one_shot(4),
        Arc::new(SettingsProxyProvider::new(Arc::clone(&store))),
        Arc::new(probe),
    )
    .unwrap();

    let first = collect(&sched, 2).await;
    assert!(first.iter().all(|s| s.ok), "{first:?}");
    assert_eq!(up.hits(), 2);

    // selection changes apply from the next cycle on
    store.write().select("broken").unwrap();
    let second = collect(&sched, 2).await;
    assert!(second.iter().all(|s| !s.ok), "{second:?}");
    assert_eq!(broken.hits(), 2);
    assert_eq!(up.hits(), 2);

    let snap = sched.snapshot();
    let ok: Vec<bool> = snap.iter().map(|s| s.ok).collect();
    assert_eq!(ok, [true, true, false, false]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn settings_file_change_reroutes_probes() {
    init_tracing();
    let first = FakeProxy::start(200).unwrap();
    let second = FakeProxy::start(200).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    let mut on_disk = ProxyStore::default();
    on_disk.add("first", "127.0.0.1", first.port(), ProxyKind::Http).unwrap();
    on_disk.add("second", "127.0.0.1", second.port(), ProxyKind::Http).unwrap();
    on_disk.select("first").unwrap();
    on_disk.save(&path).unwrap();

    let store = Arc::new(RwLock::new(ProxyStore::load(&path).unwrap()));
    let _watcher = SettingsWatcher::spawn(&path, Arc::clone(&store)).unwrap();
    let probe = LatencyProbe::new(target(), Duration::from_secs(2), Arc::new(UreqTransport::new()));
    let sched = ProbeScheduler::new(
        one_shot(4),
        Arc::new(SettingsProxyProvider::new(Arc::clone(&store))),
        Arc::new(probe),
    )
    .unwrap();

    assert!(collect(&sched, 1).await[0].ok);
    assert_eq!(first.hits(), 1);

    // another process selecting a different proxy
    on_disk.select("second").unwrap();
    on_disk.save(&path).unwrap();
    let mut switched = false;
    for _ in 0..100 {
        if store.read().selected_id() == Some("second") {
            switched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(switched, "settings reload not observed");

    assert!(collect(&sched, 1).await[0].ok);
    assert_eq!(second.hits(), 1);
    assert_eq!(first.hits(), 1);
}
