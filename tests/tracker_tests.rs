use herakles_proc_cpu_tracker::health_stats::HealthStats;
use herakles_proc_cpu_tracker::{
    handle_register, handle_snapshot, CpuTimeOracle, SampleError, Tracker, TrackerOptions,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Oracle whose answers are set by the test. Unknown pids are reported gone.
#[derive(Default)]
struct ScriptedOracle {
    answers: Mutex<HashMap<i32, Result<u64, String>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn set(&self, pid: i32, answer: Result<u64, &str>) {
        self.answers
            .lock()
            .unwrap()
            .insert(pid, answer.map_err(str::to_string));
    }

    fn exit(&self, pid: i32) {
        self.answers.lock().unwrap().remove(&pid);
    }
}

impl CpuTimeOracle for ScriptedOracle {
    fn sample(&self, pid: i32) -> Result<u64, SampleError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().unwrap().get(&pid) {
            Some(Ok(t)) => Ok(*t),
            Some(Err(reason)) => Err(SampleError::Transient {
                pid,
                reason: reason.clone(),
            }),
            None => Err(SampleError::NotFound(pid)),
        }
    }
}

/// Options with a period long enough that only explicit refreshes run.
fn manual_options() -> TrackerOptions {
    TrackerOptions {
        refresh_interval: Duration::from_secs(3600),
        dedup_registrations: false,
    }
}

async fn wait_for_passes(stats: &HealthStats, passes: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while stats.refresh_passes() < passes {
        assert!(Instant::now() < deadline, "refresh pass did not complete in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn register_update_prune_scenario() {
    let oracle = Arc::new(ScriptedOracle::default());
    let stats = Arc::new(HealthStats::new());
    let tracker = Tracker::start(manual_options(), oracle.clone(), Arc::clone(&stats));
    let registry = Arc::clone(tracker.registry());

    handle_register(&registry, b"100\n", 1024).unwrap();
    assert_eq!(handle_snapshot(&registry), "100: 0\n");

    oracle.set(100, Ok(42));
    assert!(tracker.schedule_refresh());
    wait_for_passes(&stats, 1).await;
    assert_eq!(handle_snapshot(&registry), "100: 42\n");

    oracle.exit(100);
    assert!(tracker.schedule_refresh());
    wait_for_passes(&stats, 2).await;
    assert_eq!(handle_snapshot(&registry), "");

    let report = tracker.stop().await;
    assert_eq!(report.released_entries, 0);
    assert_eq!(stats.entries_pruned(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transient_failure_keeps_previous_value() {
    let oracle = Arc::new(ScriptedOracle::default());
    let stats = Arc::new(HealthStats::new());
    let tracker = Tracker::start(manual_options(), oracle.clone(), Arc::clone(&stats));
    let registry = Arc::clone(tracker.registry());

    registry.register(7).unwrap();
    registry.register(8).unwrap();
    oracle.set(7, Ok(10));
    oracle.set(8, Ok(20));
    tracker.schedule_refresh();
    wait_for_passes(&stats, 1).await;

    oracle.set(7, Err("stat unreadable"));
    oracle.set(8, Ok(25));
    tracker.schedule_refresh();
    wait_for_passes(&stats, 2).await;

    assert_eq!(handle_snapshot(&registry), "7: 10\n8: 25\n");
    assert_eq!(stats.sample_failures(), 1);

    let report = tracker.stop().await;
    assert_eq!(report.released_entries, 2);
    assert!(registry.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_trigger_refreshes_without_help() {
    let oracle = Arc::new(ScriptedOracle::default());
    oracle.set(55, Ok(3));
    let stats = Arc::new(HealthStats::new());
    let options = TrackerOptions {
        refresh_interval: Duration::from_millis(25),
        dedup_registrations: false,
    };
    let tracker = Tracker::start(options, oracle.clone(), Arc::clone(&stats));
    tracker.registry().register(55).unwrap();

    wait_for_passes(&stats, 2).await;
    assert_eq!(handle_snapshot(tracker.registry()), "55: 3\n");

    let report = tracker.stop().await;
    assert!(report.firings >= 2);
    assert_eq!(report.released_entries, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_are_all_visible() {
    let oracle = Arc::new(ScriptedOracle::default());
    let tracker = Tracker::start(manual_options(), oracle, Arc::new(HealthStats::new()));
    let registry = Arc::clone(tracker.registry());

    let mut handles = Vec::new();
    for pid in 1..=200 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::task::spawn_blocking(move || {
            handle_register(&registry, pid.to_string().as_bytes(), 1024)
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let mut pids: Vec<i32> = registry.snapshot().iter().map(|e| e.pid).collect();
    pids.sort_unstable();
    assert_eq!(pids, (1..=200).collect::<Vec<_>>());

    tracker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dedup_option_collapses_registrations() {
    let options = TrackerOptions {
        dedup_registrations: true,
        ..manual_options()
    };
    let tracker = Tracker::start(
        options,
        Arc::new(ScriptedOracle::default()),
        Arc::new(HealthStats::new()),
    );
    let registry = tracker.registry();

    handle_register(registry, b"9", 1024).unwrap();
    handle_register(registry, b"0x9", 1024).unwrap();
    handle_register(registry, b"10", 1024).unwrap();
    assert_eq!(handle_snapshot(registry), "9: 0\n10: 0\n");

    tracker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_waits_for_refresh_scheduled_just_before() {
    let oracle = Arc::new(ScriptedOracle::slow(Duration::from_millis(50)));
    let stats = Arc::new(HealthStats::new());
    let tracker = Tracker::start(manual_options(), oracle.clone(), Arc::clone(&stats));
    for pid in 0..4 {
        tracker.registry().register(pid).unwrap();
        oracle.set(pid, Ok(1));
    }

    assert!(tracker.schedule_refresh());
    let report = tracker.stop().await;

    // The pass ran to completion before the entries were released.
    assert_eq!(report.drained_tasks, 1);
    assert_eq!(stats.refresh_passes(), 1);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.released_entries, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_stress_with_pending_refreshes() {
    for round in 0..25 {
        let oracle = Arc::new(ScriptedOracle::slow(Duration::from_millis(1)));
        let stats = Arc::new(HealthStats::new());
        let options = TrackerOptions {
            refresh_interval: Duration::from_millis(2),
            dedup_registrations: false,
        };
        let tracker = Tracker::start(options, oracle.clone(), Arc::clone(&stats));
        let registry = Arc::clone(tracker.registry());

        for pid in 0..10 {
            registry.register(pid).unwrap();
            if pid % 2 == 0 {
                oracle.set(pid, Ok(round));
            }
        }

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::task::spawn_blocking(move || {
                for pid in 100..150 {
                    registry.register(pid).unwrap();
                }
            })
        };

        for _ in 0..3 {
            tracker.schedule_refresh();
        }
        writer.await.unwrap();

        let report = tracker.stop().await;
        assert!(registry.is_empty());
        assert!(report.released_entries <= 60);

        // Nothing touches the registry once stop has returned.
        let passes = stats.refresh_passes();
        let calls = oracle.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stats.refresh_passes(), passes);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), calls);
        assert!(registry.is_empty());
    }
}
