//! End-to-end scale run scenarios
//!
//! Drives full batch lifecycles against scripted resources, through a real
//! file-backed timing store, into report assembly and the variance gate:
//! the same path a quota scale comparison takes in CI, minus the platform.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use vmscale_engine::{
    phase, phase_key, BatchWaiter, Clock, FanOutExecutor, Poller, RunError, ScaleBatch,
    TimedCapture,
};
use vmscale_interfaces::testing::{ResourceScript, ScriptedResource};
use vmscale_interfaces::{
    ManagedResource, ResourceId, ResourceStatus, TimingStore, TimingStoreExt,
};
use vmscale_report::{append_document, read_documents, ReportAssembler, VarianceGate};
use vmscale_store::{FileTimingStore, MemoryTimingStore};

/// Deterministic clock replaying scripted readings; the last one repeats.
struct StepClock {
    readings: Mutex<VecDeque<f64>>,
}

impl StepClock {
    fn new<I: IntoIterator<Item = f64>>(readings: I) -> Arc<Self> {
        Arc::new(Self {
            readings: Mutex::new(readings.into_iter().collect()),
        })
    }
}

impl Clock for StepClock {
    fn now(&self) -> f64 {
        let mut readings = self.readings.lock().unwrap();
        if readings.len() == 1 {
            readings[0]
        } else {
            readings.pop_front().unwrap_or(0.0)
        }
    }
}

fn fleet(
    run_key: &str,
    size: usize,
) -> (Vec<Arc<ScriptedResource>>, Vec<Arc<dyn ManagedResource>>) {
    let scripted: Vec<_> = (0..size)
        .map(|index| {
            ScriptedResource::new(
                ResourceId::namespaced(format!("vm-{index}"), run_key),
                ResourceScript::succeeding().with_statuses([
                    None,
                    Some("Scheduled"),
                    Some("Running"),
                ]),
            )
        })
        .collect();
    let resources = scripted
        .iter()
        .map(|resource| resource.clone() as Arc<dyn ManagedResource>)
        .collect();
    (scripted, resources)
}

/// One full scale run under `run_key`: create the fleet, wait for it to be
/// scheduled and then running (each phase timed), tear it down. The clock
/// readings control what the captures record, two per phase in the order
/// deploy, scheduled, running, delete.
async fn run_scenario(
    store: Arc<dyn TimingStore>,
    run_key: &str,
    readings: Vec<f64>,
    size: usize,
) -> Vec<Arc<ScriptedResource>> {
    let (scripted, resources) = fleet(run_key, size);
    let capture = TimedCapture::with_clock(store, StepClock::new(readings));
    let waiter = BatchWaiter::new(FanOutExecutor::default(), Poller::default());

    let batch = ScaleBatch::builder(resources)
        .timing(capture.clone(), run_key)
        .batch_id(run_key)
        .build()
        .unwrap();

    let run_key = run_key.to_string();
    let completed: Result<usize, RunError<String>> = batch
        .scoped(move |fleet| async move {
            let scheduled = ResourceStatus::from("Scheduled");
            capture
                .capture(&phase_key(&run_key, phase::SCHEDULED), || {
                    waiter.all_reach_status(&fleet, &scheduled)
                })
                .await
                .map_err(|error| error.to_string())?;

            let running = ResourceStatus::from("Running");
            capture
                .capture(&phase_key(&run_key, phase::RUNNING), || {
                    waiter.all_reach_status(&fleet, &running)
                })
                .await
                .map_err(|error| error.to_string())?;

            Ok(fleet.len())
        })
        .await;

    assert_eq!(completed.unwrap(), size);
    scripted
}

#[tokio::test(start_paused = true)]
async fn scale_runs_produce_a_passing_gated_report() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("timings.json");
    let store = Arc::new(FileTimingStore::open(&store_path).await.unwrap());

    // Baseline: deploy 40s, scheduled 100s, running 60s, delete 30s.
    let baseline = run_scenario(
        store.clone(),
        "quota-baseline",
        vec![0.0, 40.0, 40.0, 140.0, 140.0, 200.0, 200.0, 230.0],
        3,
    )
    .await;
    // Scaled run: scheduled 104s, inside the 10% envelope.
    let scaled = run_scenario(
        store.clone(),
        "quota-2k",
        vec![300.0, 345.0, 345.0, 449.0, 449.0, 512.0, 512.0, 540.0],
        3,
    )
    .await;

    for resource in baseline.iter().chain(&scaled) {
        assert_eq!(resource.creates(), 1);
        assert!(resource.was_deleted());
    }

    store.close().await.unwrap();

    let run_keys = vec!["quota-baseline".to_string(), "quota-2k".to_string()];
    let mut report = ReportAssembler::new(store.clone())
        .assemble(&run_keys)
        .await
        .unwrap();

    assert!(report.pass);
    let elapsed = |phase: &str, run_key: &str| {
        report
            .timing(phase, run_key)
            .and_then(|timing| timing.elapsed)
    };
    assert_eq!(elapsed("deploy", "quota-baseline"), Some(40.0));
    assert_eq!(elapsed("scheduled", "quota-baseline"), Some(100.0));
    assert_eq!(elapsed("running", "quota-baseline"), Some(60.0));
    assert_eq!(elapsed("delete", "quota-baseline"), Some(30.0));
    assert_eq!(elapsed("scheduled", "quota-2k"), Some(104.0));

    VarianceGate::default().apply(&mut report).unwrap();
    assert!(report.pass);
    assert_eq!(report.error_lines().count(), 0);

    // Persist and read the document back, as successive CI runs do.
    let report_path = dir.path().join("scale-report.yaml");
    append_document(&report_path, &report).await.unwrap();
    let documents = read_documents(&report_path).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert!(documents[0].pass);

    // The timing data itself survives the session for later re-assembly.
    let reopened = FileTimingStore::open(&store_path).await.unwrap();
    assert_eq!(
        reopened
            .get_f64("quota-baseline-scheduled-elapsed")
            .await
            .unwrap(),
        Some(100.0)
    );
}

#[tokio::test(start_paused = true)]
async fn variance_gate_flags_a_slow_scale_run() {
    let store = Arc::new(MemoryTimingStore::new());

    run_scenario(
        store.clone(),
        "quota-baseline",
        vec![0.0, 40.0, 40.0, 140.0, 140.0, 200.0, 200.0, 230.0],
        2,
    )
    .await;
    // Scheduled takes 125s against a 100s baseline, past the 10% envelope.
    run_scenario(
        store.clone(),
        "quota-2k",
        vec![300.0, 345.0, 345.0, 470.0, 470.0, 533.0, 533.0, 561.0],
        2,
    )
    .await;

    let run_keys = vec!["quota-baseline".to_string(), "quota-2k".to_string()];
    let mut report = ReportAssembler::new(store)
        .assemble(&run_keys)
        .await
        .unwrap();
    assert!(report.pass);

    VarianceGate::default().apply(&mut report).unwrap();

    assert!(!report.pass);
    assert!(report.errors.contains("run quota-2k"));
    assert!(report.errors.contains("exceeds baseline"));
    assert!(!report.errors.contains("run quota-baseline"));
}

#[tokio::test(start_paused = true)]
async fn an_interrupted_run_reports_incomplete_data() {
    let store = Arc::new(MemoryTimingStore::new());

    run_scenario(
        store.clone(),
        "quota-baseline",
        vec![0.0, 40.0, 40.0, 140.0, 140.0, 200.0, 200.0, 230.0],
        2,
    )
    .await;

    // The scaled run dies after the scheduled wait; no running capture
    // happens, but teardown still records the delete phase.
    let (scripted, resources) = fleet("quota-2k", 2);
    let capture = TimedCapture::with_clock(
        store.clone(),
        StepClock::new(vec![300.0, 345.0, 345.0, 449.0, 512.0, 540.0]),
    );
    let waiter = BatchWaiter::new(FanOutExecutor::default(), Poller::default());
    let batch = ScaleBatch::builder(resources)
        .timing(capture.clone(), "quota-2k")
        .batch_id("quota-2k")
        .build()
        .unwrap();

    let completed: Result<(), RunError<String>> = batch
        .scoped(move |fleet| async move {
            let scheduled = ResourceStatus::from("Scheduled");
            capture
                .capture(&phase_key("quota-2k", phase::SCHEDULED), || {
                    waiter.all_reach_status(&fleet, &scheduled)
                })
                .await
                .map_err(|error| error.to_string())?;
            Err("virt-launcher pods never came up".to_string())
        })
        .await;

    match completed {
        Err(RunError::Body(message)) => {
            assert_eq!(message, "virt-launcher pods never came up")
        }
        other => panic!("expected body failure, got {other:?}"),
    }
    for resource in &scripted {
        assert!(resource.was_deleted());
    }

    let run_keys = vec!["quota-baseline".to_string(), "quota-2k".to_string()];
    let mut report = ReportAssembler::new(store)
        .assemble(&run_keys)
        .await
        .unwrap();

    assert!(!report.pass);
    assert!(report.errors.contains("quota-2k-running"));
    assert_eq!(
        report
            .timing("delete", "quota-2k")
            .and_then(|timing| timing.elapsed),
        Some(28.0)
    );

    // Gating still works on the phases that do exist.
    VarianceGate::default().apply(&mut report).unwrap();
    assert!(!report.pass);
}
