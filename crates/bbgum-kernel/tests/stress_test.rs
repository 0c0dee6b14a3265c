//! Simulator stress runs
//!
//! Run with: cargo test --package bbgum-kernel --test stress_test

use bbgum_kernel::test_harness::*;
use std::time::Instant;

#[test]
fn simulator_passes_default_mix() {
    let start = Instant::now();
    let report = run_simulator(SimulatorConfig {
        seed: 42,
        total_flows: 5_000,
        ..Default::default()
    });

    println!("{}", report.generate_text());
    println!("  Completed in {:.2}s", start.elapsed().as_secs_f64());

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.stats.executed, 5_000);
    assert_eq!(report.stats.skipped, 0);
    assert!(report.stats.verdicts.pass > 0);
    assert!(report.stats.verdicts.fail > 0);
    assert!(report.stats.verdicts.inconclusive > 0);
}

#[test]
fn simulator_is_reproducible() {
    let config = SimulatorConfig {
        seed: 7,
        total_flows: 1_000,
        threads: 4,
        ..Default::default()
    };
    let a = run_simulator(config.clone());
    let b = run_simulator(config);
    assert_eq!(a.stats.verdicts, b.stats.verdicts);
    assert_eq!(a.stats.flows_by_variant, b.stats.flows_by_variant);
}

#[test]
fn single_thread_matches_parallel() {
    let base = SimulatorConfig {
        seed: 99,
        total_flows: 800,
        ..Default::default()
    };
    let serial = run_simulator(SimulatorConfig { threads: 1, ..base.clone() });
    let parallel = run_simulator(SimulatorConfig { threads: 8, ..base });
    assert!(serial.passed() && parallel.passed());
    assert_eq!(serial.stats.verdicts, parallel.stats.verdicts);
}

#[test]
fn stress_harness_reports_success() {
    let report = TestHarness::run_stress_test(2_000, 4);
    assert!(report.success);
    assert_eq!(report.violations, 0);
    assert_eq!(report.verdicts, 2_000);
}

#[test]
fn config_loads_from_json() {
    let config: SimulatorConfig =
        serde_json::from_str(r#"{"seed": 5, "total_flows": 10, "stop_on_first_violation": true}"#)
            .unwrap();
    assert_eq!(config.seed, 5);
    assert_eq!(config.max_script_len, 8);
    assert!(run_simulator(config).passed());
}
