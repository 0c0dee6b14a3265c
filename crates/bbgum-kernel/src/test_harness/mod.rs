// Test harness module
// Seeded flow simulation over the dispatch core

pub mod simulator;

pub use simulator::*;

/// Entry points for stress and certification runs
pub struct TestHarness;

impl TestHarness {
    /// Run `flows` generated flows on `threads` workers
    pub fn run_stress_test(flows: u64, threads: usize) -> StressTestReport {
        tracing::info!(flows, threads, "running stress test");

        let config = SimulatorConfig {
            seed: 12345,
            total_flows: flows,
            threads,
            ..Default::default()
        };

        let report = run_simulator(config);

        StressTestReport {
            flows,
            threads,
            verdicts: report.stats.verdicts.total(),
            violations: report.violations.len(),
            success: report.passed(),
        }
    }

    /// Run the simulator across ten seeds
    pub fn run_certification() -> CertificationReport {
        tracing::info!("running certification simulation");

        let mut all_passed = true;
        let mut total_violations = 0;

        for seed in 0..10 {
            let report = run_simulator(SimulatorConfig {
                seed,
                total_flows: 20_000,
                ..Default::default()
            });
            if !report.passed() {
                all_passed = false;
                tracing::error!(seed, violations = report.violations.len(), "seed failed");
            }
            total_violations += report.violations.len();
        }

        CertificationReport {
            passed: all_passed && total_violations == 0,
            total_violations,
            seeds_tested: 10,
        }
    }
}

/// Report from a stress test
#[derive(Debug, Clone)]
pub struct StressTestReport {
    pub flows: u64,
    pub threads: usize,
    pub verdicts: u64,
    pub violations: usize,
    pub success: bool,
}

/// Report from certification
#[derive(Debug, Clone)]
pub struct CertificationReport {
    pub passed: bool,
    pub total_violations: usize,
    pub seeds_tested: u64,
}
