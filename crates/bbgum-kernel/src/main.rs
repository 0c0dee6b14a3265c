use anyhow::Context;
use bbgum_kernel::test_harness::{run_simulator, SimulatorConfig, TestHarness};
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Command::new("bbgum-sim")
        .version(bbgum_kernel::VERSION)
        .about("BbGum flow kernel simulator")
        .subcommand(
            Command::new("simulate")
                .about("Run the flow simulator")
                .arg(
                    Arg::new("flows")
                        .long("flows")
                        .default_value("10000")
                        .value_parser(value_parser!(u64))
                        .help("Number of flows to generate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("threads")
                        .long("threads")
                        .default_value("0")
                        .value_parser(value_parser!(usize))
                        .help("Worker threads (0 = one per core)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON simulator config; flags are ignored when given"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                ),
        )
        .subcommand(
            Command::new("stress")
                .about("Run stress test")
                .arg(
                    Arg::new("flows")
                        .long("flows")
                        .default_value("100000")
                        .value_parser(value_parser!(u64))
                        .help("Number of flows to run"),
                )
                .arg(
                    Arg::new("threads")
                        .long("threads")
                        .default_value("0")
                        .value_parser(value_parser!(usize))
                        .help("Worker threads (0 = one per core)"),
                ),
        )
        .subcommand(Command::new("certify").about("Run the simulator across ten seeds"));

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let config = match args.get_one::<PathBuf>("config") {
                Some(path) => {
                    let raw = std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str::<SimulatorConfig>(&raw)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => SimulatorConfig {
                    seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
                    total_flows: args.get_one::<u64>("flows").copied().unwrap_or(10_000),
                    threads: args.get_one::<usize>("threads").copied().unwrap_or(0),
                    stop_on_first_violation: args.get_flag("stop-on-violation"),
                    ..Default::default()
                },
            };

            println!("Running flow simulator...");
            println!("Flows: {}", config.total_flows);
            println!("Seed: {}", config.seed);
            println!();

            let report = run_simulator(config);
            println!("{}", report.generate_text());

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("stress", args)) => {
            let flows = args.get_one::<u64>("flows").copied().unwrap_or(100_000);
            let threads = args.get_one::<usize>("threads").copied().unwrap_or(0);

            let report = TestHarness::run_stress_test(flows, threads);

            println!("Stress Test Report:");
            println!("  Flows: {}", report.flows);
            println!("  Verdicts: {}", report.verdicts);
            println!("  Violations: {}", report.violations);
            println!("  Success: {}", report.success);

            std::process::exit(if report.success { 0 } else { 1 });
        }
        Some(("certify", _)) => {
            let report = TestHarness::run_certification();

            println!("Certification Report:");
            println!("  Seeds: {}", report.seeds_tested);
            println!("  Violations: {}", report.total_violations);
            println!("  Result: {}", if report.passed { "PASS" } else { "FAIL" });

            std::process::exit(if report.passed { 0 } else { 1 });
        }
        _ => Ok(()),
    }
}
