//! Flow simulator - property harness for the dispatch core
//!
//! Generates seeded flows over every variant, each with the verdict it must
//! reach, runs them in parallel against one shared controller and checks the
//! kernel invariants after every flow and once at the end.

use crate::action::Action;
use crate::controller::{ConformanceController, ControllerConfig};
use crate::element::{BlackBox, EventElement, Exchange, Quiescence};
use crate::error::FlowError;
use crate::journal::Journal;
use crate::script::{ExpectedStep, PayloadMatch, Script};
use crate::tally::TallySnapshot;
use crate::types::{Direction, Payload, Timestamp, VariantTag, Verdict};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Flows to generate
    pub total_flows: u64,
    /// Worker threads; 0 lets rayon decide
    pub threads: usize,
    /// Mix of generated flow kinds
    pub distribution: FlowDistribution,
    /// Longest generated black-box script
    pub max_script_len: usize,
    /// Stop scheduling flows after the first violation
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            total_flows: 10_000,
            threads: 0,
            distribution: FlowDistribution::default(),
            max_script_len: 8,
            stop_on_first_violation: false,
        }
    }
}

/// Probability distribution for flow generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDistribution {
    /// Flows that follow their model to completion
    pub conforming: f64,
    /// Flows that deviate from their model
    pub deviating: f64,
    /// Flows cut short by a deadline
    pub timing_out: f64,
}

impl Default for FlowDistribution {
    fn default() -> Self {
        Self {
            conforming: 0.60,
            deviating: 0.25,
            timing_out: 0.15,
        }
    }
}

/// What a generated flow is meant to exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    /// Follows its model to completion
    Conforming,
    /// Breaks its model at a random point
    Deviating,
    /// Receives a deadline before completing
    TimingOut,
}

/// Element variant data for one generated flow
#[derive(Debug, Clone)]
pub enum SimulatedElement {
    /// Scripted black box
    BlackBox(BlackBox),
    /// Request/reply exchange
    Exchange(Exchange),
    /// Silence check
    Quiescence(Quiescence),
}

impl SimulatedElement {
    fn tag(&self) -> VariantTag {
        match self {
            Self::BlackBox(_) => VariantTag::BlackBox,
            Self::Exchange(_) => VariantTag::Exchange,
            Self::Quiescence(_) => VariantTag::Quiescence,
        }
    }

    fn build(&self, controller: &ConformanceController) -> Box<dyn EventElement> {
        match self {
            Self::BlackBox(v) => Box::new(controller.element(v.clone())),
            Self::Exchange(v) => Box::new(controller.element(v.clone())),
            Self::Quiescence(v) => Box::new(controller.element(v.clone())),
        }
    }
}

/// One generated flow and the verdict it must reach
#[derive(Debug, Clone)]
pub struct SimulatedFlow {
    /// Position in the generated sequence
    pub index: u64,
    /// Behaviour the flow exercises
    pub kind: FlowKind,
    /// Variant data the element is built from
    pub element: SimulatedElement,
    /// Actions delivered in order
    pub events: Vec<Action>,
    /// Verdict the controller must reach
    pub expected: Verdict,
}

/// A violation detected during simulation
#[derive(Debug, Clone)]
pub enum Violation {
    /// Flow concluded with a different verdict than generated
    UnexpectedVerdict {
        /// Flow index
        flow: u64,
        /// Generated flow kind
        kind: FlowKind,
        /// Verdict the generator computed
        expected: Verdict,
        /// Verdict the controller reached
        actual: Verdict,
    },
    /// Generator produced an invalid model
    Generation {
        /// Flow index
        flow: u64,
        /// Construction error
        error: FlowError,
    },
    /// Dispatch or query returned a fault
    Fault {
        /// Flow index
        flow: u64,
        /// Returned error
        error: FlowError,
    },
    /// Invariant was violated
    Invariant(InvariantViolation),
}

/// A specific invariant violation
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Failed check
    pub check: InvariantCheck,
    /// Human-readable context
    pub details: String,
}

/// Types of invariant checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantCheck {
    // Per flow
    /// Every generated flow ends terminated
    FlowReachesTerminalState,
    /// A late event leaves state and conclusion unchanged
    TerminalStateIsSticky,
    /// Repeated conclusion queries agree
    ConclusionIsIdempotent,

    // Cross flow
    /// Shared tally equals the verdicts flows reported
    TallyMatchesFlowVerdicts,
    /// Journal hash chain verifies
    JournalChainIsUnbroken,
    /// One journal record per counted verdict
    JournalCoversEveryVerdict,
}

/// Statistics collected during simulation
#[derive(Debug, Clone, Default)]
pub struct FlowStats {
    /// Flows requested from the generator
    pub generated: u64,
    /// Flows delivered to the controller
    pub executed: u64,
    /// Flows not run, after a stop or a generation error
    pub skipped: u64,
    /// Verdicts reached by executed flows
    pub verdicts: TallySnapshot,
    /// Executed flows per element variant
    pub flows_by_variant: HashMap<VariantTag, u64>,
}

/// Final report from the simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    /// Configuration the run used
    pub config: SimulatorConfig,
    /// Aggregated statistics
    pub stats: FlowStats,
    /// Everything that went wrong, in flow order
    pub violations: Vec<Violation>,
    /// Records in the verdict journal at the end of the run
    pub journal_records: usize,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate a text report
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== BbGum Flow Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Generated Flows: {}\n", self.stats.generated));
        report.push_str(&format!("Executed: {}\n", self.stats.executed));
        report.push_str(&format!("Skipped: {}\n", self.stats.skipped));
        report.push_str(&format!(
            "Verdicts: PASS={} FAIL={} INCONCLUSIVE={}\n",
            self.stats.verdicts.pass, self.stats.verdicts.fail, self.stats.verdicts.inconclusive
        ));
        let mut variants: Vec<_> = self.stats.flows_by_variant.iter().collect();
        variants.sort_by_key(|(tag, _)| tag.to_string());
        for (tag, count) in variants {
            report.push_str(&format!("  {tag}: {count}\n"));
        }
        report.push_str(&format!("Journal Records: {}\n", self.journal_records));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

struct FlowOutcome {
    tag: VariantTag,
    verdict: Option<Verdict>,
    violations: Vec<Violation>,
}

/// Run the flow simulator
pub fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let journal = Arc::new(Journal::new());
    let controller = ConformanceController::new(
        ControllerConfig::new()
            .with_name("simulator")
            .with_history_limit(16),
    )
    .with_journal(Arc::clone(&journal));

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut flows = Vec::new();
    let mut violations = Vec::new();
    for index in 0..config.total_flows {
        match generate_flow(&mut rng, &config, index) {
            Ok(flow) => flows.push(flow),
            Err(error) => violations.push(Violation::Generation { flow: index, error }),
        }
    }

    let stop = AtomicBool::new(false);
    let run = || {
        flows
            .par_iter()
            .map(|flow| {
                if stop.load(Ordering::Relaxed) {
                    return None;
                }
                let outcome = execute_flow(&controller, flow);
                if config.stop_on_first_violation && !outcome.violations.is_empty() {
                    stop.store(true, Ordering::Relaxed);
                }
                Some(outcome)
            })
            .collect::<Vec<_>>()
    };
    let outcomes = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            tracing::warn!("Falling back to the global thread pool: {}", e);
            run()
        }
    };

    let mut stats = FlowStats {
        generated: config.total_flows,
        skipped: violations.len() as u64,
        ..FlowStats::default()
    };
    for outcome in outcomes {
        let Some(outcome) = outcome else {
            stats.skipped += 1;
            continue;
        };
        stats.executed += 1;
        *stats.flows_by_variant.entry(outcome.tag).or_insert(0) += 1;
        if let Some(verdict) = outcome.verdict {
            match verdict {
                Verdict::Pass => stats.verdicts.pass += 1,
                Verdict::Fail => stats.verdicts.fail += 1,
                Verdict::Inconclusive => stats.verdicts.inconclusive += 1,
            }
        }
        violations.extend(outcome.violations);
    }

    if let Err(v) = FlowInvariants::check_cross_flow(&controller, &journal, &stats.verdicts) {
        violations.extend(v.into_iter().map(Violation::Invariant));
    }

    tracing::info!(
        seed = config.seed,
        executed = stats.executed,
        violations = violations.len(),
        "simulation finished"
    );

    SimulatorReport {
        config,
        stats,
        violations,
        journal_records: journal.len(),
    }
}

fn deliver(
    element: &mut dyn EventElement,
    controller: &ConformanceController,
    action: &Action,
) -> Result<(), FlowError> {
    match action.direction() {
        Direction::In => element.incoming(controller, action),
        Direction::Out => element.outgoing(controller, action),
        Direction::Timeout => element.timeout(controller, action),
    }
}

/// Execute one flow and check the per-flow invariants
fn execute_flow(controller: &ConformanceController, flow: &SimulatedFlow) -> FlowOutcome {
    let mut element = flow.element.build(controller);
    let mut outcome = FlowOutcome {
        tag: flow.element.tag(),
        verdict: None,
        violations: Vec::new(),
    };

    for action in &flow.events {
        if let Err(error) = deliver(element.as_mut(), controller, action) {
            outcome.violations.push(Violation::Fault { flow: flow.index, error });
            return outcome;
        }
    }

    match element.is_flow_term(controller) {
        Ok(true) => {}
        Ok(false) => {
            outcome.violations.push(invariant(
                InvariantCheck::FlowReachesTerminalState,
                format!("flow {} still running after {} events", flow.index, flow.events.len()),
            ));
            return outcome;
        }
        Err(error) => {
            outcome.violations.push(Violation::Fault { flow: flow.index, error });
            return outcome;
        }
    }

    let verdict = match element.conclusion(controller) {
        Ok(v) => v,
        Err(error) => {
            outcome.violations.push(Violation::Fault { flow: flow.index, error });
            return outcome;
        }
    };
    outcome.verdict = Some(verdict);

    if verdict != flow.expected {
        outcome.violations.push(Violation::UnexpectedVerdict {
            flow: flow.index,
            kind: flow.kind,
            expected: flow.expected,
            actual: verdict,
        });
    }

    // A late event must change neither terminality nor the conclusion.
    let late = Action::incoming("LATE").at(Timestamp(u64::MAX));
    let after = deliver(element.as_mut(), controller, &late)
        .and_then(|()| element.is_flow_term(controller))
        .and_then(|term| element.conclusion(controller).map(|v| (term, v)));
    match after {
        Ok((true, v)) if v == verdict => {}
        Ok((term, v)) => outcome.violations.push(invariant(
            InvariantCheck::TerminalStateIsSticky,
            format!("flow {}: after late event term={term} verdict={v}, was {verdict}", flow.index),
        )),
        Err(error) => outcome.violations.push(Violation::Fault { flow: flow.index, error }),
    }

    match element.conclusion(controller) {
        Ok(v) if v == verdict => {}
        other => outcome.violations.push(invariant(
            InvariantCheck::ConclusionIsIdempotent,
            format!("flow {}: second query returned {other:?}, first {verdict}", flow.index),
        )),
    }

    outcome
}

fn invariant(check: InvariantCheck, details: String) -> Violation {
    Violation::Invariant(InvariantViolation { check, details })
}

/// Generate a flow based on the distribution
fn generate_flow(
    rng: &mut StdRng,
    config: &SimulatorConfig,
    index: u64,
) -> Result<SimulatedFlow, FlowError> {
    let d = &config.distribution;
    let r: f64 = rng.random::<f64>() * (d.conforming + d.deviating + d.timing_out);
    let kind = if r < d.conforming {
        FlowKind::Conforming
    } else if r < d.conforming + d.deviating {
        FlowKind::Deviating
    } else {
        FlowKind::TimingOut
    };

    let (element, events, expected) = match rng.random_range(0..3) {
        0 => generate_black_box(rng, kind, config.max_script_len.max(1))?,
        1 => generate_exchange(rng, kind),
        _ => generate_quiescence(rng, kind),
    };

    let base = index * 10_000;
    let events = events
        .into_iter()
        .enumerate()
        .map(|(i, a)| a.at(Timestamp(base + i as u64)))
        .collect();

    Ok(SimulatedFlow {
        index,
        kind,
        element,
        events,
        expected,
    })
}

fn matching_action(step: &ExpectedStep) -> Action {
    let payload = match &step.payload {
        PayloadMatch::Exact(p) | PayloadMatch::Prefix(p) => p.clone(),
        PayloadMatch::Any | PayloadMatch::Absent => Payload::from("?"),
    };
    Action::new(step.direction, Some(payload), Timestamp(0))
}

fn generate_black_box(
    rng: &mut StdRng,
    kind: FlowKind,
    max_len: usize,
) -> Result<(SimulatedElement, Vec<Action>, Verdict), FlowError> {
    let len = rng.random_range(1..=max_len);
    let steps: Vec<ExpectedStep> = (0..len)
        .map(|i| {
            let payload = PayloadMatch::Exact(Payload::from(format!("S{i}").as_str()));
            if rng.random_bool(0.5) {
                ExpectedStep::incoming(payload)
            } else {
                ExpectedStep::outgoing(payload)
            }
        })
        .collect();
    let timeout_verdict = if rng.random_bool(0.5) {
        Verdict::Inconclusive
    } else {
        Verdict::Fail
    };
    let mut events: Vec<Action> = Vec::with_capacity(len + 1);

    let expected = match kind {
        FlowKind::Conforming => {
            events.extend(steps.iter().map(matching_action));
            Verdict::Pass
        }
        FlowKind::Deviating => {
            let k = rng.random_range(0..len);
            events.extend(steps[..k].iter().map(matching_action));
            let step = &steps[k];
            let wrong = if rng.random_bool(0.5) {
                let flipped = match step.direction {
                    Direction::In => Direction::Out,
                    _ => Direction::In,
                };
                Action::new(flipped, Some(Payload::from(format!("S{k}").as_str())), Timestamp(0))
            } else {
                Action::new(step.direction, Some(Payload::from("WRONG")), Timestamp(0))
            };
            events.push(wrong);
            Verdict::Fail
        }
        FlowKind::TimingOut => {
            let k = rng.random_range(0..len);
            events.extend(steps[..k].iter().map(matching_action));
            events.push(Action::new(Direction::Timeout, None, Timestamp(0)));
            timeout_verdict
        }
    };

    let script = Script::new(steps)?;
    let element =
        SimulatedElement::BlackBox(BlackBox::new(script).with_timeout_verdict(timeout_verdict));
    Ok((element, events, expected))
}

fn generate_exchange(rng: &mut StdRng, kind: FlowKind) -> (SimulatedElement, Vec<Action>, Verdict) {
    let retries = rng.random_range(0..=2u32);
    let exchange = Exchange::new(
        PayloadMatch::Exact(Payload::from("REQ")),
        PayloadMatch::Prefix(Payload::from("RSP")),
    )
    .with_retries(retries);
    let req = || Action::new(Direction::Out, Some(Payload::from("REQ")), Timestamp(0));
    let rsp = |body: &str| Action::new(Direction::In, Some(Payload::from(body)), Timestamp(0));
    let tick = || Action::new(Direction::Timeout, None, Timestamp(0));
    let mut events = Vec::new();

    let expected = match kind {
        FlowKind::Conforming => {
            for _ in 0..rng.random_range(0..=retries) {
                events.push(req());
                events.push(tick());
            }
            events.push(req());
            events.push(rsp("RSP 200"));
            Verdict::Pass
        }
        FlowKind::Deviating => {
            if rng.random_bool(0.5) {
                events.push(rsp("RSP 200"));
            } else {
                events.push(req());
                events.push(rsp("ERR 500"));
            }
            Verdict::Fail
        }
        FlowKind::TimingOut => {
            if rng.random_bool(0.3) {
                events.push(tick());
                Verdict::Inconclusive
            } else {
                for _ in 0..=retries {
                    events.push(req());
                    events.push(tick());
                }
                Verdict::Fail
            }
        }
    };

    (SimulatedElement::Exchange(exchange), events, expected)
}

fn generate_quiescence(
    rng: &mut StdRng,
    kind: FlowKind,
) -> (SimulatedElement, Vec<Action>, Verdict) {
    let strict = rng.random_bool(0.3);
    let quiescence = if strict {
        Quiescence::strict()
    } else {
        Quiescence::new()
    };
    let mut events = Vec::new();

    let expected = match kind {
        FlowKind::Conforming | FlowKind::TimingOut => {
            if !strict {
                for _ in 0..rng.random_range(0..3) {
                    events.push(Action::new(Direction::Out, Some(Payload::from("KEEPALIVE")), Timestamp(0)));
                }
            }
            events.push(Action::new(Direction::Timeout, None, Timestamp(0)));
            Verdict::Pass
        }
        FlowKind::Deviating => {
            let direction = if strict && rng.random_bool(0.5) {
                Direction::Out
            } else {
                Direction::In
            };
            events.push(Action::new(direction, Some(Payload::from("NOISE")), Timestamp(0)));
            Verdict::Fail
        }
    };

    (SimulatedElement::Quiescence(quiescence), events, expected)
}

/// Cross-flow invariant checks
pub struct FlowInvariants;

impl FlowInvariants {
    /// Check tally and journal against the verdicts the flows reported
    pub fn check_cross_flow(
        controller: &ConformanceController,
        journal: &Journal,
        observed: &TallySnapshot,
    ) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();

        let tally = controller.tally().snapshot();
        if tally != *observed {
            violations.push(InvariantViolation {
                check: InvariantCheck::TallyMatchesFlowVerdicts,
                details: format!("tally {tally:?} != flow verdicts {observed:?}"),
            });
        }
        if let Err(e) = journal.verify_integrity() {
            violations.push(InvariantViolation {
                check: InvariantCheck::JournalChainIsUnbroken,
                details: e.to_string(),
            });
        }
        if journal.len() as u64 != tally.total() {
            violations.push(InvariantViolation {
                check: InvariantCheck::JournalCoversEveryVerdict,
                details: format!("{} records for {} verdicts", journal.len(), tally.total()),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let config = SimulatorConfig::default();
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for index in 0..50 {
            let fa = generate_flow(&mut a, &config, index).unwrap();
            let fb = generate_flow(&mut b, &config, index).unwrap();
            assert_eq!(fa.events, fb.events);
            assert_eq!(fa.expected, fb.expected);
        }
    }

    #[test]
    fn degenerate_script_length_still_generates() {
        let config = SimulatorConfig {
            max_script_len: 0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        for index in 0..200 {
            let flow = generate_flow(&mut rng, &config, index).unwrap();
            assert!(!flow.events.is_empty());
        }

        let report = run_simulator(SimulatorConfig {
            total_flows: 200,
            ..config
        });
        assert!(report.passed(), "{}", report.generate_text());
        assert!(!report
            .violations
            .iter()
            .any(|v| matches!(v, Violation::Generation { .. })));
    }

    #[test]
    fn small_run_passes() {
        let report = run_simulator(SimulatorConfig {
            seed: 3,
            total_flows: 300,
            threads: 4,
            ..Default::default()
        });
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.executed, 300);
        assert_eq!(report.journal_records as u64, report.stats.verdicts.total());
    }
}
