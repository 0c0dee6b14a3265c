use bbgum_kernel::*;
use bbgum_test_utils::*;
use std::sync::Arc;

fn journaled(config: ControllerConfig) -> (ConformanceController, Arc<Journal>) {
    let journal = Arc::new(Journal::new());
    let controller = ConformanceController::new(config).with_journal(Arc::clone(&journal));
    (controller, journal)
}

#[test]
fn one_record_per_terminated_flow() {
    let (controller, journal) = journaled(ControllerConfig::new());

    let mut pass = controller.element(Quiescence::new());
    pass.timeout(&controller, &stamped(Direction::Timeout, None, 100)).unwrap();
    let mut fail = controller.element(Quiescence::new());
    fail.incoming(&controller, &stamped(Direction::In, Some("NOISE"), 200)).unwrap();
    fail.incoming(&controller, &stamped(Direction::In, Some("NOISE"), 300)).unwrap();
    let running = controller.element(request_ack());

    let records = journal.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].element, pass.id());
    assert_eq!(records[0].verdict, Verdict::Pass);
    assert_eq!(records[0].decided_at, Timestamp(100));
    assert_eq!(records[1].element, fail.id());
    assert_eq!(records[1].variant, VariantTag::Quiescence);
    assert_eq!(records[1].decided_at, Timestamp(200));
    assert!(records.iter().all(|r| r.element != running.id()));
    assert!(journal.verify_integrity().is_ok());
    assert_eq!(records[1].hash_hex().len(), 64);
}

#[test]
fn journaling_can_be_disabled() {
    let (controller, journal) = journaled(ControllerConfig::new().with_journal_verdicts(false));

    let mut element = controller.element(Quiescence::new());
    element.timeout(&controller, &Action::timeout(None)).unwrap();

    assert!(journal.is_empty());
    assert_eq!(controller.tally().snapshot().pass, 1);
}

#[test]
fn persisted_records_round_trip_through_json() {
    let (controller, journal) = journaled(ControllerConfig::new());
    let mut element = controller.element(request_ack());
    element.incoming(&controller, &Action::incoming("ACK")).unwrap();

    let raw = serde_json::to_string(&journal.records()).unwrap();
    let restored: Vec<VerdictRecord> = serde_json::from_str(&raw).unwrap();
    let restored = Journal::from_records(restored);
    assert!(restored.verify_integrity().is_ok());

    let mut tampered = restored.records();
    tampered[0].detail = None;
    assert_eq!(
        Journal::from_records(tampered).verify_integrity(),
        Err(JournalError::IntegrityViolation { seq: 0 })
    );
}

#[test]
fn shared_tally_spans_controllers() {
    let tally = Arc::new(VerdictTally::new());
    let lab = ConformanceController::new(ControllerConfig::new().with_name("lab"))
        .with_tally(Arc::clone(&tally));
    let field = ConformanceController::new(ControllerConfig::new().with_name("field"))
        .with_tally(Arc::clone(&tally));

    let mut a = lab.element(Quiescence::new());
    a.timeout(&lab, &Action::timeout(None)).unwrap();
    let mut b = field.element(Exchange::new(exact("REQ"), exact("RSP")));
    b.timeout(&field, &Action::timeout(None)).unwrap();

    let snapshot = tally.snapshot();
    assert_eq!(snapshot.get(Verdict::Pass), 1);
    assert_eq!(snapshot.get(Verdict::Inconclusive), 1);
}
