use bbgum_kernel::*;
use bbgum_test_utils::*;

#[test]
fn partial_controller_handles_registered_variant() {
    let controller = FirstReplyController;
    let mut element = Element::fresh(request_ack());

    element.outgoing(&controller, &Action::outgoing("anything")).unwrap();
    element.incoming(&controller, &Action::incoming("whatever")).unwrap();
    assert_eq!(element.conclusion(&controller).unwrap(), Verdict::Pass);
}

#[test]
fn unsupported_variant_rejects_every_operation() {
    let controller = FirstReplyController;
    let mut element = Element::fresh(Quiescence::new());
    let expected = FlowError::unsupported(VariantTag::Quiescence, "first-reply");

    assert_eq!(element.incoming(&controller, &Action::incoming("x")), Err(expected.clone()));
    assert_eq!(element.outgoing(&controller, &Action::outgoing("x")), Err(expected.clone()));
    assert_eq!(element.timeout(&controller, &Action::timeout(None)), Err(expected.clone()));
    assert_eq!(element.is_flow_term(&controller), Err(expected.clone()));
    assert_eq!(element.conclusion(&controller), Err(expected.clone()));
    assert!(expected.is_fatal());

    // Rejected deliveries leave the monitor untouched.
    assert!(element.monitor().is_fresh());
}

#[test]
fn unsupported_exchange_names_the_controller() {
    let controller = FirstReplyController;
    let mut element = Element::fresh(Exchange::new(exact("REQ"), exact("RSP")));

    let err = element.outgoing(&controller, &Action::outgoing("REQ")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "controller `first-reply` has no handler for exchange elements"
    );
}

#[test]
fn misrouted_action_is_rejected() {
    let controller = setup_controller();
    let mut element = controller.element(request_ack());

    let err = element.incoming(&controller, &Action::outgoing("REQ")).unwrap_err();
    assert_eq!(
        err,
        FlowError::MisroutedAction {
            expected: Direction::In,
            actual: Direction::Out
        }
    );
    assert!(err.is_fatal());
    assert!(element.monitor().is_fresh());

    let err = element.timeout(&controller, &Action::incoming("ACK")).unwrap_err();
    assert!(matches!(err, FlowError::MisroutedAction { expected: Direction::Timeout, .. }));
}

#[test]
fn premature_conclusion_is_an_error_not_a_verdict() {
    let controller = setup_controller();
    let mut element = controller.element(request_ack());
    element.outgoing(&controller, &Action::outgoing("REQ")).unwrap();

    let err = element.conclusion(&controller).unwrap_err();
    assert_eq!(err, FlowError::PrematureConclusion { element: element.id() });
    assert_eq!(controller.tally().snapshot().total(), 0);
}

#[test]
fn monitor_must_be_fresh() {
    let controller = setup_controller();
    let mut first = controller.element(Quiescence::new());
    first.incoming(&controller, &Action::incoming("NOISE")).unwrap();

    let reused = first.monitor().clone();
    let err = Element::new(Quiescence::new(), reused).unwrap_err();
    assert_eq!(
        err,
        FlowError::MonitorNotFresh {
            state: FlowState::TerminatedFail,
            observed: 1
        }
    );

    assert!(Element::new(Quiescence::new(), controller.new_monitor()).is_ok());
}

#[test]
fn dispatch_follows_element_variant() {
    let controller = setup_controller();
    let mut elements: Vec<Box<dyn EventElement>> = vec![
        Box::new(controller.element(request_ack())),
        Box::new(controller.element(Exchange::new(exact("REQ"), exact("RSP")))),
        Box::new(controller.element(Quiescence::strict())),
    ];

    // Same action, three verdict rules.
    for element in &mut elements {
        element.outgoing(&controller, &Action::outgoing("REQ")).unwrap();
    }

    let states: Vec<_> = elements
        .iter()
        .map(|e| (e.tag(), e.is_flow_term(&controller).unwrap()))
        .collect();
    assert_eq!(
        states,
        vec![
            (VariantTag::BlackBox, false),
            (VariantTag::Exchange, false),
            (VariantTag::Quiescence, true),
        ]
    );
    assert_eq!(elements[2].conclusion(&controller).unwrap(), Verdict::Fail);
}

#[test]
fn element_keeps_assigned_id() {
    let controller = setup_controller();
    let id = ElementId::new();
    let element = controller.element(Quiescence::new()).with_id(id);
    assert_eq!(element.id(), id);
}

#[test]
fn deserialized_monitor_with_recorded_outcome_is_rejected() {
    let mut raw = serde_json::to_value(Monitor::new()).unwrap();
    raw["conclusion"] = serde_json::json!("Pass");
    raw["position"] = serde_json::json!(7);
    raw["retries_used"] = serde_json::json!(9);
    let doctored: Monitor = serde_json::from_value(raw).unwrap();

    assert_eq!(doctored.state(), FlowState::Running);
    assert!(!doctored.is_fresh());
    let variant = BlackBox::new(Script::single(ExpectedStep::incoming(PayloadMatch::Any)));
    assert!(matches!(
        Element::new(variant, doctored),
        Err(FlowError::MonitorNotFresh { state: FlowState::Running, .. })
    ));
}
