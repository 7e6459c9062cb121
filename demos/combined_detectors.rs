//! Detector combinators on a closed-form circular orbit.
//!
//! A satellite on a unit circular orbit is watched by:
//! - `and(north, east)`: in the north-east quadrant
//! - `not(north)`: the opposite of the northern half
//! - `east` gated by a predicate: only reported after the first two orbits
//! - a date detector stopping the run after two and a half orbits
//!
//! Every event goes through one shared logger.
//!
//! Run with:
//!   cargo run --example combined_detectors

use zerocross::{
    AnalyticalPropagator, BooleanDetector, DateDetector, DetectionSettings,
    EnablingPredicateFilter, EventDetector, EventsLogger, FnModel, FunctionDetector,
    NegateDetector, OdeState, StopOnEvent,
};

type State = OdeState<2>;

fn component(name: &str, index: usize) -> FunctionDetector<State> {
    FunctionDetector::new(name, move |s: &State| s.y[index])
        .with_settings(DetectionSettings::constant(0.05, 1e-9, 100).unwrap())
}

fn main() {
    let period = 1.0;
    let n = 2.0 * std::f64::consts::PI / period;
    let orbit = FnModel::new(move |t: f64| OdeState::new(t, [(n * t).cos(), (n * t).sin()]));

    let logger = EventsLogger::new();
    let mut propagator = AnalyticalPropagator::new(orbit).with_fixed_step(0.1);

    let quadrant: Vec<Box<dyn EventDetector<State>>> = vec![
        Box::new(component("north", 1)),
        Box::new(component("east", 0)),
    ];
    propagator.add_event_detector(
        logger.monitor_detector(BooleanDetector::and_combine(quadrant).unwrap()),
    );
    propagator
        .add_event_detector(logger.monitor_detector(NegateDetector::new(component("north", 1))));
    propagator.add_event_detector(logger.monitor_detector(EnablingPredicateFilter::new(
        component("east", 0),
        move |s: &State| s.t > 2.0 * period,
    )));
    propagator.add_event_detector(
        logger.monitor_detector(DateDetector::at("end", 2.5 * period).with_handler(StopOnEvent)),
    );

    let end = propagator.propagate(0.01, 10.0 * period).unwrap();
    println!("Combined detectors on a circular orbit (period {:.1})", period);
    println!("  Stopped at t = {:.6}", end.t);
    println!();

    // the logger sees every event, filtered or not
    for event in logger.logged_events().iter() {
        println!(
            "  t = {:8.5}  {:<16} {}",
            event.state.t,
            event.detector,
            if event.increasing { "increasing" } else { "decreasing" }
        );
    }
}
