//! End-to-end scenarios: detectors, scheduler and combinators driven by the
//! bundled propagators.

use std::sync::Arc;

use parking_lot::Mutex;
use zerocross::{
    handler_fn, Action, AnalyticalPropagator, BooleanDetector, DateDetector, DetectionSettings,
    Dual, EnablingPredicateFilter, EventDetector, EventsLogger, FilterType, FnModel,
    FunctionDetector, MaxCheck, NegateDetector, OdeState, OdeSystem, RecordAndContinue, Rkf78,
    SlopeFilter, StepHandler, StepInterpolator, StepNormalizer, StopOnIncreasing, Tolerances,
};

type State = OdeState<1>;

/// Earth gravitational parameter [km³/s²]
const MU: f64 = 398600.4418;

fn settings(max_check: f64, threshold: f64) -> DetectionSettings<State> {
    DetectionSettings::constant(max_check, threshold, 100).unwrap()
}

/// Trajectory that only carries time; detectors look at `s.t`.
fn clock() -> FnModel<impl Fn(f64) -> State> {
    FnModel::new(|t: f64| OdeState::new(t, [t]))
}

#[test]
fn single_crossing_within_threshold() {
    let threshold = 1e-9;
    let record = RecordAndContinue::new();
    let mut propagator = AnalyticalPropagator::new(clock());
    propagator.add_event_detector(
        FunctionDetector::new("cube", |s: &State| s.t * s.t * s.t - 2.0)
            .with_settings(settings(0.5, threshold))
            .with_handler(record.clone()),
    );
    propagator.propagate(0.0, 3.0).unwrap();

    let events = record.events();
    assert_eq!(events.len(), 1);
    let root = 2.0_f64.cbrt();
    assert!(
        (events[0].state.t - root).abs() <= threshold + 1e-12,
        "event at {}, root at {}",
        events[0].state.t,
        root
    );
    assert!(events[0].increasing);
}

#[test]
fn constant_sign_never_fires() {
    let record = RecordAndContinue::new();
    let mut propagator = AnalyticalPropagator::new(clock()).with_fixed_step(0.3);
    propagator.add_event_detector(
        FunctionDetector::new("positive", |s: &State| 2.0 + s.t.sin())
            .with_settings(settings(0.1, 1e-9))
            .with_handler(record.clone()),
    );
    propagator.propagate(0.0, 50.0).unwrap();
    assert!(record.is_empty());
}

#[test]
fn repeated_runs_are_identical() {
    let logger = EventsLogger::new();
    let mut propagator = AnalyticalPropagator::new(clock()).with_fixed_step(0.7);
    propagator.add_event_detector(logger.monitor_detector(
        FunctionDetector::new("sin", |s: &State| s.t.sin()).with_settings(settings(0.4, 1e-10)),
    ));
    propagator.add_event_detector(logger.monitor_detector(
        FunctionDetector::new("cos 2t", |s: &State| (2.0 * s.t).cos())
            .with_settings(settings(0.4, 1e-10)),
    ));

    propagator.propagate(0.1, 20.0).unwrap();
    let first = logger.logged_events();
    logger.clear_logged_events();
    propagator.propagate(0.1, 20.0).unwrap();
    let second = logger.logged_events();

    assert!(!first.is_empty());
    assert_eq!(*first, *second);
}

#[test]
fn earlier_crossing_delivered_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut propagator = AnalyticalPropagator::new(clock());
    // registered in reverse time order, inside a single step
    for (name, root) in [("late", 3.0), ("early", 2.0)] {
        let order = Arc::clone(&order);
        propagator.add_event_detector(
            FunctionDetector::new(name, move |s: &State| s.t - root)
                .with_settings(settings(0.5, 1e-10))
                .with_handler(handler_fn(move |s: &State, _| {
                    order.lock().push((name, s.t));
                    Action::Continue
                })),
        );
    }
    propagator.propagate(0.0, 5.0).unwrap();

    let order = order.lock();
    assert_eq!(order.len(), 2);
    assert_eq!(order[0].0, "early");
    assert_eq!(order[1].0, "late");
    assert!(order[0].1 < order[1].1);
}

#[test]
fn negation_swaps_directions_at_same_times() {
    let plain = RecordAndContinue::new();
    let negated = RecordAndContinue::new();
    let detector =
        || FunctionDetector::new("sin", |s: &State| s.t.sin()).with_settings(settings(0.5, 1e-10));

    let mut propagator = AnalyticalPropagator::new(clock());
    propagator.add_event_detector(detector().with_handler(plain.clone()));
    propagator.add_event_detector(NegateDetector::new(detector()).with_handler(negated.clone()));
    propagator.propagate(0.5, 12.0).unwrap();

    let plain = plain.events();
    let negated = negated.events();
    assert_eq!(plain.len(), 3);
    assert_eq!(plain.len(), negated.len());
    for (p, n) in plain.iter().zip(negated.iter()) {
        assert!((p.state.t - n.state.t).abs() < 1e-9);
        assert_eq!(p.increasing, !n.increasing);
    }
}

#[test]
fn and_with_deactivating_detector_fires_once_decreasing() {
    let record = RecordAndContinue::new();
    let always: Box<dyn EventDetector<State>> = Box::new(
        FunctionDetector::new("always", |_: &State| 1.0).with_settings(settings(0.5, 1e-10)),
    );
    let until_five: Box<dyn EventDetector<State>> = Box::new(
        FunctionDetector::new("until 5", |s: &State| 5.0 - s.t)
            .with_settings(settings(0.5, 1e-10)),
    );
    let and = BooleanDetector::and_combine(vec![always, until_five])
        .unwrap()
        .with_handler(record.clone());

    let mut propagator = AnalyticalPropagator::new(clock()).with_fixed_step(1.3);
    propagator.add_event_detector(and);
    propagator.propagate(0.0, 10.0).unwrap();

    let events = record.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].increasing);
    assert!((events[0].state.t - 5.0).abs() < 1e-9);
    assert_eq!(events[0].detector, "and(always, until 5)");
}

#[test]
fn date_detector_over_fixed_steps() {
    let step = 60.0;
    let t0 = 1000.0;
    let nominal = t0 + 5.25 * step;

    // last output time the step handler had seen when the event fired
    let seen = Arc::new(Mutex::new(t0));
    let observed = Arc::new(Mutex::new(Vec::new()));

    let mut propagator = AnalyticalPropagator::new(clock()).with_fixed_step(step);
    let sink = Arc::clone(&seen);
    propagator.add_step_handler(
        StepNormalizer::new(step, move |s: &State, _| *sink.lock() = s.t).unwrap(),
    );
    let (seen_at_event, events) = (Arc::clone(&seen), Arc::clone(&observed));
    propagator.add_event_detector(DateDetector::at("date", nominal).with_handler(handler_fn(
        move |s: &State, _| {
            events.lock().push((s.t, *seen_at_event.lock()));
            Action::Continue
        },
    )));

    let end = propagator.propagate(t0, t0 + 10.0 * step).unwrap();
    assert_eq!(end.t, t0 + 10.0 * step);

    let observed = observed.lock();
    assert_eq!(observed.len(), 1);
    let (event_time, step_time) = observed[0];
    assert!((event_time - nominal).abs() < 1e-6);
    assert!((event_time - step_time).abs() <= step);
}

#[test]
fn logger_counts_and_snapshots_extend() {
    // sin t: roots at kπ; cos 3t: roots at π/6 + kπ/3
    fn expected(duration: f64) -> usize {
        let sin = (duration / std::f64::consts::PI).floor() as usize;
        let cos = ((duration - std::f64::consts::FRAC_PI_6) / std::f64::consts::FRAC_PI_3)
            .floor() as usize
            + 1;
        sin + cos
    }

    let logger = EventsLogger::new();
    let mut propagator = AnalyticalPropagator::new(clock()).with_fixed_step(2.5);
    propagator.add_event_detector(logger.monitor_detector(
        FunctionDetector::new("sin t", |s: &State| s.t.sin()).with_settings(settings(0.3, 1e-10)),
    ));
    propagator.add_event_detector(logger.monitor_detector(
        FunctionDetector::new("cos 3t", |s: &State| (3.0 * s.t).cos())
            .with_settings(settings(0.3, 1e-10)),
    ));

    propagator.propagate(0.1, 10.0).unwrap();
    let short = logger.logged_events();
    assert_eq!(short.len(), expected(10.0));
    assert_eq!(short.len(), 13);

    propagator.propagate(0.1, 20.0).unwrap();
    let long = logger.logged_events();
    assert_eq!(short.len(), 13);
    assert_eq!(long.len(), short.len() + expected(20.0));
    assert_eq!(long[..short.len()], short[..]);
}

#[test]
fn event_time_sensitivity_with_dual_numbers() {
    type DualState = OdeState<1, Dual>;

    // y = A cos t crosses 0.5 at t = acos(0.5 / A); dt/dA = 1/√3 at A = 1
    let amplitude = Dual::variable(1.0);
    let model = FnModel::new(move |t: Dual| OdeState::new(t, [amplitude * t.cos()]));
    let record = RecordAndContinue::new();

    let mut propagator = AnalyticalPropagator::new(model);
    propagator.add_event_detector(
        FunctionDetector::new("half", |s: &DualState| s.y[0] - Dual::constant(0.5))
            .with_settings(DetectionSettings::constant(0.25, 1e-12, 100).unwrap())
            .with_handler(record.clone()),
    );
    propagator
        .propagate(Dual::constant(0.0), Dual::constant(3.0))
        .unwrap();

    let events = record.events();
    assert_eq!(events.len(), 1);
    let t = events[0].state.t;
    assert!((t.value - std::f64::consts::FRAC_PI_3).abs() < 1e-9);
    assert!(
        (t.derivative - 1.0 / 3.0_f64.sqrt()).abs() < 1e-4,
        "dt/dA = {}",
        t.derivative
    );
}

#[test]
fn periapsis_of_elliptical_orbit() {
    struct TwoBody {
        mu: f64,
    }

    impl OdeSystem<6> for TwoBody {
        fn rhs(&self, _t: f64, y: &[f64; 6], dydt: &mut [f64; 6]) {
            let r = (y[0] * y[0] + y[1] * y[1] + y[2] * y[2]).sqrt();
            let mu_r3 = self.mu / (r * r * r);
            dydt[0] = y[3];
            dydt[1] = y[4];
            dydt[2] = y[5];
            dydt[3] = -mu_r3 * y[0];
            dydt[4] = -mu_r3 * y[1];
            dydt[5] = -mu_r3 * y[2];
        }
    }

    // Apoapsis at 42164 km (GEO), periapsis at 6678 km (300 km alt)
    let ra = 42164.0;
    let rp = 6678.0;
    let a = (ra + rp) / 2.0;
    let v_apo = (MU * (2.0 / ra - 1.0 / a)).sqrt();
    let y0 = [ra, 0.0, 0.0, 0.0, -v_apo, 0.0];
    let period = 2.0 * std::f64::consts::PI * (a.powi(3) / MU).sqrt();

    let mut solver = Rkf78::new(Tolerances::new(1e-10, 1e-12));
    // radial velocity goes from - to + at periapsis
    solver.add_event_detector(
        FunctionDetector::new("periapsis", |s: &OdeState<6>| {
            let y = &s.y;
            let r = (y[0] * y[0] + y[1] * y[1] + y[2] * y[2]).sqrt();
            (y[0] * y[3] + y[1] * y[4] + y[2] * y[5]) / r
        })
        .with_settings(DetectionSettings::constant(300.0, 1e-6, 100).unwrap())
        .with_handler(StopOnIncreasing),
    );

    let result = solver
        .propagate(&TwoBody { mu: MU }, 0.0, &y0, period, 60.0)
        .unwrap();
    assert!(result.is_stopped());

    let end = result.state();
    let r = (end.y[0].powi(2) + end.y[1].powi(2) + end.y[2].powi(2)).sqrt();
    assert!(
        (end.t - period / 2.0).abs() < 10.0,
        "periapsis at {} s, expected ~{} s",
        end.t,
        period / 2.0
    );
    assert!((r - rp).abs() < 1.0, "periapsis radius {} km, expected ~{} km", r, rp);
}

#[test]
fn step_handlers_cover_the_run_without_gaps() {
    #[derive(Clone, Default)]
    struct Coverage(Arc<Mutex<Vec<(f64, f64)>>>);

    impl StepHandler<State> for Coverage {
        fn handle_step(&mut self, interpolator: &dyn StepInterpolator<State>) {
            self.0
                .lock()
                .push((interpolator.previous_state().t, interpolator.current_state().t));
        }
    }

    let coverage = Coverage::default();
    let mut propagator = AnalyticalPropagator::new(clock()).with_fixed_step(1.0);
    propagator.add_step_handler(coverage.clone());
    propagator.add_event_detector(
        FunctionDetector::new("sin", |s: &State| s.t.sin()).with_settings(settings(0.5, 1e-10)),
    );
    propagator.propagate(0.5, 7.5).unwrap();

    let steps = coverage.0.lock();
    assert_eq!(steps.first().map(|s| s.0), Some(0.5));
    assert_eq!(steps.last().map(|s| s.1), Some(7.5));
    for pair in steps.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
    // two roots cut two steps in half
    assert_eq!(steps.len(), 7 + 2);
}

fn wave() -> FunctionDetector<State> {
    FunctionDetector::new("wave", |s: &State| s.t.sin()).with_settings(settings(0.5, 1e-10))
}

fn assert_multiples_of_pi(times: &[f64], multiples: &[f64]) {
    assert_eq!(times.len(), multiples.len(), "{:?}", times);
    for (t, k) in times.iter().zip(multiples) {
        assert!((t - k * std::f64::consts::PI).abs() < 1e-9, "{:?}", times);
    }
}

#[test]
fn slope_filter_still_tracks_every_crossing() {
    // sin over (0.1, 20): decreasing at odd multiples of pi, increasing at even
    let logger = EventsLogger::new();
    let kept = RecordAndContinue::new();
    let mut propagator = AnalyticalPropagator::new(clock()).with_fixed_step(1.3);
    propagator.add_event_detector(logger.monitor_detector(SlopeFilter::new(
        wave().with_handler(kept.clone()),
        FilterType::IncreasingOnly,
    )));
    propagator.propagate(0.1, 20.0).unwrap();

    let all = logger.logged_events();
    let times: Vec<f64> = all.iter().map(|e| e.state.t).collect();
    assert_multiples_of_pi(&times, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    for (k, event) in all.iter().enumerate() {
        assert_eq!(event.increasing, k % 2 == 1);
    }

    let kept = kept.events();
    let times: Vec<f64> = kept.iter().map(|e| e.state.t).collect();
    assert_multiples_of_pi(&times, &[2.0, 4.0, 6.0]);
    assert!(kept.iter().all(|e| e.increasing));
}

#[test]
fn enabling_predicate_gates_handler_only() {
    let logger = EventsLogger::new();
    let kept = RecordAndContinue::new();
    let mut propagator = AnalyticalPropagator::new(clock());
    propagator.add_event_detector(logger.monitor_detector(EnablingPredicateFilter::new(
        wave().with_handler(kept.clone()),
        |s: &State| s.t > 10.0,
    )));
    propagator.propagate(0.1, 20.0).unwrap();

    let times: Vec<f64> = logger.logged_events().iter().map(|e| e.state.t).collect();
    assert_multiples_of_pi(&times, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    let kept = kept.events();
    let times: Vec<f64> = kept.iter().map(|e| e.state.t).collect();
    assert_multiples_of_pi(&times, &[4.0, 5.0, 6.0]);
    let directions: Vec<bool> = kept.iter().map(|e| e.increasing).collect();
    assert_eq!(directions, vec![true, false, true]);
}

#[test]
fn adaptive_max_check_resolves_close_roots() {
    // negative only on (5.3, 5.4)
    let dip = |s: &State| (s.t - 5.3) * (s.t - 5.4);
    let run = |settings: DetectionSettings<State>| {
        let record = RecordAndContinue::new();
        let mut propagator = AnalyticalPropagator::new(clock());
        propagator.add_event_detector(
            FunctionDetector::new("dip", dip)
                .with_settings(settings)
                .with_handler(record.clone()),
        );
        propagator.propagate(0.05, 10.0).unwrap();
        record.events()
    };

    // samples at 5.05 and 6.05 straddle the dip
    assert!(run(settings(1.0, 1e-10)).is_empty());

    let fine_near_dip = MaxCheck::adaptive(|s: &State, _forward| {
        if (s.t - 5.35).abs() < 1.0 {
            0.02
        } else {
            1.0
        }
    });
    let events = run(DetectionSettings::new(fine_near_dip, 1e-10, 100).unwrap());
    assert_eq!(events.len(), 2);
    assert!((events[0].state.t - 5.3).abs() < 1e-9);
    assert!(!events[0].increasing);
    assert!((events[1].state.t - 5.4).abs() < 1e-9);
    assert!(events[1].increasing);
}
