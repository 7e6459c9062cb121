//! Event detection: periapsis finding in a two-body orbit.
//!
//! Part 1 stops at the first periapsis. Part 2 keeps going over five orbits,
//! recording periapsis passes through a slope filter, while a step
//! normalizer prints the radius every ten minutes of the first orbit.
//!
//! Run with:
//!   cargo run --example periapsis_events

use zerocross::{
    DetectionSettings, FilterType, FunctionDetector, OdeState, OdeSystem, RecordAndContinue,
    Rkf78, SlopeFilter, StepNormalizer, StopOnIncreasing, Tolerances,
};

type State = OdeState<6>;

/// Keplerian two-body problem.
struct TwoBody {
    mu: f64,
}

impl OdeSystem<6> for TwoBody {
    fn rhs(&self, _t: f64, y: &[f64; 6], dydt: &mut [f64; 6]) {
        let r2 = y[0] * y[0] + y[1] * y[1] + y[2] * y[2];
        let r = r2.sqrt();
        let r3 = r2 * r;
        let mu_r3 = self.mu / r3;

        dydt[0] = y[3];
        dydt[1] = y[4];
        dydt[2] = y[5];
        dydt[3] = -mu_r3 * y[0];
        dydt[4] = -mu_r3 * y[1];
        dydt[5] = -mu_r3 * y[2];
    }
}

fn radius(s: &State) -> f64 {
    (s.y[0] * s.y[0] + s.y[1] * s.y[1] + s.y[2] * s.y[2]).sqrt()
}

/// r·v: negative → positive at periapsis, positive → negative at apoapsis.
fn radial(name: &str) -> FunctionDetector<State> {
    FunctionDetector::new(name, |s: &State| {
        s.y[0] * s.y[3] + s.y[1] * s.y[4] + s.y[2] * s.y[5]
    })
    .with_settings(DetectionSettings::constant(120.0, 1e-6, 100).unwrap())
}

fn main() {
    let mu = 398600.4418;
    let sys = TwoBody { mu };

    // Elliptical orbit: 400 km × 2000 km altitude
    let earth_radius = 6378.137;
    let r_peri = earth_radius + 400.0;
    let r_apo = earth_radius + 2000.0;
    let a = (r_peri + r_apo) / 2.0;
    let v_peri = (mu * (2.0 / r_peri - 1.0 / a)).sqrt();

    // Start at periapsis, moving prograde
    let y0 = [r_peri, 0.0, 0.0, 0.0, v_peri, 0.0];
    let period = 2.0 * std::f64::consts::PI * (a.powi(3) / mu).sqrt();

    println!("Event Detection: Periapsis Finding");
    println!("  Orbit: {:.0} × {:.0} km altitude", 400.0, 2000.0);
    println!("  Period: {:.1} s ({:.1} min)", period, period / 60.0);
    println!();

    // --- Part 1: stop at the first periapsis after t=0 ---
    // We start at periapsis, so the next one is after one full orbit.
    let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-12));
    solver.add_event_detector(radial("periapsis").with_handler(StopOnIncreasing));

    let result = solver
        .propagate(&sys, 0.0, &y0, 1.5 * period, 10.0)
        .unwrap();
    let end = result.state();
    println!("Part 1: StopOnIncreasing");
    if result.is_stopped() {
        let r = radius(end);
        println!("  Periapsis found at t = {:.6} s", end.t);
        println!("  Radius at periapsis: {:.6} km  (expected: {:.3})", r, r_peri);
        println!("  Radius error: {:.2e} km", (r - r_peri).abs());
    } else {
        println!("  No periapsis found (reached t = {})", end.t);
    }
    println!(
        "  Steps: {} accepted, {} rejected",
        solver.stats.accepted_steps, solver.stats.rejected_steps
    );
    println!();

    // --- Part 2: record every periapsis over 5 orbits ---
    let passes = RecordAndContinue::new();
    let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-12));
    solver.add_event_detector(SlopeFilter::new(
        radial("periapsis").with_handler(passes.clone()),
        FilterType::IncreasingOnly,
    ));
    let ticker = StepNormalizer::new(600.0, move |s: &State, last| {
        if s.t <= period || last {
            println!("  t = {:8.1} s  r = {:10.3} km", s.t, radius(s));
        }
    })
    .unwrap();
    solver.add_step_handler(ticker);

    println!("Part 2: SlopeFilter + RecordAndContinue (5 orbits)");
    solver
        .propagate(&sys, 0.0, &y0, 5.0 * period, 10.0)
        .unwrap();

    let events = passes.events();
    println!("  Found {} periapsis crossings:", events.len());
    for (i, ev) in events.iter().enumerate() {
        let r = radius(&ev.state);
        println!(
            "    #{}: t = {:10.3} s  r = {:.6} km  err = {:.2e} km",
            i + 1,
            ev.state.t,
            r,
            (r - r_peri).abs()
        );
    }
}
