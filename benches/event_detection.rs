use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zerocross::{
    AnalyticalPropagator, BooleanDetector, DetectionSettings, EventDetector, FnModel,
    FunctionDetector, OdeState, OdeSystem, RecordAndContinue, Rkf78, Tolerances,
};

type State = OdeState<1>;

/// Two-body problem (6-state)
struct TwoBody {
    mu: f64,
}

impl OdeSystem<6> for TwoBody {
    fn rhs(&self, _t: f64, y: &[f64; 6], dydt: &mut [f64; 6]) {
        let r = (y[0] * y[0] + y[1] * y[1] + y[2] * y[2]).sqrt();
        let r3 = r * r * r;
        let mu_r3 = self.mu / r3;

        dydt[0] = y[3];
        dydt[1] = y[4];
        dydt[2] = y[5];
        dydt[3] = -mu_r3 * y[0];
        dydt[4] = -mu_r3 * y[1];
        dydt[5] = -mu_r3 * y[2];
    }
}

fn wave(k: usize) -> FunctionDetector<State> {
    let omega = 1.0 + 0.1 * k as f64;
    FunctionDetector::new(format!("wave {}", k), move |s: &State| (omega * s.t).sin())
        .with_settings(DetectionSettings::constant(0.3, 1e-10, 100).unwrap())
}

fn bench_many_detectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("analytical_detectors");
    for count in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let record = RecordAndContinue::new();
                let model = FnModel::new(|t: f64| OdeState::new(t, [t]));
                let mut propagator = AnalyticalPropagator::new(model).with_fixed_step(1.0);
                for k in 0..count {
                    propagator.add_event_detector(wave(k).with_handler(record.clone()));
                }
                propagator.propagate(0.05, black_box(100.0)).unwrap();
                record.len()
            })
        });
    }
    group.finish();
}

fn bench_boolean_combination(c: &mut Criterion) {
    c.bench_function("and_of_four_waves", |b| {
        b.iter(|| {
            let detectors: Vec<Box<dyn EventDetector<State>>> =
                (0..4).map(|k| Box::new(wave(k)) as Box<dyn EventDetector<State>>).collect();
            let record = RecordAndContinue::new();
            let model = FnModel::new(|t: f64| OdeState::new(t, [t]));
            let mut propagator = AnalyticalPropagator::new(model);
            propagator.add_event_detector(
                BooleanDetector::and_combine(detectors)
                    .unwrap()
                    .with_handler(record.clone()),
            );
            propagator.propagate(0.05, black_box(100.0)).unwrap();
            record.len()
        })
    });
}

fn bench_orbit_with_apsides(c: &mut Criterion) {
    let mu: f64 = 398600.4418;
    let ra: f64 = 42164.0;
    let rp: f64 = 6678.0;
    let a = (ra + rp) / 2.0;
    let v_apo = (mu * (2.0 / ra - 1.0 / a)).sqrt();
    let y0 = [ra, 0.0, 0.0, 0.0, -v_apo, 0.0];
    let period = 2.0 * std::f64::consts::PI * (a.powi(3) / mu).sqrt();
    let sys = TwoBody { mu };

    c.bench_function("elliptical_orbit_3periods_apsides", |b| {
        b.iter(|| {
            let record = RecordAndContinue::new();
            let mut solver = Rkf78::new(Tolerances::new(1e-10, 1e-12));
            solver.add_event_detector(
                FunctionDetector::new("apsides", |s: &OdeState<6>| {
                    let y = &s.y;
                    y[0] * y[3] + y[1] * y[4] + y[2] * y[5]
                })
                .with_settings(DetectionSettings::constant(300.0, 1e-6, 100).unwrap())
                .with_handler(record.clone()),
            );
            solver
                .propagate(&sys, 0.0, black_box(&y0), 3.0 * period, 60.0)
                .unwrap();
            record.len()
        })
    });
}

criterion_group!(
    benches,
    bench_many_detectors,
    bench_boolean_combination,
    bench_orbit_with_apsides
);
criterion_main!(benches);
