use std::sync::Arc;

use ecm_core::units::amp_hours;
use ecm_fit::{
    Budget, CancelToken, CellConstants, EvalError, EvalResult, Excitation, FitBuilder, FitError,
    FitStatus, Measurement, ModelEvaluator, ParticleSwarm, RcBranch, RcPairs, TheveninEvaluator,
    TheveninParameters,
};
use ecm_ocv::OcvCurve;

fn pulse_excitation() -> (Vec<f64>, Vec<f64>) {
    let time: Vec<f64> = (0..120).map(f64::from).collect();
    let current = time
        .iter()
        .map(|&t| if (10.0..70.0).contains(&t) { 4.85 } else { 0.0 })
        .collect();
    (time, current)
}

fn synthetic(params: &TheveninParameters, evaluator: &TheveninEvaluator) -> Measurement {
    let (time, current) = pulse_excitation();
    let voltage = evaluator
        .simulate(
            params,
            Excitation {
                time: &time,
                current: &current,
            },
        )
        .expect("reference parameters simulate");
    Measurement {
        time,
        current,
        voltage,
    }
}

#[test]
fn recovers_one_rc_network_from_synthetic_pulse() {
    let cell = CellConstants::default();
    let curve = Arc::new(OcvCurve::from_table(vec![0.0, 1.0], vec![3.2, 4.1]).unwrap());
    let evaluator = TheveninEvaluator::with_curve(cell, curve.clone());
    let truth = TheveninParameters {
        r0: 0.006,
        branches: vec![RcBranch { r: 0.004, c: 800.0 }],
        initial_soc: 0.6,
        ocv: curve.ocv_at(0.6).unwrap(),
    };
    let measurement = synthetic(&truth, &evaluator);

    let model = FitBuilder::with_order(RcPairs::One)
        .cell(cell)
        .budget(Budget {
            max_iterations: 150,
            max_unchanged_iterations: 40,
        })
        .build_model()
        .unwrap();
    let outcome = model
        .problem(measurement, truth.initial_soc, truth.ocv)
        .unwrap()
        .optimize(&evaluator, &ParticleSwarm::default(), &CancelToken::new())
        .unwrap();

    assert!(outcome.status.has_parameters(), "status {}", outcome.status);
    let fitted = outcome.parameters.expect("parameters");
    assert!((fitted.r0 - 0.006).abs() < 5e-4, "r0 = {}", fitted.r0);
    assert!(outcome.cost < 1e-4, "cost = {}", outcome.cost);
}

#[test]
fn model_order_decides_vector_length() {
    assert_eq!(RcPairs::try_from(1).unwrap().dimension(), 3);
    assert_eq!(RcPairs::try_from(2).unwrap().dimension(), 5);
    assert!(matches!(
        FitBuilder::new(0),
        Err(FitError::UnsupportedModelOrder { rc_pairs: 0 })
    ));
    assert!(matches!(
        FitBuilder::new(4),
        Err(FitError::UnsupportedModelOrder { rc_pairs: 4 })
    ));
}

struct AlwaysDiverges;

impl ModelEvaluator for AlwaysDiverges {
    fn simulate(&self, _: &TheveninParameters, _: Excitation<'_>) -> EvalResult<Vec<f64>> {
        Err(EvalError::SimulationDiverged {
            reason: "unstable".to_string(),
        })
    }
}

#[test]
fn unstable_model_is_reported_as_failed_pulse() {
    let mut cell = CellConstants::default();
    cell.capacity = amp_hours(5.0);
    let model = FitBuilder::with_order(RcPairs::Two)
        .cell(cell)
        .budget(Budget {
            max_iterations: 20,
            max_unchanged_iterations: 5,
        })
        .build_model()
        .unwrap();
    let (time, current) = pulse_excitation();
    let measurement = Measurement {
        voltage: vec![3.8; time.len()],
        time,
        current,
    };
    let outcome = model
        .problem(measurement, 0.7, 3.8)
        .unwrap()
        .optimize(&AlwaysDiverges, &ParticleSwarm::default(), &CancelToken::new())
        .unwrap();
    assert_eq!(outcome.status, FitStatus::Failed);
    assert_eq!(outcome.iterations, 20);
    assert_eq!(outcome.finite_evaluations, 0);
    assert!(outcome.cost.is_infinite());
}
