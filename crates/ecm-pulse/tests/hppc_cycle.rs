use ecm_ocv::{OcvCurve, SocExtrapolation};
use ecm_pulse::{
    CyclingRecord, DetectionConfig, ExtractionConfig, HppcCycle, PulseConfig, RecordConfig,
};

/// Charge step, rest, discharge step, as logged by the cycler (charge negative).
fn raw_cycle() -> (Vec<f64>, Vec<f64>) {
    let mut current = vec![0.0, 0.0, 0.0, -5.0, -5.0, -5.0, -5.0];
    current.extend(vec![0.0; 10]);
    current.extend([5.0, 5.0, 5.0, 0.0, 0.0]);
    let voltage = current.iter().map(|i| 3.7 - 0.01 * i).collect();
    (voltage, current)
}

#[test]
fn rise_and_fall_of_one_step_pair_are_two_pulses() {
    let (voltage, current) = raw_cycle();
    let record = CyclingRecord::from_raw(1, &voltage, &current, &RecordConfig::default())
        .expect("valid record");
    assert_eq!(record.current()[3], 5.0);

    let curve = OcvCurve::from_table(vec![0.0, 0.5, 1.0], vec![3.0, 3.6, 4.2]).unwrap();
    let config = PulseConfig {
        detection: DetectionConfig {
            current_threshold_a: 0.1,
            min_distance: 5,
        },
        extraction: ExtractionConfig { window_size: 8 },
        soc_policy: SocExtrapolation::Clamp,
    };
    let cycle = HppcCycle::analyze(record, &curve, &config).expect("analysis");
    assert_eq!(cycle.starts(), &[2, 16]);

    let pulses = cycle.pulses().expect("two pulses");
    assert_eq!(pulses.len(), 2);
    assert_eq!(pulses[0].summary().duration, 8);
    // second window is clipped by the end of the record
    assert_eq!(pulses[1].summary().duration, 6);
    assert_eq!(pulses[1].summary().peak_current, 5.0);
    for p in &pulses {
        let s = p.summary();
        assert!(s.voltage_drop > 0.0);
        assert!((0.0..=1.0).contains(&s.initial_soc));
        assert!((0.0..=1.0).contains(&s.final_soc));
    }
}

#[test]
fn default_config_merges_close_edges_into_one_pulse() {
    let (voltage, current) = raw_cycle();
    let record =
        CyclingRecord::from_raw(0, &voltage, &current, &RecordConfig::default()).unwrap();
    let curve = OcvCurve::from_table(vec![0.0, 1.0], vec![3.0, 4.2]).unwrap();
    let cycle = HppcCycle::analyze(record, &curve, &PulseConfig::default()).unwrap();
    assert_eq!(cycle.starts(), &[2]);
    assert_eq!(cycle.pulse(0).unwrap().len(), 22 - 2);
}
