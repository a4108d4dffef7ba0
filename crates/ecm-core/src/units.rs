// ecm-core/src/units.rs

use uom::si::f64::{
    Capacitance as UomCapacitance, ElectricCharge as UomElectricCharge,
    ElectricCurrent as UomElectricCurrent, ElectricPotential as UomElectricPotential,
    ElectricalResistance as UomElectricalResistance, Ratio as UomRatio,
    ThermodynamicTemperature as UomThermodynamicTemperature, Time as UomTime,
};

// Public canonical unit types (SI, f64)
pub type Capacitance = UomCapacitance;
pub type Charge = UomElectricCharge;
pub type Current = UomElectricCurrent;
pub type Voltage = UomElectricPotential;
pub type Resistance = UomElectricalResistance;
pub type Ratio = UomRatio;
pub type Temperature = UomThermodynamicTemperature;
pub type Time = UomTime;

#[inline]
pub fn volts(v: f64) -> Voltage {
    use uom::si::electric_potential::volt;
    Voltage::new::<volt>(v)
}

#[inline]
pub fn amps(v: f64) -> Current {
    use uom::si::electric_current::ampere;
    Current::new::<ampere>(v)
}

#[inline]
pub fn ohms(v: f64) -> Resistance {
    use uom::si::electrical_resistance::ohm;
    Resistance::new::<ohm>(v)
}

#[inline]
pub fn farads(v: f64) -> Capacitance {
    use uom::si::capacitance::farad;
    Capacitance::new::<farad>(v)
}

#[inline]
pub fn amp_hours(v: f64) -> Charge {
    use uom::si::electric_charge::ampere_hour;
    Charge::new::<ampere_hour>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn unitless(v: f64) -> Ratio {
    use uom::si::ratio::ratio;
    Ratio::new::<ratio>(v)
}

/// Raw SI magnitudes, for the numeric kernels that work on plain `f64`.
pub mod raw {
    use super::*;

    #[inline]
    pub fn volts_of(v: Voltage) -> f64 {
        v.get::<uom::si::electric_potential::volt>()
    }

    #[inline]
    pub fn coulombs_of(q: Charge) -> f64 {
        q.get::<uom::si::electric_charge::coulomb>()
    }

    #[inline]
    pub fn amp_hours_of(q: Charge) -> f64 {
        q.get::<uom::si::electric_charge::ampere_hour>()
    }

    #[inline]
    pub fn kelvin_of(t: Temperature) -> f64 {
        t.get::<uom::si::thermodynamic_temperature::kelvin>()
    }

    #[inline]
    pub fn seconds_of(t: Time) -> f64 {
        t.get::<uom::si::time::second>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_smoke() {
        let _v = volts(4.2);
        let _i = amps(5.0);
        let _r = ohms(1e-3);
        let _c = farads(500.0);
        let _t = k(298.15);
        let _dt = s(1.0);
        let _x = unitless(0.5);
    }

    #[test]
    fn amp_hours_convert_to_coulombs() {
        let q = amp_hours(4.85);
        assert!((raw::coulombs_of(q) - 4.85 * 3600.0).abs() < 1e-9);
        assert!((raw::amp_hours_of(q) - 4.85).abs() < 1e-12);
    }
}
