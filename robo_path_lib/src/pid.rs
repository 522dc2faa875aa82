//! A reusable SISO PID block with integrator clamp and band-limited,
//! by-default-unpublished derivative (§4.D, §9).

#[derive(Debug, Clone, Copy)]
pub struct PidConfig {
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,
    pub lim_min: f64,
    pub lim_max: f64,
    pub lim_int_min: f64,
    pub lim_int_max: f64,
    pub k_sum: f64,
    pub tau: f64,
    pub sample_period: f64,
    /// Whether the computed derivative term is added into the output.
    /// Default `false`, matching observed upstream behavior (§9).
    pub include_derivative: bool,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            k_p: 0.6,
            k_i: 0.3,
            k_d: 0.0,
            lim_min: -0.7,
            lim_max: 0.7,
            lim_int_min: -0.7,
            lim_int_max: 0.7,
            k_sum: 2.0,
            tau: 0.02,
            sample_period: 0.02,
            include_derivative: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pid {
    cfg: PidConfig,
    integral: f64,
    prev_measurement: f64,
    prev_error: f64,
    prev_derivative: f64,
}

impl Pid {
    pub fn new(cfg: PidConfig) -> Self {
        Self {
            cfg,
            integral: 0.0,
            prev_measurement: 0.0,
            prev_error: 0.0,
            prev_derivative: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_measurement = 0.0;
        self.prev_error = 0.0;
        self.prev_derivative = 0.0;
    }

    pub fn calculate(&mut self, measurement: f64, setpoint: f64) -> f64 {
        let setpoint = setpoint.clamp(self.cfg.lim_min, self.cfg.lim_max);
        let error = setpoint - measurement;

        if error == 0.0 && self.prev_error == 0.0 {
            self.integral = 0.0;
        } else {
            self.integral += error;
            let bound = self.cfg.lim_max.abs() * self.cfg.k_sum;
            self.integral = self.integral.clamp(-bound, bound);
        }

        let i_term = (self.cfg.k_i * self.integral).clamp(self.cfg.lim_int_min, self.cfg.lim_int_max);
        let p_term = self.cfg.k_p * error;

        let tau = self.cfg.tau;
        let t = self.cfg.sample_period;
        let derivative = -(2.0 * self.cfg.k_d * (measurement - self.prev_measurement)
            + (2.0 * tau - t) * self.prev_derivative)
            / (2.0 * tau + t);

        let mut out = p_term + i_term;
        if self.cfg.include_derivative {
            out += derivative;
        }
        out = out.clamp(self.cfg.lim_min, self.cfg.lim_max);

        if setpoint == 0.0 {
            out = 0.0;
            self.integral = 0.0;
        }

        self.prev_measurement = measurement;
        self.prev_error = error;
        self.prev_derivative = derivative;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_respects_limits() {
        let mut pid = Pid::new(PidConfig::default());
        for _ in 0..100 {
            let out = pid.calculate(0.0, 0.7);
            assert!(out.abs() <= 0.7 + 1e-12);
        }
    }

    #[test]
    fn zero_setpoint_forces_zero_output_and_integral() {
        let mut pid = Pid::new(PidConfig::default());
        pid.calculate(0.0, 0.7);
        let out = pid.calculate(0.3, 0.0);
        assert_eq!(out, 0.0);
        assert_eq!(pid.integral, 0.0);
    }

    #[test]
    fn integral_accumulates_then_clamps() {
        let cfg = PidConfig {
            k_sum: 2.0,
            lim_max: 0.7,
            ..PidConfig::default()
        };
        let mut pid = Pid::new(cfg);
        for _ in 0..1000 {
            pid.calculate(0.0, 0.7);
        }
        assert!(pid.integral.abs() <= 0.7 * 2.0 + 1e-9);
    }

    #[test]
    fn derivative_excluded_by_default() {
        let mut pid = Pid::new(PidConfig {
            k_d: 5.0,
            k_p: 0.0,
            k_i: 0.0,
            ..PidConfig::default()
        });
        pid.calculate(0.0, 0.5);
        let out = pid.calculate(1.0, 0.5);
        assert_eq!(out, 0.0);
    }

    proptest::proptest! {
        #[test]
        fn output_always_within_configured_limits(
            measurement in -5.0_f64..5.0,
            setpoint in -5.0_f64..5.0,
        ) {
            let mut pid = Pid::new(PidConfig::default());
            for _ in 0..20 {
                let out = pid.calculate(measurement, setpoint);
                proptest::prop_assert!((-0.7 - 1e-9..=0.7 + 1e-9).contains(&out));
            }
        }
    }
}
