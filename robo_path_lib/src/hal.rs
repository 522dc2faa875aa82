//! Collaborator interfaces the controller consumes (§6): motor driver,
//! encoders, IMU, digital inputs, monotonic clock. The real embedded I/O
//! layer behind these is out of scope (§1); `SimHardware` is a deterministic
//! stand-in used by the `robot` binary and by tests.

pub trait MotorDriver {
    fn set_left_pwm(&mut self, x: f64);
    fn set_right_pwm(&mut self, x: f64);
    /// The controller only ever commands left/right (§9, "three-wheel omni
    /// reduced to differential"); the back channel is wired for
    /// completeness but unused by §4.C.
    fn set_back_pwm(&mut self, _x: f64) {}
}

pub trait Encoders {
    fn read_left_ticks(&mut self) -> i64;
    fn read_right_ticks(&mut self) -> i64;
}

pub trait Imu {
    /// CCW-positive is implementation-defined; the core reconciles via a
    /// constant offset (§6).
    fn read_yaw_deg(&mut self) -> f64;
}

pub trait DigitalInputs {
    fn stop_asserted(&mut self) -> bool;
    fn start_asserted(&mut self) -> bool;
}

pub trait Clock {
    fn now(&self) -> f64;

    /// Called once per control tick after PWM is commanded. Real hardware
    /// leaves this a no-op (time simply passes); simulated hardware steps
    /// its plant model forward using the last-commanded PWM.
    fn advance(&mut self) {}
}

pub trait Hardware: MotorDriver + Encoders + Imu + DigitalInputs + Clock {}
impl<T: MotorDriver + Encoders + Imu + DigitalInputs + Clock> Hardware for T {}

/// A deterministic simulated rover: commanded PWM is applied instantly as a
/// fraction of `max_motor_speed_cm_s`, ticks accumulate from that speed, and
/// yaw integrates from the commanded angular rate. No noise, no slip.
pub struct SimHardware {
    pub kinematics: crate::kinematics::KinematicsConfig,
    pub tick_period_s: f64,
    left_ticks: i64,
    right_ticks: i64,
    yaw_deg: f64,
    left_pwm: f64,
    right_pwm: f64,
    stop: bool,
    start: bool,
    elapsed_s: f64,
}

impl SimHardware {
    pub fn new(kinematics: crate::kinematics::KinematicsConfig, tick_period_s: f64) -> Self {
        Self {
            kinematics,
            tick_period_s,
            left_ticks: 0,
            right_ticks: 0,
            yaw_deg: 0.0,
            left_pwm: 0.0,
            right_pwm: 0.0,
            stop: false,
            start: false,
            elapsed_s: 0.0,
        }
    }

    pub fn set_stop(&mut self, stop: bool) {
        self.stop = stop;
    }

    pub fn set_start(&mut self, start: bool) {
        self.start = start;
    }

    fn step(&mut self) {
        let v_l = self.left_pwm * self.kinematics.max_motor_speed_cm_s;
        let v_r = self.right_pwm * self.kinematics.max_motor_speed_cm_s;
        let dist_per_tick = self.kinematics.distance_per_tick_cm();
        self.left_ticks += ((v_l * self.tick_period_s) / dist_per_tick).round() as i64;
        self.right_ticks += ((v_r * self.tick_period_s) / dist_per_tick).round() as i64;

        let body = crate::kinematics::forward_kinematics(v_l, v_r, &self.kinematics);
        self.yaw_deg -= body.omega.to_degrees() * self.tick_period_s;
        self.elapsed_s += self.tick_period_s;
    }
}

impl MotorDriver for SimHardware {
    fn set_left_pwm(&mut self, x: f64) {
        self.left_pwm = x;
    }

    fn set_right_pwm(&mut self, x: f64) {
        self.right_pwm = x;
    }
}

impl Encoders for SimHardware {
    fn read_left_ticks(&mut self) -> i64 {
        self.left_ticks
    }

    fn read_right_ticks(&mut self) -> i64 {
        self.right_ticks
    }
}

impl Imu for SimHardware {
    fn read_yaw_deg(&mut self) -> f64 {
        self.yaw_deg
    }
}

impl DigitalInputs for SimHardware {
    fn stop_asserted(&mut self) -> bool {
        self.stop
    }

    fn start_asserted(&mut self) -> bool {
        self.start
    }
}

impl Clock for SimHardware {
    fn now(&self) -> f64 {
        self.elapsed_s
    }

    fn advance(&mut self) {
        self.step();
    }
}
