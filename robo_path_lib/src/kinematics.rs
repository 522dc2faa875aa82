//! Two-drive-wheel (reduced from three-wheel omni, §9) kinematics and the
//! gyro-dominant pose integrator.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicsConfig {
    pub wheel_radius_cm: f64,
    pub frame_radius_cm: f64,
    pub encoder_pulses_per_rev: f64,
    pub gear_ratio: f64,
    pub max_motor_speed_cm_s: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            wheel_radius_cm: 5.0,
            frame_radius_cm: 15.0,
            encoder_pulses_per_rev: 360.0,
            gear_ratio: 1.0,
            max_motor_speed_cm_s: 40.0,
        }
    }
}

impl KinematicsConfig {
    pub fn distance_per_tick_cm(&self) -> f64 {
        2.0 * PI * self.wheel_radius_cm / (self.encoder_pulses_per_rev * self.gear_ratio)
    }
}

/// Body-frame velocity: linear along the robot's forward axis (cm/s) and
/// angular rate (rad/s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyVelocity {
    pub v_x: f64,
    pub omega: f64,
}

/// `v_l`, `v_r` in cm/s -> body-frame velocity.
pub fn forward_kinematics(v_l: f64, v_r: f64, cfg: &KinematicsConfig) -> BodyVelocity {
    BodyVelocity {
        v_x: (v_r + v_l) / 2.0,
        omega: (v_r - v_l) / (2.0 * cfg.frame_radius_cm),
    }
}

/// Desired body-frame velocity -> normalized wheel PWM in [-1, 1].
pub fn inverse_kinematics(desired: BodyVelocity, cfg: &KinematicsConfig) -> (f64, f64) {
    let v_r = desired.v_x + desired.omega * cfg.frame_radius_cm;
    let v_l = desired.v_x - desired.omega * cfg.frame_radius_cm;
    let pwm_r = (v_r / cfg.max_motor_speed_cm_s).clamp(-1.0, 1.0);
    let pwm_l = (v_l / cfg.max_motor_speed_cm_s).clamp(-1.0, 1.0);
    (pwm_l, pwm_r)
}

/// Wheel speed (cm/s) from an encoder tick delta over `dt` seconds.
/// `dt == 0` yields 0; `dt > 0.5s` (stall/scheduling hiccup) is treated as
/// `dt == 0`.
pub fn wheel_speed_from_ticks(delta_ticks: f64, dt: f64, cfg: &KinematicsConfig) -> f64 {
    if dt <= 0.0 || dt > 0.5 {
        return 0.0;
    }
    2.0 * PI * cfg.wheel_radius_cm * delta_ticks / (cfg.encoder_pulses_per_rev * dt)
}

fn normalize_360(mut deg: f64) -> f64 {
    deg %= 360.0;
    if deg < 0.0 {
        deg += 360.0;
    }
    deg
}

/// Gyro-dominant pose estimator: encoders provide translation only, the IMU
/// provides heading (§4.K, §9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Odometry {
    pub x_cm: f64,
    pub y_cm: f64,
    /// Degrees, [0, 360).
    pub heading_deg: f64,
    offset_deg: f64,
}

impl Odometry {
    pub fn new() -> Self {
        Self {
            x_cm: 0.0,
            y_cm: 0.0,
            heading_deg: 0.0,
            offset_deg: 0.0,
        }
    }

    /// Reset pose so that the reported heading equals `theta0_deg` given the
    /// IMU's current yaw reading.
    pub fn set_pose(&mut self, x_cm: f64, y_cm: f64, theta0_deg: f64, current_yaw_deg: f64) {
        self.x_cm = x_cm;
        self.y_cm = y_cm;
        self.offset_deg = -current_yaw_deg - theta0_deg;
        self.heading_deg = normalize_360(theta0_deg);
    }

    /// One periodic tick: `v_l`, `v_r` in cm/s from this tick's encoder
    /// deltas; `yaw_deg` the IMU's raw reading.
    pub fn tick(&mut self, dt: f64, v_l: f64, v_r: f64, yaw_deg: f64, cfg: &KinematicsConfig) {
        let body = forward_kinematics(v_l, v_r, cfg);
        let heading_rad = self.heading_deg.to_radians();
        let x_dot = body.v_x * heading_rad.cos();
        let y_dot = body.v_x * heading_rad.sin();
        self.x_cm += x_dot * dt;
        self.y_cm += y_dot * dt;
        self.heading_deg = normalize_360(-yaw_deg - self.offset_deg);
    }
}

impl Default for Odometry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> KinematicsConfig {
        KinematicsConfig::default()
    }

    #[test]
    fn forward_inverse_round_trip() {
        let cfg = cfg();
        for (v_x, omega) in [(10.0, 0.0), (5.0, 0.3), (-8.0, -0.1)] {
            let desired = BodyVelocity { v_x, omega };
            let (pwm_l, pwm_r) = inverse_kinematics(desired, &cfg);
            let v_l = pwm_l * cfg.max_motor_speed_cm_s;
            let v_r = pwm_r * cfg.max_motor_speed_cm_s;
            let back = forward_kinematics(v_l, v_r, &cfg);
            assert!((back.v_x - v_x).abs() < 1e-9);
            assert!((back.omega - omega).abs() < 1e-9);
        }
    }

    #[test]
    fn inverse_kinematics_clamps_to_unit_range() {
        let cfg = cfg();
        let (pwm_l, pwm_r) = inverse_kinematics(
            BodyVelocity {
                v_x: 1000.0,
                omega: 5.0,
            },
            &cfg,
        );
        assert!((-1.0..=1.0).contains(&pwm_l));
        assert!((-1.0..=1.0).contains(&pwm_r));
    }

    #[test]
    fn wheel_speed_zero_dt_is_zero() {
        assert_eq!(wheel_speed_from_ticks(100.0, 0.0, &cfg()), 0.0);
    }

    #[test]
    fn wheel_speed_stall_guard() {
        assert_eq!(wheel_speed_from_ticks(100.0, 0.6, &cfg()), 0.0);
    }

    #[test]
    fn wheel_speed_normal_tick() {
        let cfg = cfg();
        let dt = 0.1;
        let v = wheel_speed_from_ticks(cfg.encoder_pulses_per_rev * dt, dt, &cfg);
        assert!((v - 2.0 * PI * cfg.wheel_radius_cm).abs() < 1e-9);
    }

    #[test]
    fn set_pose_then_straight_line_run() {
        let cfg = cfg();
        let mut odo = Odometry::new();
        odo.set_pose(0.0, 0.0, 0.0, 0.0);
        let dt = 0.02;
        let ticks = (1.0 / dt) as usize;
        for _ in 0..ticks {
            odo.tick(dt, 10.0, 10.0, 0.0, &cfg);
        }
        assert!((odo.x_cm - 10.0).abs() < 1e-6);
        assert!(odo.y_cm.abs() < 1e-6);
        assert_eq!(odo.heading_deg, 0.0);
    }

    #[test]
    fn heading_tracks_negated_yaw_after_offset() {
        let mut odo = Odometry::new();
        odo.set_pose(0.0, 0.0, 90.0, 0.0);
        odo.tick(0.02, 0.0, 0.0, -45.0, &cfg());
        assert!((odo.heading_deg - 135.0).abs() < 1e-9);
    }

    proptest::proptest! {
        #[test]
        fn inverse_kinematics_output_always_in_unit_range(
            v_x in -200.0_f64..200.0,
            omega in -10.0_f64..10.0,
        ) {
            let cfg = KinematicsConfig::default();
            let (pwm_l, pwm_r) = inverse_kinematics(BodyVelocity { v_x, omega }, &cfg);
            proptest::prop_assert!((-1.0..=1.0).contains(&pwm_l));
            proptest::prop_assert!((-1.0..=1.0).contains(&pwm_r));
        }

        #[test]
        fn wheel_speed_from_ticks_zero_outside_valid_dt_range(
            delta in -10000.0_f64..10000.0,
            dt in 0.51_f64..5.0,
        ) {
            proptest::prop_assert_eq!(wheel_speed_from_ticks(delta, dt, &KinematicsConfig::default()), 0.0);
        }
    }
}

