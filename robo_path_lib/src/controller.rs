//! The point-to-point drive controller (§4.C) and mission glue / path
//! execution policy (§4.C "Path execution", I).
//!
//! Grounded on `Movement::PositionDriver`/`angular_align`/`linear_increment`
//! (`examples/original_source/src/main/base_controller/src/Movement.cpp`):
//! same direction-bias constant, same heading-first-then-translate
//! sequencing, same PID gains and output clamp.

use crate::config::ControllerConfig;
use crate::geometry::{distance, normalize_angle_deg, Point};
use crate::hal::Hardware;
use crate::kinematics::{inverse_kinematics, wheel_speed_from_ticks, BodyVelocity, KinematicsConfig, Odometry};
use crate::map::{Path, Waypoint};
use crate::pid::{Pid, PidConfig};

/// Sentinel for `theta_goal`: don't care about final heading.
pub const NO_HEADING_GOAL: f64 = -1.0;

const WHEEL_SPEED_EXIT_EPS_CM_S: f64 = 0.5;
/// Safety bound against a goal that can never be reached while `stop` stays
/// asserted forever; ordinary runs exit far earlier via the tolerance check.
const MAX_TICKS: u64 = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Front,
    Back,
    Left,
    Right,
}

fn signed_speed(error: f64, slowdown: f64, min_speed: f64, max_speed: f64) -> f64 {
    if error == 0.0 {
        return 0.0;
    }
    let magnitude = (error.abs() / slowdown * max_speed).clamp(min_speed, max_speed);
    magnitude * error.signum()
}

pub struct PointToPointController {
    pub kinematics: KinematicsConfig,
    pub ctrl: ControllerConfig,
    pub odometry: Odometry,
    pid_left: Pid,
    pid_right: Pid,
    prev_left_ticks: i64,
    prev_right_ticks: i64,
}

impl PointToPointController {
    pub fn new(kinematics: KinematicsConfig, ctrl: ControllerConfig, include_derivative: bool) -> Self {
        let pid_cfg = PidConfig {
            k_p: ctrl.wheel_pid_kp,
            k_i: ctrl.wheel_pid_ki,
            k_d: ctrl.wheel_pid_kd,
            lim_min: -ctrl.wheel_pid_out_clamp,
            lim_max: ctrl.wheel_pid_out_clamp,
            lim_int_min: -ctrl.wheel_pid_out_clamp,
            lim_int_max: ctrl.wheel_pid_out_clamp,
            k_sum: 2.0,
            tau: 0.02,
            sample_period: ctrl.tick_period_s,
            include_derivative,
        };
        Self {
            kinematics,
            ctrl,
            odometry: Odometry::new(),
            pid_left: Pid::new(pid_cfg),
            pid_right: Pid::new(pid_cfg),
            prev_left_ticks: 0,
            prev_right_ticks: 0,
        }
    }

    pub fn set_pose(&mut self, hw: &mut dyn Hardware, x_cm: f64, y_cm: f64, theta_deg: f64) {
        let yaw = hw.read_yaw_deg();
        self.odometry.set_pose(x_cm, y_cm, theta_deg, yaw);
        self.prev_left_ticks = hw.read_left_ticks();
        self.prev_right_ticks = hw.read_right_ticks();
    }

    /// Reads encoders/IMU and advances the pose integrator by one tick.
    /// Returns this tick's measured wheel speeds (cm/s).
    fn odometry_tick(&mut self, hw: &mut dyn Hardware) -> (f64, f64) {
        let left_ticks = hw.read_left_ticks();
        let right_ticks = hw.read_right_ticks();
        let dn_l = (left_ticks - self.prev_left_ticks) as f64;
        let dn_r = (right_ticks - self.prev_right_ticks) as f64;
        self.prev_left_ticks = left_ticks;
        self.prev_right_ticks = right_ticks;

        let dt = self.ctrl.tick_period_s;
        let v_l = wheel_speed_from_ticks(dn_l, dt, &self.kinematics);
        let v_r = wheel_speed_from_ticks(dn_r, dt, &self.kinematics);
        let yaw = hw.read_yaw_deg();
        self.odometry.tick(dt, v_l, v_r, yaw, &self.kinematics);
        (v_l, v_r)
    }

    /// One control-loop tick with zero commanded PWM, for use between path
    /// executions so pose streaming keeps advancing while the robot is idle.
    pub fn idle_tick(&mut self, hw: &mut dyn Hardware) {
        self.odometry_tick(hw);
        hw.set_left_pwm(0.0);
        hw.set_right_pwm(0.0);
        hw.advance();
    }

    /// Drive from the current pose to `(x_goal, y_goal)` in centimeters,
    /// ending at heading `theta_goal` degrees (or [`NO_HEADING_GOAL`] to
    /// ignore final heading). Blocks until the goal tolerance is met.
    pub fn drive_to_pose(
        &mut self,
        hw: &mut dyn Hardware,
        x_goal: f64,
        y_goal: f64,
        theta_goal: f64,
        mut pose_sink: impl FnMut(f64, f64, f64),
    ) {
        let mut tick: u64 = 0;
        loop {
            let (v_l_meas, v_r_meas) = self.odometry_tick(hw);

            let dx = x_goal - self.odometry.x_cm;
            let dy = y_goal - self.odometry.y_cm;
            let rho0 = (dx * dx + dy * dy).sqrt();
            let phi0 = dy.atan2(dx).to_degrees();

            let ref_heading = if theta_goal == NO_HEADING_GOAL {
                self.odometry.heading_deg
            } else {
                theta_goal
            };
            let forward_err = normalize_angle_deg(ref_heading - phi0).abs();
            let backward_err = normalize_angle_deg(ref_heading - phi0 + 180.0).abs();
            let reverse = forward_err > self.ctrl.direction_bias * backward_err;

            let (rho, phi) = if reverse {
                (-rho0, normalize_angle_deg(phi0 + 180.0))
            } else {
                (rho0, phi0)
            };

            let translating_done = rho.abs() < self.ctrl.linear_tolerance_cm;
            let target_heading = if !translating_done {
                phi
            } else if theta_goal != NO_HEADING_GOAL {
                theta_goal
            } else {
                self.odometry.heading_deg
            };
            let dtheta = normalize_angle_deg(target_heading - self.odometry.heading_deg);

            let mut angular_setpoint = signed_speed(
                dtheta,
                self.ctrl.angular_slowdown_dist_deg,
                self.ctrl.min_angular_speed_rad_s,
                self.ctrl.max_angular_speed_rad_s,
            );
            let mut linear_setpoint = signed_speed(
                rho,
                self.ctrl.linear_slowdown_dist_cm,
                self.ctrl.min_linear_speed_cm_s,
                self.ctrl.max_linear_speed_cm_s,
            );
            if dtheta.abs() > 10.0 {
                linear_setpoint = 0.0;
            }

            let within_tolerance =
                rho.abs() < self.ctrl.linear_tolerance_cm && dtheta.abs() < self.ctrl.angular_tolerance_deg;
            if within_tolerance {
                linear_setpoint = 0.0;
                angular_setpoint = 0.0;
            }

            let (pwm_l_sp, pwm_r_sp) = inverse_kinematics(
                BodyVelocity {
                    v_x: linear_setpoint,
                    omega: angular_setpoint,
                },
                &self.kinematics,
            );
            let pwm_l_meas = (v_l_meas / self.kinematics.max_motor_speed_cm_s).clamp(-1.0, 1.0);
            let pwm_r_meas = (v_r_meas / self.kinematics.max_motor_speed_cm_s).clamp(-1.0, 1.0);
            let mut out_l = self.pid_left.calculate(pwm_l_meas, pwm_l_sp);
            let mut out_r = self.pid_right.calculate(pwm_r_meas, pwm_r_sp);

            if hw.stop_asserted() {
                out_l = 0.0;
                out_r = 0.0;
                self.pid_left.reset();
                self.pid_right.reset();
            }
            hw.set_left_pwm(out_l);
            hw.set_right_pwm(out_r);

            if tick.is_multiple_of(10) {
                pose_sink(
                    self.odometry.x_cm / 100.0,
                    self.odometry.y_cm / 100.0,
                    self.odometry.heading_deg.to_radians(),
                );
            }

            hw.advance();
            tick += 1;

            let wheels_stopped =
                v_l_meas.abs() < WHEEL_SPEED_EXIT_EPS_CM_S && v_r_meas.abs() < WHEEL_SPEED_EXIT_EPS_CM_S;
            if within_tolerance && wheels_stopped {
                break;
            }
            if tick >= MAX_TICKS {
                tracing::warn!("drive_to_pose exceeded max tick bound, giving up");
                break;
            }
        }

        settle(hw, self.ctrl.settle_period_s, self.ctrl.tick_period_s);
    }

    /// Drives `omega` toward an externally supplied wall-angle error
    /// (degrees) until three consecutive ticks land within 3 degrees.
    pub fn angular_align(&mut self, hw: &mut dyn Hardware, mut wall_angle_error_deg: impl FnMut() -> f64) {
        let mut consecutive_in_tolerance = 0u32;
        loop {
            self.odometry_tick(hw);
            let err = wall_angle_error_deg();
            let setpoint = signed_speed(
                err,
                self.ctrl.angular_slowdown_dist_deg,
                self.ctrl.min_angular_speed_rad_s,
                self.ctrl.max_angular_speed_rad_s,
            );
            let (_, pwm_r_sp) = inverse_kinematics(
                BodyVelocity {
                    v_x: 0.0,
                    omega: setpoint,
                },
                &self.kinematics,
            );
            let (pwm_l_sp, _) = inverse_kinematics(
                BodyVelocity {
                    v_x: 0.0,
                    omega: setpoint,
                },
                &self.kinematics,
            );
            hw.set_left_pwm(pwm_l_sp);
            hw.set_right_pwm(pwm_r_sp);
            hw.advance();

            if err.abs() < 3.0 {
                consecutive_in_tolerance += 1;
            } else {
                consecutive_in_tolerance = 0;
            }
            if consecutive_in_tolerance >= 3 {
                break;
            }
        }
        hw.set_left_pwm(0.0);
        hw.set_right_pwm(0.0);
        hw.advance();
    }

    /// Computes a goal pose `distance` cm along `direction` (rotated by the
    /// current heading) and drives to it.
    pub fn linear_increment(
        &mut self,
        hw: &mut dyn Hardware,
        distance_cm: f64,
        direction: Direction,
        pose_sink: impl FnMut(f64, f64, f64),
    ) {
        let direction_offset_deg = match direction {
            Direction::Front => 0.0,
            Direction::Back => 180.0,
            Direction::Left => 90.0,
            Direction::Right => -90.0,
        };
        let angle = (self.odometry.heading_deg + direction_offset_deg).to_radians();
        let x_goal = self.odometry.x_cm + distance_cm * angle.cos();
        let y_goal = self.odometry.y_cm + distance_cm * angle.sin();
        self.drive_to_pose(hw, x_goal, y_goal, NO_HEADING_GOAL, pose_sink);
    }
}

fn settle(hw: &mut dyn Hardware, settle_period_s: f64, tick_period_s: f64) {
    hw.set_left_pwm(0.0);
    hw.set_right_pwm(0.0);
    let ticks = (settle_period_s / tick_period_s).round().max(1.0) as u64;
    for _ in 0..ticks {
        hw.advance();
    }
}

/// Outcome of executing a stored path (§4.C "Path execution").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
}

/// Finds the nearest waypoint to `pose` and the traversal order to visit the
/// rest of the path, per the nearest-waypoint selection policy.
pub fn plan_execution_order(path: &Path, pose: Point) -> Vec<usize> {
    let n = path.waypoints.len();
    if n == 0 {
        return Vec::new();
    }
    let nearest = (0..n)
        .min_by(|&a, &b| {
            let da = distance(&pose, &path.waypoints[a].position);
            let db = distance(&pose, &path.waypoints[b].position);
            da.partial_cmp(&db).unwrap()
        })
        .unwrap();

    if nearest == 0 {
        return (0..n).collect();
    }
    if nearest == n - 1 {
        return (0..n).rev().collect();
    }

    let d_prev = distance(&pose, &path.waypoints[nearest - 1].position);
    let d_next = distance(&pose, &path.waypoints[nearest + 1].position);
    if d_prev < d_next {
        let mut order: Vec<usize> = (0..=nearest).rev().collect();
        order.extend(1..n);
        order
    } else {
        (nearest..n).collect()
    }
}

/// Executes `path` from the controller's current pose: finds the nearest
/// waypoint, drives through the remainder in the chosen direction, checking
/// the stop input between waypoints, and reports the outcome. `on_started`
/// and `on_waypoint` are invoked for protocol lifecycle notifications and
/// periodic pose streaming respectively.
pub fn execute_path(
    controller: &mut PointToPointController,
    hw: &mut dyn Hardware,
    path: &Path,
    mut on_started: impl FnMut(),
    mut pose_sink: impl FnMut(f64, f64, f64),
) -> ExecutionOutcome {
    let current = Point::new(controller.odometry.x_cm / 100.0, controller.odometry.y_cm / 100.0);
    let order = plan_execution_order(path, current);

    on_started();

    for idx in order {
        if hw.stop_asserted() {
            return ExecutionOutcome { success: false };
        }
        let wp: Waypoint = path.waypoints[idx];
        controller.drive_to_pose(
            hw,
            wp.position.x * 100.0,
            wp.position.y * 100.0,
            wp.heading.to_degrees(),
            &mut pose_sink,
        );
    }

    ExecutionOutcome { success: true }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SimHardware;

    fn controller_with_sim() -> (PointToPointController, SimHardware) {
        let kin = KinematicsConfig::default();
        let ctrl = ControllerConfig::default();
        let hw = SimHardware::new(kin, ctrl.tick_period_s);
        (PointToPointController::new(kin, ctrl, false), hw)
    }

    #[test]
    fn drive_to_pose_reaches_goal_forward() {
        let (mut ctl, mut hw) = controller_with_sim();
        ctl.set_pose(&mut hw, 0.0, 0.0, 0.0);
        ctl.drive_to_pose(&mut hw, 100.0, 0.0, NO_HEADING_GOAL, |_, _, _| {});
        assert!((ctl.odometry.x_cm - 100.0).abs() < ctl.ctrl.linear_tolerance_cm);
        assert!(ctl.odometry.y_cm.abs() < ctl.ctrl.linear_tolerance_cm);
    }

    #[test]
    fn drive_to_pose_reaches_goal_with_heading() {
        let (mut ctl, mut hw) = controller_with_sim();
        ctl.set_pose(&mut hw, 0.0, 0.0, 0.0);
        ctl.drive_to_pose(&mut hw, 50.0, 50.0, 90.0, |_, _, _| {});
        let dist = ((ctl.odometry.x_cm - 50.0).powi(2) + (ctl.odometry.y_cm - 50.0).powi(2)).sqrt();
        assert!(dist < ctl.ctrl.linear_tolerance_cm);
        let heading_err = normalize_angle_deg(90.0 - ctl.odometry.heading_deg).abs();
        assert!(heading_err < ctl.ctrl.angular_tolerance_deg);
    }

    #[test]
    fn nearest_waypoint_selection_middle_forward() {
        let mut path = Path::new("p");
        for x in 0..5 {
            path.waypoints.push(Waypoint::new(Point::new(x as f64, 0.0), 0.0, 1.0));
        }
        let order = plan_execution_order(&path, Point::new(2.4, 0.0));
        assert_eq!(order[0], 2);
        assert_eq!(order, vec![2, 3, 4]);
    }

    #[test]
    fn nearest_waypoint_selection_prefers_backward_sweep() {
        let mut path = Path::new("p");
        for x in 0..5 {
            path.waypoints.push(Waypoint::new(Point::new(x as f64, 0.0), 0.0, 1.0));
        }
        let order = plan_execution_order(&path, Point::new(1.6, 0.0));
        assert_eq!(order, vec![2, 1, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn execute_path_forward_emits_lifecycle_and_reaches_end() {
        let (mut ctl, mut hw) = controller_with_sim();
        ctl.set_pose(&mut hw, 0.0, 0.0, 0.0);
        let mut path = Path::new("P");
        path.waypoints.push(Waypoint::new(Point::new(0.0, 0.0), 0.0, 1.0));
        path.waypoints.push(Waypoint::new(Point::new(1.0, 0.0), 0.0, 1.0));

        let mut started = 0;
        let outcome = execute_path(&mut ctl, &mut hw, &path, || started += 1, |_, _, _| {});
        assert_eq!(started, 1);
        assert!(outcome.success);
        assert!((ctl.odometry.x_cm - 100.0).abs() < ctl.ctrl.linear_tolerance_cm);
    }

    #[test]
    fn execute_path_stop_between_waypoints_fails() {
        let (mut ctl, mut hw) = controller_with_sim();
        ctl.set_pose(&mut hw, 0.0, 0.0, 0.0);
        hw.set_stop(true);
        let mut path = Path::new("P");
        path.waypoints.push(Waypoint::new(Point::new(0.0, 0.0), 0.0, 1.0));
        path.waypoints.push(Waypoint::new(Point::new(1.0, 0.0), 0.0, 1.0));

        let outcome = execute_path(&mut ctl, &mut hw, &path, || {}, |_, _, _| {});
        assert!(!outcome.success);
    }
}
