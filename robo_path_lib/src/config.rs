//! Per-deployment configuration, loaded from TOML (§4.K, §4.C "configurable").

use crate::kinematics::KinematicsConfig;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub linear_tolerance_cm: f64,
    pub angular_tolerance_deg: f64,
    pub linear_slowdown_dist_cm: f64,
    pub max_linear_speed_cm_s: f64,
    pub min_linear_speed_cm_s: f64,
    pub angular_slowdown_dist_deg: f64,
    pub max_angular_speed_rad_s: f64,
    pub min_angular_speed_rad_s: f64,
    /// Forward/reverse direction-choice bias (§9, Open Questions).
    pub direction_bias: f64,
    pub tick_period_s: f64,
    pub settle_period_s: f64,
    pub wheel_pid_kp: f64,
    pub wheel_pid_ki: f64,
    pub wheel_pid_kd: f64,
    pub wheel_pid_out_clamp: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            linear_tolerance_cm: 3.0,
            angular_tolerance_deg: 2.0,
            linear_slowdown_dist_cm: 10.0,
            max_linear_speed_cm_s: 35.0,
            min_linear_speed_cm_s: 7.5,
            angular_slowdown_dist_deg: 10.0,
            max_angular_speed_rad_s: 1.5,
            min_angular_speed_rad_s: 0.2,
            direction_bias: 1.2,
            tick_period_s: 0.02,
            settle_period_s: 0.25,
            wheel_pid_kp: 0.6,
            wheel_pid_ki: 0.3,
            wheel_pid_kd: 0.0,
            wheel_pid_out_clamp: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub port: u16,
    pub pose_period_ms: u64,
    pub buffer_cap_bytes: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            port: 5800,
            pose_period_ms: 50,
            buffer_cap_bytes: 1 << 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct RobotConfig {
    pub kinematics: KinematicsConfig,
    pub controller: ControllerConfig,
    pub protocol: ProtocolConfig,
    pub include_derivative: bool,
}

impl RobotConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RobotConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_table() {
        let cfg = RobotConfig::default();
        assert_eq!(cfg.controller.linear_tolerance_cm, 3.0);
        assert_eq!(cfg.controller.direction_bias, 1.2);
        assert!(!cfg.include_derivative);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = RobotConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: RobotConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.protocol.port, cfg.protocol.port);
    }
}
