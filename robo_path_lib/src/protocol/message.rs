//! Wire message types for the planner<->robot bus (§4.P).
//!
//! Encoding/decoding is hand-written rather than `#[serde(tag = "type")]`
//! because unknown `type` values must decode into a `Generic` variant
//! instead of failing — the spec requires unknown types to be logged and
//! dropped, not treated as a parse error (§4.P, §7).

use crate::error::CoreError;
use crate::geometry::Point;
use crate::map::{MapData, Path, ReferencePoint, RobotShape};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn missing(field: &str) -> CoreError {
    CoreError::MissingRequiredField(field.to_string())
}

/// The flat reference-point shape used by `sendReferencePoints`, distinct
/// from the nested form embedded in `MapData` (§4.P vs §4.M).
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePointWireNamed {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub has_heading: bool,
    pub heading: f64,
}

impl From<ReferencePointWireNamed> for ReferencePoint {
    fn from(w: ReferencePointWireNamed) -> Self {
        ReferencePoint {
            position: Point::new(w.x, w.y),
            name: w.name,
            has_heading: w.has_heading,
            heading: w.heading,
        }
    }
}

impl Serialize for ReferencePointWireNamed {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            name: String,
            x: f64,
            y: f64,
            #[serde(rename = "hasHeading")]
            has_heading: bool,
            heading: f64,
            heading_deg: f64,
        }
        Wire {
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            has_heading: self.has_heading,
            heading: self.heading,
            heading_deg: self.heading.to_degrees(),
        }
        .serialize(s)
    }
}

impl<'de> Deserialize<'de> for ReferencePointWireNamed {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        parse_reference_point_named(&v).map_err(serde::de::Error::custom)
    }
}

fn parse_reference_point_named(v: &Value) -> Result<ReferencePointWireNamed, CoreError> {
    let name = v
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("name"))?
        .to_string();
    let x = v.get("x").and_then(Value::as_f64).ok_or_else(|| missing("x"))?;
    let y = v.get("y").and_then(Value::as_f64).ok_or_else(|| missing("y"))?;
    let has_heading = v
        .get("hasHeading")
        .and_then(Value::as_bool)
        .ok_or_else(|| missing("hasHeading"))?;
    let heading = if let Some(rad) = v.get("heading").and_then(Value::as_f64) {
        rad
    } else if let Some(deg) = v.get("heading_deg").and_then(Value::as_f64) {
        deg.to_radians()
    } else {
        0.0
    };
    Ok(ReferencePointWireNamed {
        name,
        x,
        y,
        has_heading,
        heading,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    RobotPose {
        x: f64,
        y: f64,
        heading: f64,
    },
    Status {
        status: String,
        moving: bool,
    },
    PathExecutionStarted,
    PathExecutionFinished {
        success: bool,
    },
    SendPath {
        path: Path,
    },
    SendMapData {
        map_data: MapData,
    },
    SendReferencePoints {
        reference_points: Vec<ReferencePointWireNamed>,
    },
    SetRobotShape {
        shape: RobotShape,
    },
    GetState,
    /// Any `{"type": ..., ...}` not matching a known message type. Forwarded
    /// to the application layer by name rather than treated as malformed
    /// (§4.P).
    Generic {
        type_name: String,
        data: Value,
    },
}

impl Message {
    pub fn robot_pose(x: f64, y: f64, heading: f64) -> Self {
        Message::RobotPose { x, y, heading }
    }

    pub fn status(status: impl Into<String>, moving: bool) -> Self {
        Message::Status {
            status: status.into(),
            moving,
        }
    }

    pub fn to_json_line(&self) -> String {
        let mut s = serde_json::to_string(self).expect("Message always serializes");
        s.push('\n');
        s
    }

    pub fn from_json_str(s: &str) -> Result<Self, CoreError> {
        serde_json::from_str(s).map_err(|e| CoreError::MalformedJson(e.to_string()))
    }
}

impl Serialize for Message {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            Message::RobotPose { x, y, heading } => {
                json!({"type": "robotPose", "x": x, "y": y, "heading": heading})
            }
            Message::Status { status, moving } => {
                json!({"type": "status", "status": status, "moving": moving})
            }
            Message::PathExecutionStarted => json!({"type": "pathExecutionStarted"}),
            Message::PathExecutionFinished { success } => {
                json!({"type": "pathExecutionFinished", "success": success})
            }
            Message::SendPath { path } => {
                json!({"type": "sendPath", "path": path})
            }
            Message::SendMapData { map_data } => {
                json!({"type": "sendMapData", "mapData": map_data})
            }
            Message::SendReferencePoints { reference_points } => {
                json!({"type": "sendReferencePoints", "referencePoints": reference_points})
            }
            Message::SetRobotShape { shape } => {
                json!({"type": "setRobotShape", "shape": shape.as_wire_str()})
            }
            Message::GetState => json!({"type": "getState"}),
            Message::Generic { type_name, data } => {
                let mut obj = data.clone();
                if let Value::Object(ref mut map) = obj {
                    map.insert("type".to_string(), Value::String(type_name.clone()));
                } else {
                    obj = json!({"type": type_name, "data": data});
                }
                obj
            }
        };
        value.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Message::from_value(&v).map_err(serde::de::Error::custom)
    }
}

impl Message {
    fn from_value(v: &Value) -> Result<Self, CoreError> {
        let type_name = v
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("type"))?;

        Ok(match type_name {
            "robotPose" => Message::RobotPose {
                x: v.get("x").and_then(Value::as_f64).ok_or_else(|| missing("x"))?,
                y: v.get("y").and_then(Value::as_f64).ok_or_else(|| missing("y"))?,
                heading: v
                    .get("heading")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| missing("heading"))?,
            },
            "status" => Message::Status {
                status: v
                    .get("status")
                    .and_then(Value::as_str)
                    .ok_or_else(|| missing("status"))?
                    .to_string(),
                moving: v
                    .get("moving")
                    .and_then(Value::as_bool)
                    .ok_or_else(|| missing("moving"))?,
            },
            "pathExecutionStarted" => Message::PathExecutionStarted,
            "pathExecutionFinished" => Message::PathExecutionFinished {
                success: v
                    .get("success")
                    .and_then(Value::as_bool)
                    .ok_or_else(|| missing("success"))?,
            },
            "sendPath" => {
                let path = v.get("path").ok_or_else(|| missing("path"))?;
                Message::SendPath {
                    path: serde_json::from_value(path.clone())
                        .map_err(|e| CoreError::MalformedJson(e.to_string()))?,
                }
            }
            "sendMapData" => {
                let map_data = v.get("mapData").ok_or_else(|| missing("mapData"))?;
                Message::SendMapData {
                    map_data: serde_json::from_value(map_data.clone())
                        .map_err(|e| CoreError::MalformedJson(e.to_string()))?,
                }
            }
            "sendReferencePoints" => {
                let arr = v
                    .get("referencePoints")
                    .and_then(Value::as_array)
                    .ok_or_else(|| missing("referencePoints"))?;
                let mut reference_points = Vec::with_capacity(arr.len());
                for item in arr {
                    reference_points.push(parse_reference_point_named(item)?);
                }
                Message::SendReferencePoints { reference_points }
            }
            "setRobotShape" => {
                let shape = v
                    .get("shape")
                    .and_then(Value::as_str)
                    .ok_or_else(|| missing("shape"))?;
                Message::SetRobotShape {
                    shape: RobotShape::from_wire_str(shape)?,
                }
            }
            "getState" => Message::GetState,
            other => {
                let data = v
                    .as_object()
                    .map(|m| {
                        let mut m = m.clone();
                        m.remove("type");
                        Value::Object(m)
                    })
                    .unwrap_or_else(|| Value::Object(Default::default()));
                Message::Generic {
                    type_name: other.to_string(),
                    data,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_pose_round_trips() {
        let m = Message::robot_pose(1.0, 2.0, 0.5);
        let json = serde_json::to_string(&m).unwrap();
        let back = Message::from_json_str(&json).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn unknown_type_becomes_generic() {
        let m = Message::from_json_str(r#"{"type":"customThing","data":{"n":1}}"#).unwrap();
        match m {
            Message::Generic { type_name, data } => {
                assert_eq!(type_name, "customThing");
                assert_eq!(data["data"]["n"], 1);
            }
            _ => panic!("expected Generic"),
        }
    }

    #[test]
    fn missing_type_is_malformed() {
        let err = Message::from_json_str(r#"{"x":1}"#).unwrap_err();
        assert!(matches!(err, CoreError::MalformedJson(_)));
    }

    #[test]
    fn get_state_has_no_payload() {
        let m = Message::from_json_str(r#"{"type":"getState"}"#).unwrap();
        assert_eq!(m, Message::GetState);
    }
}
