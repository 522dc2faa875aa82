//! Map/path data model and its JSON codec (wire format: meters, radians).
//!
//! Unknown fields are ignored on decode; missing optional fields default as
//! documented on each type. Decode failures never return a partial object —
//! every `from_json`/`TryFrom<&str>` here is all-or-nothing.

use crate::error::CoreError;
use crate::geometry::{distance, Point, Segment};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn missing(field: &str) -> CoreError {
    CoreError::MissingRequiredField(field.to_string())
}

fn type_mismatch(field: &str, expected: &str) -> CoreError {
    CoreError::TypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
    }
}

fn get_f64(v: &Value, field: &str) -> Result<f64, CoreError> {
    v.get(field)
        .ok_or_else(|| missing(field))?
        .as_f64()
        .ok_or_else(|| type_mismatch(field, "number"))
}

fn get_str(v: &Value, field: &str) -> Result<String, CoreError> {
    v.get(field)
        .ok_or_else(|| missing(field))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| type_mismatch(field, "string"))
}

fn parse_value(v: &Value) -> Result<Point, CoreError> {
    Ok(Point::new(get_f64(v, "x")?, get_f64(v, "y")?))
}

impl Serialize for Segment {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            start: Point,
            end: Point,
            length: f64,
            angle: f64,
        }
        Wire {
            start: self.start,
            end: self.end,
            length: self.length(),
            angle: self.angle().to_degrees(),
        }
        .serialize(s)
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        let start = v
            .get("start")
            .ok_or_else(|| serde::de::Error::custom("missing field `start`"))?;
        let end = v
            .get("end")
            .ok_or_else(|| serde::de::Error::custom("missing field `end`"))?;
        let start = parse_value(start).map_err(serde::de::Error::custom)?;
        let end = parse_value(end).map_err(serde::de::Error::custom)?;
        Ok(Segment::new(start, end))
    }
}

/// A named anchor optionally carrying an orientation, as embedded in
/// `MapData` (heading on the wire in **degrees** here, per §4.M).
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePoint {
    pub position: Point,
    pub name: String,
    pub has_heading: bool,
    /// Orientation, radians, CCW from +X.
    pub heading: f64,
}

impl Serialize for ReferencePoint {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            position: Point,
            name: String,
            #[serde(rename = "hasHeading")]
            has_heading: bool,
            heading: f64,
        }
        Wire {
            position: self.position,
            name: self.name.clone(),
            has_heading: self.has_heading,
            heading: self.heading.to_degrees(),
        }
        .serialize(s)
    }
}

impl<'de> Deserialize<'de> for ReferencePoint {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        let position = v
            .get("position")
            .ok_or_else(|| serde::de::Error::custom("missing field `position`"))
            .and_then(|p| parse_value(p).map_err(serde::de::Error::custom))?;
        let name = get_str(&v, "name").map_err(serde::de::Error::custom)?;
        let has_heading = v
            .get("hasHeading")
            .and_then(Value::as_bool)
            .ok_or_else(|| serde::de::Error::custom("missing field `hasHeading`"))?;
        let heading_deg = v.get("heading").and_then(Value::as_f64).unwrap_or(0.0);
        Ok(ReferencePoint {
            position,
            name,
            has_heading,
            heading: heading_deg.to_radians(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub name: String,
    #[serde(rename = "gridSize", default = "default_grid_size")]
    pub grid_size: f64,
    pub lines: Vec<Segment>,
    #[serde(rename = "referencePoints")]
    pub reference_points: Vec<ReferencePoint>,
}

fn default_grid_size() -> f64 {
    1.0
}

impl MapData {
    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        serde_json::from_str(s).map_err(|e| CoreError::MalformedJson(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("MapData always serializes")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RobotShape {
    Rectangle,
    Square,
    Triangle,
}

impl RobotShape {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            RobotShape::Rectangle => "rectangle",
            RobotShape::Square => "square",
            RobotShape::Triangle => "triangle",
        }
    }

    pub fn from_wire_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "rectangle" => Ok(RobotShape::Rectangle),
            "square" => Ok(RobotShape::Square),
            "triangle" => Ok(RobotShape::Triangle),
            other => Err(CoreError::TypeMismatch {
                field: "shape".to_string(),
                expected: format!("one of rectangle|square|triangle, got {other}"),
            }),
        }
    }
}

/// Position + heading of the robot plus its footprint dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotPose {
    pub position: Point,
    /// CCW radians, 0 along +X.
    pub heading: f64,
    pub shape: RobotShape,
    pub width: f64,
    pub length: f64,
}

/// An authored pose plus advisory max linear speed the controller passes
/// through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Point,
    /// Radians, CCW from +X.
    pub heading: f64,
    pub velocity: f64,
}

impl Waypoint {
    pub fn new(position: Point, heading: f64, velocity: f64) -> Self {
        Self {
            position,
            heading,
            velocity,
        }
    }
}

impl Serialize for Waypoint {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            x: f64,
            y: f64,
            theta_rad: f64,
            theta: f64,
            velocity: f64,
        }
        Wire {
            x: self.position.x,
            y: self.position.y,
            theta_rad: self.heading,
            theta: self.heading.to_degrees(),
            velocity: self.velocity,
        }
        .serialize(s)
    }
}

impl<'de> Deserialize<'de> for Waypoint {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        let position = parse_value(&v).map_err(serde::de::Error::custom)?;
        let velocity = v.get("velocity").and_then(Value::as_f64).unwrap_or(1.0);

        let heading = if let Some(rad) = v.get("theta_rad").and_then(Value::as_f64) {
            rad
        } else if let Some(deg) = v.get("theta").and_then(Value::as_f64) {
            deg.to_radians()
        } else if let Some(deg) = v.get("heading_deg").and_then(Value::as_f64) {
            deg.to_radians()
        } else {
            v.get("heading").and_then(Value::as_f64).unwrap_or(0.0)
        };

        Ok(Waypoint::new(position, heading, velocity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    pub waypoints: Vec<Waypoint>,
}

fn default_true() -> bool {
    true
}

impl Path {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            visible: true,
            waypoints: Vec::new(),
        }
    }

    pub fn total_length(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|w| distance(&w[0].position, &w[1].position))
            .sum()
    }

    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        serde_json::from_str(s).map_err(|e| CoreError::MalformedJson(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCollection {
    pub version: String,
    pub paths: Vec<Path>,
    #[serde(rename = "activePathIndex", default = "default_active_index")]
    pub active_path_index: i64,
}

fn default_active_index() -> i64 {
    -1
}

impl Default for PathCollection {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: Vec::new(),
            active_path_index: -1,
        }
    }
}

impl PathCollection {
    fn clamp_active_index(&mut self) {
        if self.paths.is_empty() {
            self.active_path_index = -1;
        } else if self.active_path_index >= self.paths.len() as i64 {
            self.active_path_index = self.paths.len() as i64 - 1;
        }
    }

    /// Insert `path`, replacing any existing path with the same name in
    /// place; otherwise append. This is the robot's receive-side semantics
    /// for `sendPath` (§3, Lifecycles).
    pub fn upsert(&mut self, path: Path) {
        if let Some(existing) = self.paths.iter_mut().find(|p| p.name == path.name) {
            *existing = path;
        } else {
            self.paths.push(path);
        }
        self.clamp_active_index();
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Path, CoreError> {
        if index >= self.paths.len() {
            return Err(CoreError::IndexOutOfRange(index));
        }
        let removed = self.paths.remove(index);
        self.clamp_active_index();
        Ok(removed)
    }

    pub fn by_name(&self, name: &str) -> Result<&Path, CoreError> {
        self.paths
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| CoreError::PathNotFound(name.to_string()))
    }

    pub fn by_index(&self, index: usize) -> Result<&Path, CoreError> {
        self.paths.get(index).ok_or(CoreError::IndexOutOfRange(index))
    }

    pub fn count(&self) -> usize {
        self.paths.len()
    }

    pub fn all(&self) -> &[Path] {
        &self.paths
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.active_path_index = -1;
    }

    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        serde_json::from_str(s).map_err(|e| CoreError::MalformedJson(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("PathCollection always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_round_trip_keeps_endpoints() {
        let seg = Segment::new(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        let json = serde_json::to_string(&seg).unwrap();
        let back: Segment = serde_json::from_str(&json).unwrap();
        assert_eq!(seg, back);
        assert!(json.contains("\"length\":1.0"));
    }

    #[test]
    fn waypoint_precedence_theta_rad_first() {
        let v: Waypoint =
            serde_json::from_str(r#"{"x":1,"y":2,"theta_rad":0.5,"theta":999}"#).unwrap();
        assert!((v.heading - 0.5).abs() < 1e-12);
    }

    #[test]
    fn waypoint_legacy_theta_degrees() {
        let v: Waypoint =
            serde_json::from_str(r#"{"x":1,"y":2,"theta":90,"velocity":0.5}"#).unwrap();
        assert!((v.heading - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(v.velocity, 0.5);

        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"theta\":90"));
        let back: Waypoint = serde_json::from_str(&json).unwrap();
        assert!((back.heading - v.heading).abs() < 1e-12);
    }

    #[test]
    fn waypoint_heading_deg_fallback() {
        let v: Waypoint = serde_json::from_str(r#"{"x":0,"y":0,"heading_deg":180}"#).unwrap();
        assert!((v.heading - std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn waypoint_heading_rad_legacy_fallback() {
        let v: Waypoint = serde_json::from_str(r#"{"x":0,"y":0,"heading":1.0}"#).unwrap();
        assert!((v.heading - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reference_point_heading_degrees_on_wire() {
        let rp = ReferencePoint {
            position: Point::new(0.0, 0.0),
            name: "home".to_string(),
            has_heading: true,
            heading: std::f64::consts::PI,
        };
        let json = serde_json::to_string(&rp).unwrap();
        assert!(json.contains("\"heading\":180"));
        let back: ReferencePoint = serde_json::from_str(&json).unwrap();
        assert!((back.heading - rp.heading).abs() < 1e-9);
    }

    #[test]
    fn path_collection_upsert_replaces_by_name() {
        let mut pc = PathCollection::default();
        let mut p1 = Path::new("P");
        p1.waypoints.push(Waypoint::new(Point::new(0.0, 0.0), 0.0, 1.0));
        pc.upsert(p1);
        let mut p2 = Path::new("P");
        p2.waypoints.push(Waypoint::new(Point::new(1.0, 1.0), 0.0, 1.0));
        p2.waypoints.push(Waypoint::new(Point::new(2.0, 2.0), 0.0, 1.0));
        pc.upsert(p2.clone());
        assert_eq!(pc.count(), 1);
        assert_eq!(pc.by_name("P").unwrap(), &p2);
    }

    #[test]
    fn active_index_clamps_on_removal() {
        let mut pc = PathCollection::default();
        pc.upsert(Path::new("a"));
        pc.upsert(Path::new("b"));
        pc.active_path_index = 1;
        pc.remove_at(1).unwrap();
        assert_eq!(pc.active_path_index, 0);
        pc.remove_at(0).unwrap();
        assert_eq!(pc.active_path_index, -1);
    }

    #[test]
    fn map_data_decodes_with_default_grid_size() {
        let json = r#"{"name":"M","lines":[],"referencePoints":[]}"#;
        let m = MapData::from_json(json).unwrap();
        assert_eq!(m.grid_size, 1.0);
    }

    proptest::proptest! {
        #[test]
        fn waypoint_round_trips_through_json(
            x in -1000.0_f64..1000.0,
            y in -1000.0_f64..1000.0,
            heading in -10.0_f64..10.0,
            velocity in 0.0_f64..10.0,
        ) {
            let wp = Waypoint::new(Point::new(x, y), heading, velocity);
            let json = serde_json::to_string(&wp).unwrap();
            let back: Waypoint = serde_json::from_str(&json).unwrap();
            proptest::prop_assert!((back.heading - wp.heading).abs() < 1e-12);
            proptest::prop_assert!((back.position.x - wp.position.x).abs() < 1e-9);
            proptest::prop_assert!((back.position.y - wp.position.y).abs() < 1e-9);
            proptest::prop_assert!((back.velocity - wp.velocity).abs() < 1e-9);
        }

        #[test]
        fn segment_round_trips_through_json(
            sx in -1000.0_f64..1000.0, sy in -1000.0_f64..1000.0,
            ex in -1000.0_f64..1000.0, ey in -1000.0_f64..1000.0,
        ) {
            let seg = Segment::new(Point::new(sx, sy), Point::new(ex, ey));
            let json = serde_json::to_string(&seg).unwrap();
            let back: Segment = serde_json::from_str(&json).unwrap();
            proptest::prop_assert!((back.start.x - seg.start.x).abs() < 1e-9);
            proptest::prop_assert!((back.start.y - seg.start.y).abs() < 1e-9);
            proptest::prop_assert!((back.end.x - seg.end.x).abs() < 1e-9);
            proptest::prop_assert!((back.end.y - seg.end.y).abs() < 1e-9);
        }
    }
}
