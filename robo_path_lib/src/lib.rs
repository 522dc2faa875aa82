pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod hal;
pub mod kinematics;
pub mod map;
pub mod pid;
pub mod protocol;
pub mod tracing_init;

pub use config::*;
pub use controller::*;
pub use error::*;
pub use geometry::*;
pub use hal::*;
pub use kinematics::*;
pub use map::*;
pub use pid::*;
pub use protocol::*;
pub use tracing_init::*;
