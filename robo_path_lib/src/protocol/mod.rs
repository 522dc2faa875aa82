pub mod client;
pub mod framing;
pub mod message;
pub mod server;

pub use client::*;
pub use framing::*;
pub use message::*;
pub use server::*;
