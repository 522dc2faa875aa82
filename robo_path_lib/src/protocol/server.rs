//! Robot-side protocol engine: the robot is the TCP server, accepting one
//! planner connection at a time (§4.P, §5).
//!
//! Grounded on the original `PathPlannerComm` accept-loop/send-thread shape
//! (`examples/original_source/src/main/pathplanner/src/PathPlannerComm.cpp`):
//! a dedicated reader thread blocking on `recv`, a dedicated sender thread
//! emitting pose on a timer, and a mutex-guarded path store shared by both.

use crate::error::CoreError;
use crate::map::{MapData, PathCollection, ReferencePoint, RobotShape};
use crate::protocol::framing::LineFramer;
use crate::protocol::message::Message;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Listening,
    Accepting,
    Connected,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

/// Inbound application-layer events the reader thread can't fully resolve
/// itself (it handles `sendPath`/`getState` inline against the shared
/// stores). Everything else is handed to the application via this queue.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    MapData(MapData),
    ReferencePoints(Vec<ReferencePoint>),
    RobotShape(RobotShape),
    Generic { type_name: String, data: serde_json::Value },
}

struct Writer {
    stream: Mutex<TcpStream>,
    connected: Arc<AtomicBool>,
}

impl Writer {
    fn send(&self, msg: &Message) -> Result<(), CoreError> {
        let line = msg.to_json_line();
        let mut stream = self.stream.lock().unwrap();
        match stream.write_all(line.as_bytes()).and_then(|_| stream.flush()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(CoreError::Socket(e))
            }
        }
    }
}

pub struct RobotServer {
    listener: TcpListener,
    state: Mutex<ServerState>,
    path_store: Arc<Mutex<PathCollection>>,
    pose: Arc<Mutex<PoseSnapshot>>,
    outbound_tx: Sender<Message>,
    outbound_rx: Mutex<Receiver<Message>>,
    inbound_tx: Sender<InboundEvent>,
    inbound_rx: Mutex<Receiver<InboundEvent>>,
    moving: Arc<AtomicBool>,
    pose_period: Duration,
    buffer_cap: usize,
}

impl RobotServer {
    pub fn bind(port: u16, pose_period: Duration, buffer_cap: usize) -> Result<Self, CoreError> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        let (outbound_tx, outbound_rx) = mpsc::channel();
        let (inbound_tx, inbound_rx) = mpsc::channel();
        Ok(Self {
            listener,
            state: Mutex::new(ServerState::Listening),
            path_store: Arc::new(Mutex::new(PathCollection::default())),
            pose: Arc::new(Mutex::new(PoseSnapshot {
                x: 0.0,
                y: 0.0,
                heading: 0.0,
            })),
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            moving: Arc::new(AtomicBool::new(false)),
            pose_period,
            buffer_cap,
        })
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap()
    }

    pub fn local_port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    pub fn path_store(&self) -> Arc<Mutex<PathCollection>> {
        self.path_store.clone()
    }

    pub fn set_pose(&self, x: f64, y: f64, heading: f64) {
        *self.pose.lock().unwrap() = PoseSnapshot { x, y, heading };
    }

    pub fn set_moving(&self, moving: bool) {
        self.moving.store(moving, Ordering::SeqCst);
    }

    pub fn notify(&self, msg: Message) {
        let _ = self.outbound_tx.send(msg);
    }

    pub fn try_recv_inbound(&self) -> Option<InboundEvent> {
        match self.inbound_rx.lock().unwrap().try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Accept one connection, run reader+sender threads until it drops, then
    /// return to `Listening`. Blocks; callers typically run this on its own
    /// thread in a loop.
    pub fn accept_once(&self) -> Result<(), CoreError> {
        *self.state.lock().unwrap() = ServerState::Accepting;
        let (stream, addr) = self.listener.accept()?;
        tracing::info!(%addr, "planner connected");
        *self.state.lock().unwrap() = ServerState::Connected;

        let connected = Arc::new(AtomicBool::new(true));
        let writer = Arc::new(Writer {
            stream: Mutex::new(stream.try_clone()?),
            connected: connected.clone(),
        });

        let reader_handle = {
            let stream = stream.try_clone()?;
            let path_store = self.path_store.clone();
            let inbound_tx = self.inbound_tx.clone();
            let writer = writer.clone();
            let connected = connected.clone();
            let pose = self.pose.clone();
            let moving = self.moving.clone();
            let buffer_cap = self.buffer_cap;
            std::thread::spawn(move || {
                reader_loop(
                    stream, path_store, inbound_tx, writer, connected, pose, moving, buffer_cap,
                )
            })
        };

        let sender_handle = {
            let writer = writer.clone();
            let pose = self.pose.clone();
            let connected = connected.clone();
            let pose_period = self.pose_period;
            std::thread::spawn(move || sender_loop(writer, pose, connected, pose_period))
        };

        // Drain outbound lifecycle notifications on this thread while the
        // connection is live.
        while connected.load(Ordering::SeqCst) {
            match self.outbound_rx.lock().unwrap().recv_timeout(Duration::from_millis(50)) {
                Ok(msg) => {
                    let _ = writer.send(&msg);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        connected.store(false, Ordering::SeqCst);
        let _ = reader_handle.join();
        let _ = sender_handle.join();

        *self.state.lock().unwrap() = ServerState::Closing;
        tracing::info!("planner disconnected");
        *self.state.lock().unwrap() = ServerState::Listening;
        Ok(())
    }

    /// Runs `accept_once` forever.
    pub fn run(&self) -> ! {
        loop {
            if let Err(e) = self.accept_once() {
                tracing::warn!(error = %e, "accept failed");
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn reader_loop(
    mut stream: TcpStream,
    path_store: Arc<Mutex<PathCollection>>,
    inbound_tx: Sender<InboundEvent>,
    writer: Arc<Writer>,
    connected: Arc<AtomicBool>,
    pose: Arc<Mutex<PoseSnapshot>>,
    moving: Arc<AtomicBool>,
    buffer_cap: usize,
) {
    let mut framer = LineFramer::new(buffer_cap);
    let mut buf = [0u8; 4096];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "read error");
                break;
            }
        };

        let lines = match framer.feed(&buf[..n]) {
            Ok(lines) => lines,
            Err(CoreError::BufferOverflow) => {
                tracing::warn!("inbound buffer overflow, disconnecting");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "framing error");
                break;
            }
        };

        for line in lines {
            match Message::from_json_str(&line) {
                Ok(msg) => handle_message(
                    msg,
                    &path_store,
                    &inbound_tx,
                    &writer,
                    &pose,
                    &moving,
                ),
                Err(e) => tracing::warn!(error = %e, "malformed message, dropped"),
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

fn handle_message(
    msg: Message,
    path_store: &Arc<Mutex<PathCollection>>,
    inbound_tx: &Sender<InboundEvent>,
    writer: &Arc<Writer>,
    pose: &Arc<Mutex<PoseSnapshot>>,
    moving: &Arc<AtomicBool>,
) {
    match msg {
        Message::SendPath { path } => {
            path_store.lock().unwrap().upsert(path);
        }
        Message::SendMapData { map_data } => {
            let _ = inbound_tx.send(InboundEvent::MapData(map_data));
        }
        Message::SendReferencePoints { reference_points } => {
            let points = reference_points.into_iter().map(ReferencePoint::from).collect();
            let _ = inbound_tx.send(InboundEvent::ReferencePoints(points));
        }
        Message::SetRobotShape { shape } => {
            let _ = inbound_tx.send(InboundEvent::RobotShape(shape));
        }
        Message::GetState => {
            let is_moving = moving.load(Ordering::SeqCst);
            let status = if is_moving { "moving" } else { "idle" };
            let _ = writer.send(&Message::status(status, is_moving));
            let p = *pose.lock().unwrap();
            let _ = writer.send(&Message::robot_pose(p.x, p.y, p.heading));
        }
        Message::Generic { type_name, data } => {
            let _ = inbound_tx.send(InboundEvent::Generic { type_name, data });
        }
        // Messages the robot only ever emits; if received anyway, ignore.
        Message::RobotPose { .. }
        | Message::Status { .. }
        | Message::PathExecutionStarted
        | Message::PathExecutionFinished { .. } => {
            tracing::debug!("dropped robot-originated message type received from planner");
        }
    }
}

fn sender_loop(
    writer: Arc<Writer>,
    pose: Arc<Mutex<PoseSnapshot>>,
    connected: Arc<AtomicBool>,
    period: Duration,
) {
    while connected.load(Ordering::SeqCst) {
        let p = *pose.lock().unwrap();
        if writer.send(&Message::robot_pose(p.x, p.y, p.heading)).is_err() {
            break;
        }
        std::thread::sleep(period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn accept_and_stream_pose_then_path_upsert() {
        let server = Arc::new(
            RobotServer::bind(0, Duration::from_millis(10), BUFFER_CAP_DEFAULT).unwrap(),
        );
        let port = server.local_port();

        let server_clone = server.clone();
        std::thread::spawn(move || {
            let _ = server_clone.accept_once();
        });

        std::thread::sleep(Duration::from_millis(20));
        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();

        // Observe at least one robotPose within 100ms (scenario 3).
        let mut reader = std::io::BufReader::new(client.try_clone().unwrap());
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let msg = Message::from_json_str(line.trim_end()).unwrap();
        assert!(matches!(msg, Message::RobotPose { .. }));

        // Send a path and confirm it lands in the store (scenario 4).
        let send_path = r#"{"type":"sendPath","path":{"name":"P","waypoints":[{"x":0,"y":0,"theta_rad":0,"velocity":1},{"x":1,"y":0,"theta_rad":0,"velocity":1}]}}"#;
        client.write_all(send_path.as_bytes()).unwrap();
        client.write_all(b"\n").unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let store = server.path_store();
        let store = store.lock().unwrap();
        let path = store.by_name("P").unwrap();
        assert_eq!(path.waypoints.len(), 2);
    }

    const BUFFER_CAP_DEFAULT: usize = 1 << 20;
}
