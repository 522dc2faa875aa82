//! Planner-side protocol engine: the planner is the TCP client with manual
//! reconnect (§4.P, §5). Grounded on `RobotComm`'s non-blocking connect and
//! buffered read loop
//! (`examples/original_source/RobotPathPlanner/src/RobotComm.cpp`).

use crate::error::CoreError;
use crate::protocol::framing::LineFramer;
use crate::protocol::message::Message;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    ConnectionError(String),
    Disconnected,
    Received(Message),
}

pub struct RobotClient {
    state: Arc<Mutex<ClientState>>,
    stream: Arc<Mutex<Option<TcpStream>>>,
    events_tx: Sender<ClientEvent>,
    events_rx: Mutex<Receiver<ClientEvent>>,
    buffer_cap: usize,
}

impl RobotClient {
    pub fn new(buffer_cap: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            state: Arc::new(Mutex::new(ClientState::Disconnected)),
            stream: Arc::new(Mutex::new(None)),
            events_tx,
            events_rx: Mutex::new(events_rx),
            buffer_cap,
        }
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock().unwrap()
    }

    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        match self.events_rx.lock().unwrap().try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Connect to `host:port`. Spawns a connect+reader thread and returns
    /// immediately; success/failure arrive as `ClientEvent`s (non-blocking
    /// per §4.P). Reconnection after a failure is manual: call `connect`
    /// again.
    pub fn connect(self: &Arc<Self>, host: impl Into<String>, port: u16) {
        *self.state.lock().unwrap() = ClientState::Connecting;
        let host = host.into();
        let this = self.clone();
        std::thread::spawn(move || {
            match TcpStream::connect((host.as_str(), port)) {
                Ok(stream) => {
                    *this.state.lock().unwrap() = ClientState::Connected;
                    *this.stream.lock().unwrap() = Some(stream.try_clone().unwrap());
                    let _ = this.events_tx.send(ClientEvent::Connected);
                    this.reader_loop(stream);
                }
                Err(e) => {
                    *this.state.lock().unwrap() = ClientState::Disconnected;
                    let _ = this.events_tx.send(ClientEvent::ConnectionError(e.to_string()));
                }
            }
        });
    }

    fn reader_loop(self: &Arc<Self>, mut stream: TcpStream) {
        let mut framer = LineFramer::new(self.buffer_cap);
        let mut buf = [0u8; 4096];
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => break,
            };
            match framer.feed(&buf[..n]) {
                Ok(lines) => {
                    for line in lines {
                        match Message::from_json_str(&line) {
                            Ok(msg) => {
                                let _ = self.events_tx.send(ClientEvent::Received(msg));
                            }
                            Err(e) => tracing::warn!(error = %e, "malformed message, dropped"),
                        }
                    }
                }
                Err(CoreError::BufferOverflow) => {
                    tracing::warn!("inbound buffer overflow, disconnecting");
                    break;
                }
                Err(_) => break,
            }
        }
        *self.state.lock().unwrap() = ClientState::Disconnected;
        *self.stream.lock().unwrap() = None;
        let _ = self.events_tx.send(ClientEvent::Disconnected);
    }

    /// Fails fast returning `false` with no side effects while disconnected
    /// (§4.P).
    pub fn send(&self, msg: &Message) -> bool {
        let mut guard = self.stream.lock().unwrap();
        let Some(stream) = guard.as_mut() else {
            return false;
        };
        let line = msg.to_json_line();
        if stream.write_all(line.as_bytes()).and_then(|_| stream.flush()).is_err() {
            *guard = None;
            drop(guard);
            *self.state.lock().unwrap() = ClientState::Disconnected;
            let _ = self.events_tx.send(ClientEvent::Disconnected);
            return false;
        }
        true
    }

    pub fn send_path(&self, path: crate::map::Path) -> bool {
        self.send(&Message::SendPath { path })
    }

    pub fn send_map_data(&self, map_data: crate::map::MapData) -> bool {
        self.send(&Message::SendMapData { map_data })
    }

    pub fn set_robot_shape(&self, shape: crate::map::RobotShape) -> bool {
        self.send(&Message::SetRobotShape { shape })
    }

    pub fn get_state(&self) -> bool {
        self.send(&Message::GetState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::server::RobotServer;
    use std::time::Duration;

    #[test]
    fn connect_then_observe_pose_then_disconnect_reconnect() {
        let server = Arc::new(RobotServer::bind(0, Duration::from_millis(10), 1 << 20).unwrap());
        let port = server.local_port();
        let server_clone = server.clone();
        std::thread::spawn(move || loop {
            if server_clone.accept_once().is_err() {
                break;
            }
        });

        let client = Arc::new(RobotClient::new(1 << 20));
        client.connect("127.0.0.1", port);

        let deadline = std::time::Instant::now() + Duration::from_millis(500);
        let mut saw_pose = false;
        while std::time::Instant::now() < deadline {
            if let Some(ClientEvent::Received(Message::RobotPose { .. })) = client.try_recv_event() {
                saw_pose = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(saw_pose);
    }

    #[test]
    fn send_while_disconnected_fails_fast() {
        let client = RobotClient::new(1 << 20);
        assert!(!client.get_state());
    }
}
