//! Planner workstation CLI: the GUI's File-menu and connection operations
//! reimplemented as subcommands, since no GUI toolkit is in scope (§1, §9).

use clap::{Parser, Subcommand};
use robo_path_lib::{
    init_tracing, ClientEvent, MapData, Path, PathCollection, RobotClient, RobotShape,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(about = "Planner workstation CLI: map/path authoring and robot connection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to a robot and print live pose/status until it disconnects.
    Connect {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 5800)]
        port: u16,
    },
    /// Load or save a map file.
    Map {
        #[command(subcommand)]
        action: MapAction,
    },
    /// Load or save a path-collection file.
    Path {
        #[command(subcommand)]
        action: PathAction,
    },
    /// Send a named path from a path-collection file to the robot.
    SendPath {
        name: String,
        #[arg(long, default_value = "paths.json")]
        file: String,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 5800)]
        port: u16,
    },
    /// Send a map file to the robot.
    SendMap {
        #[arg(long, default_value = "map.json")]
        file: String,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 5800)]
        port: u16,
    },
    /// Send a robot footprint shape to the robot.
    SendShape {
        shape: String,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 5800)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum MapAction {
    Load { file: String },
    Save {
        file: String,
        #[arg(long, default_value = "untitled")]
        name: String,
    },
}

#[derive(Subcommand)]
enum PathAction {
    Load { file: String },
    Save { file: String },
}

fn main() -> eyre::Result<()> {
    let _guard = init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Connect { host, port } => connect_and_stream(host, port),
        Command::Map { action } => match action {
            MapAction::Load { file } => load_map(&file),
            MapAction::Save { file, name } => save_map(&file, &name),
        },
        Command::Path { action } => match action {
            PathAction::Load { file } => load_path_collection(&file),
            PathAction::Save { file } => save_path_collection(&file),
        },
        Command::SendPath {
            name,
            file,
            host,
            port,
        } => send_path(&name, &file, host, port),
        Command::SendMap { file, host, port } => send_map(&file, host, port),
        Command::SendShape { shape, host, port } => send_shape(&shape, host, port),
    }
}

fn connect_and_stream(host: String, port: u16) -> eyre::Result<()> {
    let client = Arc::new(RobotClient::new(1 << 20));
    client.connect(host.clone(), port);
    tracing::info!(%host, port, "connecting");

    loop {
        match client.try_recv_event() {
            Some(ClientEvent::Connected) => println!("connected to {host}:{port}"),
            Some(ClientEvent::ConnectionError(e)) => {
                println!("connection error: {e}");
                break;
            }
            Some(ClientEvent::Disconnected) => {
                println!("disconnected");
                break;
            }
            Some(ClientEvent::Received(msg)) => println!("{msg:?}"),
            None => std::thread::sleep(Duration::from_millis(10)),
        }
    }
    Ok(())
}

fn load_map(file: &str) -> eyre::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let map = MapData::from_json(&content)?;
    println!(
        "map \"{}\": gridSize={}, {} lines, {} reference points",
        map.name,
        map.grid_size,
        map.lines.len(),
        map.reference_points.len()
    );
    Ok(())
}

fn save_map(file: &str, name: &str) -> eyre::Result<()> {
    let map = MapData {
        name: name.to_string(),
        grid_size: 1.0,
        lines: Vec::new(),
        reference_points: Vec::new(),
    };
    std::fs::write(file, map.to_json_pretty())?;
    println!("wrote {file}");
    Ok(())
}

fn load_path_collection(file: &str) -> eyre::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let pc = PathCollection::from_json(&content)?;
    println!("{} paths, activePathIndex={}", pc.count(), pc.active_path_index);
    for p in pc.all() {
        println!("  \"{}\": {} waypoints, {:.2}m total", p.name, p.waypoints.len(), p.total_length());
    }
    Ok(())
}

fn save_path_collection(file: &str) -> eyre::Result<()> {
    let pc = PathCollection::default();
    std::fs::write(file, pc.to_json_pretty())?;
    println!("wrote {file}");
    Ok(())
}

fn connect_blocking(client: &Arc<RobotClient>, host: String, port: u16) -> bool {
    client.connect(host, port);
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        match client.try_recv_event() {
            Some(ClientEvent::Connected) => return true,
            Some(ClientEvent::ConnectionError(e)) => {
                println!("connection error: {e}");
                return false;
            }
            _ => std::thread::sleep(Duration::from_millis(10)),
        }
    }
    println!("connect timed out");
    false
}

fn send_path(name: &str, file: &str, host: String, port: u16) -> eyre::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let pc = PathCollection::from_json(&content)?;
    let path: Path = pc.by_name(name)?.clone();

    let client = Arc::new(RobotClient::new(1 << 20));
    if connect_blocking(&client, host, port) {
        client.send_path(path);
        std::thread::sleep(Duration::from_millis(100));
        println!("sent path \"{name}\"");
    }
    Ok(())
}

fn send_map(file: &str, host: String, port: u16) -> eyre::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let map = MapData::from_json(&content)?;

    let client = Arc::new(RobotClient::new(1 << 20));
    if connect_blocking(&client, host, port) {
        client.send_map_data(map);
        std::thread::sleep(Duration::from_millis(100));
        println!("sent map");
    }
    Ok(())
}

fn send_shape(shape: &str, host: String, port: u16) -> eyre::Result<()> {
    let shape = RobotShape::from_wire_str(shape)?;
    let client = Arc::new(RobotClient::new(1 << 20));
    if connect_blocking(&client, host, port) {
        client.set_robot_shape(shape);
        std::thread::sleep(Duration::from_millis(100));
        println!("sent shape");
    }
    Ok(())
}
