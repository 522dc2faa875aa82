//! Robot runtime: binds the protocol server, runs the 20ms control loop, and
//! executes stored paths on request from the application layer (generic
//! `executePath` commands). Hardware is `SimHardware` (§1: real embedded I/O
//! is out of scope).

use clap::Parser;
use robo_path_lib::{
    execute_path, init_tracing, InboundEvent, Message, PointToPointController, RobotConfig,
    RobotServer, SimHardware,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(about = "Robot runtime: protocol server, odometry, control loop, mission glue")]
struct Cli {
    #[arg(long, default_value_t = 5800)]
    port: u16,
    #[arg(long, default_value = "robot.toml")]
    config: String,
}

fn main() -> eyre::Result<()> {
    let _guard = init_tracing();
    let cli = Cli::parse();
    let config = RobotConfig::load_or_default(&cli.config)?;

    let server = Arc::new(RobotServer::bind(
        cli.port,
        Duration::from_millis(config.protocol.pose_period_ms),
        config.protocol.buffer_cap_bytes,
    )?);
    tracing::info!(port = cli.port, "robot listening");

    {
        let server = server.clone();
        std::thread::spawn(move || server.run());
    }

    let mut hw = SimHardware::new(config.kinematics, config.controller.tick_period_s);
    let mut controller =
        PointToPointController::new(config.kinematics, config.controller, config.include_derivative);
    controller.set_pose(&mut hw, 0.0, 0.0, 0.0);

    let tick = Duration::from_secs_f64(config.controller.tick_period_s);
    loop {
        while let Some(event) = server.try_recv_inbound() {
            handle_inbound(event, &server, &mut controller, &mut hw);
        }

        controller.idle_tick(&mut hw);
        server.set_pose(
            controller.odometry.x_cm / 100.0,
            controller.odometry.y_cm / 100.0,
            controller.odometry.heading_deg.to_radians(),
        );

        std::thread::sleep(tick);
    }
}

fn handle_inbound(
    event: InboundEvent,
    server: &Arc<RobotServer>,
    controller: &mut PointToPointController,
    hw: &mut SimHardware,
) {
    match event {
        InboundEvent::MapData(map) => {
            tracing::info!(name = %map.name, lines = map.lines.len(), "map data received");
        }
        InboundEvent::ReferencePoints(points) => {
            tracing::info!(count = points.len(), "reference points received");
        }
        InboundEvent::RobotShape(shape) => {
            tracing::info!(shape = shape.as_wire_str(), "robot shape set");
        }
        InboundEvent::Generic { type_name, data } if type_name == "executePath" => {
            if let Some(name) = data.get("name").and_then(|v| v.as_str()) {
                run_path(server, controller, hw, name);
            } else {
                tracing::warn!("executePath command missing \"name\" field");
            }
        }
        InboundEvent::Generic { type_name, .. } => {
            tracing::debug!(type_name = %type_name, "unhandled generic command, dropped");
        }
    }
}

fn run_path(
    server: &Arc<RobotServer>,
    controller: &mut PointToPointController,
    hw: &mut SimHardware,
    name: &str,
) {
    let path = {
        let store = server.path_store();
        let store = store.lock().unwrap();
        store.by_name(name).cloned()
    };
    let path = match path {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "path lookup failed, available paths logged");
            let store = server.path_store();
            let names: Vec<String> = store.lock().unwrap().all().iter().map(|p| p.name.clone()).collect();
            tracing::info!(?names, "available paths");
            return;
        }
    };

    server.set_moving(true);
    server.notify(Message::status("moving", true));
    let outcome = execute_path(
        controller,
        hw,
        &path,
        || server.notify(Message::PathExecutionStarted),
        |x, y, heading| server.set_pose(x, y, heading),
    );
    server.set_moving(false);
    server.notify(Message::status("idle", false));
    tracing::info!(name, success = outcome.success, "path execution finished");
    server.notify(Message::PathExecutionFinished {
        success: outcome.success,
    });
}
