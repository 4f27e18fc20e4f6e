use anyhow::{anyhow, bail, Context, Result};
use board_align::config::{load_config, AppConfig};
use board_align::logger;
use board_align::pipeline::{
    DecisionUpdate, NoActuator, Pipeline, PipelineEvent, PipelineState, RejectActuator,
};
use board_align::relay::{available_ports, RelayConnectionState, RelayController};
use board_align::report::{spawn_reporter, JsonLinesReporter, LogSink};
use board_align::source::open_source;
use board_align::DecisionKind;
use crossbeam_channel::{bounded, select, RecvTimeoutError};
use log::{debug, info, warn};
use std::env;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const CONNECT_WAIT: Duration = Duration::from_secs(10);
const CONTINUOUS_PHASE: Duration = Duration::from_millis(200);

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn usage() -> String {
    [
        "Usage:",
        "  board-align <config.json>",
        "  board-align --list-ports",
        "  board-align --relay-test <config.json> [cycles]",
        "  board-align --relay-continuous <config.json> [seconds]",
    ]
    .join("\n")
}

fn run() -> Result<()> {
    logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--list-ports") => list_ports(),
        Some("--relay-test") => {
            let path = args.get(1).ok_or_else(|| anyhow!(usage()))?;
            let cycles = match args.get(2) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("invalid cycle count {raw:?}"))?,
                None => 3,
            };
            relay_test(Path::new(path), cycles)
        }
        Some("--relay-continuous") => {
            let path = args.get(1).ok_or_else(|| anyhow!(usage()))?;
            let seconds = match args.get(2) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("invalid duration {raw:?}"))?,
                None => 10,
            };
            relay_continuous(Path::new(path), Duration::from_secs(seconds))
        }
        Some(path) if !path.starts_with("--") => inspect(Path::new(path)),
        _ => bail!(usage()),
    }
}

fn list_ports() -> Result<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

fn load(path: &Path) -> Result<AppConfig> {
    load_config(path).with_context(|| format!("loading {}", path.display()))
}

fn inspect(path: &Path) -> Result<()> {
    let config = load(path)?;
    let actuator: Arc<dyn RejectActuator> = match &config.relay {
        Some(relay) => Arc::new(
            RelayController::serial(relay.clone()).context("starting relay controller")?,
        ),
        None => {
            info!("no relay configured; rejects are only recorded");
            Arc::new(NoActuator)
        }
    };

    let (defects, reporter) = if config.reporter.enabled {
        let sink = JsonLinesReporter::create(&config.reporter.dir, config.max_defect_images())
            .context("opening defect log")?;
        info!("recording defects to {}", sink.log_path().display());
        spawn_reporter(sink)?
    } else {
        spawn_reporter(LogSink)?
    };

    let pipeline = Pipeline::new(
        config.resolved_pipeline(),
        config.detection_settings(),
        actuator,
        defects,
    )?;
    pipeline.set_roi(config.roi.clone());
    let source = open_source(&config.resolved_source()).context("opening frame source")?;
    let events = pipeline.events();
    pipeline.start(source)?;

    loop {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(PipelineEvent::Started { source }) => info!("inspecting {source}"),
            Ok(PipelineEvent::Decision(update)) => log_decision(&update),
            Ok(PipelineEvent::Status(status)) => warn!("pipeline: {status:?}"),
            Ok(PipelineEvent::Stopped { reason }) => {
                info!("pipeline stopped: {reason:?}");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if pipeline.state() == PipelineState::Stopped {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    pipeline.stop();
    let stats = pipeline.stats();
    drop(pipeline);
    reporter
        .join()
        .map_err(|_| anyhow!("defect reporter panicked"))?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn log_decision(update: &DecisionUpdate) {
    let decision = &update.decision;
    match decision.kind {
        DecisionKind::Misaligned => warn!(
            "frame {}: misaligned at {:.2}° (relay {:?}, {})",
            update.frame.sequence(),
            decision.angle_deg.unwrap_or_default(),
            update.relay,
            update.relay_state
        ),
        DecisionKind::Aligned => debug!(
            "frame {}: aligned at {:.2}°",
            update.frame.sequence(),
            decision.angle_deg.unwrap_or_default()
        ),
        DecisionKind::NoSignal => debug!("frame {}: no signal", update.frame.sequence()),
    }
}

/// Open the configured relay and wait until it is connected.
fn connect_relay(path: &Path) -> Result<RelayController> {
    let config = load(path)?;
    let relay_config = config
        .relay
        .ok_or_else(|| anyhow!("{} has no relay section", path.display()))?;
    let controller = RelayController::serial(relay_config)?;
    if !controller.config().auto_connect {
        controller.connect(&controller.config().port, controller.config().baud_rate)?;
    }

    let states = controller.subscribe();
    let deadline = Instant::now() + CONNECT_WAIT;
    loop {
        match states.recv_deadline(deadline) {
            Ok(RelayConnectionState::Connected) => break,
            Ok(state) => debug!("relay {state}"),
            Err(_) => bail!(
                "relay did not connect within {CONNECT_WAIT:?} (state {})",
                controller.current_state()
            ),
        }
    }
    Ok(controller)
}

fn relay_test(path: &Path, cycles: u32) -> Result<()> {
    let controller = connect_relay(path)?;
    let pulse = controller.config().trigger_duration();
    let done = controller.self_test(cycles, pulse, pulse)?;
    println!("Relay self test: {done}/{cycles} cycle(s) completed");
    controller.release()?;
    Ok(())
}

fn relay_continuous(path: &Path, duration: Duration) -> Result<()> {
    let controller = connect_relay(path)?;
    let done = controller.continuous_test(duration, CONTINUOUS_PHASE, CONTINUOUS_PHASE)?;
    println!("Relay continuous test for {duration:?}; press Enter to stop");

    let (enter_tx, enter_rx) = bounded(1);
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            if matches!(io::stdin().read_line(&mut line), Ok(n) if n > 0) {
                let _ = enter_tx.send(());
            }
        })?;
    let result = select! {
        recv(done) -> result => result,
        recv(enter_rx) -> pressed => {
            // A closed stdin is not a stop request.
            if pressed.is_ok() {
                controller.stop_test()?;
            }
            done.recv()
        }
    };
    let cycles = result.map_err(|_| anyhow!("relay worker stopped"))??;
    println!("Relay continuous test: {cycles} cycle(s) completed");
    controller.release()?;
    Ok(())
}
