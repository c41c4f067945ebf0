//! Telnet bridge: entry point.
//!
//! Runs the bridge service the way a controller's main loop would: a fixed
//! interval drives `handle()`, every completed line is logged and answered
//! with `ok`, and lines typed on stdin are broadcast to all connected
//! clients.  Ctrl+C stops the service and exits.
//!
//! # Usage
//!
//! ```text
//! telnet-bridge [OPTIONS]
//!
//! Options:
//!   --config   <PATH>  Settings file [default: telnet-bridge.toml]
//!   --port     <PORT>  Override the listen port from the settings file
//!   --bind     <IP>    Local address to listen on [default: 0.0.0.0]
//!   --disabled         Start with the service switched off
//!   --tick-ms  <MS>    Poll interval in milliseconds [default: 10]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                | Default              |
//! |-------------------------|----------------------|
//! | `TELNET_BRIDGE_CONFIG`  | `telnet-bridge.toml` |
//! | `TELNET_BRIDGE_PORT`    | from settings file   |
//! | `TELNET_BRIDGE_BIND`    | `0.0.0.0`            |
//! | `TELNET_BRIDGE_TICK_MS` | `10`                 |
//!
//! `RUST_LOG` takes precedence over the file's `log_level`.

use std::io::BufRead;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use telnet_bridge::application::{BridgeEvent, BridgeService, StartOutcome};
use telnet_bridge::domain::{OverriddenSettings, SettingsOverrides, SettingsStore};
use telnet_bridge::infrastructure::{StdTcpListenerFactory, TomlSettingsStore};
use telnet_core::{ListenerFactory, Scheduler, ThreadYield};

/// Reply sent to every client after a line has been taken.
const ACK: &[u8] = b"ok\r\n";

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Multi-client TCP text bridge for a line-oriented controller.
#[derive(Debug, Parser)]
#[command(
    name = "telnet-bridge",
    about = "Multi-client TCP text bridge for a line-oriented controller",
    version
)]
struct Cli {
    /// Path of the TOML settings file.  A missing file means defaults.
    #[arg(long, default_value = "telnet-bridge.toml", env = "TELNET_BRIDGE_CONFIG")]
    config: PathBuf,

    /// Listen port; overrides `[telnet] port`.
    #[arg(long, env = "TELNET_BRIDGE_PORT")]
    port: Option<u16>,

    /// Local IP address to listen on.
    #[arg(long, default_value = "0.0.0.0", env = "TELNET_BRIDGE_BIND")]
    bind: String,

    /// Start with the service disabled, regardless of the settings file.
    #[arg(long)]
    disabled: bool,

    /// Interval between `handle()` ticks, in milliseconds.
    #[arg(long, default_value_t = 10, env = "TELNET_BRIDGE_TICK_MS")]
    tick_ms: u64,
}

impl Cli {
    /// Command-line values that win over the settings file.
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            port: self.port,
            disabled: self.disabled,
        }
    }

    /// # Errors
    ///
    /// Returns an error if `--bind` is not an IP address.
    fn bind_ip(&self) -> anyhow::Result<IpAddr> {
        self.bind
            .parse()
            .with_context(|| format!("invalid bind address: '{}'", self.bind))
    }

    fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

// ── Controller loop ───────────────────────────────────────────────────────────

/// Forwards each line of `reader` into `tx` from a plain OS thread.
///
/// The thread is detached: a read blocked on a terminal or pipe must not keep
/// the process alive after shutdown.  It ends on EOF, on a read error, or
/// once the receiver is gone.
fn spawn_stdin_forwarder<R>(reader: R, tx: mpsc::Sender<String>) -> std::thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for line in reader.lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
        debug!("stdin forwarder finished");
    })
}

/// One pass of the controller loop.
///
/// Ticks the service, answers every completed line with [`ACK`], broadcasts
/// queued output lines, and drains the event channel.
fn pump<F, S, Y>(
    service: &mut BridgeService<F, S, Y>,
    out_rx: &mut mpsc::Receiver<String>,
    events: &mut mpsc::Receiver<BridgeEvent>,
) where
    F: ListenerFactory,
    S: SettingsStore,
    Y: Scheduler,
{
    service.handle();
    while let Some(line) = service.read_line() {
        info!("line: {}", String::from_utf8_lossy(&line));
        service.write(ACK);
    }

    while let Ok(mut text) = out_rx.try_recv() {
        text.push_str("\r\n");
        service.write(text.as_bytes());
    }

    // The service already logs these at info.
    while let Ok(event) = events.try_recv() {
        debug!("event: {event}");
    }
}

/// Runs [`pump`] every `tick` until `running` is cleared, then stops the
/// service.
async fn run<F, S, Y>(
    service: &mut BridgeService<F, S, Y>,
    out_rx: &mut mpsc::Receiver<String>,
    events: &mut mpsc::Receiver<BridgeEvent>,
    running: &AtomicBool,
    tick: Duration,
) where
    F: ListenerFactory,
    S: SettingsStore,
    Y: Scheduler,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while running.load(Ordering::Relaxed) {
        interval.tick().await;
        pump(service, out_rx, events);
    }

    service.stop();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let store = TomlSettingsStore::new(&cli.config);
    let file_config = store
        .load_config()
        .with_context(|| format!("failed to load settings from {}", store.path().display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&file_config.log_level)),
        )
        .init();
    debug!("settings file: {}", store.path().display());

    // The service re-reads the file on every start(); CLI values win.
    let settings = OverriddenSettings::new(store, cli.overrides());
    let factory = StdTcpListenerFactory::new(cli.bind_ip()?);
    let (mut service, mut events) = BridgeService::new(factory, settings, ThreadYield);

    match service.start().context("failed to start telnet bridge")? {
        StartOutcome::Listening { port } => {
            info!("telnet bridge listening on {}:{port}", cli.bind);
        }
        StartOutcome::Disabled => {
            info!("telnet bridge disabled; nothing to do");
            return Ok(());
        }
    }

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Controller output from stdin ──────────────────────────────────────────
    let (out_tx, mut out_rx) = mpsc::channel::<String>(16);
    spawn_stdin_forwarder(std::io::BufReader::new(std::io::stdin()), out_tx);

    run(&mut service, &mut out_rx, &mut events, &running, cli.tick()).await;

    info!("telnet bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use telnet_bridge::domain::{BridgeSettings, StaticSettings};
    use telnet_core::transport::mock::MockNetwork;
    use telnet_core::NoYield;

    use super::*;

    type TestService = BridgeService<MockNetwork, StaticSettings, NoYield>;

    fn started_service() -> (TestService, MockNetwork, mpsc::Receiver<BridgeEvent>) {
        let net = MockNetwork::new();
        let (mut service, events) =
            BridgeService::new(net.clone(), StaticSettings::default(), NoYield);
        service.start().expect("start");
        (service, net, events)
    }

    #[test]
    fn test_cli_defaults() {
        // Arrange / Act
        let cli = Cli::parse_from(["telnet-bridge"]);

        // Assert
        assert_eq!(cli.config, PathBuf::from("telnet-bridge.toml"));
        assert_eq!(cli.port, None);
        assert_eq!(cli.bind, "0.0.0.0");
        assert!(!cli.disabled);
        assert_eq!(cli.tick_ms, 10);
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["telnet-bridge", "--port", "2323"]);

        let overrides = cli.overrides();

        assert_eq!(overrides.port, Some(2323));
        assert!(!overrides.disabled);
    }

    #[test]
    fn test_cli_without_flags_overrides_nothing() {
        let cli = Cli::parse_from(["telnet-bridge"]);
        assert_eq!(cli.overrides(), SettingsOverrides::default());
    }

    #[test]
    fn test_cli_disabled_flag_switches_service_off() {
        let cli = Cli::parse_from(["telnet-bridge", "--disabled"]);
        assert!(!cli.overrides().apply(BridgeSettings::default()).enabled);
    }

    #[test]
    fn test_cli_config_path_override() {
        let cli = Cli::parse_from(["telnet-bridge", "--config", "/etc/grbl/telnet.toml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/grbl/telnet.toml"));
    }

    #[test]
    fn test_bind_ip_parses_loopback() {
        let cli = Cli::parse_from(["telnet-bridge", "--bind", "127.0.0.1"]);
        assert!(cli.bind_ip().expect("ip").is_loopback());
    }

    #[test]
    fn test_invalid_bind_returns_error() {
        let cli = Cli::parse_from(["telnet-bridge", "--bind", "not.an.ip"]);
        assert!(cli.bind_ip().is_err());
    }

    #[test]
    fn test_zero_tick_is_clamped() {
        let cli = Cli::parse_from(["telnet-bridge", "--tick-ms", "0"]);
        assert_eq!(cli.tick(), Duration::from_millis(1));
    }

    // ── Controller loop ───────────────────────────────────────────────────────

    #[test]
    fn test_pump_acknowledges_each_line() {
        // Arrange
        let (mut service, net, mut events) = started_service();
        let (_out_tx, mut out_rx) = mpsc::channel(4);
        let peer = net.connect();
        peer.send(b"$X\r\n");

        // Act
        pump(&mut service, &mut out_rx, &mut events);

        // Assert
        assert_eq!(peer.written(), ACK);
        assert_eq!(service.available(), 0);
    }

    #[test]
    fn test_pump_broadcasts_queued_output_with_crlf() {
        let (mut service, net, mut events) = started_service();
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let peer = net.connect();
        out_tx.try_send("Grbl 1.1h".to_string()).expect("queue");

        pump(&mut service, &mut out_rx, &mut events);

        assert_eq!(peer.written(), b"Grbl 1.1h\r\n");
    }

    #[test]
    fn test_pump_drains_events() {
        let (mut service, _net, mut events) = started_service();
        let (_out_tx, mut out_rx) = mpsc::channel(4);

        pump(&mut service, &mut out_rx, &mut events);

        assert!(events.try_recv().is_err(), "Started must have been drained");
    }

    #[tokio::test]
    async fn test_run_stops_service_once_running_is_cleared() {
        // Arrange
        let (mut service, net, mut events) = started_service();
        let (_out_tx, mut out_rx) = mpsc::channel(4);
        let peer = net.connect();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.store(false, Ordering::Relaxed);
        });

        // Act
        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            run(&mut service, &mut out_rx, &mut events, &running, Duration::from_millis(1)),
        )
        .await;

        // Assert
        assert!(finished.is_ok(), "loop must exit after the flag is cleared");
        assert!(!service.is_listening());
        assert!(peer.is_closed());
        assert_eq!(net.bound_port(), None);
    }

    #[tokio::test]
    async fn test_run_with_cleared_flag_returns_immediately() {
        let (mut service, _net, mut events) = started_service();
        let (_out_tx, mut out_rx) = mpsc::channel(4);
        let running = AtomicBool::new(false);

        run(&mut service, &mut out_rx, &mut events, &running, Duration::from_millis(1)).await;

        assert!(!service.is_listening());
    }

    #[test]
    fn test_stdin_forwarder_sends_each_line_then_finishes() {
        // Arrange
        let (tx, mut rx) = mpsc::channel(4);

        // Act
        let handle = spawn_stdin_forwarder(Cursor::new(b"G0\nG1\n".to_vec()), tx);
        handle.join().expect("forwarder thread");

        // Assert
        assert_eq!(rx.try_recv().ok(), Some("G0".to_string()));
        assert_eq!(rx.try_recv().ok(), Some("G1".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stdin_forwarder_stops_when_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let handle = spawn_stdin_forwarder(Cursor::new(b"a\nb\nc\n".to_vec()), tx);

        assert!(handle.join().is_ok());
    }
}
