//! Campus controller entry point.
//!
//! Reads packet-in events as JSON lines from a file or stdin, runs each one
//! through the controller, and writes every resulting flow-mod to stdout as
//! one JSON line: `{"dpid": 3, "flow_mod": {...}}`.

use anyhow::{Context, Result};
use campus_controller::audit::{init_logging, init_logging_pretty};
use campus_controller::config::DEFAULT_CONFIG_PATH;
use campus_controller::{
    audit_log, AuditCategory, AuditOutcome, AuditRecord, CampusConfig, Controller, FlowSink,
    PacketIn,
};
use campus_openflow::{DatapathId, FlowMod};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Campus SDN controller
#[derive(Parser, Debug)]
#[command(name = "campus-controller")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Topology and policy file; the built-in campus is used if the default
    /// file does not exist
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Packet-in events, one JSON object per line (default: stdin)
    #[arg(short = 'e', long)]
    events: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Serialize)]
struct FlowModLine {
    dpid: DatapathId,
    flow_mod: FlowMod,
}

/// Hands flow-mods to the stdout writer task.
struct ChannelSink {
    tx: mpsc::UnboundedSender<FlowModLine>,
}

impl FlowSink for ChannelSink {
    fn send_flow_mod(&self, dpid: DatapathId, flow_mod: &FlowMod) -> std::result::Result<(), String> {
        self.tx
            .send(FlowModLine {
                dpid,
                flow_mod: flow_mod.clone(),
            })
            .map_err(|_| "flow-mod writer has stopped".to_string())
    }
}

#[derive(Debug, Default)]
struct Summary {
    events: u64,
    flow_mods: u64,
    rejected: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.log_format {
        LogFormat::Json => init_logging(&args.log_level),
        LogFormat::Pretty => init_logging_pretty(&args.log_level),
    }

    info!(version = env!("CARGO_PKG_VERSION"), "campus-controller: starting");
    audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "campus-controller", "start")
        .with_outcome(AuditOutcome::Success));

    let result = run(args).await;

    match &result {
        Ok(summary) => {
            info!(
                events = summary.events,
                flow_mods = summary.flow_mods,
                rejected = summary.rejected,
                "campus-controller: exiting normally"
            );
            audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "campus-controller", "stop")
                .with_outcome(AuditOutcome::Success));
        }
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "campus-controller: exiting with error");
            audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "campus-controller", "stop")
                .with_error(message));
        }
    }

    result.map(|_| ())
}

async fn run(args: Args) -> Result<Summary> {
    let config = match &args.config {
        Some(path) => CampusConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => CampusConfig::load_or_default(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("loading configuration from {}", DEFAULT_CONFIG_PATH))?,
    };
    let controller = Controller::from_config(&config).context("building switch tables")?;
    info!(
        switches = controller.topology().len(),
        policy_rules = controller.policy().len(),
        "campus-controller: topology loaded"
    );

    let summary = match &args.events {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening events file {}", path.display()))?;
            pump(BufReader::new(file), &controller, tokio::io::stdout()).await?
        }
        None => pump(BufReader::new(tokio::io::stdin()), &controller, tokio::io::stdout()).await?,
    };

    Ok(summary)
}

/// Runs every event through the controller while a writer drains the
/// resulting flow-mods to `out`.
///
/// The writer is always run to completion, so flow-mods produced before a
/// read error still reach `out`. A read error wins over a write error.
async fn pump<R, W>(reader: R, controller: &Controller, out: W) -> Result<Summary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let events = async move {
        // The sink is dropped when this future finishes, which ends the writer.
        let sink = ChannelSink { tx };
        process_events(reader, controller, &sink).await
    };

    let (processed, written) = tokio::join!(events, write_flow_mods(rx, out));
    let summary = processed?;
    let written = written?;
    debug!(written, "campus-controller: flow-mod stream closed");

    Ok(summary)
}

async fn process_events<R>(reader: R, controller: &Controller, sink: &ChannelSink) -> Result<Summary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = Summary::default();
    let mut line_no = 0u64;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading packet-in events")?,
            _ = tokio::signal::ctrl_c() => {
                info!("campus-controller: received shutdown signal");
                break;
            }
        };
        let Some(line) = line else { break };
        line_no += 1;

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event: PacketIn = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "campus-controller: skipping invalid event");
                summary.rejected += 1;
                continue;
            }
        };

        summary.events += 1;
        match controller.handle(&event, sink) {
            Ok(disposition) if disposition.flow_mod.is_some() => summary.flow_mods += 1,
            Ok(_) => {}
            Err(_) => summary.rejected += 1,
        }
    }

    Ok(summary)
}

async fn write_flow_mods<W>(mut rx: mpsc::UnboundedReceiver<FlowModLine>, mut out: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(line) = rx.recv().await {
        let mut json = serde_json::to_vec(&line).context("encoding flow-mod")?;
        json.push(b'\n');
        out.write_all(&json).await.context("writing flow-mod")?;
        written += 1;
    }
    out.flush().await.context("flushing flow-mods")?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_openflow::{ArpHeader, FrameBuilder, PortNo};
    use campus_types::{Ipv4Address, MacAddress};
    use pretty_assertions::assert_eq;

    fn arp_event(dpid: u64) -> String {
        let frame = FrameBuilder::new(MacAddress::new([0, 0, 0, 0, 0, 1]), MacAddress::BROADCAST)
            .arp(
                ArpHeader::REQUEST,
                Ipv4Address::new(20, 2, 1, 10),
                MacAddress::ZERO,
                Ipv4Address::new(30, 1, 4, 66),
            );
        let event = PacketIn::new(DatapathId::new(dpid), PortNo::new(2), frame);
        serde_json::to_string(&event).unwrap()
    }

    fn controller() -> Controller {
        Controller::from_config(&CampusConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_pump_writes_one_line_per_flow_mod() {
        let input = format!("{}\n# comment\n\nnot json\n{}\n", arp_event(1), arp_event(3));
        let mut out = Vec::new();

        let summary = pump(input.as_bytes(), &controller(), &mut out).await.unwrap();
        assert_eq!(
            (summary.events, summary.flow_mods, summary.rejected),
            (2, 2, 1)
        );

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["dpid"], serde_json::json!(1));
        assert_eq!(lines[1]["dpid"], serde_json::json!(3));
    }

    #[tokio::test]
    async fn test_pump_flushes_flow_mods_before_read_error() {
        // The second line is not valid UTF-8, so reading it fails.
        let mut input = arp_event(3).into_bytes();
        input.extend_from_slice(b"\n\xff\xfe\n");
        let mut out = Vec::new();

        let err = pump(input.as_slice(), &controller(), &mut out)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("reading packet-in events"));

        let written = String::from_utf8(out).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.starts_with(r#"{"dpid":3,"#));
    }
}
