//! canpack command line
//! Compiles DBC files into layout tables and decodes/encodes frames against the built-in bus

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context};
use canpack::bus::REGISTRY;
use canpack::can_encoder::FrameBuilder;
use canpack::candump::{frame_to_candump_line, CandumpReader, LoggedFrame};
use canpack::{codegen, result_buffer, schema};
use tracing_subscriber::{prelude::*, EnvFilter};

const USAGE: &str = "\
Usage:
  canpack generate <out.rs> <file.dbc>...   compile DBC files into Rust layout tables
  canpack check <file.dbc>...               compile and validate DBC files
  canpack decode <candump.log>              decode a candump log against the built-in bus
  canpack encode <Message> [Signal=value]...  print a candump line for physical signal values";

fn generate(out: &Path, inputs: &[PathBuf]) -> anyhow::Result<()> {
    let messages = schema::compile_files(inputs)?;
    fs::write(out, codegen::render(&messages)?)
        .with_context(|| format!("failed to write {}", out.display()))?;
    tracing::info!("wrote {} messages to {}", messages.len(), out.display());
    Ok(())
}

fn check(inputs: &[PathBuf]) -> anyhow::Result<()> {
    let messages = schema::compile_files(inputs)?;
    for message in &messages {
        println!(
            "{:#05X} {} ({} bytes, {} signals)",
            message.id,
            message.name,
            message.dlc,
            message.signals.len()
        );
    }
    Ok(())
}

fn decode(log: &Path) -> anyhow::Result<()> {
    let reader = CandumpReader::from_file(log)
        .with_context(|| format!("failed to open {}", log.display()))?;
    let (mut decoded, mut skipped) = (0usize, 0usize);
    for logged in reader {
        let layout = match REGISTRY.lookup(logged.frame.id, logged.frame.dlc) {
            Ok(layout) => layout,
            Err(error) => {
                tracing::debug!("{:.6}: {error}", logged.timestamp);
                skipped += 1;
                continue;
            }
        };
        for signal in result_buffer::allocate(layout, &logged.frame) {
            println!(
                "({:.6}) {} {}.{} = {} {}",
                logged.timestamp, logged.channel, layout.name, signal.name, signal.value, signal.unit
            );
        }
        decoded += 1;
    }
    tracing::info!("decoded {decoded} frames, skipped {skipped}");
    Ok(())
}

fn encode(message: &str, assignments: &[String]) -> anyhow::Result<()> {
    let layout = REGISTRY
        .by_name(message)
        .ok_or_else(|| anyhow!("no message named {message} on the built-in bus"))?;
    let mut builder = FrameBuilder::new(layout);
    for assignment in assignments {
        let (signal, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("expected Signal=value, got {assignment}"))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("invalid value for {signal}"))?;
        builder = builder.set_physical(signal, value)?;
    }
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default();
    let logged = LoggedFrame {
        timestamp,
        channel: "vcan0".to_owned(),
        frame: builder.build(),
    };
    println!("{}", frame_to_candump_line(&logged));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let format_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer)
        .init();

    let args: Vec<String> = env::args().collect();
    let paths = |from: usize| args[from..].iter().map(PathBuf::from).collect::<Vec<_>>();
    match args.get(1).map(String::as_str) {
        Some("generate") if args.len() >= 4 => generate(Path::new(&args[2]), &paths(3)),
        Some("check") if args.len() >= 3 => check(&paths(2)),
        Some("decode") if args.len() == 3 => decode(Path::new(&args[2])),
        Some("encode") if args.len() >= 3 => encode(&args[2], &args[3..]),
        _ => {
            eprintln!("{USAGE}");
            bail!("invalid arguments");
        }
    }
}
