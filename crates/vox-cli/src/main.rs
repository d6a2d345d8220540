//! vox - speak text through the resident voxd synthesis daemon.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use vox_core::logging::{self, LogFormat};
use vox_core::{Sink, SynthesisRequest};

mod client;
mod launcher;
mod playback;
mod sink;

use client::StreamingClient;
use launcher::Launcher;

/// Low-latency streaming TTS client
#[derive(Debug, Parser)]
#[command(name = "vox")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text to speak; reads standard input when omitted
    text: Option<String>,

    /// Voice to synthesize with
    #[arg(short, long, default_value = vox_engine::DEFAULT_VOICE)]
    voice: String,

    /// Write a WAV file instead of playing
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress status output; errors are still printed
    #[arg(short, long)]
    quiet: bool,

    /// Print the daemon's known voices and exit
    #[arg(long)]
    list_voices: bool,

    /// Print daemon status and exit
    #[arg(long)]
    status: bool,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_logging(&args.log_level, LogFormat::Text);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Errors always print, quiet mode included.
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let launcher = Launcher::default_endpoint();

    if args.status {
        match launcher.probe() {
            Ok(report) => println!(
                "voxd: {} ({} voices, idle timeout {} min)",
                report.status,
                report.voices.len(),
                report.idle_timeout_mins
            ),
            Err(_) => println!("voxd: not running"),
        }
        return Ok(());
    }

    if args.list_voices {
        let report = launcher.ensure_running().context("could not reach voxd")?;
        for voice in report.voices {
            println!("{voice}");
        }
        return Ok(());
    }

    let text = match args.text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    if text.trim().is_empty() {
        bail!("no text to speak");
    }

    let report = launcher.ensure_running().context("could not reach voxd")?;
    if !report.voices.iter().any(|v| v == &args.voice) {
        bail!(
            "unknown voice '{}' (available: {})",
            args.voice,
            report.voices.join(", ")
        );
    }

    let sink = match &args.output {
        Some(path) => Sink::File(path.clone()),
        None => Sink::Play,
    };
    let request = SynthesisRequest::new(text, args.voice)?.with_sink(sink);

    client::install_interrupt_handler();
    let client = StreamingClient::new(launcher.base_url().to_string(), args.quiet);
    client.synthesize(&request)?;

    Ok(())
}
