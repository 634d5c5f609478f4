// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! `wharfd`: build images and supervise instances.
//!
//! `wharfd build` assembles an image from a `wharf.toml` build spec (or
//! renders the equivalent container build file). `wharfd run` starts the
//! recorded entry command from a committed image and reports health
//! transitions and process exit.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use wharf_builder::{render_containerfile, ExecInstaller, ImageBuilder};
use wharf_core::{HealthEvent, ImageSpec, SystemClock};
use wharf_daemon::{Config, InstanceEvent, Supervisor};

const DEFAULT_LOG_FILTER: &str = "wharfd=info,wharf_daemon=info,wharf_builder=info";

#[derive(Parser, Debug)]
#[command(name = "wharfd", version, about = "Image builder and process supervisor")]
struct Args {
    /// Log level filter (e.g. "wharf_daemon=debug")
    #[arg(short, long)]
    log_level: Option<String>,

    /// State directory (default: ~/.local/state/wharf)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble an image from a build spec.
    Build {
        /// Path to the wharf.toml build spec
        #[arg(long, default_value = "wharf.toml")]
        spec: PathBuf,

        /// Print the equivalent container build file instead of building
        #[arg(long)]
        render: bool,
    },
    /// Start and supervise an instance from a committed image.
    Run {
        /// Image directory produced by `wharfd build`
        #[arg(long)]
        image: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let config = match &args.state_dir {
        Some(dir) => Config::at(dir.clone()),
        None => Config::load().context("resolve state directory")?,
    };
    config.ensure_dirs().context("create state directories")?;

    // Daemon logs go to a file under the state dir; the terminal only sees
    // warnings and the command's own output.
    let file_appender = tracing_appender::rolling::never(
        &config.state_dir,
        config
            .log_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "daemon.log".into()),
    );
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&filter))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::filter::LevelFilter::WARN),
        )
        .init();

    match args.command {
        Command::Build { spec, render } => build(&config, &spec, render).await,
        Command::Run { image } => run(config, &image).await,
    }
}

async fn build(config: &Config, spec_path: &PathBuf, render: bool) -> anyhow::Result<()> {
    let spec = ImageSpec::from_path(spec_path)
        .with_context(|| format!("read build spec {}", spec_path.display()))?;

    if render {
        let rendered = render_containerfile(&spec)?;
        print!("{rendered}");
        return Ok(());
    }

    let builder = ImageBuilder::new(ExecInstaller::default(), SystemClock, &config.images_dir);
    let meta = builder.build(&spec).await?;
    println!("{}", builder.image_dir(&meta.id).display());
    Ok(())
}

async fn run(config: Config, image_dir: &PathBuf) -> anyhow::Result<()> {
    let supervisor = Supervisor::new(SystemClock, config)?;
    let mut running = supervisor.start(image_dir).await?;
    eprintln!(
        "instance {} (pid {}) serving on port {}",
        running.instance.id, running.instance.pid, running.instance.port
    );

    loop {
        match running.next_event().await {
            InstanceEvent::Health(event) => report_health(&event),
            InstanceEvent::Exited { code } => {
                eprintln!("instance exited with code {code}");
                std::process::exit(code);
            }
        }
    }
}

fn report_health(event: &HealthEvent) {
    match event {
        HealthEvent::ProbingStarted => eprintln!("grace period over, probing"),
        HealthEvent::BecameHealthy => eprintln!("instance healthy"),
        HealthEvent::ProbeFailed { consecutive, failure } => {
            eprintln!("probe failed ({consecutive} consecutive): {failure}")
        }
        HealthEvent::BecameUnhealthy { failures } => {
            eprintln!("instance unhealthy after {failures} consecutive failures")
        }
    }
}
