#![allow(unused)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::{env, panic};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use redo_replay::schema::{CatalogRow, CatalogTableKind, SchemaDictionary};
use redo_replay::output::OutputBuffer;
use redo_replay::replay_loop::ReplayLoop;

use redo_replay_cli::config::ConfigLoad;
use redo_replay_cli::sink::Sink;
use redo_replay_cli::source::DirLogSource;
use redo_replay_cli::trace;

#[derive(Debug, Parser)]
#[command(version, author, about = "Streams logical row changes out of a redo-log directory.")]
pub struct Args {
    #[clap(short, long, help = "debug mode: print the resolved config before starting")]
    debug: bool,

    /// Configuration file path, default 'config/redo-replay.yaml'
    #[clap(short = 'c', long = "config", help = "Configuration file path", default_value = "config/redo-replay.yaml")]
    config: String,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,

    #[clap(long, help = "Directory used for fern's rotating log file", default_value = "logs")]
    log_dir: String,

    #[clap(long, help = "Directory holding online (still-being-written) redo logs")]
    online_dir: PathBuf,

    #[clap(long, help = "Directory holding archived redo logs")]
    archived_dir: PathBuf,

    #[clap(long, help = "Database identity recorded in checkpoints", default_value = "default")]
    database_identity: String,

    #[clap(long, help = "JSON file with bootstrap dictionary rows and catalog-table object ids")]
    bootstrap_dictionary: Option<PathBuf>,

    #[clap(long = "start-seq", help = "Begin replay at this sequence, overriding any checkpoint")]
    start_seq: Option<u32>,

    #[clap(long, help = "Write events to this file instead of stdout")]
    output_file: Option<PathBuf>,
}

#[derive(Debug, serde_derive::Deserialize)]
struct BootstrapDictionary {
    rows: Vec<CatalogRow>,
    #[serde(default)]
    catalog_kinds: std::collections::HashMap<u32, CatalogTableKind>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_hooks();

    let args = Args::parse();
    let _guards = trace::init_logging(&args.log_dir, &args.log_level).await?;
    info!("redo-replay-cli starting with args: {args:?}");

    let mut replay_config = ConfigLoad::load(&args.config).into_replay_config();
    if let Some(seq) = args.start_seq {
        replay_config.source_reader.start_seq = Some(seq);
    }
    if args.debug {
        println!("{replay_config:?}");
    }

    let mut dictionary = SchemaDictionary::new(replay_config.flags.schema_keep);
    if let Some(path) = &args.bootstrap_dictionary {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let bootstrap: BootstrapDictionary = serde_json::from_slice(&bytes)?;
        dictionary.register_catalog_objects(bootstrap.catalog_kinds);
        dictionary.load_bootstrap_rows(bootstrap.rows).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    let output = OutputBuffer::new(64);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        info!("received interrupt, finishing current record and shutting down");
        stop_handler.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    let writer_output = output.clone();
    let mut sink = match &args.output_file {
        Some(path) => Sink::file(path.clone())?,
        None => Sink::stdout(),
    };
    let writer = thread::spawn(move || {
        while let Some(message) = writer_output.next_timeout(Duration::from_millis(200)) {
            if let Err(err) = sink.write_message(&message) {
                log::error!("sink write failed: {err}");
                break;
            }
        }
    });

    let start_seq = replay_config.source_reader.start_seq.unwrap_or(1);
    let source = DirLogSource::new(args.online_dir, args.archived_dir);
    let mut loop_ = ReplayLoop::new(source, replay_config, dictionary, output.clone(), args.database_identity, start_seq);
    loop_.resume_from_checkpoint().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let run_result = loop_.run(&stop);
    output.shutdown();
    writer.join().expect("writer thread panicked");

    run_result.map_err(|e| anyhow::anyhow!(e.to_string()))
}

fn setup_panic_hooks() {
    let meta = human_panic::Metadata {
        version: env!("CARGO_PKG_VERSION").into(),
        name: env!("CARGO_PKG_NAME").into(),
        authors: env!("CARGO_PKG_AUTHORS").replace(':', ", ").into(),
        homepage: env!("CARGO_PKG_HOMEPAGE").into(),
    };

    let default_hook = panic::take_hook();

    if env::var("RUST_BACKTRACE").is_err() {
        panic::set_hook(Box::new(move |info: &panic::PanicInfo| {
            default_hook(info);

            let file_path = human_panic::handle_dump(&meta, info);
            human_panic::print_msg(file_path, &meta)
                .expect("human-panic: printing error message to console failed");
        }));
    }
}
