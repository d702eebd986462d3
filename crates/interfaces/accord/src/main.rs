use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use accord_core::Root;
use accord_engine::{event_bus, ArchiveScanner, Event, Reconciler};
use accord_scanner::sim::SimFs;
use accord_scanner::spawn_scanner;
use accord_tui::{spawn_input_pump, Terminal};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Interactive multi-archive reconciliation: review duplicates and absentees, \
             then drive the copies into congruence with the origin."
)]
struct Cli {
    /// Archive roots. The first is the origin, the rest are copies.
    roots: Vec<Utf8PathBuf>,

    /// Use the scripted in-memory tree with staged hashing.
    #[arg(long)]
    sim: bool,

    /// Use the scripted in-memory tree, hashed instantly.
    #[arg(long)]
    sim2: bool,

    /// Write logs to this file (the terminal owns stdout). Also read from
    /// ACCORD_LOG.
    #[arg(long)]
    log: Option<Utf8PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Accept the traditional single-dash spellings of the sim flags.
    let argv = std::env::args().map(|arg| match arg.as_str() {
        "-sim" => "--sim".to_string(),
        "-sim2" => "--sim2".to_string(),
        _ => arg,
    });
    let cli = Cli::parse_from(argv);

    init_logging(&cli)?;

    let (tx, mut rx) = event_bus();
    let sim_mode = cli.sim || cli.sim2;

    let scanners: Vec<(Root, Box<dyn ArchiveScanner>)> = if sim_mode {
        let fs = SimFs::new(tx.clone(), cli.sim);
        let mut scanners = Vec::new();
        for root in SimFs::roots() {
            let handle = fs.scanner(&root).context("failed to start sim scanner")?;
            scanners.push((root, Box::new(handle) as Box<dyn ArchiveScanner>));
        }
        scanners
    } else {
        let roots = resolve_roots(&cli.roots)?;
        let mut scanners = Vec::new();
        for root in roots {
            let handle = spawn_scanner(root.clone(), tx.clone())
                .with_context(|| format!("failed to start scanner for {root}"))?;
            scanners.push((root, Box::new(handle) as Box<dyn ArchiveScanner>));
        }
        scanners
    };

    let mut terminal = Terminal::new().context("failed to initialize terminal")?;

    let (width, height) = terminal.size();
    let _ = tx.blocking_send(Event::ScreenSize { width, height });
    let pump = spawn_input_pump(tx.clone(), terminal.targets(), terminal.stop_flag())
        .context("failed to start input pump")?;

    let reconciler = Reconciler::new(scanners);
    reconciler.run(&mut rx, &mut terminal);

    drop(rx);
    let _ = pump.join();
    Ok(())
}

fn resolve_roots(args: &[Utf8PathBuf]) -> anyhow::Result<Vec<Root>> {
    anyhow::ensure!(
        !args.is_empty(),
        "at least one archive root is required (the first is the origin)"
    );

    let mut seen = HashSet::new();
    let mut roots = Vec::new();
    for arg in args {
        let abs = std::fs::canonicalize(arg.as_std_path())
            .with_context(|| format!("cannot resolve archive root {arg}"))?;
        let abs = Utf8PathBuf::from_path_buf(abs)
            .map_err(|p| anyhow::anyhow!("non-UTF-8 archive root {}", p.display()))?;
        anyhow::ensure!(abs.is_dir(), "archive root {abs} is not a directory");
        anyhow::ensure!(seen.insert(abs.clone()), "archive root {abs} given twice");
        roots.push(Root::new(abs.into_string()));
    }
    Ok(roots)
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let target = cli
        .log
        .clone()
        .or_else(|| std::env::var("ACCORD_LOG").ok().map(Utf8PathBuf::from));
    let Some(path) = target else {
        return Ok(());
    };

    let file = std::fs::File::create(path.as_std_path())
        .with_context(|| format!("cannot open log file {path}"))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
