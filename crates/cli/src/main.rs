use std::path::{Path, PathBuf};

use adjdec::api::{run_cluster, ExactRotation, RunCfg, SearchMode, Threads};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

mod io;
mod provenance;

use provenance::Provenance;

#[derive(Parser)]
#[command(name = "adjdec")]
#[command(about = "Adjacency decomposition with symmetry-class bookkeeping")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Enumerate facet (or vertex) classes of a problem file
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Worker threads per node; defaults to the number of CPUs
        #[arg(long)]
        threads: Option<usize>,
        /// Simulated nodes (in-process transport)
        #[arg(long, default_value_t = 1)]
        nodes: usize,
        #[arg(long, value_enum, default_value_t = Mode::Facet)]
        mode: Mode,
    },
    /// Print a small provenance JSON block, optionally summarizing a result
    Report {
        #[arg(long)]
        result: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Facet,
    Vertex,
}

impl From<Mode> for SearchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Facet => SearchMode::Facet,
            Mode::Vertex => SearchMode::Vertex,
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    SubscriberBuilder::default()
        .with_target(false)
        .with_env_filter(filter)
        .init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Run {
            input,
            out,
            threads,
            nodes,
            mode,
        } => {
            let cfg = RunCfg {
                threads: threads.map_or(Threads::Auto, Threads::Fixed),
                mode: mode.into(),
            };
            run(&input, &out, nodes, cfg)
        }
        Action::Report { result } => report(result.as_deref()),
    }
}

fn run(input: &Path, out: &Path, nodes: usize, cfg: RunCfg) -> Result<()> {
    tracing::info!(input = %input.display(), out = %out.display(), nodes, mode = %cfg.mode, "run");
    let problem = io::load_problem(input)?;
    let threads = cfg.threads.resolve()?;
    let rows = run_cluster(nodes, &problem, &ExactRotation, &cfg)
        .context("adjacency decomposition failed")?;

    let params = json!({
        "mode": cfg.mode.to_string(),
        "threads": threads,
        "nodes": nodes,
        "maps": problem.maps.len(),
        "deterministic": !problem.deterministics.is_empty(),
        "known_output": problem.known_output.len(),
    });
    let sidecar = io::write_result(
        out,
        cfg.mode,
        &rows,
        Provenance::capture(params).with_input(input),
    )?;
    tracing::info!(classes = rows.len(), provenance = %sidecar.display(), "done");
    Ok(())
}

fn report(result: Option<&Path>) -> Result<()> {
    let summary = match result {
        Some(path) => {
            let doc = io::read_result(path)?;
            json!({ "path": path.to_string_lossy(), "mode": doc.mode, "classes": doc.classes })
        }
        None => serde_json::Value::Null,
    };
    let obj = json!({
        "code_rev": provenance::code_rev(),
        "version": adjdec::VERSION,
        "result": summary,
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
