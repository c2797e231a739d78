//! # kfaddr - Main Entry Point
//!
//! Resolves every address given on the command line against one target
//! object and prints one block per address:
//!
//! ```text
//! schedule+0x1a/0x80:
//! __schedule at kernel/sched/core.c:6720
//!  (inlined by) schedule at kernel/sched/core.c:6797
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::io::{self, BufWriter};
use std::time::Instant;

use kfaddr::cli::Args;
use kfaddr::config::Toolchain;
use kfaddr::domain::SymbolizeError;
use kfaddr::preflight::run_preflight_checks;
use kfaddr::symbolization::{Faddr2Line, PathNormalizer};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

/// `-v` raises the default filter to debug; `RUST_LOG` still wins
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.to_string().to_lowercase().contains("no addresses given") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run(args: &Args) -> Result<()> {
    let start = Instant::now();
    let (target, specs) = args.target_and_specs();
    if specs.is_empty() {
        anyhow::bail!(
            "No addresses given\n\n\
             Usage:\n  \
             kfaddr vmlinux func+0xOFFSET/0xLENGTH ...\n\n\
             Run 'kfaddr --help' for more options"
        );
    }

    run_preflight_checks(&target)?;

    let toolchain = Toolchain::from_env();
    debug!("Using line resolution tool: {}", toolchain.addr2line());

    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
    let mut paths = PathNormalizer::new(cwd)
        .with_path_prefixes(args.path_prefixes.clone())
        .with_module_roots(args.module_srcs.clone())
        .with_basenames(args.basenames);
    if let Some(root) = &args.kernel_src {
        paths.set_kernel_root(root);
    }

    // NoSymbolTable and ToolNotFound already say what to do about them
    let mut engine = Faddr2Line::open(&target, &toolchain, paths).map_err(|e| match e {
        SymbolizeError::NoSymbolTable(_) | SymbolizeError::ToolNotFound { .. } => {
            anyhow::Error::new(e)
        }
        other => anyhow::Error::new(other).context(format!("Failed to load {}", target.display())),
    })?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    engine.run(&specs, &mut out).context("Failed to write results")?;

    info!(
        "Resolved {} addresses in {:.2}ms",
        specs.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
