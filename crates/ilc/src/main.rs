//! Viper IL driver CLI
//!
//! Command-line interface for executing, benchmarking, and verifying
//! textual IL modules through the in-process VM.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use ilc::{BenchOptions, RunOptions, cmd_bench, cmd_run, cmd_verify};
use std::io;
use std::path::PathBuf;
use std::process;
use viper_vm::DispatchStrategy;

#[derive(ClapParser)]
#[command(name = "ilc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Viper IL driver - run, benchmark, and verify IL modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute an IL module on the VM
    Run {
        /// Input .il file
        input: PathBuf,

        /// Trace mode: il (per instruction) or src (per source line)
        #[arg(long, value_name = "MODE")]
        trace: Option<String>,

        /// Maximum instruction count (0 = unlimited)
        #[arg(long = "max-steps", default_value_t = 0)]
        max_steps: u64,

        /// Breakpoint: block LABEL or FILE:LINE
        #[arg(long = "break", value_name = "SPEC")]
        breaks: Vec<String>,

        /// Source-line breakpoint: FILE:LINE
        #[arg(long = "break-src", value_name = "FILE:LINE")]
        break_srcs: Vec<String>,

        /// Watch a named variable for stores
        #[arg(long = "watch", value_name = "NAME")]
        watches: Vec<String>,

        /// Debugger automation script (step N / continue lines)
        #[arg(long = "debug-cmds", value_name = "SCRIPT")]
        debug_cmds: Option<String>,

        /// Pause before the first instruction
        #[arg(long)]
        step: bool,

        /// Run without pausing (default)
        #[arg(long = "continue")]
        continue_run: bool,

        /// Report the executed instruction count
        #[arg(long)]
        count: bool,

        /// Report wall-clock time and instruction rate
        #[arg(long)]
        time: bool,

        /// Redirect rt_input_line to read from PATH
        #[arg(long, value_name = "PATH")]
        stdin: Option<String>,

        /// Echo trap detail (instruction and call stack) to stderr
        #[arg(long = "dump-trap")]
        dump_trap: bool,

        /// Rejected: bounds checks are chosen at lowering time
        #[arg(long = "bounds-checks", hide = true)]
        bounds_checks: bool,
    },

    /// Benchmark IL modules across dispatch strategies
    Bench {
        /// Input .il files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Number of iterations per file/strategy
        #[arg(short = 'n', default_value_t = 3)]
        iterations: u32,

        /// Maximum interpreter steps (0 = unlimited)
        #[arg(long = "max-steps", default_value_t = 0)]
        max_steps: u64,

        /// Run only function-pointer-table dispatch
        #[arg(long)]
        table: bool,

        /// Run only switch dispatch
        #[arg(long)]
        switch: bool,

        /// Run only token-threaded dispatch
        #[arg(long)]
        threaded: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Verbose per-iteration output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Verify an IL module without running it
    #[command(name = "il-verify")]
    IlVerify {
        /// Input .il file
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run {
            input,
            trace,
            max_steps,
            breaks,
            break_srcs,
            watches,
            debug_cmds,
            step,
            continue_run: _,
            count,
            time,
            stdin,
            dump_trap,
            bounds_checks,
        } => {
            if bounds_checks {
                eprintln!(
                    "ilc: --bounds-checks is not a runtime option; recompile with checked \
                     opcodes (.chk variants) instead"
                );
                process::exit(1);
            }
            cmd_run(
                &input,
                RunOptions {
                    trace,
                    max_steps,
                    breaks,
                    break_srcs,
                    watches,
                    debug_cmds,
                    step,
                    count,
                    time,
                    stdin,
                    dump_trap,
                },
            )
        }
        Commands::Bench {
            inputs,
            iterations,
            max_steps,
            table,
            switch,
            threaded,
            json,
            verbose,
        } => {
            let strategies = selected_strategies(table, switch, threaded);
            cmd_bench(
                &inputs,
                BenchOptions {
                    iterations,
                    max_steps,
                    strategies,
                    json,
                    verbose,
                },
            )
        }
        Commands::IlVerify { input } => cmd_verify(&input),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ilc", &mut io::stdout());
            0
        }
    };
    process::exit(code);
}

/// Strategy flags narrow the default full set.
fn selected_strategies(table: bool, switch: bool, threaded: bool) -> Vec<DispatchStrategy> {
    if !table && !switch && !threaded {
        return vec![
            DispatchStrategy::Table,
            DispatchStrategy::Switch,
            DispatchStrategy::Threaded,
        ];
    }
    let mut strategies = Vec::new();
    if table {
        strategies.push(DispatchStrategy::Table);
    }
    if switch {
        strategies.push(DispatchStrategy::Switch);
    }
    if threaded {
        strategies.push(DispatchStrategy::Threaded);
    }
    strategies
}
