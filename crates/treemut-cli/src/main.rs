//! Command-line driver for mutation runs.

mod sample;
mod telemetry;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use treemut_core::{FinderSelection, MutationKind, MutatorConfig};
use treemut_fuzz::{replay_sequence, ChaChaSource, EngineStatus, MutationEngine, MutationSequence};
use treemut_ir::{Ast, Printer, Program, Resolver};

#[derive(Parser)]
#[command(
    name = "treemut",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mutation-based fuzzer for tree programs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mutation loop on a program
    Mutate {
        /// Program JSON to mutate
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the mutated program (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record the applied mutations here (`.json` for JSON, bincode otherwise)
        #[arg(short, long)]
        record: Option<PathBuf>,

        /// Mutator configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Re-apply a recorded run to its initial program
    Replay {
        /// Program JSON the run started from
        #[arg(short, long)]
        input: PathBuf,

        /// Recorded mutation sequence
        #[arg(short, long)]
        record: PathBuf,

        /// Where to write the result (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a program as source text
    Print {
        /// Program JSON
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write the built-in starter program
    Sample {
        /// Where to write the program JSON (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Command-line settings that take precedence over the config file
#[derive(clap::Args, Default)]
struct ConfigOverrides {
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_mutations: Option<usize>,

    #[arg(long)]
    max_consecutive_failures: Option<usize>,

    #[arg(long)]
    max_expression_size: Option<usize>,

    /// Use every enabled finder instead of a random subset
    #[arg(long)]
    enable_all: bool,

    /// Restrict the run to these mutation kinds
    #[arg(long, value_delimiter = ',', value_parser = parse_kind)]
    mutations: Option<Vec<MutationKind>>,

    /// Weight finder selection by chance of applying
    #[arg(long)]
    weighted: bool,
}

impl ConfigOverrides {
    fn apply(self, config: &mut MutatorConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n) = self.max_mutations {
            config.max_mutations = n;
        }
        if let Some(n) = self.max_consecutive_failures {
            config.max_consecutive_failures = n;
        }
        if let Some(n) = self.max_expression_size {
            config.max_expression_size = n;
        }
        if self.enable_all {
            config.enable_all_mutations = true;
        }
        if let Some(kinds) = self.mutations {
            config.enabled_mutations = kinds;
        }
        if self.weighted {
            config.finder_selection = FinderSelection::Weighted;
        }
    }
}

fn parse_kind(s: &str) -> std::result::Result<MutationKind, String> {
    MutationKind::ALL
        .into_iter()
        .find(|k| k.name() == s)
        .ok_or_else(|| {
            let names: Vec<_> = MutationKind::ALL.iter().map(|k| k.name()).collect();
            format!("unknown mutation kind '{}', expected one of {}", s, names.join(", "))
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_logging(cli.json_logs)?;
    let validator = Resolver::new();

    match cli.command {
        Commands::Mutate {
            input,
            output,
            record,
            config,
            overrides,
        } => {
            let mut cfg = match config {
                Some(path) => MutatorConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to load config {:?}", path))?,
                None => MutatorConfig::default(),
            };
            overrides.apply(&mut cfg);
            let program = load_program(&input, &validator)?;
            let run = mutate(program, &cfg, &validator)?;
            if let Some(path) = record {
                run.sequence.write_to_file(&path)?;
            }
            match run.status {
                EngineStatus::Aborted => {
                    for d in &run.diagnostics {
                        warn!("{}", d);
                    }
                    write_program(&run.program, output.as_deref())?;
                    bail!(
                        "mutation {} produced an invalid program",
                        run.sequence.len() + 1
                    );
                }
                status => {
                    info!("Run ended {:?} with {} mutations", status, run.sequence.len());
                    write_program(&run.program, output.as_deref())?;
                }
            }
        }
        Commands::Replay {
            input,
            record,
            output,
        } => {
            let initial = load_program(&input, &validator)?;
            let sequence = MutationSequence::read_from_file(&record)?;
            let (program, _) = replay_sequence(&initial, &sequence, &validator);
            write_program(&program, output.as_deref())?;
        }
        Commands::Print { input } => {
            let program = load_program(&input, &validator)?;
            print!("{}", Printer::default().print(&program));
        }
        Commands::Sample { output } => {
            let program = sample::starter_program(&validator);
            write_program(&program, output.as_deref())?;
        }
    }
    Ok(())
}

fn mutate(
    program: Program,
    config: &MutatorConfig,
    validator: &Resolver,
) -> Result<treemut_fuzz::MutationRun> {
    let rng = ChaChaSource::seeded(config.seed);
    let engine = MutationEngine::new(program, config, validator, rng)?;
    Ok(engine.run())
}

fn load_program(path: &Path, validator: &Resolver) -> Result<Program> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let ast = Ast::from_json(&text).with_context(|| format!("Failed to parse {:?}", path))?;
    let program = Program::new(ast, validator);
    if !program.is_valid() {
        for d in program.diagnostics() {
            warn!("{}", d);
        }
        bail!("{:?} is not a valid program", path);
    }
    Ok(program)
}

fn write_program(program: &Program, path: Option<&Path>) -> Result<()> {
    let json = program.to_json()?;
    match path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote {} to {:?}", program.id(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
