use anyhow::{Result, anyhow};
use attsim::{RegisterView, Simulation, StackEntry};
use attsim_cli::{
    BatchOutcome, Config, LineTracer, build_simulation, format_parse_error, run_batch,
    write_flags, write_registers, write_stack,
};
use clap::Parser;
use colored::*;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "attsim-cli")]
#[command(about = "Run an AT&T-syntax x86-64 program and show the resulting machine state")]
struct Args {
    /// Path to the assembly source
    #[arg(required_unless_present = "generate_sample")]
    program: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generate a sample configuration file at the specified path and exit
    #[arg(long, value_name = "PATH")]
    generate_sample: Option<PathBuf>,

    /// Print every evaluated line with the registers it changed
    #[arg(short, long)]
    trace: bool,

    /// Write the final registers, flags and stack as TOML to this path
    #[arg(long, value_name = "PATH")]
    dump: Option<PathBuf>,
}

fn setup_logging() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // stdout carries the program report, logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive("attsim_cli=info".parse()?))
        .init();

    Ok(())
}

#[derive(Serialize)]
struct Dump {
    outcome: String,
    steps: usize,
    rip: usize,
    call_depth: i64,
    flags: FlagDump,
    registers: Vec<RegisterView>,
    stack: Vec<StackEntry>,
}

#[derive(Serialize)]
struct FlagDump {
    zf: bool,
    sf: bool,
    of: bool,
    cf: bool,
}

impl Dump {
    fn capture(simulation: &Simulation, outcome: &BatchOutcome) -> Self {
        let state = simulation.state();
        Dump {
            outcome: describe(outcome),
            steps: state.step(),
            rip: state.rip(),
            call_depth: state.call_depth(),
            flags: FlagDump {
                zf: attsim::zero_flag(state),
                sf: attsim::sign_flag(state),
                of: attsim::overflow_flag(state),
                cf: attsim::carry_flag(state),
            },
            registers: simulation.registers(),
            stack: simulation.stack(),
        }
    }
}

fn describe(outcome: &BatchOutcome) -> String {
    match outcome {
        BatchOutcome::Finished => "finished".to_string(),
        BatchOutcome::Fault(fault) => format!("fault: {}", fault),
        BatchOutcome::Stopped => "stopped".to_string(),
        BatchOutcome::Exhausted => "run limit reached".to_string(),
    }
}

fn print_state(simulation: &Simulation) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", "Registers".bold())?;
    write_registers(&mut out, &simulation.registers())?;
    writeln!(out, "{}", "Flags".bold())?;
    write_flags(&mut out, simulation.state())?;
    writeln!(out, "{}", "Stack".bold())?;
    write_stack(&mut out, &simulation.stack())?;
    Ok(())
}

fn main() -> Result<()> {
    setup_logging()?;

    let args = Args::parse();

    // Handle sample generation
    if let Some(sample_path) = &args.generate_sample {
        info!("Generating sample configuration at: {:?}", sample_path);
        let sample_config = Config::create_sample();
        sample_config.save_to_file(sample_path)?;
        println!("Sample configuration saved to: {:?}", sample_path);
        return Ok(());
    }

    let program_path = args
        .program
        .as_ref()
        .ok_or_else(|| anyhow!("No program file given"))?;
    let config = match &args.config {
        Some(path) => {
            info!("Config file: {:?}", path);
            Config::load_from_file(path)?
        }
        None => Config::default(),
    };

    let source = fs::read_to_string(program_path)
        .map_err(|e| anyhow!("Failed to read program {:?}: {}", program_path, e))?;
    let mut simulation = match build_simulation(&source, &config) {
        Ok(simulation) => simulation,
        Err(errors) => {
            for error in &errors {
                eprintln!("{}", format_parse_error(error));
            }
            return Err(anyhow!("{} line(s) failed to parse", errors.len()));
        }
    };
    info!(
        "Loaded {} line(s) from {:?}",
        simulation.program().len(),
        program_path
    );

    let mut tracer = LineTracer::new(args.trace, config.line_actions.clone());
    let outcome = run_batch(&mut simulation, &mut tracer, config.run.max_runs, |sim, line| {
        println!(
            "{} before line {}: {}",
            "Breakpoint".yellow().bold(),
            line,
            sim.program().line(line).map(ToString::to_string).unwrap_or_default()
        );
        if let Err(e) = print_state(sim) {
            error!("Failed to print state: {}", e);
        }
    });
    if tracer.is_enabled() {
        println!();
    }

    match &outcome {
        BatchOutcome::Finished => println!(
            "{} after {} step(s)",
            "Finished".green().bold(),
            simulation.state().step()
        ),
        BatchOutcome::Fault(fault) => println!("{} {}", "Fault".red().bold(), fault),
        BatchOutcome::Stopped => println!("{}", "Stopped".yellow().bold()),
        BatchOutcome::Exhausted => println!(
            "{} after {} run(s) of {} step(s)",
            "Gave up".yellow().bold(),
            config.run.max_runs,
            config.run.steps_per_run
        ),
    }
    print_state(&simulation)?;

    if let Some(path) = &args.dump {
        let dump = Dump::capture(&simulation, &outcome);
        let contents =
            toml::to_string_pretty(&dump).map_err(|e| anyhow!("Failed to serialize dump: {}", e))?;
        fs::write(path, contents)
            .map_err(|e| anyhow!("Failed to write dump {:?}: {}", path, e))?;
        info!("State written to {:?}", path);
    }

    if let BatchOutcome::Fault(fault) = outcome {
        return Err(anyhow!("{}", fault));
    }
    Ok(())
}
