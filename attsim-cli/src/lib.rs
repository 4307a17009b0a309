use attsim::{HookManager, Program, RunOutcome, RuntimeFault, Simulation, SourceError};
use tracing::{debug, info};

mod config;
mod report;
mod tracer;

pub use config::{Config, LineActionConfig, RunConfig, StackConfig};
pub use report::{format_parse_error, write_flags, write_registers, write_stack};
pub use tracer::{LineAction, LineActions, LineTracer};

/// Parses `source` and sets up a simulation with the config's stack base,
/// initial registers and breakpoints.
pub fn build_simulation(source: &str, config: &Config) -> Result<Simulation, Vec<SourceError>> {
    let program = Program::from_source(source)?;
    let mut simulation = Simulation::with_initial_state(
        program,
        config.initial_state(),
        config.simulation_config(),
    );
    for &line in &config.breakpoints {
        if line < simulation.program().len() {
            simulation.toggle_breakpoint(line);
        } else {
            debug!("Ignoring breakpoint past the end of the program: {}", line);
        }
    }
    Ok(simulation)
}

/// How a batch of bounded runs ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Finished,
    Fault(RuntimeFault),
    /// A hook stopped the run.
    Stopped,
    /// `max_runs` bounded runs went by without the program finishing.
    Exhausted,
}

/// Repeats bounded runs until the program finishes, faults, a hook stops
/// it, or `max_runs` is reached. `on_break` is called at every breakpoint
/// with the line number.
pub fn run_batch<H, F>(
    simulation: &mut Simulation,
    hooks: &mut H,
    max_runs: usize,
    mut on_break: F,
) -> BatchOutcome
where
    H: HookManager,
    F: FnMut(&Simulation, usize),
{
    for run in 0..max_runs {
        match simulation.run(hooks) {
            Ok(RunOutcome::Finished) => {
                info!(runs = run + 1, steps = simulation.state().step(), "program finished");
                return BatchOutcome::Finished;
            }
            Ok(RunOutcome::Breakpoint(line)) => on_break(simulation, line),
            Ok(RunOutcome::StepLimit) => debug!(run, "step limit reached, continuing"),
            Ok(RunOutcome::Stopped) => return BatchOutcome::Stopped,
            Err(fault) => return BatchOutcome::Fault(fault),
        }
    }
    BatchOutcome::Exhausted
}

#[cfg(test)]
mod tests {
    use super::*;
    use attsim::{NoHooks, Register};

    #[test]
    fn test_build_simulation_applies_config() {
        let mut config = Config {
            breakpoints: vec![1, 99],
            ..Config::default()
        };
        config.registers.insert(Register::RDI, 7);

        let simulation = build_simulation("movq %rdi, %rax\naddq %rax, %rax", &config).unwrap();

        assert_eq!(simulation.state().read_register(Register::RDI), 7);
        assert!(simulation.program().is_breakpoint(1));
        assert!(!simulation.program().is_breakpoint(0));
    }

    #[test]
    fn test_run_batch_across_breakpoints() {
        let config = Config {
            breakpoints: vec![1],
            ..Config::default()
        };
        let mut simulation =
            build_simulation("movq $1, %rax\nmovq $2, %rbx\nmovq $3, %rcx", &config).unwrap();

        let mut hits = Vec::new();
        let outcome = run_batch(&mut simulation, &mut NoHooks, 10, |_, line| hits.push(line));

        assert_eq!(outcome, BatchOutcome::Finished);
        assert_eq!(hits, vec![1]);
        assert_eq!(simulation.state().read_register(Register::RCX), 3);
    }

    #[test]
    fn test_run_batch_gives_up() {
        let mut simulation = build_simulation("top:\njmp top", &Config::default()).unwrap();

        let outcome = run_batch(&mut simulation, &mut NoHooks, 3, |_, _| {});

        assert_eq!(outcome, BatchOutcome::Exhausted);
        assert_eq!(simulation.history().len(), 301);
    }

    #[test]
    fn test_run_batch_reports_fault() {
        let mut simulation =
            build_simulation("movq $0, %rcx\nidivq %rcx", &Config::default()).unwrap();

        let outcome = run_batch(&mut simulation, &mut NoHooks, 3, |_, _| {});

        assert!(matches!(outcome, BatchOutcome::Fault(fault) if fault.line == 1));
    }
}
