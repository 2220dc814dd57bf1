use kairos::{
    Outcome, ProcessBody, ProcessContext, ProcessHandle, SimConfig, SimResult, Simulation, Step,
    StepResult, Value,
};
use tracing_subscriber::EnvFilter;

/// A machine that builds parts until it reaches its quota. A breakdown
/// interrupts the part in progress and costs a repair.
struct Machine {
    made: i64,
    started: bool,
    repairing: bool,
    build_time: u64,
    repair_time: u64,
    quota: i64,
}

impl Machine {
    fn new(build_time: u64, repair_time: u64, quota: i64) -> Self {
        Machine {
            made: 0,
            started: false,
            repairing: false,
            build_time,
            repair_time,
            quota,
        }
    }
}

impl ProcessBody for Machine {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> StepResult {
        if ctx.acknowledge_fault() {
            let cause = ctx.fault().cloned().unwrap_or_default();
            tracing::info!(at = %ctx.now(), %cause, made = self.made, "machine broke down");
            self.repairing = true;
            return Ok(Step::wait(ctx.timeout(self.repair_time, ())?));
        }
        if self.repairing {
            self.repairing = false;
        } else if self.started && ctx.outcome().is_some_and(Outcome::is_ok) {
            self.made += 1;
        }
        self.started = true;

        if self.made >= self.quota {
            return Ok(Step::finish(self.made));
        }
        Ok(Step::wait(ctx.timeout(self.build_time, ())?))
    }
}

/// Breaks `machine` every `interval` ticks until it has finished.
fn saboteur(machine: ProcessHandle, interval: u64) -> impl ProcessBody {
    let mut armed = false;
    move |ctx: &mut ProcessContext<'_>| -> StepResult {
        if armed {
            if !ctx.sim().is_alive(machine)? {
                return Ok(Step::finish(()));
            }
            ctx.interrupt(machine, "worn belt")?;
        }
        armed = true;
        Ok(Step::wait(ctx.timeout(interval, ())?))
    }
}

/// Run the shop once; returns end time, parts made and the trace hash.
fn run_shop() -> SimResult<(u64, Value, u64)> {
    let mut sim = Simulation::with_config(SimConfig::new().with_trace(true));
    let machine = sim.start("machine", Machine::new(3, 5, 10))?;
    sim.start("saboteur", saboteur(machine, 11))?;
    sim.run()?;

    let made = sim.value(machine.event())?.cloned().unwrap_or_default();
    Ok((sim.now().ticks(), made, sim.trace_hash().unwrap_or_default()))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("═══════════════════════════════════════════════════════");
    println!("  Kairos: machine shop replay demo");
    println!("═══════════════════════════════════════════════════════");

    match (run_shop(), run_shop()) {
        (Ok((end, made, h1)), Ok((_, _, h2))) => {
            println!("  Finished at T={}, parts made: {}", end, made);
            println!("    Run 1 trace hash: {:016x}", h1);
            println!("    Run 2 trace hash: {:016x}", h2);
            if h1 == h2 {
                println!("    ✓ Traces are IDENTICAL, deterministic replay confirmed.");
            } else {
                println!("    ✗ MISMATCH, determinism violation detected!");
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("simulation aborted: {}", e);
            std::process::exit(1);
        }
    }
}
