use std::error::Error;
use std::io::Write;
use std::process::ExitCode;

use common::constants::{HFPERCLK_RATE, NUM_TIMERS};
use emu_lib::SocConfig;
use script_lib::{Runner, parse};

use clap::Parser;
use clap_stdin::FileOrStdin;

/// Drives the EFM32 timer and UART models from a bus script
#[derive(Parser)]
#[command(about)]
struct Args {
    /// Script file, or - for stdin
    input: FileOrStdin,

    /// Timer clock before prescaling, in Hz
    #[arg(long, default_value_t = HFPERCLK_RATE)]
    base_clock: u32,

    /// Number of timers to map
    #[arg(long, default_value_t = NUM_TIMERS)]
    timers: usize,

    /// Print every bus access
    #[arg(long)]
    trace: bool,
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = SocConfig{
        base_clock: args.base_clock,
        num_timers: args.timers,
    };
    let trace = args.trace;

    let input = args.input.contents()?;
    let lines = parse(&input)?;

    let mut runner = Runner::new(&config, std::io::stdout().lock())?;
    runner.set_trace(trace);
    runner.run(&lines)?;
    runner.into_output().flush()?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("interpreter: {err}");
            ExitCode::FAILURE
        }
    }
}
