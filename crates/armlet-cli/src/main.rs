//! `armlet` — run ARMv7-M firmware to completion under emulation.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use armlet_machine::{Machine, RunStatus};
use armlet_trace::Tracer;

#[derive(Parser, Debug)]
#[command(name = "armlet", about = "ARMv7-M Thumb-2 instruction-set emulator")]
struct Args {
    /// ELF32 firmware image to execute.
    elf: PathBuf,

    /// Stop after this many instructions instead of running to completion.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Override the initial stack pointer (defaults to vector table word 0).
    #[arg(long, value_parser = parse_hex_or_dec)]
    stack_pointer: Option<u32>,

    /// Log each executed step: PC, disassembly, register deltas.
    #[arg(long)]
    trace: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_hex_or_dec(s: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| e.to_string())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> anyhow::Result<u32> {
    let bytes = std::fs::read(&args.elf)
        .with_context(|| format!("reading {}", args.elf.display()))?;
    let image = armlet_elf::load(&bytes).context("loading firmware image")?;
    info!(
        entry = format_args!("{:#010x}", image.entry),
        regions = image.regions.len(),
        "image loaded"
    );

    let sp = args.stack_pointer.or(image.initial_sp);
    let mut machine = Machine::from_image_with_sp(&image, sp)
        .context("assembling machine (pass --stack-pointer if the image has no vector table)")?;

    if args.trace {
        // The tracer is shared between the pre hook (mnemonic) and the post
        // hook (register deltas).
        let tracer = std::sync::Arc::new(std::sync::Mutex::new(Tracer::new()));
        let pre = tracer.clone();
        machine.set_pre_step(Box::new(move |state, bus| {
            pre.lock().unwrap().pre_step(state, bus);
        }));
        machine.set_post_step(Box::new(move |state, bus| {
            tracer.lock().unwrap().post_step(state, bus);
        }));
    }

    let exit = machine.run(args.max_steps);
    match exit.status {
        RunStatus::Exit => Ok(exit.exit_code),
        RunStatus::ErrorExit => {
            info!(exit_code = exit.exit_code, steps = exit.steps, "guest error exit");
            Ok(if exit.exit_code == 0 { 1 } else { exit.exit_code })
        }
        RunStatus::BudgetExhausted => {
            bail!("step budget exhausted after {} instructions", exit.steps)
        }
        RunStatus::Fault => {
            let cfsr = machine.cpu().state.cfsr();
            let pc = machine.cpu().state.pc();
            match exit.error {
                Some(error) => bail!(
                    "fault at pc {pc:#010x} after {} steps (CFSR {cfsr:#010x}): {error}",
                    exit.steps
                ),
                None => bail!(
                    "fault latched at pc {pc:#010x} after {} steps (CFSR {cfsr:#010x})",
                    exit.steps
                ),
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(args) {
        Ok(code) => ExitCode::from((code & 0xFF) as u8),
        Err(err) => {
            eprintln!("armlet: {err:#}");
            ExitCode::FAILURE
        }
    }
}
