use std::fs::File;
use std::io::BufReader;
use std::time::Instant;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tagstore::config::LayeredCacheConfig;
use tagstore::io::get_trace;
use tagstore::simulator::Simulator;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TraceFormat {
    /// 40 byte records: `<pc:016X> <address:016X> <R|W> <size:03>`
    Fixed,
    /// One `R|W <hex address> [size]` access per line
    Text,
}

#[derive(Parser, Debug)]
#[command(about = String::from("Trace driven simulator for layered set-associative tag stores"))]
struct Args {
    config: String,
    trace: String,

    #[arg(short, long, value_enum, default_value_t = TraceFormat::Fixed)]
    format: TraceFormat,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,

    /// Log evictions and writebacks, overriding RUST_LOG
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let start = Instant::now();
    let args = Args::parse();
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut logger = env_logger::Builder::from_env(env);
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let config_file = File::open(&args.config)
        .with_context(|| format!("Couldn't open the config file at path {}", args.config))?;
    let config: LayeredCacheConfig = serde_json::from_reader(BufReader::new(config_file))
        .context("Couldn't parse the config file")?;
    let mut simulator = Simulator::new(&config).context("Invalid cache configuration")?;
    let trace_file = File::open(&args.trace)
        .with_context(|| format!("Couldn't open the trace file at path {}", args.trace))?;
    let trace = get_trace(trace_file).context("Couldn't read the trace file")?;
    log::info!("simulating {} bytes of {:?} trace", trace.len(), args.format);
    let result = match args.format {
        TraceFormat::Fixed => simulator.simulate(&trace)?,
        TraceFormat::Text => {
            let text = std::str::from_utf8(&trace).context("The text trace isn't valid UTF-8")?;
            simulator.simulate_text(text)?
        }
    };
    println!("{}", serde_json::to_string_pretty(result).context("Couldn't serialise the output")?);

    if args.performance {
        let simulation_time = simulator.get_execution_time();
        let total_time = start.elapsed();
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!(
            "Total execution time (includes initial parsing, configuration, and output): {}s",
            total_time.as_nanos() as f64 / 1e9
        );
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!(
            "Running the debug binary, debug mode is enabled by default. \
             Build with --release when benchmarking"
        );
        println!("Parsed input configuration: {config:?}");
        let occupancies = simulator.get_occupancies();
        let formatted = config
            .caches
            .iter()
            .zip(occupancies.iter())
            .map(|(cache, occupancy)| format!("{}: {occupancy}", cache.name))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Valid lines by layer: ({formatted})");
        println!("Total valid lines: {}", occupancies.iter().sum::<u64>());
    }
    Ok(())
}
