//! Fair division command-line runner.
//!
//! Runs one allocation driver on an instance file and prints the report as
//! JSON on stdout. Logs go to stderr.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `FAIRDIV_ALGORITHM`: driver name (default: envy_cycle_elimination)
//! - `FAIRDIV_MAX_ATTEMPTS`, `FAIRDIV_RANDOM_ATTEMPTS`, `FAIRDIV_SEED`,
//!   `FAIRDIV_WORKERS`: tie-break search of the EFX-preserving driver
//! - `RUST_LOG`: Log level filter (default: fairdiv=info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! FAIRDIV_ALGORITHM=efx_preserving fairdiv instances/three_agents.txt
//! fairdiv generate 4 8 42 > random.txt
//! ```

use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fairdiv_kernel::{run, AdditiveGenerator, Instance, RunConfig};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fairdiv=info,fairdiv_kernel=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn usage() -> String {
    "usage: fairdiv <instance-file> | fairdiv generate <agents> <items> [seed]".to_string()
}

fn generate(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let [agents, items, rest @ ..] = args else {
        return Err(usage().into());
    };
    let agents: usize = agents.parse()?;
    let items: usize = items.parse()?;
    let seed: u64 = match rest.first() {
        Some(seed) => seed.parse()?,
        None => 0,
    };

    let instance = AdditiveGenerator::default().generate_seeded(agents, items, seed);
    print!("{}", instance.to_text()?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("generate") => return generate(&args[1..]),
        Some(_) => {}
        None => return Err(usage().into()),
    }

    let config = RunConfig::from_env()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        algorithm = %config.algorithm,
        params_hash = %config.params_hash(),
        "Starting fairdiv"
    );

    let instance = Instance::from_file(&args[0])?;
    let report = match run(&config, &instance) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, path = %args[0], "allocation failed");
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
