//! cubetool: run a cubekit application.
//!
//! ```text
//! cubetool fits2cube FROM=image.fits TO=image.cub
//! cubetool flatfield FROM=in.cub FLAT=flat.cub DARK=dark.cub TO=out.cub
//! ```
//!
//! Exit codes: 0 on success, 1 for user errors, 2 for internal errors.

use anyhow::{Context, Result};
use clap::Parser;
use cube_common::{CubeError, Preferences};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cubetool")]
#[command(about = "Planetary cube processing applications")]
struct Args {
    /// Application to run; `list` prints every application
    app: String,

    /// Application parameters as KEY=VALUE
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    params: Vec<String>,

    /// Preferences file (YAML)
    #[arg(long, env = "CUBEKIT_PREFERENCES")]
    preferences: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr);
    if args.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: &Args) -> Result<()> {
    let prefs = Preferences::resolve(args.preferences.as_deref()).context("loading preferences")?;
    if args.app.eq_ignore_ascii_case("list") {
        for app in cubetool::registry() {
            print!("{}", app.definition.usage());
        }
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    info!(app = %args.app, "Starting application");
    cubetool::run(&args.app, &args.params, &prefs, &mut stdout)?;
    info!(app = %args.app, "Application complete");
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CubeError>())
        .map_or(2, |e| e.exit_code() as u8)
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code(&err);
            error!(app = %args.app, code, "{:#}", err);
            eprintln!("{}: {:#}", args.app, err);
            ExitCode::from(code)
        }
    }
}
