use std::{error::Error, process};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dbctl::{
    cli::{Cli, Commands, parse_args},
    config::{Config, load_config},
    logs::show_logs,
    result::{CommandResult, SupervisorResult},
    supervisor::Supervisor,
    tools::default_search_dirs,
};

fn main() {
    let args = parse_args();
    init_logging(&args);

    if let Err(err) = run(args) {
        error!("{err}");
        eprintln!("dbctl: {err}");
        process::exit(1);
    }
}

fn run(args: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(Some(&args.config))?;
    apply_poll_overrides(&args, &mut config);

    match args.command {
        Commands::Status { json } => {
            let supervisor = build_supervisor(&config)?;
            let status = supervisor.status();
            if json {
                let report = serde_json::json!({
                    "running": status.success,
                    "pid": supervisor.state().pid(),
                    "message": status.message(),
                });
                println!("{report}");
            } else {
                println!("{status}");
            }
            finish(status.success);
        }
        Commands::Logs { lines } => {
            show_logs(&config.handle(), lines)?;
        }
        Commands::Init => report_command(build_supervisor(&config)?.init()?),
        Commands::Start => report(build_supervisor(&config)?.start()?),
        Commands::Stop => report(build_supervisor(&config)?.stop()?),
        Commands::Restart => report(build_supervisor(&config)?.restart()?),
        Commands::Createdb { name } => {
            report_command(build_supervisor(&config)?.create_database(&name)?)
        }
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn apply_poll_overrides(args: &Cli, config: &mut Config) {
    if let Some(attempts) = args.attempts {
        config.poll.max_attempts = Some(attempts);
    }
    if let Some(interval) = &args.interval {
        config.poll.interval = Some(interval.clone());
    }
    if let Some(backoff) = args.backoff {
        config.poll.backoff = Some(backoff);
    }
}

fn build_supervisor(config: &Config) -> Result<Supervisor, Box<dyn Error>> {
    let search_dirs = default_search_dirs(config.tools.basedir.as_deref());
    let supervisor = Supervisor::from_config(config, &search_dirs)?;

    let token = supervisor.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("dbctl: interrupted, abandoning wait");
        token.cancel();
    })?;

    Ok(supervisor)
}

fn report(result: SupervisorResult) {
    if result.success {
        info!("{result}");
        println!("{result}");
    } else {
        warn!("{result}");
        eprintln!("{result}");
    }
    finish(result.success);
}

fn report_command(result: CommandResult) {
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    if !result.success() {
        error!(
            "`{}` exited with status {}",
            result.command_line(),
            result.exit
        );
    }
    finish(result.success());
}

fn finish(success: bool) {
    if !success {
        process::exit(1);
    }
}
