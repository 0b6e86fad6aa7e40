//! Nagios-style freshness checks for a published archive mirror
//!
//! Prints one `"<STATUS>: <message>"` line per check and exits with the worst
//! status code.

use bushel::monitoring::{run_checks, Check, CheckResult, CheckStatus, CollectorRemote};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bushel-check")]
#[command(version)]
#[command(about = "Checks that an archive mirror is up to date", long_about = None)]
struct Cli {
    /// Host name of the mirror
    #[arg(value_name = "HOST")]
    host: String,

    /// Run only this check (index, relay_consensus, bridge_status, ...)
    #[arg(long, value_name = "NAME")]
    check: Option<String>,

    /// Use plain HTTP instead of HTTPS
    #[arg(long)]
    http: bool,

    /// Log progress to stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout belongs to the check output
    let filter = match cli.verbose {
        0 => EnvFilter::new("error"),
        1 => EnvFilter::new("bushel=debug,info"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let status = run(&cli).await;
    std::process::exit(status.exit_code());
}

async fn run(cli: &Cli) -> CheckStatus {
    let checks = match &cli.check {
        Some(name) => match Check::by_name(name) {
            Some(check) => vec![check],
            None => {
                let known: Vec<_> = Check::all().iter().map(Check::name).collect();
                println!(
                    "{}",
                    CheckResult::new(
                        CheckStatus::Unknown,
                        format!("Unknown check {:?}, expected one of: {}", name, known.join(", "))
                    )
                );
                return CheckStatus::Unknown;
            }
        },
        None => Check::all(),
    };

    let remote = match CollectorRemote::new(&cli.host, !cli.http) {
        Ok(remote) => remote,
        Err(e) => {
            println!("{}", CheckResult::critical(e.to_string()));
            return CheckStatus::Critical;
        }
    };

    tracing::debug!("Running {} checks against {}", checks.len(), cli.host);
    let mut worst = CheckStatus::Ok;
    for (check, result) in run_checks(&remote, &checks, chrono::Utc::now()).await {
        tracing::debug!("Check {} finished: {}", check.name(), result.status);
        println!("{}", result);
        worst = worst.max(result.status);
    }
    worst
}
