mod cli;

use sceneclip::{config, report::Reporter};
use sceneclip_av::{trim_file, TrimRequest};

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "sceneclip=debug,sceneclip_av=trace".to_string()
        } else {
            "sceneclip=info,sceneclip_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let reporter = Reporter::from_args();
    std::process::exit(run(&cli, &reporter));
}

/// Run one trim and return the process exit status.
fn run(cli: &Cli, reporter: &Reporter) -> i32 {
    let config = match config::load_config_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            reporter.error(format!("{:#}", e));
            return 1;
        }
    };

    // Keep stdout clean for the JSON report.
    if cli.output.exists() && !cli.json {
        reporter.warning(format!("overwriting {}", cli.output.display()));
    }

    let request = TrimRequest {
        input: cli.input.clone(),
        output: cli.output.clone(),
        start: cli.start,
        end: cli.end,
    };

    tracing::info!(
        "Trimming {:?} [{}s, {}s] into {:?}",
        request.input,
        request.start,
        request.end,
        request.output
    );

    match trim_file(&request, &config.encode_settings()) {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        reporter.error(e);
                        return 1;
                    }
                }
            }
            0
        }
        Err(e) => {
            reporter.error(&e);
            e.exit_code()
        }
    }
}
