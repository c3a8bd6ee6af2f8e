use clap::Parser;
use jsh::Shell;

/// An interactive, job-controlling command shell.
#[derive(Parser)]
#[command(name = "jsh", version, about)]
struct Cli {
    /// Run one command non-interactively and exit.
    #[arg(short = 'c', value_name = "COMMAND")]
    command: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();

    if let Some(command) = cli.command {
        let mut shell = match Shell::new_noninteractive() {
            Ok(shell) => shell,
            Err(e) => {
                tracing::error!("{e}");
                std::process::exit(1);
            }
        };
        std::process::exit(shell.run_one(&command));
    }

    let mut shell = match Shell::new() {
        Ok(shell) => shell,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    std::process::exit(shell.run());
}
