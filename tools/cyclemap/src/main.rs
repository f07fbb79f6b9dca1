use clap::Parser;
use cyclemap::cli::Cli;
use log::error;

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = cli.run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}
