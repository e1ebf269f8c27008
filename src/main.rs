use clap::Parser;
use console::style;
use env_logger::Env;
use pixel_truth::cli::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet flags
    let log_level = if args.quiet {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    log::debug!("pixel-truth starting: {:?}", args.command);

    if let Err(e) = pixel_truth::app::run(args).await {
        log::debug!("Command failed: {:?}", e);
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
