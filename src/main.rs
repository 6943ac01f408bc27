use anyhow::Result;
use log::LevelFilter;

fn main() -> Result<()> {
    let args = gnc_import::args::parse();
    init_logging(args.verbose);
    gnc_import::cli::main(args)
}

/// `RUST_LOG` takes precedence over `-v`.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
