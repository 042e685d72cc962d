use clap::Parser;
use tramline::cli::{run_cli, Cli};
use tramline::logging::{init_logging_with_config, LogConfig};

fn main() -> anyhow::Result<()> {
    let mut log_config = LogConfig::from_env();
    // command output goes to stdout; keep stderr quiet unless asked
    if std::env::var_os("TRAMLINE_LOG_LEVEL").is_none() {
        log_config.log_level = "warn".to_string();
    }
    init_logging_with_config(&log_config)?;

    let cli = Cli::parse();
    run_cli(&cli)
}
