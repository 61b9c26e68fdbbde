use clap::Parser;

mod cli;
mod logging;

use cli::args::Cli;
use cli::commands::{dispatch, exit_codes};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();

    let cfg = match benchlens_core::config::load_or_default(&cli.config, cli.strict) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };
    logging::init_logging(&cfg.log_level, cfg.log_format);

    let code = match dispatch(cli, cfg).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
