use super::exit_codes;
use crate::cli::args::InitArgs;
use anyhow::Result;
use benchlens_core::config::write_sample_config;
use std::path::Path;

pub fn cmd_init(args: InitArgs, config_path: &Path) -> Result<i32> {
    if config_path.exists() && !args.force {
        eprintln!(
            "⚠️  {} already exists, skipping (use --force to overwrite).",
            config_path.display()
        );
        return Ok(exit_codes::CONFIG_ERROR);
    }
    write_sample_config(config_path)?;
    println!("✅ Wrote {}", config_path.display());
    Ok(exit_codes::OK)
}
