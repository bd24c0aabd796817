//! Config validation CLI tool
//!
//! Validates a timeclock configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use timeclock_util::{default_config_path, format_duration};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a timeclock configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match timeclock_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", timeclock_config::CURRENT_CONFIG_VERSION);
            println!("  Data directory: {}", policy.service.data_dir.display());
            match &policy.service.log_file {
                Some(path) => println!("  Log file: {}", path.display()),
                None => println!("  Log file: (stderr only)"),
            }
            println!("  Log level: {}", policy.service.log_level);
            println!("  Cooldown: {}", format_duration(policy.session.cooldown));
            println!(
                "  Session eviction: {} after cooldown, swept every {}",
                format_duration(policy.session.eviction_grace),
                format_duration(policy.session.eviction_interval)
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                timeclock_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                timeclock_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                timeclock_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                timeclock_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        timeclock_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
