//! regcraft - build and check register EEPROM images
//!
//! Turns a register configuration into the EEPROM image of a chip such as the
//! CDCE6214, recovers registers from an EEPROM readback, and prints field values.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Encode {
            descriptor,
            bitmap,
            config,
            output,
            strict_missing,
            widths,
            config_args,
        } => commands::run_encode(
            &descriptor,
            &bitmap,
            &config,
            output.as_deref(),
            strict_missing,
            widths,
            config_args,
        ),
        Commands::Decode {
            bitmap,
            image,
            output,
            strict,
            widths,
        } => commands::run_decode(&bitmap, &image, output.as_deref(), strict, widths),
        Commands::Fields {
            descriptor,
            config,
            widths,
            config_args,
        } => commands::run_fields(&descriptor, &config, widths, config_args),
        Commands::Diff {
            expected,
            actual,
            widths,
        } => commands::run_diff(&expected, &actual, widths),
    }
}
