//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "regcraft")]
#[command(author, version, about = "Register field and EEPROM image tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Word widths shared across commands
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct WidthArgs {
    /// Width of a logical register in bits
    #[arg(long, default_value_t = 16)]
    pub register_width: u32,

    /// Width of an image word in bits (ignored for JSON bit maps, which carry their own)
    #[arg(long, default_value_t = 16)]
    pub word_width: u32,
}

/// How register configuration files are read
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct ConfigArgs {
    /// Fail when a register is set more than once instead of keeping the last value
    #[arg(long)]
    pub reject_duplicates: bool,

    /// Read values without a 0x prefix as decimal instead of hex
    #[arg(long)]
    pub decimal_values: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an EEPROM image from a register configuration
    Encode {
        /// Register descriptor (JSON)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Bit map (text table, or JSON if the file ends in .json)
        #[arg(short, long)]
        bitmap: PathBuf,

        /// Register configuration file
        config: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail when the bit map references a register the configuration does not set
        #[arg(long)]
        strict_missing: bool,

        #[command(flatten)]
        widths: WidthArgs,

        #[command(flatten)]
        config_args: ConfigArgs,
    },

    /// Recover register values from an EEPROM readback
    Decode {
        /// Bit map (text table, or JSON if the file ends in .json)
        #[arg(short, long)]
        bitmap: PathBuf,

        /// Image file (`<address> <word>` lines)
        image: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail if any fixed bit reads back wrong
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        widths: WidthArgs,
    },

    /// Print every field value of a register configuration
    Fields {
        /// Register descriptor (JSON)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Register configuration file
        config: PathBuf,

        #[command(flatten)]
        widths: WidthArgs,

        #[command(flatten)]
        config_args: ConfigArgs,
    },

    /// Compare two image files word by word
    Diff {
        /// Image that was written
        expected: PathBuf,

        /// Image that was read back
        actual: PathBuf,

        #[command(flatten)]
        widths: WidthArgs,
    },
}
