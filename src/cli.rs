use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::types::Rotation;

#[derive(Parser, Debug)]
#[command(
    name = "scan-assembler",
    version,
    about = "Assemble folders of scanned pages into structured documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every folder under INPUT_DIR into one document per folder.
    Process(ProcessArgs),
    /// Store the Gemini API key in the OS keyring.
    SetKey(SetKeyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    pub input_dir: PathBuf,

    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    #[arg(long, default_value_t = false)]
    pub summary: bool,

    #[arg(long)]
    pub language: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// File name to leave out of its folder's document. Repeatable.
    #[arg(long = "exclude", value_name = "NAME")]
    pub excludes: Vec<String>,

    /// Clockwise rotation for an image, as NAME=DEGREES. Repeatable.
    #[arg(long = "rotate", value_name = "NAME=DEGREES", value_parser = parse_rotation)]
    pub rotations: Vec<(String, Rotation)>,
}

#[derive(Args, Debug, Clone)]
pub struct SetKeyArgs {
    pub api_key: String,
}

pub fn parse_rotation(raw: &str) -> Result<(String, Rotation), String> {
    let (name, degrees) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=DEGREES, got '{raw}'"))?;
    if name.trim().is_empty() {
        return Err(format!("missing file name in '{raw}'"));
    }
    let degrees: u16 = degrees
        .trim()
        .parse()
        .map_err(|_| format!("'{degrees}' is not a number of degrees"))?;
    let rotation = Rotation::try_from(degrees).map_err(|err| err.to_string())?;
    Ok((name.trim().to_string(), rotation))
}
