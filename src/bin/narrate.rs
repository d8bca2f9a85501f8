//! narrate - one-shot narration of a detection list
//!
//! Reads `{"detections": [...], "texts": [...]}` as JSON from a file or stdin
//! and prints the resulting narration record as JSON.

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;

use percepta::detect::RawDetection;
use percepta::narrate::{Language, Narrator, NarratorSettings};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input JSON file, or "-" for stdin.
    #[arg(long, default_value = "-")]
    input: String,
    /// Narration language code.
    #[arg(long, default_value = "en")]
    language: String,
    /// Frame width the bounding boxes refer to.
    #[arg(long, default_value_t = 640)]
    width: u32,
    /// Frame height the bounding boxes refer to.
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Extra class policies (JSON).
    #[arg(long)]
    classes: Option<PathBuf>,
    /// Extra phrase packs (JSON).
    #[arg(long)]
    phrases: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct NarrateInput {
    #[serde(default, alias = "objects")]
    detections: Vec<RawDetection>,
    #[serde(default)]
    texts: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.width == 0 || args.height == 0 {
        return Err(anyhow!("--width and --height must be non-zero"));
    }
    let language = Language::parse(&args.language)?;

    let raw = read_input(&args.input)?;
    let input: NarrateInput =
        serde_json::from_str(&raw).map_err(|e| anyhow!("invalid narration input: {}", e))?;

    let mut narrator = Narrator::new(&NarratorSettings {
        classes_path: args.classes,
        phrases_path: args.phrases,
        ..NarratorSettings::default()
    })?;
    let scored = narrator.score_frame(&input.detections, args.height, args.width);
    let event = narrator.format_context(&scored, &input.texts, &language);

    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    std::fs::read_to_string(input).map_err(|e| anyhow!("failed to read {}: {}", input, e))
}
