//! musicxml2antescofo - convert a MusicXML score into an Antescofo score.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};

use antescore::rational::format_duration;
use antescore::{convert_file, timeline_to_json, ConvertError, ConvertOptions};

#[derive(Parser)]
#[command(name = "musicxml2antescofo")]
#[command(about = "Convert MusicXML (.musicxml, .xml, .mxl) to an Antescofo score")]
#[command(version)]
struct Cli {
    /// Input score
    input: PathBuf,

    /// Write here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print pitch names (C4) instead of fixed-point codes (6000)
    #[arg(long)]
    names: bool,

    /// Leave out the leading comment banner
    #[arg(long)]
    no_header: bool,

    /// Convert only this part id (repeatable)
    #[arg(long = "part", value_name = "ID")]
    parts: Vec<String>,

    /// Convert only this staff (repeatable)
    #[arg(long = "staff", value_name = "N")]
    staves: Vec<i32>,

    /// Convert only this voice (repeatable)
    #[arg(long = "voice", value_name = "N")]
    voices: Vec<i32>,

    /// Print only this measure (repeatable)
    #[arg(long = "measure", value_name = "N")]
    measures: Vec<i32>,

    /// Tempo used until the score sets one
    #[arg(long)]
    bpm: Option<String>,

    /// JSON options file; flags given here override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the element tree instead of the score
    #[arg(long)]
    tree: bool,

    /// Print the event timeline as JSON instead of the score
    #[arg(long, conflicts_with = "tree")]
    timeline: bool,

    /// Log conversion details
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> Result<ConvertOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                ConvertOptions::from_json(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => ConvertOptions::default(),
        };

        if self.names {
            options.note_names = true;
        }
        if self.no_header {
            options.header = false;
        }
        if !self.parts.is_empty() {
            options.parts = self.parts.clone();
        }
        if !self.staves.is_empty() {
            options.staves = self.staves.clone();
        }
        if !self.voices.is_empty() {
            options.voices = self.voices.clone();
        }
        if !self.measures.is_empty() {
            options.measures = self.measures.clone();
        }
        if let Some(bpm) = &self.bpm {
            options.default_bpm = bpm.clone();
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let options = cli.options()?;
    let input = cli.input.display().to_string();

    let conversion = match convert_file(&cli.input, &options) {
        Ok(conversion) => conversion,
        Err(err) => {
            // whatever was placed before the failure is still written out
            if let Some(partial) = err.partial_score() {
                emit(cli.output.as_deref(), partial)?;
            }
            if let ConvertError::Timeline { source, .. } = &err {
                let context = format!(
                    "{input}: measure {}, beat {}",
                    source.measure(),
                    format_duration(source.beat())
                );
                return Err(anyhow::Error::new(err).context(context));
            }
            return Err(err).with_context(|| format!("converting {input}"));
        }
    };

    let text = if cli.tree {
        conversion.tree_text()
    } else if cli.timeline {
        timeline_to_json(&conversion)?
    } else {
        conversion.score_text()
    };
    emit(cli.output.as_deref(), &text)?;

    if !conversion.diagnostics.is_empty() {
        info!(
            "{input}: {} overlapping event(s) skipped",
            conversion.diagnostics.len()
        );
    }
    Ok(())
}

fn emit(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?
        }
        None => print!("{text}"),
    }
    Ok(())
}
