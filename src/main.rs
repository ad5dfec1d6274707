use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pdf_translation_studio::{Config, DocumentKind, MethodChoice, Progress, RunReport};

#[derive(Parser, Debug)]
#[command(
    name = "pdf-translation-studio",
    version,
    about = "Translate PDF documents word by word and lay the result out next to the source pages"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate a PDF and write the interleaved result
    Translate {
        /// PDF to translate
        input: PathBuf,

        /// Output PDF (default: translated_<input> next to the input)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Extraction method: auto, digital or ocr
        #[arg(short = 'm', long = "method", default_value = "auto")]
        method: MethodChoice,

        /// Dictionary JSON (word -> translation); overrides settings
        #[arg(short = 'D', long = "dictionary")]
        dictionary: Option<PathBuf>,

        /// Phrase table JSON (phrase -> translation)
        #[arg(long = "phrases")]
        phrases: Option<PathBuf>,

        /// Write the word mappings of every page as JSON
        #[arg(long = "export-mappings")]
        export_mappings: Option<PathBuf>,

        /// Print translation statistics as JSON
        #[arg(long = "show-stats")]
        show_stats: bool,
    },

    /// Report whether a PDF has a text layer or needs OCR
    Classify {
        input: PathBuf,
    },

    /// Build a JSON dictionary from a TEI file and optional JSON overlays
    BuildDictionary {
        /// TEI (FreeDict) dictionary
        #[arg(long = "tei")]
        tei: PathBuf,

        /// JSON dictionaries merged on top, later files win
        #[arg(long = "merge")]
        merge: Vec<PathBuf>,

        /// Output JSON path
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pdf_translation_studio::logging::init(cli.verbose)?;

    match cli.command {
        Command::Translate {
            input,
            output,
            method,
            dictionary,
            phrases,
            export_mappings,
            show_stats,
        } => {
            let config = Config {
                input,
                output,
                method,
                dictionary,
                phrases,
                export_mappings,
                settings_path: cli.read_settings,
            };
            let report = translate_with_progress(config).await?;
            print_report(&report, show_stats)?;
        }
        Command::Classify { input } => {
            let kind =
                pdf_translation_studio::classify_file(&input, cli.read_settings.as_deref())?;
            println!(
                "{}",
                match kind {
                    DocumentKind::Digital => "digital",
                    DocumentKind::Scanned => "scanned",
                }
            );
        }
        Command::BuildDictionary { tei, merge, output } => {
            let count = pdf_translation_studio::build_dictionary(&tei, &merge, &output)?;
            println!("{count} entries written to {}", output.display());
        }
    }
    Ok(())
}

async fn translate_with_progress(config: Config) -> Result<RunReport> {
    let (progress, mut events) = Progress::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            eprintln!("[{:>3.0}%] {}", event.percent, event.message);
        }
    });
    let result = pdf_translation_studio::run(config, &progress).await;
    drop(progress);
    printer.await.with_context(|| "progress printer stopped unexpectedly")?;
    result
}

fn print_report(report: &RunReport, show_stats: bool) -> Result<()> {
    println!("{}", report.output.display());
    if let Some(path) = &report.mappings_path {
        println!("{}", path.display());
    }
    if show_stats {
        let json = serde_json::to_string_pretty(&report.stats)
            .with_context(|| "failed to serialize statistics")?;
        println!("{json}");
    }
    Ok(())
}
