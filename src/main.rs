//! lexicon CLI: split a book into articles and build its entity directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

use lexicon::config::PipelineConfig;
use lexicon::consolidate::{ConsolidationReport, ManualMergeReport};
use lexicon::extract::ExtractReport;
use lexicon::llm::{ChatClient, LlmMentionSource, LlmMerger};
use lexicon::pipeline::{ChapterSplit, Pipeline};

#[derive(Parser)]
#[command(name = "lexicon", version, about = "Article segmentation and entity directory builder")]
struct Cli {
    /// Pipeline config file (TOML). Used only if it exists.
    #[arg(long, global = true, default_value = "lexicon.toml")]
    config: PathBuf,

    /// Book directory; overrides `book_dir` from the config.
    #[arg(long, global = true)]
    book_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split chapter texts into per-article files.
    Split,

    /// Extract entity mentions from every article not yet cached.
    Extract,

    /// Group and merge cached mentions into the entity directory.
    Consolidate,

    /// Rebuild the entity directory from the consolidation snapshot and the
    /// hand-written merge groups.
    MergeGroups,

    /// Run split, extract, consolidate and merge-groups in order.
    Run,

    /// Show what has been produced so far.
    Status,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = PipelineConfig::load_or_default(&cli.config)?;
    if let Some(book_dir) = cli.book_dir {
        config.book_dir = book_dir;
    }

    match cli.command {
        Commands::Split => {
            let pipeline = Pipeline::new(config)?;
            print_split(&pipeline.split()?);
        }

        Commands::Extract => {
            let client = ChatClient::from_env(config.llm.clone())?;
            let mut pipeline = Pipeline::new(config)?;
            let report = pipeline.extract(&LlmMentionSource::new(&client))?;
            print_extract(&report);
            println!("Requests sent: {}", pipeline.requests_sent());
        }

        Commands::Consolidate => {
            let client = ChatClient::from_env(config.llm.clone())?;
            let mut pipeline = Pipeline::new(config)?;
            let report = pipeline.consolidate(&LlmMerger::new(&client))?;
            print_consolidate(&report);
            println!("Wrote {}", pipeline.paths().directory.display());
        }

        Commands::MergeGroups => {
            let pipeline = Pipeline::new(config)?;
            print_manual(&pipeline.merge_groups()?);
            println!("Wrote {}", pipeline.paths().directory.display());
        }

        Commands::Run => {
            let client = ChatClient::from_env(config.llm.clone())?;
            println!("Model: {}", client.model());
            let mut pipeline = Pipeline::new(config)?;
            let report = pipeline.run(&LlmMentionSource::new(&client), &LlmMerger::new(&client))?;
            print_split(&report.split);
            print_extract(&report.extract);
            print_consolidate(&report.consolidate);
            print_manual(&report.manual);
            println!(
                "Directory: {} entities in {} ({} requests)",
                report.entities,
                pipeline.paths().directory.display(),
                pipeline.requests_sent()
            );
        }

        Commands::Status => {
            let pipeline = Pipeline::new(config)?;
            println!("Book directory: {}", pipeline.paths().root().display());
            println!("{}", pipeline.status()?);
        }
    }

    Ok(())
}

fn print_split(chapters: &[ChapterSplit]) {
    println!("Split:");
    for ch in chapters {
        println!(
            "  {}: {} articles ({} preamble lines dropped)",
            ch.tag, ch.articles, ch.discarded_lines
        );
    }
}

fn print_extract(report: &ExtractReport) {
    println!(
        "Extract: {} new, {} cached, {} mentions added",
        report.processed, report.skipped, report.mentions
    );
    if !report.failed.is_empty() {
        println!("  failed ({}), re-run to retry:", report.failed.len());
        for id in &report.failed {
            println!("    {id}");
        }
    }
}

fn print_consolidate(report: &ConsolidationReport) {
    println!(
        "Consolidate: {} buckets ({} single, {} merged, {} reused, {} fallback)",
        report.buckets(),
        report.singles,
        report.merged,
        report.reused,
        report.fallbacks.len()
    );
    for key in &report.fallbacks {
        println!("  fallback: {key}");
    }
}

fn print_manual(report: &ManualMergeReport) {
    if let Some((expected, actual)) = report.snapshot_mismatch {
        println!(
            "Merge groups: skipped, written for {expected} entities but snapshot has {actual}"
        );
        return;
    }
    println!(
        "Merge groups: {} applied, {} skipped, {} entities folded",
        report.groups_applied, report.groups_skipped, report.entities_removed
    );
    for missing in &report.missing {
        println!("  unresolved: {missing}");
    }
}
