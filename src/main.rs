mod config;
mod error;
mod kb;
mod model;
mod normalize;
mod ocr;
mod parser;
mod pipeline;
mod preview;
mod validate;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};

use config::Settings;
use ocr::engine::PopplerTesseract;

#[derive(Parser)]
#[command(name = "riverwalk_kb", about = "Riverwalk CCR/Bylaws PDF to JSON knowledge base")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// OCR the scanned PDF (through the page cache) and write the KB
    Build {
        /// Scanned CCR/Bylaws PDF
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// KB JSON output path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Per-page OCR cache
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Render resolution for OCR
        #[arg(long)]
        dpi: Option<u32>,
        /// Start the Bylaws at this page instead of searching for the marker
        #[arg(long)]
        bylaws_page: Option<u32>,
    },
    /// Check a KB file for structural problems (read-only)
    Validate {
        /// KB JSON file
        #[arg(default_value = "output/riverwalk_ccrs_kb.json")]
        path: PathBuf,
        /// Total page count of the source PDF, for range checks
        #[arg(long)]
        page_count: Option<usize>,
    },
    /// Print sections for reading alongside the PDF
    Preview {
        /// KB JSON file
        #[arg(default_value = "output/riverwalk_ccrs_kb.json")]
        path: PathBuf,
        /// Page filter: "4-6", "35", "-10", "50-"
        #[arg(short, long)]
        pages: Option<String>,
        /// Declaration or Bylaws
        #[arg(short, long)]
        doc_type: Option<String>,
        /// Section number prefix, e.g. "10."
        #[arg(short, long)]
        section: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Build {
            pdf,
            output,
            cache,
            dpi,
            bylaws_page,
        } => match build(pdf, output, cache, dpi, bylaws_page) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Build failed: {:#}", e);
                ExitCode::from(1)
            }
        },
        Commands::Validate { path, page_count } => match validate::validate_file(&path, page_count) {
            Ok(report) => {
                report.print();
                if report.is_clean() {
                    println!("{}: no issues.", path.display());
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(1)
                }
            }
            Err(e) => {
                tracing::error!("Cannot read {}: {}", path.display(), e);
                ExitCode::from(2)
            }
        },
        Commands::Preview {
            path,
            pages,
            doc_type,
            section,
        } => match preview_file(&path, pages, doc_type, section) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Preview failed: {:#}", e);
                ExitCode::from(2)
            }
        },
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    code
}

fn build(
    pdf: Option<PathBuf>,
    output: Option<PathBuf>,
    cache: Option<PathBuf>,
    dpi: Option<u32>,
    bylaws_page: Option<u32>,
) -> anyhow::Result<()> {
    let mut settings = Settings::load()?;
    if let Some(p) = pdf {
        settings.pdf_path = p;
    }
    if let Some(p) = output {
        settings.output_path = p;
    }
    if let Some(p) = cache {
        settings.cache_path = p;
    }
    if let Some(d) = dpi {
        settings.dpi = d;
    }
    if bylaws_page.is_some() {
        settings.bylaws_start_page = bylaws_page;
    }
    settings.check()?;

    let engine = PopplerTesseract::from_settings(&settings);
    let summary = pipeline::run_build(&settings, &engine)?;
    summary.print();
    println!("KB written to {}", settings.output_path.display());
    Ok(())
}

fn preview_file(
    path: &std::path::Path,
    pages: Option<String>,
    doc_type: Option<String>,
    section: Option<String>,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let (sections, _) = validate::read_sections(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let filter = preview::Filter {
        pages: pages
            .as_deref()
            .map(preview::PageRange::parse)
            .transpose()?
            .unwrap_or_default(),
        doc_type,
        section_prefix: section,
    };
    let out = preview::render(&sections, &filter);
    if out.is_empty() {
        println!("No sections match.");
    } else {
        print!("{}", out);
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
