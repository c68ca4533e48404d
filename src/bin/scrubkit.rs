//! scrubkit CLI tool
//!
//! Watermark and metadata removal for PDF/PPTX files, PDF unlocking, comic
//! chapter downloads and the applied-jobs CSV export.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glob::glob;
use std::path::PathBuf;
use std::process;

use scrubkit::clean::{clean_copy, default_output_path, nuke_file_metadata, DocumentKind, DEFAULT_CLEAN_SUFFIX};
use scrubkit::comic::ComicDownloader;
use scrubkit::config::{
    WatermarkTarget, DEFAULT_WATERMARK_HEIGHT, DEFAULT_WATERMARK_HOST, DEFAULT_WATERMARK_WIDTH,
    JOBS_COOKIE_ENV, JOBS_CSV_PATH_ENV, JOBS_DEFAULT_OUTPUT, PDF_FILE_ENV, PPTX_FILE_ENV,
};
use scrubkit::pdf::{extract_metadata, remove_watermark, unlock_pdf, UnlockOutcome};
use scrubkit::pptx::remove_pptx_watermark;
use scrubkit::{jobs, Error};

/// scrubkit - Strip watermarks and metadata, unlock PDFs, export web content
#[derive(Parser)]
#[command(name = "scrubkit")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Remove the watermark from a PDF in place
    scrubkit pdf-watermark slides.pdf

    # Clean a copy, format picked from the extension
    scrubkit clean deck.pptx -o deck-final.pptx

    # Blank metadata of every PDF in a folder
    scrubkit nuke-metadata \"reports/*.pdf\"

    # Export applied jobs using a browser session cookie
    IIMJOBS_COOKIE='...' scrubkit jobs -o applied.csv")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the watermark from a PDF, in place
    PdfWatermark {
        /// PDF file to clean
        #[arg(env = PDF_FILE_ENV)]
        file: Option<PathBuf>,

        /// Substring identifying watermark link targets
        #[arg(long, default_value = DEFAULT_WATERMARK_HOST)]
        host: String,

        /// Watermark image width in pixels
        #[arg(long, default_value_t = DEFAULT_WATERMARK_WIDTH)]
        width: i64,

        /// Watermark image height in pixels
        #[arg(long, default_value_t = DEFAULT_WATERMARK_HEIGHT)]
        height: i64,
    },

    /// Remove the watermark from every slide layout of a PPTX, in place
    PptxWatermark {
        /// Presentation to clean
        #[arg(env = PPTX_FILE_ENV)]
        file: Option<PathBuf>,

        /// Substring identifying watermark link targets
        #[arg(long, default_value = DEFAULT_WATERMARK_HOST)]
        host: String,
    },

    /// Write a watermark-free copy of a PDF or PPTX
    Clean {
        /// Input PDF or PPTX file
        input: PathBuf,

        /// Output path (default: <stem>-clean.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Substring identifying watermark link targets
        #[arg(long, default_value = DEFAULT_WATERMARK_HOST)]
        host: String,
    },

    /// Write metadata-free copies of PDF/PPTX files
    NukeMetadata {
        /// Input files. Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Suffix added to each output file stem
        #[arg(long, default_value = DEFAULT_CLEAN_SUFFIX, allow_hyphen_values = true)]
        suffix: String,
    },

    /// Decrypt a password-protected PDF
    Unlock {
        /// Encrypted PDF
        input: PathBuf,

        /// Where to write the decrypted copy
        output: PathBuf,

        /// User or owner password
        password: String,
    },

    /// Download comic chapters into PDFs, one image per page
    Comic {
        /// Chapter page URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Directory for the generated PDFs
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Export applied jobs from iimjobs.com to CSV
    Jobs {
        /// Cookie header of a logged-in browser session
        #[arg(long, env = JOBS_COOKIE_ENV, hide_env_values = true)]
        cookie: Option<String>,

        /// Output CSV path
        #[arg(short, long, env = JOBS_CSV_PATH_ENV, default_value = JOBS_DEFAULT_OUTPUT)]
        output: PathBuf,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::PdfWatermark { file, host, width, height } => {
            cmd_pdf_watermark(file, WatermarkTarget::new(&host, width, height))
        }
        Commands::PptxWatermark { file, host } => {
            cmd_pptx_watermark(file, &host)
        }
        Commands::Clean { input, output, host } => {
            cmd_clean(input, output, &host)
        }
        Commands::NukeMetadata { inputs, suffix } => {
            cmd_nuke_metadata(inputs, &suffix)
        }
        Commands::Unlock { input, output, password } => {
            cmd_unlock(input, output, &password)
        }
        Commands::Comic { urls, out_dir } => {
            cmd_comic(urls, out_dir)
        }
        Commands::Jobs { cookie, output } => {
            cmd_jobs(cookie, output)
        }
        Commands::Info { input } => {
            cmd_info(input)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> scrubkit::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let entries = glob(&pattern).map_err(|e| Error::InvalidGlob(format!("{}: {}", pattern, e)))?;
            let mut matched = false;
            for entry in entries {
                match entry {
                    Ok(path) => {
                        paths.push(path);
                        matched = true;
                    }
                    Err(e) => eprintln!("Warning: glob error for {}: {}", pattern, e),
                }
            }
            if !matched {
                return Err(Error::NoFilesMatched(pattern));
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }

    // Sort paths for consistent ordering
    paths.sort();

    Ok(paths)
}

/// Fail unless `file` was given on the command line or through `env`
fn required_file(file: Option<PathBuf>, env: &str) -> anyhow::Result<PathBuf> {
    file.ok_or_else(|| Error::MissingConfig(format!("FILE argument or {}", env)).into())
}

/// Remove the watermark from a PDF in place
fn cmd_pdf_watermark(file: Option<PathBuf>, target: WatermarkTarget) -> anyhow::Result<()> {
    let file = required_file(file, PDF_FILE_ENV)?;

    eprintln!("Cleaning {}...", file.display());
    let report = remove_watermark(&file, &target)?;

    if report.total() == 0 {
        eprintln!("No watermark found; file left unchanged");
    } else {
        eprintln!(
            "Removed {} link annotation(s), scrubbed {} image(s), excised {} draw span(s)",
            report.annotations_removed, report.images_scrubbed, report.draw_spans_removed
        );
    }

    Ok(())
}

/// Remove the watermark from a PPTX in place
fn cmd_pptx_watermark(file: Option<PathBuf>, host: &str) -> anyhow::Result<()> {
    let file = required_file(file, PPTX_FILE_ENV)?;
    let target = WatermarkTarget::new(host, DEFAULT_WATERMARK_WIDTH, DEFAULT_WATERMARK_HEIGHT);

    eprintln!("Cleaning {}...", file.display());
    let report = remove_pptx_watermark(&file, &target)?;

    if report.layouts_cleaned == 0 {
        eprintln!("No watermark found; file left unchanged");
    } else {
        eprintln!("Cleaned {} slide layout(s)", report.layouts_cleaned);
    }

    Ok(())
}

/// Clean a copy of a PDF or PPTX
fn cmd_clean(input: PathBuf, output: Option<PathBuf>, host: &str) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| default_output_path(&input, DEFAULT_CLEAN_SUFFIX));
    let target = WatermarkTarget::new(host, DEFAULT_WATERMARK_WIDTH, DEFAULT_WATERMARK_HEIGHT);

    let removed = clean_copy(&input, &output, &target)
        .with_context(|| format!("Failed to clean {}", input.display()))?;

    eprintln!("{} removal(s)", removed);
    eprintln!("Output: {}", output.display());
    Ok(())
}

/// Blank the metadata of a batch of files
fn cmd_nuke_metadata(inputs: Vec<String>, suffix: &str) -> anyhow::Result<()> {
    let inputs = expand_globs(inputs)?;
    let total = inputs.len();
    let mut failed = 0;

    for input in inputs {
        let output = default_output_path(&input, suffix);
        match nuke_file_metadata(&input, &output) {
            Ok(kind) => {
                let label = match kind {
                    DocumentKind::Pdf => "PDF",
                    DocumentKind::Pptx => "PPTX",
                };
                eprintln!("✓ {} ({}) -> {}", input.display(), label, output.display());
            }
            Err(e) => {
                eprintln!("✗ {}: {}", input.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) failed", failed, total);
    }
    Ok(())
}

/// Decrypt a PDF
fn cmd_unlock(input: PathBuf, output: PathBuf, password: &str) -> anyhow::Result<()> {
    match unlock_pdf(&input, &output, password)? {
        UnlockOutcome::Decrypted => eprintln!("Decrypted to: {}", output.display()),
        UnlockOutcome::NotEncrypted => {
            eprintln!("{} was not encrypted; copied to: {}", input.display(), output.display())
        }
    }
    Ok(())
}

/// Download each chapter URL into its own PDF
fn cmd_comic(urls: Vec<String>, out_dir: PathBuf) -> anyhow::Result<()> {
    if !out_dir.is_dir() {
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    }

    let downloader = ComicDownloader::new()?;
    let total = urls.len();
    let mut failed = 0;

    for url in urls {
        match downloader.download_chapter(&url, &out_dir) {
            Ok(report) => {
                eprintln!("✓ {} -> {} ({} pages)", url, report.output.display(), report.pages);
                if report.skipped > 0 {
                    eprintln!("  {} image(s) skipped", report.skipped);
                }
            }
            Err(e) => {
                eprintln!("✗ {}: {}", url, e);
                failed += 1;
            }
        }
        eprintln!("{}", "-".repeat(50));
    }

    if failed > 0 {
        bail!("{} of {} chapter(s) failed", failed, total);
    }
    Ok(())
}

/// Export applied jobs to CSV
fn cmd_jobs(cookie: Option<String>, output: PathBuf) -> anyhow::Result<()> {
    let cookie = cookie.unwrap_or_default();
    let (path, count) = jobs::export_applied_jobs(&cookie, &output)?;
    eprintln!("Exported {} jobs to {}", count, path.display());
    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> anyhow::Result<()> {
    if DocumentKind::from_path(&input)? != DocumentKind::Pdf {
        return Err(Error::UnsupportedFormat(input).into());
    }

    let metadata = extract_metadata(&input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);
    println!("Title: {}", metadata.title.as_deref().unwrap_or("-"));
    println!("Author: {}", metadata.author.as_deref().unwrap_or("-"));
    println!("Producer: {}", metadata.producer.as_deref().unwrap_or("-"));
    println!("Encrypted: {}", if metadata.encrypted { "yes" } else { "no" });

    Ok(())
}
