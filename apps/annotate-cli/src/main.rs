//! Headless compositing
//!
//! `annotate compose` writes an edits file (a serialized `DocumentEdits`)
//! into a PDF; `annotate inspect` prints page count and page sizes.

use annotate_core::config::EditorConfig;
use annotate_core::{composite_with_report, page_sizes, DocumentEdits, ExportMetrics};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "annotate")]
#[command(version, about = "Composite annotation edits into PDF files")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Draw an edits file onto a PDF
    Compose {
        /// Source PDF
        #[arg(short, long)]
        input: PathBuf,

        /// Edits JSON
        #[arg(short, long)]
        edits: PathBuf,

        /// Where to write the composited PDF
        #[arg(short, long)]
        output: PathBuf,

        /// TOML configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print run metrics as JSON on stdout
        #[arg(long)]
        report: bool,
    },

    /// Print page count and page sizes
    Inspect {
        /// Source PDF
        #[arg(short, long)]
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries command output, logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Compose {
            input,
            edits,
            output,
            config,
            report,
        } => {
            let metrics = compose(&input, &edits, &output, config.as_deref())?;
            if report {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            }
        }
        Command::Inspect { input, json } => {
            let source =
                fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            print!("{}", describe_pages(&source, json)?);
        }
    }
    Ok(())
}

fn compose(
    input: &Path,
    edits: &Path,
    output: &Path,
    config: Option<&Path>,
) -> Result<ExportMetrics> {
    let config = match config {
        Some(path) => EditorConfig::from_file(path)?,
        None => EditorConfig::default(),
    };
    let source = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let edits_json = fs::read_to_string(edits)
        .with_context(|| format!("Failed to read {}", edits.display()))?;
    let edits = DocumentEdits::from_json(&edits_json)
        .with_context(|| format!("Invalid edits file {}", edits.display()))?;

    let (bytes, metrics) = compose_bytes(&source, &edits, &config)?;
    fs::write(output, &bytes).with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        output = %output.display(),
        bytes = bytes.len(),
        "Wrote composited PDF"
    );
    Ok(metrics)
}

fn compose_bytes(
    source: &[u8],
    edits: &DocumentEdits,
    config: &EditorConfig,
) -> Result<(Vec<u8>, ExportMetrics)> {
    let (bytes, report) = composite_with_report(source, edits, &config.compositor)
        .context("Failed to composite edits")?;
    let metrics = ExportMetrics::from_report(&report, source.len(), bytes.len(), edits.len());
    Ok((bytes, metrics))
}

fn describe_pages(source: &[u8], json: bool) -> Result<String> {
    let pages = page_sizes(source).context("Source is not a PDF")?;
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(&pages)?));
    }

    let mut out = format!("pages: {}\n", pages.len());
    for (i, page) in pages.iter().enumerate() {
        out.push_str(&format!("page {}: {} x {}\n", i + 1, page.width, page.height));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotate_core::records::{Markup, MarkupType};
    use annotate_core::Rect;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn create_test_pdf(num_pages: usize) -> Vec<u8> {
        use lopdf::{dictionary, Document, Object};

        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..num_pages)
            .map(|_| {
                Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => Object::Reference(pages_id),
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                }))
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_parse_compose() {
        let args = Args::try_parse_from([
            "annotate", "compose", "-i", "in.pdf", "-e", "edits.json", "-o", "out.pdf",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Compose {
                input: "in.pdf".into(),
                edits: "edits.json".into(),
                output: "out.pdf".into(),
                config: None,
                report: false,
            }
        );
    }

    #[test]
    fn test_compose_requires_output() {
        assert!(Args::try_parse_from(["annotate", "compose", "-i", "a.pdf", "-e", "b.json"]).is_err());
    }

    #[test]
    fn test_parse_inspect_json() {
        let args = Args::try_parse_from(["annotate", "inspect", "--input", "a.pdf", "--json"]).unwrap();
        assert_eq!(
            args.command,
            Command::Inspect {
                input: "a.pdf".into(),
                json: true,
            }
        );
    }

    #[test]
    fn test_describe_pages() {
        let text = describe_pages(&create_test_pdf(2), false).unwrap();
        assert_eq!(text, "pages: 2\npage 1: 612 x 792\npage 2: 612 x 792\n");
        assert!(describe_pages(b"garbage", false).is_err());
    }

    #[test]
    fn test_compose_bytes_metrics() {
        let source = create_test_pdf(1);
        let edits = DocumentEdits {
            markups: Arc::new(vec![Markup::new(
                0,
                Rect::new(10.0, 10.0, 50.0, 12.0),
                MarkupType::Strikeout,
                "#FF0000",
                1.0,
            )]),
            ..Default::default()
        };
        let (bytes, metrics) = compose_bytes(&source, &edits, &EditorConfig::default()).unwrap();
        assert_eq!(metrics.page_count, 1);
        assert_eq!(metrics.applied, 1);
        assert_eq!(metrics.output_size_bytes, bytes.len());
    }

    #[test]
    fn test_compose_files() {
        let dir = std::env::temp_dir().join(format!("annotate-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.pdf");
        let edits = dir.join("edits.json");
        let output = dir.join("out.pdf");
        fs::write(&input, create_test_pdf(1)).unwrap();
        fs::write(&edits, "{}").unwrap();

        let metrics = compose(&input, &edits, &output, None).unwrap();
        assert_eq!(metrics.edit_count, 0);
        assert_eq!(metrics.page_count, 1);
        assert_eq!(fs::read(&output).unwrap(), fs::read(&input).unwrap());
        fs::remove_dir_all(&dir).ok();
    }
}
