//! KGB CLI - Command-line interface
//!
//! Usage:
//!   kgb build [FILES..] [--text T] [--html P] [--gexf P] [--csv P] [--json P]
//!   kgb text FILES..
//!   kgb entities [FILES..] [--text T]
//!   kgb relations [FILES..] [--text T]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use kgb_core::{AppConfig, LoggingConfig, NerBackend};
use kgb_extractor::KnowledgePipeline;
use kgb_graph::{render_html, to_edge_list, to_gexf, to_node_link_json};
use kgb_parser::{join_texts, select_input, ParserRegistry};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "kgb")]
#[command(about = "Knowledge Graph Builder CLI")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// NER backend (hosted or rules)
    #[arg(long, global = true)]
    ner: Option<NerBackend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// TXT, Markdown, PDF or DOCX files
    files: Vec<PathBuf>,

    /// Text to process instead of the files
    #[arg(long)]
    text: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a knowledge graph and write the requested outputs
    Build {
        #[command(flatten)]
        input: InputArgs,

        /// Interactive HTML page
        #[arg(long)]
        html: Option<PathBuf>,

        /// GEXF graph file
        #[arg(long)]
        gexf: Option<PathBuf>,

        /// Comma-delimited edge list
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Node-link JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Print the text extracted from documents
    Text {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print recognized entities as JSON
    Entities {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print extracted relations as JSON
    Relations {
        #[command(flatten)]
        input: InputArgs,
    },
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Extract and join the text of every file
fn read_files(registry: &ParserRegistry, files: &[PathBuf]) -> anyhow::Result<String> {
    let mut texts = Vec::with_capacity(files.len());
    for path in files {
        let doc = registry
            .parse(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            file_type = %doc.file_type,
            chars = doc.char_count(),
            "Document loaded"
        );
        texts.push(doc.content);
    }
    Ok(join_texts(texts.iter().map(String::as_str)))
}

/// Typed text wins unless blank; otherwise the files are used
fn read_input(registry: &ParserRegistry, input: &InputArgs) -> anyhow::Result<String> {
    let uploaded = read_files(registry, &input.files)?;
    match select_input(input.text.as_deref(), &uploaded) {
        Some(text) => Ok(text.to_string()),
        None => bail!("No input text: pass --text or at least one non-empty file"),
    }
}

fn write_output(path: &Path, content: &str) -> anyhow::Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "Artifact written");
    println!("Wrote {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.clone())?;
    if let Some(backend) = cli.ner {
        config.extraction.ner_backend = backend;
    }
    init_tracing(&config.logging);

    let registry = ParserRegistry::with_defaults();

    match cli.command {
        Commands::Text { files } => {
            println!("{}", read_files(&registry, &files)?);
        }
        Commands::Entities { input } => {
            let text = read_input(&registry, &input)?;
            let pipeline = KnowledgePipeline::from_config(&config)?;
            let entities = pipeline.extract_entities(&text).await?;
            println!("{}", serde_json::to_string_pretty(&entities)?);
        }
        Commands::Relations { input } => {
            let text = read_input(&registry, &input)?;
            let pipeline = KnowledgePipeline::from_config(&config)?;
            let relations = pipeline.extract_relations(&text).await?;
            println!("{}", serde_json::to_string_pretty(&relations)?);
        }
        Commands::Build {
            input,
            html,
            gexf,
            csv,
            json,
        } => {
            let text = read_input(&registry, &input)?;
            tracing::info!(chars = text.chars().count(), "Building knowledge graph");
            let pipeline = KnowledgePipeline::from_config(&config)?;
            let output = pipeline.run(&text).await?;

            println!("Graph Metrics");
            println!("Nodes: {}", output.metrics.node_count);
            println!("Edges: {}", output.metrics.edge_count);
            println!("Density: {:.4}", output.metrics.density);

            if let Some(path) = html {
                write_output(&path, &render_html(&output.graph, &config.render))?;
            }
            if let Some(path) = gexf {
                write_output(&path, &to_gexf(&output.graph)?)?;
            }
            if let Some(path) = csv {
                write_output(&path, &to_edge_list(&output.graph, ","))?;
            }
            if let Some(path) = json {
                write_output(&path, &to_node_link_json(&output.graph)?)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_args() {
        let cli = Cli::try_parse_from([
            "kgb", "build", "a.txt", "b.pdf", "--html", "g.html", "--ner", "rules",
        ])
        .unwrap();

        assert_eq!(cli.ner, Some(NerBackend::Rules));
        match cli.command {
            Commands::Build { input, html, gexf, .. } => {
                assert_eq!(input.files.len(), 2);
                assert_eq!(html, Some(PathBuf::from("g.html")));
                assert!(gexf.is_none());
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_text_requires_files() {
        assert!(Cli::try_parse_from(["kgb", "text"]).is_err());
    }

    #[test]
    fn test_read_input_prefers_typed_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "From the file.").unwrap();

        let registry = ParserRegistry::with_defaults();
        let input = InputArgs {
            files: vec![path.clone()],
            text: Some("Typed.".to_string()),
        };
        assert_eq!(read_input(&registry, &input).unwrap(), "Typed.");

        let input = InputArgs {
            files: vec![path],
            text: Some("  ".to_string()),
        };
        assert_eq!(read_input(&registry, &input).unwrap(), "From the file.");
    }

    #[test]
    fn test_write_output_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csv");

        write_output(&path, "Jobs,Apple,{}\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Jobs,Apple,{}\n");

        let missing = dir.path().join("no-such-dir").join("graph.csv");
        assert!(write_output(&missing, "x").is_err());
    }

    #[test]
    fn test_read_input_errors() {
        let registry = ParserRegistry::with_defaults();
        let input = InputArgs {
            files: Vec::new(),
            text: None,
        };
        assert!(read_input(&registry, &input).is_err());

        let input = InputArgs {
            files: vec![PathBuf::from("missing.rtf")],
            text: None,
        };
        assert!(read_input(&registry, &input).is_err());
    }
}
