mod cache;
mod config;
mod delay;
mod format;
mod lookup;
mod scholar;
mod tag;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use config::Config;
use delay::Throttle;
use lookup::{Citation, CitationLookup, Failure};
use scholar::ScholarClient;
use tag::render_template;

#[derive(Parser)]
#[command(name = "scholar-citations")]
#[command(about = "Render Google Scholar citation counts into static site templates")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace every `{% google_scholar_citations ... %}` tag in a template
    Render {
        /// Template file to render
        #[arg(short, long)]
        template: PathBuf,

        /// JSON object the tag variables are resolved against
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Write the rendered page here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the random pause before each uncached request
        #[arg(long)]
        no_delay: bool,
    },
    /// Print the citation count of one article
    Lookup {
        scholar_id: String,
        article_id: String,

        /// Print a JSON report instead of the bare count
        #[arg(long)]
        json: bool,

        #[arg(long)]
        no_delay: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("context in {} must be a JSON object", .0.display())]
    NotAnObject(PathBuf),
}

#[derive(Serialize)]
struct LookupReport<'a> {
    scholar_id: &'a str,
    article_id: &'a str,
    citations: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> LookupReport<'a> {
    fn new(scholar_id: &'a str, article_id: &'a str, citation: &Citation) -> Self {
        let (count, error) = match citation {
            Citation::Count(n) => (Some(*n), None),
            Citation::Unavailable(failure) => (None, Some(describe_failure(failure))),
        };
        Self {
            scholar_id,
            article_id,
            citations: citation.to_string(),
            count,
            error,
        }
    }
}

fn describe_failure(failure: &Failure) -> String {
    match failure {
        Failure::MissingParameter => "scholar_id or article_id is missing".to_string(),
        Failure::UpstreamStatus(code) => format!("upstream returned HTTP {code}"),
        Failure::Fetch(reason) => reason.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scholar_citations=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let client = ScholarClient::from_config(&config)?;

    match cli.command {
        Command::Render {
            template,
            context,
            output,
            no_delay,
        } => {
            let source = read_file(&template)?;
            let context = load_context(context.as_deref())?;

            let mut lookup = CitationLookup::new(client, Throttle::new(!no_delay), &config);
            let rendered = render_template(&source, &context, &mut lookup).await?;
            info!(
                articles = lookup.cache().len(),
                failed = lookup.cache().failures(),
                "render complete"
            );

            match output {
                Some(path) => fs::write(&path, rendered).map_err(|source| CliError::Write {
                    path: path.clone(),
                    source,
                })?,
                None => print!("{rendered}"),
            }
        }
        Command::Lookup {
            scholar_id,
            article_id,
            json,
            no_delay,
        } => {
            let mut lookup = CitationLookup::new(client, Throttle::new(!no_delay), &config);
            let citation = lookup.lookup(Some(scholar_id.as_str()), Some(article_id.as_str())).await;
            if json {
                let report = LookupReport::new(&scholar_id, &article_id, &citation);
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{citation}");
            }
        }
    }

    Ok(())
}

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the render context. Without a file, every variable is unbound.
fn load_context(path: Option<&Path>) -> Result<Value, CliError> {
    let Some(path) = path else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let raw = read_file(path)?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if !value.is_object() {
        return Err(CliError::NotAnObject(path.to_path_buf()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_render_command() {
        let cli = Cli::try_parse_from([
            "scholar-citations",
            "render",
            "--template",
            "page.html",
            "--context",
            "ctx.json",
            "--no-delay",
        ])
        .unwrap();
        match cli.command {
            Command::Render {
                template,
                context,
                output,
                no_delay,
            } => {
                assert_eq!(template, PathBuf::from("page.html"));
                assert_eq!(context, Some(PathBuf::from("ctx.json")));
                assert_eq!(output, None);
                assert!(no_delay);
            }
            Command::Lookup { .. } => panic!("expected render command"),
        }
    }

    #[test]
    fn parses_lookup_command() {
        let cli = Cli::try_parse_from(["scholar-citations", "lookup", "ABC123", "99", "--json"])
            .unwrap();
        match cli.command {
            Command::Lookup {
                scholar_id,
                article_id,
                json,
                no_delay,
            } => {
                assert_eq!(scholar_id, "ABC123");
                assert_eq!(article_id, "99");
                assert!(json);
                assert!(!no_delay);
            }
            Command::Render { .. } => panic!("expected lookup command"),
        }
    }

    #[test]
    fn lookup_requires_both_ids() {
        assert!(Cli::try_parse_from(["scholar-citations", "lookup", "ABC123"]).is_err());
    }

    #[test]
    fn load_context_reads_json_object() {
        let file = write_temp(r#"{"page": {"scholar_id": "ABC123"}}"#);
        let context = load_context(Some(file.path())).unwrap();
        assert_eq!(context["page"]["scholar_id"], "ABC123");
    }

    #[test]
    fn load_context_without_file_is_empty_object() {
        let context = load_context(None).unwrap();
        assert_eq!(context, Value::Object(serde_json::Map::new()));
    }

    #[test]
    fn load_context_rejects_non_object() {
        let file = write_temp("[1, 2, 3]");
        assert!(matches!(
            load_context(Some(file.path())),
            Err(CliError::NotAnObject(_))
        ));
    }

    #[test]
    fn load_context_reports_invalid_json() {
        let file = write_temp("{not json");
        let err = load_context(Some(file.path())).unwrap_err();
        assert!(matches!(err, CliError::Json { .. }));
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn load_context_reports_missing_file() {
        let err = load_context(Some(Path::new("/nonexistent/ctx.json"))).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }

    #[test]
    fn report_for_success_includes_count() {
        let report = LookupReport::new("ABC123", "99", &Citation::Count(3_400_000));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["citations"], "3.4M");
        assert_eq!(json["count"], 3_400_000);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn report_for_failure_includes_reason() {
        let report = LookupReport::new(
            "ABC123",
            "99",
            &Citation::Unavailable(Failure::UpstreamStatus(403)),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["citations"], "N/A");
        assert_eq!(json["error"], "upstream returned HTTP 403");
        assert!(json.get("count").is_none());
    }
}
