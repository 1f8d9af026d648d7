use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use feed_cache_core::{
    CollectionName, HttpFeedClient, IngestOptions, IngestionPipeline, KeywordSet,
    OpenSearchStore, PipelineSettings, RecordFilter, DEFAULT_CONTENT_FIELD, DEFAULT_FEED_URL,
    DEFAULT_ID_FIELD,
};
use serde_json::{Map, Value};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "feed-cache", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Feed API base URL
    #[arg(long, env = "FEED_API_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Bearer token sent with feed requests
    #[arg(long, env = "FEED_API_TOKEN", hide_env_values = true)]
    feed_token: Option<String>,

    /// OpenSearch base URL
    #[arg(long, env = "OPENSEARCH_URL", default_value = "http://localhost:9200")]
    opensearch_url: String,

    /// Prefix for OpenSearch index names
    #[arg(long, env = "OPENSEARCH_INDEX_PREFIX", default_value = "")]
    index_prefix: String,

    /// Record field holding the unique identifier
    #[arg(long, default_value = DEFAULT_ID_FIELD)]
    id_field: String,

    /// Record field holding the textual content
    #[arg(long, default_value = DEFAULT_CONTENT_FIELD)]
    content_field: String,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch an endpoint and store matching records not seen before.
    Ingest {
        /// Feed endpoint, e.g. statuses/user_timeline
        endpoint: String,
        /// Path that must hold a non-empty value (repeatable).
        #[arg(long)]
        require: Vec<String>,
        /// `path=kw1,kw2`: path must match one of the keywords (repeatable).
        /// Commas inside `{}`, `[]` or `()` and escaped commas stay in the
        /// keyword; use `--options` for anything harder to quote. An empty
        /// list (`path=`) only checks that the path holds a value.
        #[arg(long)]
        grep: Vec<String>,
        /// `key=value` query parameter (repeatable).
        #[arg(long)]
        query: Vec<String>,
        /// JSON options document with `require`, `grep` and `query`.
        #[arg(long, conflicts_with_all = ["require", "grep", "query"])]
        options: Option<String>,
        /// Read the JSON options document from a file.
        #[arg(long, conflicts_with_all = ["require", "grep", "query", "options"])]
        options_file: Option<String>,
    },
    /// Print stored records of an endpoint.
    Read {
        endpoint: String,
        /// JSON mapping of path to exact value.
        #[arg(long, default_value = "{}")]
        filter: String,
        /// Maximum number of records.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the collection name an endpoint is stored under.
    Collection { endpoint: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "feed-cache boot"
    );

    if let Command::Collection { endpoint } = &cli.command {
        println!("{}", CollectionName::from_endpoint(endpoint));
        return Ok(());
    }

    let mut feed = HttpFeedClient::new(&cli.feed_url)?;
    if let Some(token) = &cli.feed_token {
        feed = feed.with_token(token);
    }
    let store = OpenSearchStore::new(&cli.opensearch_url).with_index_prefix(&cli.index_prefix);
    let settings = PipelineSettings::new(&cli.id_field, &cli.content_field)?;
    let pipeline = IngestionPipeline::new(feed, store).with_settings(settings);

    match cli.command {
        Command::Ingest {
            endpoint,
            require,
            grep,
            query,
            options,
            options_file,
        } => {
            let options = match (options, options_file) {
                (Some(raw), _) => parse_options_document(&raw)?,
                (None, Some(path)) => {
                    let raw = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("reading options file {path}"))?;
                    parse_options_document(&raw)?
                }
                (None, None) => options_from_flags(require, &grep, &query)?,
            };

            let result = pipeline.ingest(&endpoint, &options).await?;
            if result.is_upstream_error() {
                warn!(endpoint = %endpoint, "feed answered with an error payload");
            }

            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Read {
            endpoint,
            filter,
            limit,
        } => {
            let filter: Value = serde_json::from_str(&filter).context("filter is not valid json")?;
            let filter = RecordFilter::from_value(&filter)?;
            let records = pipeline.read(&endpoint, &filter, limit).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Collection { .. } => {}
    }

    Ok(())
}

fn parse_options_document(raw: &str) -> anyhow::Result<IngestOptions> {
    let value: Value = serde_json::from_str(raw).context("options are not valid json")?;
    Ok(IngestOptions::from_value(&value)?)
}

fn options_from_flags(
    require: Vec<String>,
    grep: &[String],
    query: &[String],
) -> anyhow::Result<IngestOptions> {
    let mut options = IngestOptions {
        require,
        ..IngestOptions::default()
    };

    for entry in grep {
        let (path, keywords) = split_pair(entry, "--grep")?;
        let keywords = split_keywords(keywords)
            .into_iter()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty());
        options
            .grep
            .insert(path.to_string(), KeywordSet::many(keywords));
    }

    let mut params = Map::new();
    for entry in query {
        let (key, value) = split_pair(entry, "--query")?;
        params.insert(key.to_string(), Value::String(value.to_string()));
    }
    options.query = params;

    Ok(options)
}

/// Splits on commas outside regex groups, classes and repetition braces.
fn split_keywords(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut escaped = false;
    let mut start = 0;

    for (index, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&raw[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn split_pair<'a>(entry: &'a str, flag: &str) -> anyhow::Result<(&'a str, &'a str)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => bail!("{flag} expects key=value, got {entry:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flags_build_grep_and_query() -> anyhow::Result<()> {
        let options = options_from_flags(
            vec!["user.screen_name".to_string()],
            &["text=rust, tokio".to_string()],
            &["count=20".to_string(), "since_id=".to_string()],
        )?;

        assert_eq!(options.require, vec!["user.screen_name".to_string()]);
        assert_eq!(options.grep["text"], KeywordSet::many(["rust", "tokio"]));
        assert_eq!(options.query["count"], json!("20"));
        assert_eq!(options.query["since_id"], json!(""));
        Ok(())
    }

    #[test]
    fn grep_keywords_keep_regex_commas() -> anyhow::Result<()> {
        let options = options_from_flags(
            Vec::new(),
            &[r"text=a{1,3}, [,;]x, b\,c, (d|e,f)".to_string()],
            &[],
        )?;
        assert_eq!(
            options.grep["text"],
            KeywordSet::many(["a{1,3}", "[,;]x", r"b\,c", "(d|e,f)"])
        );
        Ok(())
    }

    #[test]
    fn empty_grep_flag_checks_presence() -> anyhow::Result<()> {
        let options = options_from_flags(Vec::new(), &["text=".to_string()], &[])?;
        assert!(options.grep["text"].is_empty());

        let predicate = options.predicate()?;
        assert!(predicate.matches(&json!({"text": "hi"})));
        assert!(!predicate.matches(&json!({"id_str": "1"})));
        Ok(())
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(options_from_flags(Vec::new(), &["text".to_string()], &[]).is_err());
        assert!(options_from_flags(Vec::new(), &[], &["=5".to_string()]).is_err());
    }

    #[test]
    fn options_document_shape_is_checked() {
        assert!(parse_options_document(r#"{"require": "text"}"#).is_err());
        assert!(parse_options_document(r#"{"grep": {"text": ["rust"]}}"#).is_ok());
    }
}
