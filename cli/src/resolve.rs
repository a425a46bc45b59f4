#![deny(missing_docs)]

//! # Resolve Command
//!
//! Loads an OpenAPI document, resolves every schema, and emits the
//! normalized model. Per-schema failures go to stderr; resolved schemas are
//! still emitted so one broken schema does not hide its siblings.

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use typeforge_core::{
    load_document, resolve_document, EngineError, EngineResult, ErrorCode, ReferenceStore,
    ReferenceStoreConfig,
};

/// Arguments for `typeforge resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Path to the OpenAPI document (JSON or YAML).
    pub input: PathBuf,

    /// Output serialization format.
    #[clap(long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Output file; stdout when omitted.
    #[clap(long, short)]
    pub out: Option<PathBuf>,

    /// Domain allowed for external references (repeatable). When omitted,
    /// every domain is allowed.
    #[clap(long = "allow-domain")]
    pub allow_domains: Vec<String>,

    /// Maximum number of cached external documents.
    #[clap(long, default_value_t = 32)]
    pub max_cache_size: usize,
}

/// Output serialization formats.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

/// Runs the resolve command.
pub async fn execute(args: &ResolveArgs) -> EngineResult<()> {
    let text = tokio::fs::read_to_string(&args.input).await.map_err(|e| {
        EngineError::new(
            ErrorCode::InvalidDocument,
            format!("cannot read '{}': {}", args.input.display(), e),
        )
    })?;
    let root = load_document(&text)?;

    let store = Arc::new(ReferenceStore::new(ReferenceStoreConfig {
        allowed_domains: if args.allow_domains.is_empty() {
            None
        } else {
            Some(args.allow_domains.clone())
        },
        max_cache_size: args.max_cache_size,
        ..ReferenceStoreConfig::default()
    })?);

    let resolution = resolve_document(root, Some(store)).await?;

    for (name, error) in &resolution.failures {
        eprintln!("schema '{}' failed: {}", name, error);
    }

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&resolution.schemas)
            .map_err(EngineError::from)?,
        OutputFormat::Yaml => serde_yaml::to_string(&resolution.schemas)
            .map_err(EngineError::from)?,
    };

    match &args.out {
        Some(path) => {
            tokio::fs::write(path, rendered).await.map_err(|e| {
                EngineError::new(
                    ErrorCode::InvalidDocument,
                    format!("cannot write '{}': {}", path.display(), e),
                )
            })?;
            tracing::info!(
                resolved = resolution.schemas.len(),
                failed = resolution.failures.len(),
                out = %path.display(),
                "model written"
            );
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
