use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;

use signet_resolver::ResolveOutcome;
use signet_server::{build_resolver, SignetConfig, SignetServer};
use signet_types::{validate_cache_key, KeyCodec, ObjectReference};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Encode(args) => emit(cmd_encode(args, format)?),
        Command::Decode(args) => emit(cmd_decode(args, format)?),
        Command::CheckKey(args) => emit(cmd_check_key(args, format)?),
        Command::Resolve(args) => emit(cmd_resolve(args, format).await?),
        Command::Serve(args) => cmd_serve(args).await,
    }
}

fn emit(output: String) -> anyhow::Result<()> {
    println!("{output}");
    Ok(())
}

/// Read `path`, or use defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SignetConfig> {
    let config = match path {
        Some(path) => SignetConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SignetConfig::default(),
    };
    tracing::debug!(
        backend = ?config.kv.backend,
        service = %config.kv.service,
        endpoint = %config.signer.endpoint,
        "config loaded"
    );
    Ok(config)
}

fn cmd_encode(args: EncodeArgs, format: OutputFormat) -> anyhow::Result<String> {
    let mut reference = ObjectReference::new(args.bucket, args.object);
    if let Some(host) = args.host {
        reference = reference.with_host(host);
    }
    if let Some(region) = args.region {
        reference = reference.with_region(region);
    }
    let token = KeyCodec::encode(&reference)?;
    Ok(match format {
        OutputFormat::Json => json!({ "token": token }).to_string(),
        OutputFormat::Text => token,
    })
}

fn cmd_decode(args: DecodeArgs, format: OutputFormat) -> anyhow::Result<String> {
    let reference = KeyCodec::decode(&args.token).context("decoding token")?;
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&reference)?,
        OutputFormat::Text => {
            let mut out = format!(
                "{} {}\n  Bucket: {}\n  Object: {}",
                "✓".green().bold(),
                "Token decoded".bold(),
                reference.bucket.yellow(),
                reference.object.yellow()
            );
            if !reference.host.is_empty() {
                out.push_str(&format!("\n  Host: {}", reference.host.cyan()));
            }
            if !reference.region.is_empty() {
                out.push_str(&format!("\n  Region: {}", reference.region.cyan()));
            }
            for (name, values) in &reference.request_params {
                out.push_str(&format!("\n  Param: {} = {}", name, values.join(",")));
            }
            out.push_str(&format!("\n  Cache subkey: {}", reference.cache_subkey().dimmed()));
            out
        }
    })
}

fn cmd_check_key(args: CheckKeyArgs, format: OutputFormat) -> anyhow::Result<String> {
    let result = validate_cache_key(&args.key);
    if format == OutputFormat::Json {
        return Ok(json!({
            "key": args.key,
            "valid": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        })
        .to_string());
    }
    result?;
    Ok(format!("{} {} is a valid cache key", "✓".green().bold(), args.key.bold()))
}

async fn cmd_resolve(args: ResolveArgs, format: OutputFormat) -> anyhow::Result<String> {
    let config = load_config(args.config.as_deref())?;
    let resolver = build_resolver(&config).await?;
    let expiry = args
        .expiry
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.resolver.expiry());
    let outcome = resolver
        .resolve_detailed(&args.tokens, expiry, config.resolver.retry_attempts)
        .await;
    Ok(render_outcome(&args.tokens, &outcome, format))
}

fn render_outcome(tokens: &[String], outcome: &ResolveOutcome, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return json!({
            "urls": outcome.urls,
            "error": outcome.last_error.as_ref().map(|e| e.to_string()),
            "stats": outcome.stats,
        })
        .to_string();
    }

    let mut lines: Vec<String> = tokens
        .iter()
        .zip(&outcome.urls)
        .map(|(token, url)| {
            if url.is_empty() {
                format!("{} {}", "✗".red(), token.dimmed())
            } else {
                url.clone()
            }
        })
        .collect();
    let s = &outcome.stats;
    lines.push(format!(
        "{} plain, {} cached, {} generated, {} failed, {} invalid",
        s.plain, s.hits, s.generated, s.failed, s.invalid
    ));
    if let Some(e) = &outcome.last_error {
        lines.push(format!("{} {}", "last error:".yellow(), e));
    }
    lines.join("\n")
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    let resolver = build_resolver(&config).await?;
    println!("Signet server on {}", config.server.bind_addr.to_string().bold());
    SignetServer::new(config.server, resolver).serve().await?;
    Ok(())
}
