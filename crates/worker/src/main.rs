use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process::ExitCode;
use stockpulse_core::config::{AnalysisOptions, Settings};
use stockpulse_core::domain::contract::MasterDocument;
use stockpulse_core::ingest::{HttpScraperClient, MarketDataProvider, NewsSource};
use stockpulse_core::pipeline::{AnalysisPipeline, Pacer, PipelineError, PipelineOutput};
use stockpulse_core::projection::PriceTrendProjector;
use stockpulse_core::sentiment::{RetryPolicy, SentimentAggregator, SentimentScorer};
use stockpulse_core::storage::lock::RunLock;
use stockpulse_core::storage::runs::{RunStatus, RunSummary};
use stockpulse_core::storage::{PersistenceReconciler, PgStockStore, ReconcileReport};
use stockpulse_core::time::us_market::{resolve_run_date, TradingCalendar};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod universe;

#[derive(Debug, Parser)]
#[command(name = "stockpulse_worker")]
struct Args {
    /// Run date (YYYY-MM-DD). Defaults to today's US/Eastern date.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Analyze and print the master document, without touching the database.
    #[arg(long)]
    dry_run: bool,

    /// Override MAX_STOCKS.
    #[arg(long)]
    max_stocks: Option<usize>,

    /// Seed the projection noise for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let mut opts = AnalysisOptions::from_env();
    if let Some(n) = args.max_stocks {
        opts.max_stocks = n;
    }
    let run_date = resolve_run_date(args.as_of_date.as_deref(), chrono::Utc::now())?;

    let scraper = HttpScraperClient::from_settings(&settings)?;

    if args.dry_run {
        let output = match analyze(&scraper, &opts, run_date, args.seed).await {
            Ok(output) => output,
            Err(err) => {
                tracing::error!(%run_date, error = %err, "analysis failed");
                return Ok(ExitCode::FAILURE);
            }
        };
        let doc = MasterDocument::build(&output.ranked, &output.shocking, chrono::Utc::now())
            .validate()?;
        println!("{}", serde_json::to_string_pretty(&doc)?);
        log_summary(&output);
        return Ok(ExitCode::SUCCESS);
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    // Total failure halts here, before anything is written.
    let output = match analyze(&scraper, &opts, run_date, args.seed).await {
        Ok(output) => output,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&anyhow::Error::new(err.clone()));
            tracing::error!(%run_date, error = %err, "analysis failed; nothing persisted");
            return Ok(ExitCode::FAILURE);
        }
    };

    stockpulse_core::storage::migrate(&pool).await?;

    let Some(run_lock) = RunLock::try_acquire(&pool, run_date).await? else {
        tracing::warn!(%run_date, "run lock not acquired; another run in progress");
        return Ok(ExitCode::FAILURE);
    };

    let run_id = match stockpulse_core::storage::runs::start_run(&pool, run_date).await {
        Ok(id) => id,
        Err(err) => {
            release_run_lock(run_lock, run_date).await;
            return Err(err);
        }
    };
    let exit = persist(&pool, &opts, &output, run_id).await;

    release_run_lock(run_lock, run_date).await;
    log_summary(&output);

    match exit {
        Ok(report) => {
            tracing::info!(
                %run_date,
                %run_id,
                written = report.written,
                errors = report.error_count(),
                stale_removed = report.stale_removed,
                "analysis run finished"
            );
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            if let Err(ledger_err) = stockpulse_core::storage::runs::finish_run(
                &pool,
                run_id,
                &RunSummary {
                    status: RunStatus::Error,
                    total_stocks: output.ranked.len(),
                    success_count: 0,
                    error_count: output.ranked.len(),
                    error: Some(format!("{err:#}")),
                },
            )
            .await
            {
                tracing::warn!(%run_id, error = %format!("{ledger_err:#}"), "recording failed run in ledger failed");
            }
            tracing::error!(%run_date, %run_id, error = %format!("{err:#}"), "persisting analysis failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn release_run_lock(run_lock: RunLock, run_date: chrono::NaiveDate) {
    if let Err(err) = run_lock.release().await {
        tracing::warn!(%run_date, error = %format!("{err:#}"), "releasing run lock failed");
    }
}

async fn persist(
    pool: &sqlx::PgPool,
    opts: &AnalysisOptions,
    output: &PipelineOutput,
    run_id: uuid::Uuid,
) -> anyhow::Result<ReconcileReport> {
    let store = PgStockStore::new(pool.clone());
    let report = PersistenceReconciler::new(&store, opts.persist_batch_size)
        .reconcile(&output.ranked, &output.shocking, chrono::Utc::now())
        .await?;

    let status = if report.is_clean() {
        RunStatus::Success
    } else {
        RunStatus::Partial
    };
    stockpulse_core::storage::runs::finish_run(
        pool,
        run_id,
        &RunSummary {
            status,
            total_stocks: output.ranked.len(),
            success_count: report.written,
            error_count: report.error_count(),
            error: None,
        },
    )
    .await?;

    Ok(report)
}

async fn analyze(
    scraper: &HttpScraperClient,
    opts: &AnalysisOptions,
    run_date: chrono::NaiveDate,
    seed: Option<u64>,
) -> Result<PipelineOutput, PipelineError> {
    let raw = match scraper.list_candidate_tickers().await {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "candidate listing failed");
            Vec::new()
        }
    };
    let candidates = universe::build_candidate_universe(
        raw,
        &universe::UniverseOptions {
            max_stocks: opts.max_stocks,
        },
    );
    tracing::info!(%run_date, candidates = candidates.len(), "candidate universe ready");

    let sources: Vec<Box<dyn NewsSource>> = scraper
        .news_sources_from_env()
        .into_iter()
        .map(|s| Box::new(s) as Box<dyn NewsSource>)
        .collect();
    let aggregator = SentimentAggregator::new(
        SentimentScorer::finance(),
        sources,
        RetryPolicy {
            max_attempts: opts.news_retry_attempts,
            backoff: opts.news_retry_backoff,
        },
        opts.days_back,
    );

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut pipeline = AnalysisPipeline::new(
        aggregator,
        scraper,
        PriceTrendProjector::new(opts.prediction_days, TradingCalendar::from_env()),
        Pacer::from_options(opts),
        opts,
        rng,
    );
    pipeline.run(&candidates, run_date).await
}

fn log_summary(output: &PipelineOutput) {
    if let Some(top) = output.ranked.first() {
        tracing::info!(
            ticker = top.ticker(),
            investment_score = top.sentiment().investment_score,
            "top investment"
        );
    }
    if let Some(up) = output.shocking.top_increases.first() {
        tracing::info!(ticker = %up.ticker, change_pct = up.abs_change_pct, "biggest projected increase");
    }
    if let Some(down) = output.shocking.top_decreases.first() {
        tracing::info!(ticker = %down.ticker, change_pct = -down.abs_change_pct, "biggest projected decrease");
    }
    tracing::info!(
        ranked = output.ranked.len(),
        candidates = output.candidates,
        projected = output.projected,
        without_news = output.without_news,
        "run summary"
    );
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
