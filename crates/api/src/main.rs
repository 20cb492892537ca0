use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpulse_core::domain::contract::{round_shocking, MasterDocument, StockDocument};
use stockpulse_core::domain::prediction::ShockingPredictions;
use stockpulse_core::ranking::{shocking_from_movers, DEFAULT_SHOCKING_TOP_N};
use stockpulse_core::storage::{master_entries, PgStockStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockpulse_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match stockpulse_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        store: pool.map(PgStockStore::new),
        shocking_top_n: std::env::var("SHOCKING_TOP_N")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SHOCKING_TOP_N),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/stocks", get(get_master_document))
        .route("/stocks/:ticker", get(get_stock_document))
        .route("/shocking", get(get_shocking))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    store: Option<PgStockStore>,
    shocking_top_n: usize,
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %format!("{e:#}"), "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_master_document(
    State(state): State<AppState>,
) -> Result<Json<MasterDocument>, StatusCode> {
    let Some(store) = &state.store else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let records = store.load_stocks().await.map_err(internal_error)?;
    if records.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    let last_updated = records
        .iter()
        .map(|r| r.updated_at)
        .max()
        .unwrap_or_else(Utc::now);
    let entries = master_entries(&records).map_err(internal_error)?;

    let shocking = load_shocking(store, state.shocking_top_n)
        .await
        .map_err(internal_error)?;

    let doc = MasterDocument::from_entries(entries, &shocking, last_updated)
        .validate()
        .map_err(internal_error)?;
    Ok(Json(doc))
}

async fn get_stock_document(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<StockDocument>, StatusCode> {
    let Some(store) = &state.store else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let ticker = ticker.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let record = store
        .load_stock(&ticker)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let history = store
        .load_price_history(&ticker)
        .await
        .map_err(internal_error)?;
    let points = store
        .load_predictions(&ticker)
        .await
        .map_err(internal_error)?;

    let last_updated = record.updated_at;
    let ranked = record
        .into_ranked(history, points)
        .map_err(internal_error)?;
    Ok(Json(StockDocument::build(&ranked.stock, last_updated)))
}

async fn get_shocking(
    State(state): State<AppState>,
) -> Result<Json<ShockingPredictions>, StatusCode> {
    let Some(store) = &state.store else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let shocking = load_shocking(store, state.shocking_top_n)
        .await
        .map_err(internal_error)?;
    Ok(Json(round_shocking(&shocking)))
}

async fn load_shocking(store: &PgStockStore, top_n: usize) -> anyhow::Result<ShockingPredictions> {
    let (movers, generated_at) = store.load_shocking_movers().await?;
    tracing::debug!(movers = movers.len(), ?generated_at, "loaded shocking movers");
    Ok(shocking_from_movers(movers, top_n))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockpulse_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
