// src/main.rs

use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::get,
    routing::post,
    Router,
};
use clap::Parser;
use tokio::{net::TcpListener, sync::Mutex};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod annealer;
mod catchment;
mod codec;
mod config;
mod error;
mod jobs;
mod models;
mod pool;
mod routes;
mod service;
mod session;
mod solution_set;

#[cfg(test)]
mod test_support;

use annealer::AnnealingRunner;
use config::{Args, ServerConfig};
use jobs::{JobHistory, JobQueue};
use routes::method_not_allowed;
use service::{RunState, Service};
use session::ScenarioSession;

pub const API_BASE: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Option<ScenarioSession>>>,
    pub jobs: JobHistory,
    pub queue: JobQueue,
    pub service: Service,
    pub cache_max_age: u64,
}

impl FromRef<AppState> for Service {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}

fn cors() -> CorsLayer {
    // Very permissive CORS for local dev (tighten for prod)
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn api_router(state: AppState) -> Router {
    let v1 = Router::new()
        // scenario
        .route(
            "/scenario",
            get(routes::scenario::get_scenario)
                .post(routes::scenario::post_scenario)
                .fallback(method_not_allowed),
        )
        // scratchpad model
        .route(
            "/model",
            get(routes::model::get_model)
                .patch(routes::model::patch_model)
                .fallback(method_not_allowed),
        )
        .route(
            "/model/actions/active",
            get(routes::model::get_active_actions)
                .put(routes::model::put_active_actions)
                .fallback(method_not_allowed),
        )
        .route(
            "/model/subcatchment/:id",
            get(routes::model::get_subcatchment)
                .post(routes::model::post_subcatchment)
                .fallback(method_not_allowed),
        )
        .route(
            "/model/subcatchment/:id/applicableActions",
            get(routes::model::get_applicable_actions).fallback(method_not_allowed),
        )
        // labelled models
        .route(
            "/models/:label",
            get(routes::models::get_model)
                .post(routes::models::post_model)
                .fallback(method_not_allowed),
        )
        // solution set
        .route(
            "/solutions",
            get(routes::solutions::get_solution_set)
                .post(routes::solutions::post_solution_set)
                .fallback(method_not_allowed),
        )
        .route(
            "/solutions/:label",
            get(routes::solutions::get_solution).fallback(method_not_allowed),
        )
        // jobs
        .route(
            "/jobs",
            get(routes::jobs::list_jobs)
                .post(routes::jobs::create_job)
                .delete(routes::jobs::purge_jobs)
                .fallback(method_not_allowed),
        )
        .route("/jobs/:id", get(routes::jobs::get_job).fallback(method_not_allowed))
        .route(
            "/jobs/:id/scenario",
            get(routes::jobs::get_job_scenario).fallback(method_not_allowed),
        );

    Router::new()
        .route("/", get(routes::admin::status).fallback(method_not_allowed))
        .nest(API_BASE, v1)
        .fallback(routes::not_found)
        // state & middleware
        .with_state(state)
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}

pub fn admin_router(service: Service) -> Router {
    Router::new()
        .route("/status", get(routes::admin::status).fallback(method_not_allowed))
        .route("/shutdown", post(routes::admin::shutdown).fallback(method_not_allowed))
        .fallback(routes::not_found)
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

/// Loads the startup scenario and solution set named on the command line.
fn preload(args: &Args) -> anyhow::Result<Option<ScenarioSession>> {
    let Some(path) = &args.scenario else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)?;
    let mut session = ScenarioSession::load(&text)?;
    info!(path = %path.display(), "startup scenario loaded");

    if let Some(path) = &args.solution_set {
        let text = std::fs::read_to_string(path)?;
        session.load_solution_set(&text)?;
        info!(path = %path.display(), "startup solution set loaded");
    }
    Ok(Some(session))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ServerConfig::load(&args)?;
    let service = Service::new(&config.service_name);

    let history = JobHistory::new();
    let (queue, worker) = JobQueue::new(config.job_queue_length, history.clone(), Arc::new(AnnealingRunner));
    let shutdown = service.shutdown_token();
    let worker = tokio::spawn(worker.run(shutdown.clone()));

    let state = AppState {
        session: Arc::new(Mutex::new(preload(&args)?)),
        jobs: history,
        queue,
        service: service.clone(),
        cache_max_age: config.cache_maximum_age_in_seconds,
    };

    let api_listener = TcpListener::bind(("0.0.0.0", config.api_port)).await?;
    let admin_listener = TcpListener::bind(("0.0.0.0", config.admin_port)).await?;
    info!(port = config.api_port, base = API_BASE, "API listening");
    info!(port = config.admin_port, "admin listening");

    let api = axum::serve(api_listener, api_router(state).into_make_service())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let admin = axum::serve(admin_listener, admin_router(service.clone()).into_make_service())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let api = tokio::spawn(async move { api.await });
    let admin = tokio::spawn(async move { admin.await });

    service.set_state(RunState::Running).await;
    service.wait_for_shutdown().await;
    info!("shutdown requested, draining listeners");

    api.await??;
    admin.await??;
    if let Err(err) = worker.await {
        warn!(error = %err, "job worker ended abnormally");
    }

    service.set_state(RunState::Dead).await;
    info!("service stopped");
    Ok(())
}
