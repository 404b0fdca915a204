use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    Scenario, SimulationError, SimulationSummary, TrialResult, run_simulation, summarize,
};

#[derive(Parser, Debug)]
#[command(
    name = "fire-sim",
    about = "Monte Carlo FIRE simulator (correlated returns, taxable-first liquidation)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a scenario file and print the JSON report to stdout
    Run(RunArgs),
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, help = "Path to a JSON scenario")]
    config: PathBuf,
    #[arg(long, help = "Overrides config.seed")]
    seed: Option<u64>,
    #[arg(long, help = "Overrides config.times")]
    trials: Option<u32>,
    #[arg(long, help = "Overrides config.years")]
    years: Option<u32>,
    #[arg(long, help = "Include per-month trial histories in the report")]
    history: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulateQuery {
    include_history: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    summary: SimulationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    trials: Option<Vec<TrialResult>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Run(args) => {
            let raw = std::fs::read_to_string(&args.config)
                .map_err(|e| format!("cannot read {}: {e}", args.config.display()))?;
            let scenario = build_scenario(&args, &raw)?;
            let response = simulate(&scenario, args.history).map_err(|e| e.to_string())?;
            let json = serde_json::to_string_pretty(&response)
                .map_err(|e| format!("cannot serialize report: {e}"))?;
            println!("{json}");
            Ok(())
        }
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("server error: {e}")),
    }
}

fn build_scenario(args: &RunArgs, json: &str) -> Result<Scenario, String> {
    let mut scenario = serde_json::from_str::<Scenario>(json)
        .map_err(|e| format!("invalid scenario JSON: {e}"))?;

    if let Some(v) = args.seed {
        scenario.config.seed = Some(v);
    }
    if let Some(v) = args.trials {
        scenario.config.times = v;
    }
    if let Some(v) = args.years {
        if v == 0 {
            return Err("--years must be > 0".to_string());
        }
        scenario.config.years = v;
    }

    Ok(scenario)
}

fn simulate(scenario: &Scenario, include_history: bool) -> Result<SimulateResponse, SimulationError> {
    let trials = run_simulation(scenario)?;
    Ok(SimulateResponse {
        summary: summarize(&trials),
        trials: include_history.then_some(trials),
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/simulate", post(simulate_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "FIRE simulation API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(
    Query(query): Query<SimulateQuery>,
    Json(scenario): Json<Scenario>,
) -> Response {
    let outcome =
        tokio::task::spawn_blocking(move || simulate(&scenario, query.include_history)).await;

    match outcome {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(err)) => error_response(status_for(&err), &err.to_string()),
        Err(join_err) => {
            error!(%join_err, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "simulation failed")
        }
    }
}

fn status_for(err: &SimulationError) -> StatusCode {
    match err {
        SimulationError::Configuration(_) => StatusCode::BAD_REQUEST,
        SimulationError::NonPositiveDefiniteCorrelation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SimulationError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
