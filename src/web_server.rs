//! Web server for the Trading Simulator
//!
//! JSON API over a single in-memory session. The session sits behind a mutex
//! so requests apply one at a time. Responses are player views: active events
//! are projected without their sentiment and news items never say which
//! headlines are real.

use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trading_sim::analysis::{self, PerformanceSummary, TradingAnalysis};
use trading_sim::calendar::Hour;
use trading_sim::catalog::Catalog;
use trading_sim::config::Difficulty;
use trading_sim::error::{TradeError, TradeErrorKind};
use trading_sim::events::PublicEvent;
use trading_sim::ledger::{EquityPosition, OptionPosition, TradeRecord};
use trading_sim::news::NewsItem;
use trading_sim::pricing::OptionType;
use trading_sim::simulation::{Command, CommandOutcome, HourReport, PriceChange, Simulation};

struct AppState {
    catalog: Arc<Catalog>,
    session: Mutex<Option<Simulation>>,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("No simulation running; POST /simulation first")]
    NoSession,
    #[error("{0}")]
    Trade(#[from] TradeError),
    #[error("Session lock poisoned")]
    Poisoned,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<TradeErrorKind>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoSession => StatusCode::CONFLICT,
            ApiError::Trade(e) if e.kind() == TradeErrorKind::NotFound => StatusCode::NOT_FOUND,
            ApiError::Trade(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let kind = match self {
            ApiError::Trade(e) => Some(e.kind()),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            kind,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NewSessionRequest {
    total_hours: Option<Hour>,
    starting_cash: Option<f64>,
    difficulty: Option<Difficulty>,
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Deserialize)]
struct TradeRequest {
    side: TradeSide,
    ticker: String,
    shares: u64,
}

#[derive(Debug, Deserialize)]
struct OpenOptionRequest {
    ticker: String,
    option_type: OptionType,
    contracts: u32,
    strike: f64,
    expires_in: Hour,
}

#[derive(Debug, Deserialize)]
struct CloseOptionRequest {
    ticker: String,
    index: usize,
}

/// What the player is allowed to see of the session
#[derive(Debug, Serialize)]
struct PlayerView {
    hour: Hour,
    total_hours: Hour,
    clock: String,
    complete: bool,
    difficulty: Difficulty,
    cash: f64,
    starting_balance: f64,
    portfolio_value: f64,
    prices: BTreeMap<String, f64>,
    price_history: BTreeMap<String, Vec<f64>>,
    positions: Vec<EquityPosition>,
    options: Vec<OptionPosition>,
    watchlist: BTreeSet<String>,
    active_events: Vec<PublicEvent>,
    news: Vec<NewsItem>,
    trades: Vec<TradeRecord>,
    portfolio_history: Vec<f64>,
}

impl PlayerView {
    fn of(sim: &Simulation) -> Self {
        let state = sim.state();
        Self {
            hour: state.current_hour,
            total_hours: state.total_hours,
            clock: sim.calendar().format(state.current_hour),
            complete: sim.is_complete(),
            difficulty: state.difficulty,
            cash: state.cash(),
            starting_balance: state.starting_balance,
            portfolio_value: state.portfolio_value(),
            prices: state
                .prices
                .iter()
                .map(|(t, s)| (t.clone(), s.last()))
                .collect(),
            price_history: state
                .prices
                .iter()
                .map(|(t, s)| (t.clone(), s.as_slice().to_vec()))
                .collect(),
            positions: state.ledger.positions().values().cloned().collect(),
            options: state.ledger.options().values().flatten().cloned().collect(),
            watchlist: state.ledger.watchlist().clone(),
            active_events: state.active_events.iter().map(|a| a.public_view()).collect(),
            news: state.news.clone(),
            trades: state.ledger.trades().to_vec(),
            portfolio_history: state.portfolio_history.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HourView {
    hour: Hour,
    clock: String,
    complete: bool,
    is_mid_day: bool,
    is_end_of_day: bool,
    new_events: Vec<PublicEvent>,
    price_changes: BTreeMap<String, PriceChange>,
    expired_options: Vec<OptionPosition>,
    news: Vec<NewsItem>,
    portfolio_value: f64,
}

impl HourView {
    fn of(sim: &Simulation, report: HourReport) -> Self {
        Self {
            hour: report.hour,
            clock: sim.calendar().format(report.hour),
            complete: sim.is_complete(),
            is_mid_day: report.is_mid_day,
            is_end_of_day: report.is_end_of_day,
            new_events: report.new_events.iter().map(|a| a.public_view()).collect(),
            price_changes: report.price_changes,
            expired_options: report.expired_options,
            news: report.news,
            portfolio_value: sim.portfolio_value(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    performance: PerformanceSummary,
    analysis: TradingAnalysis,
}

/// Run `f` against the live session
fn with_session<T, F>(data: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Simulation) -> Result<T, ApiError>,
{
    let mut guard = data.session.lock().map_err(|_| ApiError::Poisoned)?;
    let sim = guard.as_mut().ok_or(ApiError::NoSession)?;
    f(sim)
}

async fn new_session(data: web::Data<AppState>, req: web::Json<NewSessionRequest>) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    let sim = Simulation::new(
        Arc::clone(&data.catalog),
        req.total_hours.filter(|h| *h > 0).unwrap_or(80),
        req.starting_cash
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(10_000.0),
        req.difficulty.unwrap_or_default(),
        req.seed.unwrap_or(42),
    );
    let view = PlayerView::of(&sim);
    info!(hours = view.total_hours, cash = view.cash, difficulty = %view.difficulty, "session started");

    let mut guard = data.session.lock().map_err(|_| ApiError::Poisoned)?;
    *guard = Some(sim);
    Ok(HttpResponse::Created().json(view))
}

async fn get_state(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let view = with_session(&data, |sim| Ok(PlayerView::of(sim)))?;
    Ok(HttpResponse::Ok().json(view))
}

async fn trade(data: web::Data<AppState>, req: web::Json<TradeRequest>) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    let command = match req.side {
        TradeSide::Buy => Command::Buy {
            ticker: req.ticker,
            shares: req.shares,
        },
        TradeSide::Sell => Command::Sell {
            ticker: req.ticker,
            shares: req.shares,
        },
    };
    execute(&data, command)
}

async fn open_option(data: web::Data<AppState>, req: web::Json<OpenOptionRequest>) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    execute(
        &data,
        Command::OpenOption {
            ticker: req.ticker,
            option_type: req.option_type,
            contracts: req.contracts,
            strike: req.strike,
            expires_in: req.expires_in,
        },
    )
}

async fn close_option(data: web::Data<AppState>, req: web::Json<CloseOptionRequest>) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    execute(
        &data,
        Command::CloseOption {
            ticker: req.ticker,
            index: req.index,
        },
    )
}

async fn toggle_watchlist(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    execute(
        &data,
        Command::Watch {
            ticker: path.into_inner(),
        },
    )
}

fn execute(data: &AppState, command: Command) -> Result<HttpResponse, ApiError> {
    let outcome: CommandOutcome = with_session(data, |sim| Ok(sim.execute(&command)?))?;
    Ok(HttpResponse::Ok().json(outcome))
}

async fn advance(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let view = with_session(&data, |sim| {
        let report = sim.advance_hour();
        Ok(HourView::of(sim, report))
    })?;
    Ok(HttpResponse::Ok().json(view))
}

async fn get_analysis(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let response = with_session(&data, |sim| {
        Ok(AnalysisResponse {
            performance: sim.performance(),
            analysis: analysis::analyze(&sim.analysis_input()),
        })
    })?;
    Ok(HttpResponse::Ok().json(response))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trading_sim=info,web_server=info")),
        )
        .init();

    let catalog = Catalog::builtin().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    let data = web::Data::new(AppState {
        catalog: Arc::new(catalog),
        session: Mutex::new(None),
    });

    println!("🚀 Trading Simulator Web Server starting...");
    println!("📡 API listening on http://localhost:3000");
    println!();

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/simulation", web::post().to(new_session))
            .route("/state", web::get().to(get_state))
            .route("/trade", web::post().to(trade))
            .route("/options", web::post().to(open_option))
            .route("/options/close", web::post().to(close_option))
            .route("/watchlist/{ticker}", web::post().to(toggle_watchlist))
            .route("/advance", web::post().to(advance))
            .route("/analysis", web::get().to(get_analysis))
    })
    .bind("127.0.0.1:3000")?
    .run()
    .await
}
