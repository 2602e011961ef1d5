//! Trading Simulator - scripted session runner
//!
//! Loads a run configuration, replays its scripted orders as the clock
//! reaches each hour, and prints an hour-by-hour log followed by the
//! performance summary and behaviour analysis.
//!
//! Usage:
//!   cargo run --bin trading-sim -- config/sample_session.yaml
//!   cargo run --bin trading-sim -- --difficulty hard --seed 7
//!   cargo run --bin trading-sim -- --seed 7 --save-config runs/seed7.yaml

use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use trading_sim::analysis::{self, TradingAnalysis};
use trading_sim::catalog::Catalog;
use trading_sim::config::{Config, Difficulty};
use trading_sim::simulation::{CommandOutcome, HourReport, Simulation};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "trading-sim", about = "Run a scripted trading simulator session")]
struct Args {
    /// Run configuration (YAML). Defaults to a 10-day medium run.
    config: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the configured difficulty (easy, medium, hard)
    #[arg(long)]
    difficulty: Option<Difficulty>,

    /// Print price moves for every instrument each hour
    #[arg(long)]
    verbose: bool,

    /// Write the effective configuration (overrides applied) to this file
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trading_sim=info")),
        )
        .init();

    let args = Args::parse();
    println!("Trading Simulator - Scripted Session\n");

    let mut config = match &args.config {
        Some(path) => {
            println!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(cfg) => {
                    println!("✓ Configuration loaded successfully\n");
                    cfg
                }
                Err(e) => {
                    eprintln!("✗ Failed to load config: {}", e);
                    process::exit(1);
                }
            }
        }
        None => {
            println!("No configuration given, using the default 10-day run\n");
            Config::default_run()
        }
    };
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(difficulty) = args.difficulty {
        config.simulation.difficulty = difficulty;
    }
    if let Some(path) = &args.save_config {
        match config.save_to_file(path) {
            Ok(()) => println!("✓ Configuration saved to {}\n", path.display()),
            Err(e) => {
                eprintln!("✗ Failed to save config: {}", e);
                process::exit(1);
            }
        }
    }

    let catalog = match &config.catalog {
        Some(files) => Catalog::from_files(&files.instruments, &files.events),
        None => Catalog::builtin(),
    };
    let catalog = match catalog {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            eprintln!("✗ Failed to load catalog: {}", e);
            process::exit(1);
        }
    };

    let mut sim = Simulation::from_config(Arc::clone(&catalog), &config.simulation);

    println!("Simulation Parameters:");
    println!(
        "  Hours: {} ({} trading days)",
        config.simulation.total_hours,
        sim.calendar().trading_days()
    );
    println!("  Starting cash: ${:.2}", config.simulation.starting_cash);
    println!("  Difficulty: {}", config.simulation.difficulty);
    println!("  Seed: {}", config.simulation.seed);
    println!("  Instruments: {}", catalog.instruments().len());
    println!("  Event templates: {}", catalog.events().len());
    println!("  Scripted orders: {}", config.orders.len());
    println!();

    while !sim.is_complete() {
        let hour = sim.current_hour();
        for command in config.orders_at(hour) {
            match sim.execute(command) {
                Ok(CommandOutcome::Trade(trade)) => println!(
                    "  [{}] {:?} {} x{} @ ${:.2}",
                    sim.calendar().format(hour),
                    trade.action,
                    trade.ticker,
                    trade.quantity,
                    trade.price
                ),
                Ok(CommandOutcome::Watchlist { ticker, watching }) => println!(
                    "  [{}] {} {} watchlist",
                    sim.calendar().format(hour),
                    if watching { "Added to" } else { "Removed from" },
                    ticker
                ),
                Err(e) => println!("  [{}] ✗ {:?} rejected: {}", sim.calendar().format(hour), command, e),
            }
        }

        let report = sim.advance_hour();
        print_hour(&sim, &report, args.verbose);
    }

    print_summary(&sim);
    let analysis = analysis::analyze(&sim.analysis_input());
    print_analysis(&analysis);
}

fn print_hour(sim: &Simulation, report: &HourReport, verbose: bool) {
    let value = sim.portfolio_value();
    let marker = if report.is_end_of_day {
        " (close)"
    } else if report.is_mid_day {
        " (mid-day)"
    } else {
        ""
    };
    println!(
        "{}{}: portfolio ${:.2}, cash ${:.2}",
        sim.calendar().format(report.hour),
        marker,
        value,
        sim.state().cash()
    );

    for event in &report.new_events {
        let scope = if event.event.is_market_wide() {
            "market-wide".to_string()
        } else {
            event.event.affected.join(", ")
        };
        println!("    📰 {} [{}]", event.event.title, scope);
    }
    for option in &report.expired_options {
        println!(
            "    ⌛ {:?} {} ${:.2} x{} expired",
            option.option_type, option.ticker, option.strike, option.contracts
        );
    }
    if verbose {
        for (ticker, change) in &report.price_changes {
            println!(
                "      {:<7} ${:>8.2} → ${:>8.2} ({:+.2}%)",
                ticker,
                change.old,
                change.new,
                change.change / change.old * 100.0
            );
        }
    }
}

fn print_summary(sim: &Simulation) {
    let summary = sim.performance();
    let state = sim.state();

    println!("\n═══════════════════════════════════════");
    println!("Final Summary");
    println!("═══════════════════════════════════════");
    println!("Starting value: ${:.2}", summary.starting_value);
    println!("Final value: ${:.2}", summary.final_value);
    println!("Total return: {:+.2}%", summary.total_return_pct);
    println!("Max drawdown: {:.2}%", summary.max_drawdown_pct);
    println!("Trades executed: {}", summary.trade_count);
    println!("Events activated: {}", state.event_history.len());
    println!("Cash: ${:.2}", state.cash());

    if !state.ledger.positions().is_empty() {
        println!("\nOpen positions:");
        for position in state.ledger.positions().values() {
            let price = state.price(&position.ticker).unwrap_or(0.0);
            println!(
                "  {:<7} {:>5} shares  avg ${:.2}  now ${:.2}  P&L ${:+.2}",
                position.ticker,
                position.shares,
                position.avg_cost,
                price,
                position.unrealized_pnl(price)
            );
        }
    }

    let options: Vec<_> = state.ledger.options().values().flatten().collect();
    if !options.is_empty() {
        println!("\nOpen options:");
        for option in options {
            let spot = state.price(&option.ticker).unwrap_or(0.0);
            println!(
                "  {:<7} {:?} x{}  strike ${:.2}  expires h{}  paid ${:.2}  worth ${:.2}",
                option.ticker,
                option.option_type,
                option.contracts,
                option.strike,
                option.expiration_hour,
                option.cost(),
                option.market_value(spot)
            );
        }
    }
}

fn print_analysis(analysis: &TradingAnalysis) {
    println!("\n═══════════════════════════════════════");
    println!("Trading Analysis");
    println!("═══════════════════════════════════════");
    println!("Style: {}", analysis.trading_style);
    println!("Risk level: {}", analysis.risk_level);
    println!("Diversification score: {:.0}/100", analysis.diversification_score);
    println!("Timing score: {:.0}/100", analysis.timing_score);

    for insight in &analysis.insights {
        println!("\n  [{:?}] {}", insight.category, insight.title);
        println!("    {}", insight.description);
    }
}
