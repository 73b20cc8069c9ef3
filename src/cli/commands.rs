use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::catalog::{ClimateCatalog, WeatherCatalog};
use crate::config::AppConfig;
use crate::flower::{Direction, FlowerRules, RngDice, TransitionTable};
use crate::server::{self, AppState};
use crate::session::WeatherSession;

/// Load rules and catalogs, from configured paths or the embedded data.
pub fn load_rules(
    config: &AppConfig,
) -> Result<(FlowerRules, ClimateCatalog, WeatherCatalog), String> {
    let rules = match &config.app.flower_path {
        Some(path) => FlowerRules::with_overrides_file(Path::new(path))
            .map_err(|e| format!("Failed to load flower overrides from {}: {}", path, e))?,
        None => FlowerRules::standard().map_err(|e| format!("Invalid flower topology: {}", e))?,
    };

    let climates = match &config.app.catalog_path {
        Some(path) => ClimateCatalog::from_file(Path::new(path)),
        None => ClimateCatalog::builtin(),
    }
    .map_err(|e| format!("Failed to load climate catalog: {}", e))?;

    let weather = match &config.app.weather_path {
        Some(path) => WeatherCatalog::from_file(Path::new(path)),
        None => WeatherCatalog::builtin(),
    }
    .map_err(|e| format!("Failed to load weather descriptions: {}", e))?;

    climates
        .get_assignment(&config.app.default_climate, &config.app.default_season)
        .map_err(|e| format!("Configured default is not in the catalog: {}", e))?;

    info!(
        climates = climates.len(),
        overrides = rules.overrides.len(),
        "Catalog loaded"
    );
    Ok((rules, climates, weather))
}

/// Start the HTTP API and run until Ctrl-C.
pub async fn run_server(config: &AppConfig) -> Result<(), String> {
    let (rules, climates, weather) = load_rules(config)?;
    let state = Arc::new(AppState::new(rules, climates, weather, config));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;

    info!(
        environment = config.environment_name(),
        default_climate = %config.app.default_climate,
        default_season = %config.app.default_season,
        "Starting weather flower server"
    );

    tokio::select! {
        result = server::start_server(state, addr) => {
            result.map_err(|e| format!("Server error: {}", e))
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nShutdown signal received");
            Ok(())
        }
    }
}

/// Print every climate with its seasons, in catalog order.
pub fn list_climates(config: &AppConfig) -> Result<(), String> {
    let (_, climates, _) = load_rules(config)?;
    for line in climate_lines(&climates) {
        println!("{}", line);
    }
    Ok(())
}

fn climate_lines(climates: &ClimateCatalog) -> Vec<String> {
    let mut lines = Vec::new();
    for (id, name) in climates.list_climates() {
        let Ok(climate) = climates.climate(id) else {
            continue;
        };
        lines.push(format!("{} ({})", name, id));
        if let Some(description) = &climate.description {
            lines.push(format!("  {}", description));
        }
        for season in &climate.seasons {
            let start = season.assignment.initial();
            lines.push(format!(
                "  - {:<10} {:<12} start {:>2}: {}",
                season.id,
                season.name,
                start,
                season.assignment.label(start)
            ));
            if let Some(description) = &season.description {
                lines.push(format!("      {}", description));
            }
        }
    }
    lines
}

/// Print the dice-to-direction table.
pub fn print_table() {
    println!("{:<12} {:>6} {:>10} {:>8}", "Direction", "Code", "Totals", "Chance");
    println!("{}", "-".repeat(39));
    let mut seen: Vec<Direction> = Vec::new();
    for total in 2..=14i64 {
        let Ok(direction) = TransitionTable::resolve(total) else {
            continue;
        };
        if seen.contains(&direction) {
            continue;
        }
        seen.push(direction);
        let totals: Vec<String> = TransitionTable::totals(direction)
            .map(|t| t.to_string())
            .collect();
        println!(
            "{:<12} {:>6} {:>10} {:>7.1}%",
            direction.to_string(),
            direction.code(),
            totals.join(","),
            TransitionTable::probability(direction) * 100.0
        );
    }
}

/// Run an offline random walk and print each step.
pub fn walk(
    config: &AppConfig,
    climate: Option<&str>,
    season: Option<&str>,
    steps: u32,
    seed: Option<u64>,
) -> Result<(), String> {
    let (rules, climates, _) = load_rules(config)?;
    let climate = climate.unwrap_or(&config.app.default_climate);
    let season = season.unwrap_or(&config.app.default_season);

    let rng = match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut dice = RngDice::new(rng);

    let mut session = WeatherSession::new();
    let start = session
        .select_season(&climates, climate, season)
        .map_err(|e| e.to_string())?;
    let label = session.current_weather(&climates).map_err(|e| e.to_string())?;
    println!("{} / {}: start at {} ({})", climate, season, start, label);

    for step in 1..=steps {
        let t = session
            .roll(&rules, &climates, &mut dice)
            .map_err(|e| e.to_string())?;
        let faces = match (t.roll.d6, t.roll.d8) {
            (Some(d6), Some(d8)) => format!("{}+{}", d6, d8),
            _ => String::new(),
        };
        println!(
            "{:>4}: roll {:>2} ({:>3}) {:<11} {:>2} -> {:>2}  {}",
            step,
            t.roll.total,
            faces,
            t.direction.to_string(),
            t.from,
            t.to,
            t.label
        );
    }
    Ok(())
}
