use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cyboair_emissions::{ActivityRequest, CarbonEngine, EngineConfig, StaticFactorSource};

const ENV_LOG_DIR: &str = "CARBON_LOG_DIR";

fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_writer(io::stderr).with_target(false);

    match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "carbon_calc.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

// Sample batch used when stdin is an interactive terminal.
fn demo_activities() -> Vec<ActivityRequest> {
    let activity = |name: &str, kind: &str, quantity: &str, value: f64, unit: &str| {
        let unit_key = format!("{quantity}_unit");
        ActivityRequest {
            name: Some(name.to_string()),
            activity_type: Some(kind.to_string()),
            region: Some("US".to_string()),
            parameters: Some(
                [
                    (quantity.to_string(), json!(value)),
                    (unit_key, json!(unit)),
                ]
                .into_iter()
                .collect(),
            ),
            ..ActivityRequest::default()
        }
    };

    vec![
        activity("Electricity Usage", "electricity", "energy", 100.0, "kWh"),
        activity("Car Travel", "car", "distance", 50.0, "km"),
        activity("Bus Travel", "bus", "distance", 30.0, "km"),
        activity("Natural Gas Heating", "natural_gas", "energy", 200.0, "kWh"),
        activity("Train Travel", "rail", "distance", 100.0, "km"),
    ]
}

fn main() -> Result<ExitCode> {
    let config = EngineConfig::from_env();
    let _guard = init_tracing();
    let config = config.context("invalid engine configuration")?;

    let source = match &config.factor_file {
        Some(path) => StaticFactorSource::from_file(path)?,
        None => StaticFactorSource::default(),
    };
    info!(
        "Emissions engine ready (month {:?}, default region {}, {} live factors)",
        config.month,
        config.default_region,
        source.len()
    );
    let engine = CarbonEngine::with_source(config, source);

    let stdin = io::stdin();
    if stdin.is_terminal() {
        let activities = demo_activities();
        return match engine.calculate(Some(activities.as_slice()), None) {
            Ok(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                println!("{}", json!({ "error": e.to_string() }));
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let mut input = String::new();
    stdin
        .lock()
        .read_to_string(&mut input)
        .context("failed to read activities from stdin")?;

    let result = engine.run_json(&input);
    println!("{result}");
    Ok(exit_status(result.get("error").is_none()))
}

fn exit_status(succeeded: bool) -> ExitCode {
    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
