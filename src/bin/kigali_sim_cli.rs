//! Demo CLI: reads a JSON array of pre-resolved typed operations (the
//! shape an external QubecTalk parser would hand the engine), runs them
//! against a fresh `Engine` for each simulation year, and writes one CSV
//! row per `EngineResult`. QubecTalk parsing stays out of this crate —
//! this binary exists only to exercise the library end to end.

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use kigali_sim_engine::operations::{apply_all, Operation};
use kigali_sim_engine::serializer::EngineResult;
use kigali_sim_engine::{Engine, EngineError};

const CSV_HEADER: &[&str] = &[
    "scenario",
    "trial",
    "year",
    "application",
    "substance",
    "manufacture",
    "import",
    "recycle",
    "domesticConsumption",
    "importConsumption",
    "recycleConsumption",
    "population",
    "populationNew",
    "rechargeEmissions",
    "eolEmissions",
    "energyConsumption",
];

#[derive(serde::Deserialize)]
struct RunSpec {
    start_year: i32,
    end_year: i32,
    operations: Vec<Operation>,
}

fn main() -> ExitCode {
    env_logger::init();
    let path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: kigali-sim-cli <operations.json>");
            return ExitCode::from(1);
        }
    };

    match run(&path) {
        Ok(rows) => {
            let stdout = io::stdout();
            if let Err(e) = write_csv(&mut stdout.lock(), &rows) {
                eprintln!("failed writing CSV: {e:#}");
                return ExitCode::from(2);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e:#}");
            let code = match e.downcast_ref::<EngineError>() {
                Some(EngineError::ValidationError(_)) => 1,
                Some(_) => 2,
                None => 1,
            };
            ExitCode::from(code)
        }
    }
}

fn run(path: &str) -> Result<Vec<EngineResult>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let spec: RunSpec = serde_json::from_str(&raw).context("parsing operations JSON")?;

    let mut engine = Engine::new(spec.start_year, spec.end_year);
    let mut results = Vec::new();
    while !engine.is_done() {
        apply_all(&spec.operations, &mut engine)?;
        results.extend(engine.get_results());
        engine.increment_year();
    }
    Ok(results)
}

/// RFC 4180 emitter built on `csv::Writer` — quoting of fields with
/// embedded commas, quotes, or newlines is handled by the writer itself
/// rather than by hand.
fn write_csv(out: &mut impl Write, rows: &[EngineResult]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([
            row.scenario.as_str(),
            &row.trial.to_string(),
            &row.year.to_string(),
            row.application.as_str(),
            row.substance.as_str(),
            &row.manufacture.to_string(),
            &row.import.to_string(),
            &row.recycle.to_string(),
            &row.domestic_consumption.to_string(),
            &row.import_consumption.to_string(),
            &row.recycle_consumption.to_string(),
            &row.population.to_string(),
            &row.population_new.to_string(),
            &row.recharge_emissions.to_string(),
            &row.eol_emissions.to_string(),
            &row.energy_consumption.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kigali_sim_engine::serializer::TradeSupplement;
    use rust_decimal::Decimal;

    fn sample_row(application: &str) -> EngineResult {
        EngineResult {
            application: application.to_string(),
            substance: "HFC-134a".to_string(),
            year: 2030,
            scenario: "BAU".to_string(),
            trial: 0,
            manufacture: Decimal::ZERO,
            import: Decimal::ZERO,
            recycle: Decimal::ZERO,
            domestic_consumption: Decimal::ZERO,
            import_consumption: Decimal::ZERO,
            recycle_consumption: Decimal::ZERO,
            export: Decimal::ZERO,
            export_consumption: Decimal::ZERO,
            population: Decimal::ZERO,
            population_new: Decimal::ZERO,
            recharge_emissions: Decimal::ZERO,
            eol_emissions: Decimal::ZERO,
            energy_consumption: Decimal::ZERO,
            trade_supplement: TradeSupplement {
                import_initial_charge_value: Decimal::ZERO,
                import_initial_charge_consumption: Decimal::ZERO,
                export_initial_charge_value: Decimal::ZERO,
                export_initial_charge_consumption: Decimal::ZERO,
            },
        }
    }

    #[test]
    fn quotes_fields_containing_commas() {
        let rows = [sample_row("Domestic, Refrigeration")];
        let mut buf = Vec::new();
        write_csv(&mut buf, &rows).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("\"Domestic, Refrigeration\""));
    }

    #[test]
    fn leaves_plain_fields_unquoted() {
        let rows = [sample_row("Domestic Refrigeration")];
        let mut buf = Vec::new();
        write_csv(&mut buf, &rows).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("Domestic Refrigeration,HFC-134a"));
    }

    #[test]
    fn emits_header_row_first() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[]).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with("scenario,trial,year,application,substance"));
    }
}
