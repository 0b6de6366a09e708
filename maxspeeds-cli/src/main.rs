use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use maxspeeds_section::road_graph::{InMemoryRoadGraph, RoadGraphDescription};
use maxspeeds_section::section::OwnedMaxspeedsSection;
use maxspeeds_section::{
    MaxspeedsConfig, SpeedCatalogue, SpeedInUnits, SpeedMacro, Units, UrbanContext,
    build_maxspeeds_section, parse_feature_mapping_from_path, parse_maxspeeds_from_path,
};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "maxspeeds-cli", author, version, about, long_about = None)]
struct Cli {
    /// Subcommand/tool to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a maxspeeds section from an annotation table and a road graph
    Build {
        /// Maxspeed annotation table (way ID, units, forward[, backward])
        #[arg(long, env = "MAXSPEEDS_TABLE")]
        maxspeeds: PathBuf,
        /// Feature ID to way ID mapping (feature ID, way ID)
        #[arg(long, env = "MAXSPEEDS_FEATURE_MAPPING")]
        feature_mapping: PathBuf,
        /// Road graph description (JSON)
        #[arg(long)]
        road_graph: PathBuf,
        /// Optional build config (JSON); missing fields keep their defaults
        #[arg(long, env = "MAXSPEEDS_CONFIG")]
        config: Option<PathBuf>,
        /// Where to write the section
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Pretty-print the contents of a maxspeeds section
    Inspect {
        section: PathBuf,
        /// Also list every feature speed
        #[arg(long)]
        features: bool,
    },
    /// Show which speed macro a speed is stored as
    Quantize {
        speed: u16,
        /// kmh or mph
        #[arg(default_value = "kmh")]
        units: String,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read {what} at {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Invalid JSON in {what}"))
}

fn macro_json(catalogue: &SpeedCatalogue, speed_macro: SpeedMacro) -> JsonValue {
    serde_json::json!({
        "macro": speed_macro,
        "speed": catalogue.macro_to_speed(speed_macro).map(|speed| speed.to_string()),
    })
}

fn build(
    maxspeeds: &Path,
    feature_mapping: &Path,
    road_graph: &Path,
    config: Option<&Path>,
    output: &Path,
) -> anyhow::Result<()> {
    let config: MaxspeedsConfig = match config {
        Some(path) => read_json(path, "build config")?,
        None => MaxspeedsConfig::default(),
    };

    info!(path = maxspeeds.to_str(), "Reading maxspeed annotations");
    let maxspeeds = parse_maxspeeds_from_path(maxspeeds)?;
    info!(path = feature_mapping.to_str(), "Reading feature mapping");
    let feature_to_way = parse_feature_mapping_from_path(feature_mapping)?;
    info!(path = road_graph.to_str(), "Reading road graph");
    let description: RoadGraphDescription = read_json(road_graph, "road graph")?;
    let graph = InMemoryRoadGraph::new(description)?;

    let (bytes, report) =
        build_maxspeeds_section(&graph, graph.features(), &feature_to_way, &maxspeeds, &config)?;

    for anomaly in &report.anomalies {
        warn!(feature_id = anomaly.feature_id(), "{anomaly}");
    }

    if let Some(bytes) = bytes {
        fs::write(output, &bytes)
            .with_context(|| format!("Failed to write section to {}", output.display()))?;
        info!(path = output.to_str(), size = bytes.len(), "Wrote maxspeeds section");
    } else {
        info!("No speeds to store; no section was written");
    }

    let summary = serde_json::json!({
        "stored": report.stored_count,
        "inherited": report.inherited_count,
        "anomalies": report.anomalies.len(),
        "default_speeds": report.default_speeds.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn inspect(path: &Path, list_features: bool) -> anyhow::Result<()> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read section at {}", path.display()))?;
    let section = OwnedMaxspeedsSection::try_from(bytes)?;
    let catalogue = SpeedCatalogue::standard();
    let header = section.header();

    let default_speeds: serde_json::Map<String, JsonValue> = UrbanContext::ALL
        .into_iter()
        .map(|context| {
            let speeds: serde_json::Map<String, JsonValue> = section
                .default_speeds(context)
                .into_iter()
                .map(|(category, speed_macro)| {
                    (format!("{category:?}"), macro_json(catalogue, speed_macro))
                })
                .collect();
            (format!("{context:?}"), JsonValue::Object(speeds))
        })
        .collect();

    let mut output = serde_json::json!({
        "version": header.version(),
        "feature_count": header.feature_count(),
        "bidirectional_count": header.bidirectional_count(),
        "default_count": header.default_count(),
        "section_size": header.section_size(),
        "default_speeds": default_speeds,
    });
    if list_features {
        output["features"] = section
            .iter()
            .map(|speed| {
                serde_json::json!({
                    "feature_id": speed.feature_id,
                    "forward": macro_json(catalogue, speed.forward),
                    "backward": speed.backward.map(|backward| macro_json(catalogue, backward)),
                })
            })
            .collect();
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            maxspeeds,
            feature_mapping,
            road_graph,
            config,
            output,
        } => build(
            &maxspeeds,
            &feature_mapping,
            &road_graph,
            config.as_deref(),
            &output,
        ),
        Commands::Inspect { section, features } => inspect(&section, features),
        Commands::Quantize { speed, units } => {
            let units = Units::from_token(&units)
                .ok_or_else(|| anyhow!("Unknown units `{units}`. Use kmh or mph"))?;
            let catalogue = SpeedCatalogue::standard();
            let speed = SpeedInUnits::new(speed, units);
            let output = serde_json::json!({
                "input": speed.to_string(),
                "stored_as": macro_json(catalogue, catalogue.to_macro(speed)),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}
