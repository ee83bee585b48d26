// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line front end for project evaluation
//!
//! Evaluates a project file and prints its properties (and optionally its
//! items) as JSON.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use octofhir_msbuild::items::evaluate_metadata;
use octofhir_msbuild::{Evaluation, Evaluator, EvaluatorConfig, ItemTable};
use serde_json::{Map, Value as JsonValue, json};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "octofhir-msbuild")]
#[command(about = "Evaluate MSBuild-style project files")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// Log evaluation decisions (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a project and print its properties as JSON
    Evaluate {
        /// Project file to evaluate
        project: PathBuf,
        /// Global property as Name=Value (repeatable)
        #[arg(short = 'p', long = "property", value_name = "NAME=VALUE")]
        properties: Vec<String>,
        /// Configuration condition, e.g. "'$(Configuration)|$(Platform)' == 'Debug|x64'"
        #[arg(short, long)]
        condition: Option<String>,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Include items and their metadata in the output
        #[arg(short, long)]
        items: bool,
        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Substitute a text against an evaluated project
    Expand {
        /// Project file to evaluate
        project: PathBuf,
        /// Text containing $(...) references
        text: String,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let result = match cli.command {
        Commands::Evaluate {
            project,
            properties,
            condition,
            config,
            items,
            pretty,
        } => {
            handle_evaluate(
                &project,
                &properties,
                condition.as_deref(),
                config.as_deref(),
                items,
                pretty,
            )
            .await
        }
        Commands::Expand {
            project,
            text,
            config,
        } => handle_expand(&project, &text, config.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EvaluatorConfig> {
    match path {
        Some(path) => EvaluatorConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(EvaluatorConfig::default()),
    }
}

fn parse_global(text: &str) -> anyhow::Result<(String, String)> {
    let Some((name, value)) = text.split_once('=') else {
        bail!("expected NAME=VALUE, got '{text}'");
    };
    if name.trim().is_empty() {
        bail!("empty property name in '{text}'");
    }
    Ok((name.trim().to_string(), value.to_string()))
}

async fn evaluate(
    evaluator: &Evaluator,
    project: &Path,
    condition: Option<&str>,
    globals: &[(String, String)],
) -> anyhow::Result<Evaluation> {
    evaluator
        .evaluate_path(project, condition, globals)
        .await
        .with_context(|| format!("evaluating {}", project.display()))
}

async fn handle_evaluate(
    project: &Path,
    properties: &[String],
    condition: Option<&str>,
    config: Option<&Path>,
    with_items: bool,
    pretty: bool,
) -> anyhow::Result<()> {
    let evaluator = Evaluator::local(load_config(config)?);
    let globals = properties
        .iter()
        .map(String::as_str)
        .map(parse_global)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let evaluation = evaluate(&evaluator, project, condition, &globals).await?;

    let mut output = Map::new();
    output.insert(
        "properties".to_string(),
        JsonValue::Object(
            evaluation
                .properties
                .properties()
                .iter()
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect(),
        ),
    );
    output.insert(
        "imports".to_string(),
        json!(
            evaluation
                .imports
                .all()
                .map(|path| path.to_string_lossy().to_string())
                .collect::<Vec<_>>()
        ),
    );
    if with_items {
        let table = evaluator.read_items(&evaluation).await;
        output.insert("items".to_string(), items_json(&evaluator, &evaluation, &table).await);
    }

    let output = JsonValue::Object(output);
    let text = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(())
}

async fn items_json(
    evaluator: &Evaluator,
    evaluation: &Evaluation,
    table: &ItemTable,
) -> JsonValue {
    let mut by_type = Map::new();
    for items in table.iter() {
        let mut entries = Vec::new();
        for entry in items.entries() {
            let snapshot =
                evaluate_metadata(evaluator, &evaluation.properties, items, Some(entry)).await;
            let metadata: Map<String, JsonValue> = snapshot
                .settings
                .iter()
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect();
            entries.push(json!({ "name": entry.name, "metadata": metadata }));
        }
        by_type.insert(items.name().to_string(), JsonValue::Array(entries));
    }
    JsonValue::Object(by_type)
}

async fn handle_expand(project: &Path, text: &str, config: Option<&Path>) -> anyhow::Result<()> {
    let evaluator = Evaluator::local(load_config(config)?);
    let evaluation = evaluate(&evaluator, project, None, &[]).await?;
    let expanded = evaluator
        .expander(&evaluation.properties)
        .substitute(text, false)
        .await;
    println!("{expanded}");
    Ok(())
}
