// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};

use plugflow::config::{load_and_validate_pipeline, load_runtime_config, RuntimeBuilder, RuntimeConfig};
use plugflow::registry::{CapabilityDescriptor, CapabilityKind};
use plugflow::tensor::Tensor;
use plugflow::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "plugflow", version, about = "Pluggable inference runtime")]
struct Cli {
    /// Runtime settings file (.yaml, .yml or .toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip scanning the plugin search path at startup
    #[arg(long, global = true)]
    no_autoload: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered capabilities
    Capabilities {
        /// Only this kind: device, memory_pool, model_loader or pipeline_node
        #[arg(long)]
        kind: Option<CapabilityKind>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List loaded modules
    Modules {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Build a pipeline from a file and run it on one f32 tensor
    Run {
        pipeline: PathBuf,

        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f32>,

        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Print a pipeline's sources, sinks, edges and levels
    Topology { pipeline: PathBuf },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plugflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let runtime = start_runtime(cli.config.as_deref(), cli.no_autoload)?;

    match cli.command {
        Command::Capabilities { kind, format } => print_capabilities(&runtime, kind, format)?,
        Command::Modules { format } => print_modules(&runtime, format)?,
        Command::Run {
            pipeline,
            values,
            repeat,
        } => run_pipeline(&runtime, &pipeline, &values, repeat).await?,
        Command::Topology { pipeline } => print_topology(&runtime, &pipeline)?,
    }

    runtime.shutdown()?;
    Ok(())
}

fn start_runtime(config_path: Option<&Path>, no_autoload: bool) -> Result<Runtime> {
    let mut config = match config_path {
        Some(path) => load_runtime_config(path)
            .with_context(|| format!("loading runtime config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if no_autoload {
        config.autoload = false;
    }

    let (runtime, report) = RuntimeBuilder::from_config(&config)?;
    for failure in &report.failed {
        tracing::warn!(path = %failure.path.display(), "Module not loaded: {}", failure.error);
    }
    if !report.loaded.is_empty() {
        tracing::info!(modules = report.loaded.len(), "Autoload finished");
    }
    Ok(runtime)
}

fn describe(descriptor: &CapabilityDescriptor) -> Result<serde_json::Value> {
    let mut entry = json!({
        "kind": descriptor.kind(),
        "name": descriptor.name,
        "version": descriptor.version,
        "provenance": descriptor.provenance.to_string(),
        "status": descriptor.handle().status().to_string(),
        "capabilities": descriptor.handle().capabilities(),
    });
    if let Some(pool) = descriptor.as_memory_pool() {
        entry["usage"] = serde_json::to_value(pool.usage())?;
    }
    if let Some(loader) = descriptor.as_model_loader() {
        entry["formats"] = json!(loader.formats());
    }
    Ok(entry)
}

fn print_capabilities(runtime: &Runtime, kind: Option<CapabilityKind>, format: OutputFormat) -> Result<()> {
    let descriptors = match kind {
        Some(kind) => runtime.list_capabilities(kind, usize::MAX)?,
        None => runtime.capability_snapshot()?,
    };

    if format == OutputFormat::Json {
        let entries = descriptors.iter().map(describe).collect::<Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&json!({
            "capabilities": entries,
            "stats": runtime.stats()?,
        }))?);
        return Ok(());
    }

    for descriptor in &descriptors {
        println!(
            "{:<14} {:<12} {:<8} {:<9} {}",
            descriptor.kind(),
            descriptor.name,
            descriptor.version,
            descriptor.provenance,
            descriptor.handle().capabilities()
        );
    }
    let stats = runtime.stats()?;
    println!(
        "\n{} capabilities ({} built-in, {} plugin, {} dynamic), {} modules loaded",
        stats.total, stats.built_in, stats.plugin, stats.dynamic, stats.loaded_modules
    );
    Ok(())
}

fn print_modules(runtime: &Runtime, format: OutputFormat) -> Result<()> {
    let modules = runtime.modules()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(());
    }

    if modules.is_empty() {
        println!("No modules loaded");
        return Ok(());
    }
    for module in &modules {
        println!(
            "{} {} ({}) loaded {}",
            module.name(),
            module.metadata.version,
            module.path.display(),
            module.loaded_at.to_rfc3339()
        );
        for (kind, name) in &module.capabilities {
            println!("  {} {}", kind, name);
        }
        for node_type in &module.node_types {
            println!("  node type {}", node_type);
        }
    }
    Ok(())
}

fn format_outputs(outputs: &[Tensor]) -> String {
    outputs
        .iter()
        .map(|tensor| match tensor.to_f32() {
            Some(values) => format!("{:?}", values),
            None => format!("<{} bytes of {:?}>", tensor.byte_size(), tensor.dtype),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn run_pipeline(runtime: &Runtime, path: &Path, values: &[f32], repeat: u32) -> Result<()> {
    let config = load_and_validate_pipeline(path)
        .with_context(|| format!("loading pipeline {}", path.display()))?;
    let mut pipeline = runtime.build_pipeline(&config)?;
    let inputs = vec![Tensor::from_f32(vec![values.len()], values)];

    for iteration in 1..=repeat.max(1) {
        let outputs = pipeline.run(&inputs).await?;
        println!("[{}] {}", iteration, format_outputs(&outputs));
    }

    let stats = pipeline.stats();
    println!(
        "\n{}: {} runs, {} ok, {} failed, {:?} total",
        pipeline.name(),
        stats.invocations,
        stats.successes,
        stats.failures,
        stats.total_time
    );
    for name in pipeline.node_names() {
        if let Some(node) = pipeline.node_stats(name) {
            println!(
                "  {:<16} executions={} ok={} errors={} last={:?}",
                name, node.executions, node.successes, node.errors, node.last_time
            );
        }
    }
    Ok(())
}

fn print_topology(runtime: &Runtime, path: &Path) -> Result<()> {
    let config = load_and_validate_pipeline(path)
        .with_context(|| format!("loading pipeline {}", path.display()))?;
    let pipeline = runtime.build_pipeline(&config)?;
    let topology = pipeline.query_topology();

    println!("pipeline: {}", topology.pipeline);
    println!("sources:  {}", topology.sources().join(", "));
    println!("sinks:    {}", topology.sinks().join(", "));
    println!("edges:");
    for edge in &topology.edges {
        println!(
            "  {}:{} -> {}:{}",
            edge.source, edge.source_slot, edge.target, edge.target_slot
        );
    }
    println!("levels:");
    for (depth, level) in topology.levels.iter().enumerate() {
        println!("  {}: {}", depth, level.join(", "));
    }
    if !topology.cyclic.is_empty() {
        println!("cyclic:   {}", topology.cyclic.join(", "));
    }
    Ok(())
}
