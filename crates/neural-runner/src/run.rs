use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use neural_core::{Genotype, NodeId};
use neural_jit::{format_instructions, NeuralJit, ReferenceNetwork};
use tracing::{info, warn};

use crate::CommonArgs;

#[derive(Args)]
pub struct RunArgs {
    /// Genotype JSON file
    #[arg(long)]
    pub genotype: PathBuf,
    /// Value fed to every sensor (default from config)
    #[arg(long)]
    pub input_value: Option<f64>,
    /// Print the emitted instruction sequence
    #[arg(long)]
    pub instructions: bool,
    /// Print the compiled statements
    #[arg(long)]
    pub disassemble: bool,
    /// Print outputs as JSON
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn cmd_run(args: RunArgs) -> Result<()> {
    let config = args.common.resolve()?;
    let input_value = args.input_value.unwrap_or(config.input_value);

    let text = std::fs::read_to_string(&args.genotype)
        .with_context(|| format!("cannot read '{}'", args.genotype.display()))?;
    let genotype = Genotype::from_json(&text)
        .with_context(|| format!("cannot parse genotype '{}'", args.genotype.display()))?;
    info!(genes = genotype.len(), path = %args.genotype.display(), "Loaded genotype");

    let jit = NeuralJit::new(config.jit.clone());

    if args.instructions {
        print!("{}", format_instructions(&jit.structure(&genotype).instructions));
    }

    let evaluator = jit.load(&genotype)?;
    if args.disassemble {
        print!("{}", evaluator.program());
    }

    let inputs: HashMap<NodeId, f64> = genotype
        .sensors()
        .map(|node| (node.id, input_value))
        .collect();

    let mut outputs = evaluator.outputs();
    evaluator.exec(&inputs, &mut outputs)?;

    let reference = ReferenceNetwork::new(&genotype).activate(&inputs)?;
    let deviation = reference
        .iter()
        .map(|(id, expected)| (outputs.get(id).copied().unwrap_or(0.0) - expected).abs())
        .fold(0.0, f64::max);

    let effectors: Vec<(NodeId, f64)> = genotype
        .effectors()
        .map(|node| (node.id, outputs.get(&node.id).copied().unwrap_or(0.0)))
        .collect();

    if args.json {
        let map: serde_json::Map<String, serde_json::Value> = effectors
            .iter()
            .map(|(id, value)| (id.to_string(), serde_json::json!(value)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (id, value) in &effectors {
            println!("effector {:>4}: {:.6}", id, value);
        }
        println!("max deviation from reference: {:e}", deviation);
    }

    let stats = evaluator.stats();
    info!(
        statements = stats.statements,
        instructions = stats.instructions,
        deviation,
        "Run complete"
    );

    if deviation > config.tolerance {
        warn!(deviation, tolerance = config.tolerance, "Compiled network diverges from reference");
        bail!(
            "compiled outputs deviate from the reference network by {} (tolerance {})",
            deviation,
            config.tolerance
        );
    }

    Ok(())
}
