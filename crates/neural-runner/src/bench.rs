use std::collections::HashMap;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use neural_core::{random_genotype, Genotype, NodeId};
use neural_jit::{Evaluator, NeuralJit, ReferenceNetwork};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::CommonArgs;

#[derive(Args)]
pub struct BenchArgs {
    /// Number of genotypes to sample (default from config)
    #[arg(long)]
    pub population: Option<usize>,
    /// Number of exec calls per evaluator (default from config)
    #[arg(long)]
    pub ticks: Option<u64>,
    /// Random seed (default from config)
    #[arg(long)]
    pub seed: Option<u64>,
    #[command(flatten)]
    pub common: CommonArgs,
}

struct Agent {
    evaluator: Evaluator,
    inputs: HashMap<NodeId, f64>,
    outputs: HashMap<NodeId, f64>,
}

pub fn cmd_bench(args: BenchArgs) -> Result<()> {
    let mut config = args.common.resolve()?;
    if let Some(population) = args.population {
        config.population = population;
    }
    if let Some(ticks) = args.ticks {
        config.ticks = ticks;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.sample.validate()?;
    if config.ticks == 0 {
        bail!("bench needs at least one tick");
    }

    info!(
        population = config.population,
        ticks = config.ticks,
        seed = config.seed,
        optimize = config.jit.optimize,
        "Starting benchmark"
    );

    // One generator per genome keeps sampling deterministic under rayon
    let genotypes: Vec<Genotype> = (0..config.population)
        .into_par_iter()
        .map(|index| {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(index as u64));
            random_genotype(&config.sample, &mut rng)
        })
        .collect();

    let jit = NeuralJit::new(config.jit.clone());
    let started = Instant::now();
    let evaluators = genotypes
        .par_iter()
        .map(|genotype| jit.load(genotype))
        .collect::<Result<Vec<_>, _>>()?;
    let compile_time = started.elapsed();

    let statements: usize = evaluators.iter().map(|e| e.stats().statements).sum();
    let expression_nodes: usize = evaluators.iter().map(|e| e.stats().expression_nodes).sum();
    info!(
        genomes = evaluators.len(),
        statements,
        expression_nodes,
        elapsed_ms = compile_time.as_secs_f64() * 1e3,
        "Compiled population"
    );

    let mut agents: Vec<Agent> = evaluators
        .into_iter()
        .zip(&genotypes)
        .map(|(evaluator, genotype)| Agent {
            inputs: genotype
                .sensors()
                .map(|node| (node.id, config.input_value))
                .collect(),
            outputs: evaluator.outputs(),
            evaluator,
        })
        .collect();

    let started = Instant::now();
    for tick in 0..config.ticks {
        for agent in agents.iter_mut() {
            agent.evaluator.exec(&agent.inputs, &mut agent.outputs)?;
        }
        if tick == 0 {
            debug!("First tick complete");
        }
    }
    let run_time = started.elapsed();

    let execs = config.ticks as f64 * agents.len() as f64;
    let per_exec_ns = if execs > 0.0 {
        run_time.as_secs_f64() * 1e9 / execs
    } else {
        0.0
    };

    // Every tick is a self-contained pass, so the last one must match the reference
    let deviation = agents
        .par_iter()
        .zip(&genotypes)
        .map(|(agent, genotype)| -> Result<f64> {
            let reference = ReferenceNetwork::new(genotype).activate(&agent.inputs)?;
            Ok(reference
                .iter()
                .map(|(id, expected)| {
                    (agent.outputs.get(id).copied().unwrap_or(0.0) - expected).abs()
                })
                .fold(0.0, f64::max))
        })
        .try_reduce(|| 0.0, |a, b| Ok(a.max(b)))?;

    println!("genomes:            {}", agents.len());
    println!("statements:         {}", statements);
    println!("expression nodes:   {}", expression_nodes);
    println!("compile time:       {:.3} ms", compile_time.as_secs_f64() * 1e3);
    println!("exec time:          {:.3} ms over {} ticks", run_time.as_secs_f64() * 1e3, config.ticks);
    println!("per exec:           {:.1} ns", per_exec_ns);
    println!("max deviation:      {:e}", deviation);

    if deviation > config.tolerance {
        bail!(
            "compiled outputs deviate from the reference network by {} (tolerance {})",
            deviation,
            config.tolerance
        );
    }

    Ok(())
}
