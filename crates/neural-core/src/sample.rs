//! Random genotype generation for benchmarks and tests.

use crate::config::SampleConfig;
use crate::genotype::Genotype;
use crate::types::{Activation, BodyKind};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Draw a genotype with the shape described by `config`.
///
/// Ids are laid out as: blob `0`, then sensors, hidden nodes, effectors, and
/// finally links, so every gene gets a unique innovation number. Without
/// `allow_recurrent` links only point from a lower rank to a higher one
/// (sensors, then hidden nodes in id order, then effectors), which keeps the
/// network acyclic.
pub fn random_genotype(config: &SampleConfig, rng: &mut ChaCha8Rng) -> Genotype {
    let mut genotype = Genotype::new();
    let mut next_id = 0u32;
    let mut fresh_id = || {
        let id = next_id;
        next_id += 1;
        id
    };

    genotype.add_body(fresh_id(), BodyKind::Blob);

    let sensor_kinds = BodyKind::sensors();
    let sensors: Vec<u32> = (0..config.num_sensors)
        .map(|i| {
            let id = fresh_id();
            genotype.add_body(id, sensor_kinds[i % sensor_kinds.len()]);
            id
        })
        .collect();

    let activations = Activation::all();
    let hidden: Vec<u32> = (0..config.num_hidden)
        .map(|_| {
            let id = fresh_id();
            genotype.add_node(id, activations[rng.gen_range(0..activations.len())]);
            id
        })
        .collect();

    let effector_kinds = BodyKind::effectors();
    let effectors: Vec<u32> = (0..config.num_effectors)
        .map(|i| {
            let id = fresh_id();
            genotype.add_body(id, effector_kinds[i % effector_kinds.len()]);
            id
        })
        .collect();

    // Rank order: sensors < hidden < effectors
    let ranked: Vec<u32> = sensors
        .iter()
        .chain(hidden.iter())
        .chain(effectors.iter())
        .copied()
        .collect();
    let first_target = sensors.len();

    if ranked.len() <= first_target {
        return genotype;
    }

    for _ in 0..config.num_links {
        let (from, to) = if config.allow_recurrent {
            let from = ranked[rng.gen_range(0..ranked.len())];
            let to = ranked[rng.gen_range(first_target..ranked.len())];
            (from, to)
        } else {
            let to_rank = rng.gen_range(first_target..ranked.len());
            let upper = to_rank.min(first_target + hidden.len());
            if upper == 0 {
                continue;
            }
            (ranked[rng.gen_range(0..upper)], ranked[to_rank])
        };

        let weight = rng.gen_range(-config.weight_range..=config.weight_range);
        let link_id = fresh_id();
        genotype.add_link(link_id, from, to, weight);

        if rng.gen_bool(config.disabled_rate) {
            genotype.set_link_disabled(link_id.into(), true);
        }
    }

    tracing::trace!(genes = genotype.len(), "sampled genotype");
    genotype
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_sample_shape() {
        let config = SampleConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let genotype = random_genotype(&config, &mut rng);

        assert_eq!(genotype.sensors().count(), config.num_sensors);
        assert_eq!(genotype.effectors().count(), config.num_effectors);
        assert_eq!(genotype.hidden_nodes().count(), config.num_hidden);
        assert_eq!(genotype.links().count(), config.num_links);

        let ids: HashSet<_> = genotype.genes.iter().map(|g| g.innovation()).collect();
        assert_eq!(ids.len(), genotype.len());
    }

    #[test]
    fn test_sample_is_deterministic() {
        let config = SampleConfig::default();
        let a = random_genotype(&config, &mut ChaCha8Rng::seed_from_u64(7));
        let b = random_genotype(&config, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_acyclic_sample_links_point_forward() {
        let config = SampleConfig {
            allow_recurrent: false,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let genotype = random_genotype(&config, &mut rng);

        // Ids are allocated in rank order, so forward links have from < to.
        for link in genotype.links() {
            assert!(link.from < link.to, "link {:?} points backwards", link);
        }
    }

    #[test]
    fn test_sample_without_targets() {
        let config = SampleConfig {
            num_hidden: 0,
            num_effectors: 0,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let genotype = random_genotype(&config, &mut rng);
        assert_eq!(genotype.links().count(), 0);
    }
}
