//! Enumeration and random drawing of permutations and subsets.
//!
//! One *sample* is what a single iteration of the engine processes: a
//! permutation of the evaluated features for the Shapley index, or a subset of
//! them for the Banzhaf index. Each sample expands into `(feature, coalition)`
//! pairs, one marginal contribution each.

use itertools::Itertools as _;
use rand::{Rng, seq::SliceRandom as _};

use super::Method;

/// Every sample of the exact enumeration, in a fixed order.
///
/// - Shapley: all `k!` permutations of `features`
/// - Banzhaf: all `2^k - 1` nonempty subsets, by increasing size
pub(crate) fn exact_samples(
    method: Method,
    features: &[usize],
) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
    match method {
        Method::Shapley => Box::new(features.iter().copied().permutations(features.len())),
        Method::Banzhaf => Box::new(
            (1..=features.len())
                .flat_map(move |size| features.iter().copied().combinations(size)),
        ),
    }
}

/// Draws one random sample.
///
/// Shapley samples are uniform permutations. Banzhaf samples include each
/// feature independently with probability 0.5, so the empty subset can occur.
pub(crate) fn random_sample<R>(method: Method, features: &[usize], rng: &mut R) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    match method {
        Method::Shapley => {
            let mut perm = features.to_vec();
            perm.shuffle(rng);
            perm
        }
        Method::Banzhaf => features
            .iter()
            .copied()
            .filter(|_| rng.random_bool(0.5))
            .collect(),
    }
}

/// Expands a sample into `(feature, coalition)` pairs.
///
/// - Shapley: each feature paired with the prefix of the permutation before it
/// - Banzhaf: each member paired with the rest of the subset
pub(crate) fn coalitions(method: Method, sample: &[usize]) -> Vec<(usize, Vec<usize>)> {
    match method {
        Method::Shapley => sample
            .iter()
            .enumerate()
            .map(|(i, &feature)| (feature, sample[..i].to_vec()))
            .collect(),
        Method::Banzhaf => sample
            .iter()
            .map(|&feature| {
                let rest = sample.iter().copied().filter(|&f| f != feature).collect();
                (feature, rest)
            })
            .collect(),
    }
}
