//! Batch-GCD recovery of RSA moduli that share a prime factor.
//!
//! A product tree makes the all-pairs gcd near-linear: the root is the
//! product of every modulus, and pushing it back down with a reduction mod
//! n_i^2 at each node leaves z_i = (product of everything) mod n_i^2 at the
//! leaves, from which gcd(z_i / n_i, n_i) exposes the primes n_i shares with
//! any other modulus.

use itertools::Itertools;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::One;

/// Levels bottom-up: level 0 is the moduli, each level above holds pairwise
/// products with a lone last element carried forward unchanged.
pub fn product_tree(leaves: &[BigInt]) -> Vec<Vec<BigInt>> {
    if leaves.is_empty() {
        return vec![];
    }
    let mut levels = vec![leaves.to_vec()];
    while levels[levels.len() - 1].len() > 1 {
        let next: Vec<BigInt> = levels[levels.len() - 1]
            .chunks(2)
            .map(|pair| pair.iter().product())
            .collect();
        levels.push(next);
    }
    levels
}

/// Top-down pass: every node receives its parent's value reduced mod its own
/// square, ending with z_i = root mod n_i^2 at the leaves.
fn leaf_remainders(levels: &[Vec<BigInt>]) -> Vec<BigInt> {
    let mut current = levels[levels.len() - 1].clone();
    for level in levels[..levels.len() - 1].iter().rev() {
        current = level
            .iter()
            .enumerate()
            .map(|(i, node)| &current[i / 2] % (node * node))
            .collect();
    }
    current
}

/// Returns every (p, q) with p <= q and p*q one of the moduli, for moduli
/// sharing a prime with some other modulus. Deduplicated and sorted.
pub fn shared_factors(moduli: &[BigInt]) -> Vec<(BigInt, BigInt)> {
    if moduli.is_empty() {
        return vec![];
    }
    let levels = product_tree(moduli);
    let remainders = leaf_remainders(&levels);

    let mut pairs = vec![];
    let mut collapsed = vec![];
    for (i, (n, z)) in moduli.iter().zip(&remainders).enumerate() {
        let g = (z / n).gcd(n);
        if g > BigInt::one() && &g < n {
            pairs.push(ordered(n / &g, g));
        } else if &g == n {
            // n shares factors with several others at once and the batch gcd
            // collapsed to n itself
            collapsed.push(i);
        }
    }

    for i in collapsed {
        let n = &moduli[i];
        for (j, other) in moduli.iter().enumerate() {
            if j == i {
                continue;
            }
            let g = n.gcd(other);
            if g > BigInt::one() && &g < n {
                pairs.push(ordered(n / &g, g));
                break;
            }
        }
    }

    pairs.into_iter().sorted().dedup().collect()
}

fn ordered(a: BigInt, b: BigInt) -> (BigInt, BigInt) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
