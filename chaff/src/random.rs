//! Random process primitives for noise scheduling.
//!
//! Pure, stateless sampling functions shared by the scheduler and the task
//! generator. All functions are generic over [`rand::Rng`] so production code
//! can run on an entropy-seeded [`rand::rngs::StdRng`] while tests inject a
//! fixed seed.

use rand::Rng;

/// Draws an exponential inter-arrival time in seconds for a homogeneous
/// Poisson process of rate `lambda_per_second`.
///
/// Uses the inverse-CDF transform `-ln(1 - U) / lambda` with U uniform on
/// [0, 1); the mean of the returned samples is `1 / lambda_per_second`. The
/// result is clamped to the smallest positive float so callers can rely on a
/// strictly positive sample even on a U = 0 draw.
///
/// # Panics
///
/// Panics in debug builds if `lambda_per_second` is not strictly positive.
pub fn sample_inter_arrival<R: Rng + ?Sized>(rng: &mut R, lambda_per_second: f64) -> f64 {
    debug_assert!(
        lambda_per_second > 0.0,
        "inter-arrival rate must be positive"
    );
    let u: f64 = rng.gen_range(0.0..1.0);
    (-(1.0 - u).ln() / lambda_per_second).max(f64::MIN_POSITIVE)
}

/// Picks one item by cumulative weight in a single pass.
///
/// Ties between equal cumulative boundaries resolve in insertion order, and
/// zero-weight items are never selected. Weights need not sum to any
/// particular total.
///
/// # Panics
///
/// Panics if `items` is empty or the total weight is not strictly positive.
/// Callers guarantee non-empty candidate sets by construction (the generator
/// falls back to the full catalog rather than passing an empty slice).
pub fn weighted_choice<'a, T, R, F>(rng: &mut R, items: &'a [T], weight_of: F) -> &'a T
where
    R: Rng + ?Sized,
    F: Fn(&T) -> f64,
{
    assert!(!items.is_empty(), "weighted_choice over an empty slice");
    let total: f64 = items.iter().map(&weight_of).sum();
    assert!(
        total > 0.0 && total.is_finite(),
        "weighted_choice requires a positive finite total weight"
    );

    let mut remaining = rng.gen_range(0.0..total);
    for item in items {
        let weight = weight_of(item);
        if remaining < weight {
            return item;
        }
        remaining -= weight;
    }
    // Floating-point rounding can exhaust the draw a hair before the last
    // item's boundary; the draw still belongs to the final bucket.
    items.last().unwrap()
}

/// Equal-weight special case of [`weighted_choice`].
///
/// # Panics
///
/// Panics if `items` is empty.
pub fn uniform_choice<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> &'a T {
    assert!(!items.is_empty(), "uniform_choice over an empty slice");
    &items[rng.gen_range(0..items.len())]
}
