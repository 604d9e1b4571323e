//! Fixed constants of the affine invariant.

/// Normalized fingerprints are rounded to three decimal places
/// (`x * ROUND_SCALE` rounded to an integer), absorbing the noise of the
/// integer → `f64` conversion.
pub(crate) const ROUND_SCALE: f64 = 1000.0;
