//! Property-based tests for the comparator.
//!
//! Key invariants tested:
//! - a Passed comparison implies every element satisfies
//!   `|golden - actual| <= abs_tol + rel_tol * |golden|`
//! - any single element pushed past the bound forces a failure located at
//!   that element
//! - comparing a result with itself always passes

use nnparity_common::{Tensor, ToleranceSpec};
use nnparity_compare::{Comparison, MismatchKind, compare};
use proptest::prelude::*;

fn tensor_strategy() -> impl Strategy<Value = Tensor> {
    prop::collection::vec(1usize..5, 1..4).prop_flat_map(|shape| {
        let numel: usize = shape.iter().product();
        prop::collection::vec(-1.0e3f32..1.0e3, numel)
            .prop_map(move |values| Tensor::from_f32(shape.clone(), values).unwrap())
    })
}

fn tolerance_strategy() -> impl Strategy<Value = ToleranceSpec> {
    (0.0f64..1e-2, 0.0f64..1e-2).prop_map(|(abs_tol, rel_tol)| ToleranceSpec::new(abs_tol, rel_tol))
}

proptest! {
    #[test]
    fn self_comparison_passes(golden in prop::collection::vec(tensor_strategy(), 0..4)) {
        prop_assert!(compare(&golden, &golden, ToleranceSpec::new(0.0, 0.0)).is_match());
    }

    #[test]
    fn passed_implies_elementwise_bound(
        golden in tensor_strategy(),
        noise in prop::collection::vec(-2.0e-2f32..2.0e-2, 64),
        tol in tolerance_strategy(),
    ) {
        let values: Vec<f32> = golden
            .values()
            .iter()
            .zip(noise.iter().cycle())
            .map(|(g, n)| g + n)
            .collect();
        let actual = Tensor::from_f32(golden.shape().to_vec(), values).unwrap();

        let all_within = golden
            .values()
            .iter()
            .zip(actual.values())
            .all(|(g, a)| (f64::from(*g) - f64::from(*a)).abs() <= tol.abs_tol + tol.rel_tol * f64::from(*g).abs());

        let result = compare(std::slice::from_ref(&golden), std::slice::from_ref(&actual), tol);
        prop_assert_eq!(result.is_match(), all_within);
    }

    #[test]
    fn single_violation_forces_failure(
        golden in tensor_strategy(),
        tol in tolerance_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let index = pick.index(golden.numel());
        let mut values = golden.values().to_vec();
        let g = f64::from(values[index]);
        // Step well past the bound in f32 space.
        values[index] = (g + 2.0 * tol.bound(g) + 1.0) as f32;
        let actual = Tensor::from_f32(golden.shape().to_vec(), values).unwrap();

        match compare(std::slice::from_ref(&golden), std::slice::from_ref(&actual), tol) {
            Comparison::Mismatch(d) => {
                prop_assert_eq!(d.kind, MismatchKind::Numeric);
                let first = d.first_mismatch.as_ref().unwrap();
                prop_assert_eq!(first.output, 0);
                prop_assert_eq!(first.flat_index, index);
                prop_assert_eq!(d.total_mismatches(), 1);
            }
            other => prop_assert!(false, "expected mismatch, got {:?}", other),
        }
    }
}
