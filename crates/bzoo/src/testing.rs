//! Test helpers.

use burn::prelude::{Backend, Tensor};

/// Assert two float tensors have the same shape and are elementwise within `tolerance`.
pub fn assert_close<B: Backend, const D: usize>(
    actual: Tensor<B, D>,
    expected: Tensor<B, D>,
    tolerance: f32,
) {
    assert_eq!(actual.dims(), expected.dims(), "shape mismatch");

    let actual = actual.into_data().convert::<f32>().to_vec::<f32>().unwrap();
    let expected = expected
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap();

    for (idx, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "element {idx}: {a} !~ {e} (tolerance {tolerance})"
        );
    }
}

/// Assert every element of a float tensor is exactly zero.
pub fn assert_all_zero<B: Backend, const D: usize>(actual: Tensor<B, D>) {
    let values = actual.into_data().convert::<f32>().to_vec::<f32>().unwrap();
    assert!(values.iter().all(|&v| v == 0.0), "expected all zeros");
}
