//! # Padding and Channel Rounding
//!
//! Pure helpers shared by the conv blocks.

/// "Same" padding for a kernel, unless an explicit padding is given.
///
/// ```text
/// effective_kernel = dilation * (kernel - 1) + 1
/// padding = effective_kernel / 2
/// ```
///
/// # Arguments
///
/// - `kernel_size`: per-dimension kernel size, each > 0.
/// - `padding`: explicit padding; returned unchanged when present.
/// - `dilation`: kernel dilation, > 0.
pub fn autopad<const D: usize>(
    kernel_size: [usize; D],
    padding: Option<[usize; D]>,
    dilation: usize,
) -> [usize; D] {
    if let Some(padding) = padding {
        return padding;
    }
    kernel_size.map(|k| (dilation * (k - 1) + 1) / 2)
}

/// Round a channel count to a multiple of `divisor`.
///
/// Rounds to nearest, never below `divisor`; and adds one more `divisor`
/// when rounding lost more than 10% of the requested channels.
///
/// Published checkpoints were built with this exact rule; changing it
/// changes parameter shapes.
///
/// # Panics
///
/// If `divisor` is 0.
pub fn round_channels(
    channels: usize,
    divisor: usize,
) -> usize {
    assert!(divisor > 0, "channel divisor must be > 0");

    let nearest = ((channels as f64 + divisor as f64 / 2.0) as usize) / divisor * divisor;
    let mut rounded = nearest.max(divisor);
    if (rounded as f64) < 0.9 * channels as f64 {
        rounded += divisor;
    }
    rounded
}
