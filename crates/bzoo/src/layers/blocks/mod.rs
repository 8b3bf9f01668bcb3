//! # Convolutional Blocks
//!
//! * [`conv_bn_act`] - ``Conv2d + Norm + Activation`` with optional skip connection.
//! * [`dw_conv`] - depthwise [`conv_bn_act::ConvBnAct`].
//! * [`ghost_conv`] - ghost convolution.
//! * [`focus`] - space-to-depth stem.
//! * [`robust_conv`] - large-kernel depthwise blocks with layer scale.
//! * [`padding`] - "same" padding and channel rounding.

pub mod conv_bn_act;
pub mod dw_conv;
pub mod focus;
pub mod ghost_conv;
pub mod padding;
pub mod robust_conv;
