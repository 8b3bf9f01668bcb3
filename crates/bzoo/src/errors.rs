//! # Zoo Errors
//!
//! Configuration and checkpoint failures reported by block construction
//! and weight loading.
//!
//! Shape errors are not represented here; they surface from ``burn``
//! (or from shape contracts) at forward time.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the zoo.
#[derive(Error, Debug)]
pub enum ZooError {
    /// An activation name which is not in the activation registry.
    #[error("unknown activation name: {name:?}")]
    UnknownActivation {
        /// The unrecognized name.
        name: String,
    },

    /// A block which requires matching in/out channels was given distinct counts.
    #[error(
        "input and output channel count of {block} does not match: {in_channels} != {out_channels}"
    )]
    ChannelMismatch {
        /// The block type.
        block: &'static str,
        /// Requested input channels.
        in_channels: usize,
        /// Requested output channels.
        out_channels: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the invalid value.
        message: String,
    },

    /// A checkpoint could not be read or deserialized.
    #[error("failed to load checkpoint {path:?}: {message}")]
    CheckpointLoad {
        /// The checkpoint path.
        path: PathBuf,
        /// The underlying failure.
        message: String,
    },

    /// A checkpoint was read, but its structure does not match the module.
    #[error("checkpoint does not match module: {message}")]
    CheckpointMismatch {
        /// Description of the first mismatch.
        message: String,
    },
}

impl ZooError {
    /// Build an [`ZooError::InvalidConfig`].
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Check that a configuration value is positive.
pub(crate) fn expect_positive(
    name: &str,
    value: usize,
) -> Result<usize, ZooError> {
    if value == 0 {
        return Err(ZooError::invalid_config(format!("{name} must be > 0")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_positive() {
        assert_eq!(expect_positive("stride", 2).unwrap(), 2);

        let err = expect_positive("stride", 0).unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration: stride must be > 0");
    }

    #[test]
    fn test_channel_mismatch_display() {
        let err = ZooError::ChannelMismatch {
            block: "DWConv",
            in_channels: 8,
            out_channels: 16,
        };
        assert_eq!(
            err.to_string(),
            "input and output channel count of DWConv does not match: 8 != 16"
        );
    }
}
