use thiserror::Error;

/// Construction-time failures. None of these are recoverable: a model or a
/// dataset built from an invalid configuration is never handed out.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("d_out ({d_out}) must be divisible by num_heads ({num_heads})")]
    HeadsNotDivisible { d_out: usize, num_heads: usize },

    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),

    #[error("drop_rate must be in [0, 1), got {0}")]
    DropRate(f32),

    #[error("prompt must contain at least one token")]
    EmptyPrompt,

    #[error("sequence length {seq_len} exceeds context length {context_length}")]
    ContextOverflow {
        seq_len: usize,
        context_length: usize,
    },
}

impl ConfigError {
    /// Lift into candle's error type so layer constructors can keep returning
    /// `candle_core::Result`.
    pub fn into_candle(self) -> candle_core::Error {
        candle_core::Error::wrap(self)
    }
}
