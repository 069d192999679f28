//! Domain error types.

/// Top-level error type for tradekit.
#[derive(Debug, thiserror::Error)]
pub enum TradekitError {
    #[error("corrupt candle series for {pair}: {reason}")]
    CorruptSeries { pair: String, reason: String },

    #[error("insufficient data for {pair}: have {have} candles, need {need}")]
    InsufficientData {
        pair: String,
        have: usize,
        need: usize,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid strategy: {reason}")]
    StrategyInvalid { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradekitError> for std::process::ExitCode {
    fn from(err: &TradekitError) -> Self {
        let code: u8 = match err {
            TradekitError::Io(_) => 1,
            TradekitError::ConfigParse { .. }
            | TradekitError::ConfigMissing { .. }
            | TradekitError::ConfigInvalid { .. } => 2,
            TradekitError::Data { .. } => 3,
            TradekitError::StrategyInvalid { .. } => 4,
            TradekitError::CorruptSeries { .. } | TradekitError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
