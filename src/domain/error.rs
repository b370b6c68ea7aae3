//! Domain error types.
//!
//! Indicator, signal, decision and simulation code never returns these:
//! insufficient data and rejected trades are ordinary values. Errors are
//! reserved for collaborator failures, configuration and malformed input.

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PapertraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("malformed strategy rules: {reason}")]
    RulesMalformed { reason: String },

    #[error("invalid price series: {reason}")]
    InvalidPriceSeries { reason: String },

    #[error("market data error for {symbol}: {reason}")]
    MarketData { symbol: String, reason: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error("unknown broker '{name}'")]
    UnknownBroker { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PapertraderError {
    fn from(err: serde_json::Error) -> Self {
        PapertraderError::RulesMalformed {
            reason: err.to_string(),
        }
    }
}

impl PapertraderError {
    /// Process exit status for this error family.
    pub fn exit_status(&self) -> u8 {
        match self {
            PapertraderError::Io(_) => 1,
            PapertraderError::ConfigParse { .. }
            | PapertraderError::ConfigMissing { .. }
            | PapertraderError::ConfigInvalid { .. } => 2,
            PapertraderError::Database { .. } | PapertraderError::DatabaseQuery { .. } => 3,
            PapertraderError::RulesMalformed { .. } => 4,
            PapertraderError::InvalidPriceSeries { .. } | PapertraderError::MarketData { .. } => 5,
            PapertraderError::Broker { .. } | PapertraderError::UnknownBroker { .. } => 6,
        }
    }
}

impl From<&PapertraderError> for std::process::ExitCode {
    fn from(err: &PapertraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
