use thiserror::Error;

/// Top-level error type for the payout agent
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures talking to a ledger node
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("RPC {method} failed: {message}")]
    Rpc { method: String, message: String },

    #[error("Failed to decode {method} response: {message}")]
    Decode { method: String, message: String },

    #[error("Block not found: {0}")]
    BlockNotFound(u32),
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::InvalidInput(format!("Decimal conversion error: {:?}", error))
    }
}

impl From<hex::FromHexError> for AppError {
    fn from(error: hex::FromHexError) -> Self {
        AppError::InvalidInput(format!("Hex decoding error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_used_by_question_mark() {
        let hex_error: AppError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(hex_error, AppError::InvalidInput(_)));

        let gateway: AppError = GatewayError::BlockNotFound(7).into();
        assert_eq!(gateway.to_string(), "Gateway error: Block not found: 7");
    }
}
