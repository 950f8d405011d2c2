use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cypher syntax error: {0}")]
    Syntax(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Connection failed: {0}")]
    Connection(String),
}

impl StoreError {
    /// Map a driver error message onto the store taxonomy.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("SyntaxError") || message.contains("Invalid input") {
            StoreError::Syntax(message)
        } else {
            StoreError::Store(message)
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
