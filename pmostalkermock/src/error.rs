//! Types d'erreurs du simulateur

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MockError>;
