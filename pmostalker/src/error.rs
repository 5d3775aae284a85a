//! Types d'erreurs du client de portail Stalker

use serde_json::json;
use thiserror::Error;

/// Type Result pour les opérations sur le portail
pub type Result<T> = std::result::Result<T, StalkerError>;

/// Erreurs levées par le client de portail
///
/// Le type est `Clone` car un même résultat d'authentification est partagé par
/// tous les appelants qui attendent le même handshake en cours.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StalkerError {
    /// Échec réseau ou HTTP, remonté tel quel et jamais rejoué ici
    #[error("Transport error: {message}")]
    Transport { status: Option<u16>, message: String },

    /// Handshake sans token dans la réponse
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Profil renvoyé avec `msg` ou `block_msg`
    #[error("Profile error: {0}")]
    Profile(String),

    /// Échec d'autorisation toujours présent après l'unique rejeu
    #[error("Authorization failed after retry: {0}")]
    Authorization(String),

    /// Session sans URL de portail ou sans adresse MAC
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Réponse qui ne correspond pas à la forme attendue pour son action
    #[error("Unexpected {action} response: {message}")]
    UnexpectedResponse { action: String, message: String },

    /// Erreur de (dé)sérialisation JSON
    #[error("JSON parsing error: {0}")]
    Json(String),

    /// Erreur de configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stalker error: {0}")]
    Other(String),
}

impl StalkerError {
    /// Construit une erreur de transport depuis un statut HTTP et un message
    pub fn from_status_code(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn unexpected(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Statut HTTP porté par une erreur de transport
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Vue JSON de l'erreur, telle que la voit la détection des échecs d'autorisation
    pub fn to_json(&self) -> serde_json::Value {
        match self.status() {
            Some(status) => json!({ "message": self.to_string(), "status": status }),
            None => json!({ "message": self.to_string() }),
        }
    }

    /// Vrai quand l'erreur porte une signature d'échec d'autorisation
    pub fn is_authorization_failure(&self) -> bool {
        crate::auth_failure::is_authorization_failure(&self.to_json())
    }
}

impl From<reqwest::Error> for StalkerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StalkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<anyhow::Error> for StalkerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Config(err.to_string())
    }
}
