//! Couche de transport des requêtes
//!
//! La couche session n'a besoin que de « envoyer ces paramètres à ce portail
//! en tant que ce boîtier ». [`HttpTransport`] le fait avec reqwest et les en-têtes
//! qu'envoie un boîtier MAG ; les tests et le simulateur branchent leur propre
//! [`PortalTransport`].

use crate::error::{Result, StalkerError};
use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// User agent d'une stbapp MAG200
pub const MAG_USER_AGENT: &str = "Mozilla/5.0 (QtEmbedded; U; Linux; C) AppleWebKit/533.3 (KHTML, like Gecko) MAG200 stbapp ver: 2 rev: 250 Safari/533.3";

/// En-tête compagnon identifiant le modèle matériel
pub const MAG_X_USER_AGENT: &str = "Model: MAG250; Link: WiFi";

/// Timeout par défaut des requêtes, en secondes
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Une requête du protocole
#[derive(Debug, Clone, PartialEq)]
pub struct PortalRequest {
    /// Endpoint du portail (`.../portal.php` ou `.../server/load.php`)
    pub url: String,
    pub mac_address: String,
    /// Paramètres de requête, dans l'ordre
    pub params: Vec<(String, String)>,
    /// Bearer token, absent pour le handshake
    pub token: Option<String>,
    pub serial_number: Option<String>,
}

impl PortalRequest {
    pub fn new(url: impl Into<String>, mac_address: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mac_address: mac_address.into(),
            params: Vec::new(),
            token: None,
            serial_number: None,
        }
    }

    pub fn with_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_serial_number(mut self, serial_number: Option<String>) -> Self {
        self.serial_number = serial_number;
        self
    }

    /// Valeur d'un paramètre de requête
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// En-tête `Cookie` annonçant le boîtier
    pub fn cookie(&self) -> String {
        match &self.serial_number {
            Some(sn) => format!("mac={}; sn={}", self.mac_address, sn),
            None => format!("mac={}", self.mac_address),
        }
    }
}

/// Envoie une requête du protocole et retourne le corps JSON lu
///
/// Les implémentations lèvent [`StalkerError::Transport`] pour les échecs réseau et HTTP
/// et ne rejouent jamais.
#[async_trait]
pub trait PortalTransport: Send + Sync {
    async fn send(&self, request: PortalRequest) -> Result<Value>;
}

/// Transport basé sur reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Transport avec le timeout par défaut et le user agent MAG
    pub fn new() -> Result<Self> {
        Self::with_settings(Duration::from_secs(DEFAULT_TIMEOUT_SECS), MAG_USER_AGENT)
    }

    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "X-User-Agent",
            header::HeaderValue::from_static(MAG_X_USER_AGENT),
        );

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Transport configuré depuis la section `stalker` de la configuration
    pub fn from_config(config: &pmoconfig::Config) -> Result<Self> {
        use crate::config_ext::StalkerConfigExt;

        let timeout = config.get_stalker_request_timeout_secs()?;
        let user_agent = config.get_stalker_user_agent()?;
        Self::with_settings(Duration::from_secs(timeout), &user_agent)
    }

    async fn handle_response(&self, response: Response) -> Result<Value> {
        let status = response.status();

        if status.is_client_error() || status.is_server_error() {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            warn!("Portal answered HTTP {}: {}", status.as_u16(), reason);
            return Err(StalkerError::from_status_code(
                status.as_u16(),
                format!("HTTP Error: {}", reason),
            ));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            debug!("Non-JSON portal body: {}", truncate(&body, 200));
            StalkerError::Json(e.to_string())
        })
    }
}

#[async_trait]
impl PortalTransport for HttpTransport {
    async fn send(&self, request: PortalRequest) -> Result<Value> {
        debug!(
            "GET {} action={} ({} params)",
            request.url,
            request.param("action").unwrap_or("?"),
            request.params.len()
        );

        let mut builder = self
            .client
            .get(&request.url)
            .query(&request.params)
            .header(header::COOKIE, request.cookie());

        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        self.handle_response(response).await
    }
}

/// Les `max` premiers caractères de `s`, pour journaliser secrets et corps
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
