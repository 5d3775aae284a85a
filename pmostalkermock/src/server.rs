//! Façade HTTP du simulateur
//!
//! Routes :
//! - `GET /portal.php` et `GET /stalker_portal/server/load.php` : endpoints du
//!   portail, MAC lue dans le cookie `mac`, token dans `Authorization: Bearer`
//! - `GET /stalker?macAddress=...&action=...` : mêmes appels pour les outils qui
//!   ne peuvent pas poser de cookie, réponse enveloppée dans `{ "payload": ... }`
//! - `GET /health`, `POST /reset`

use crate::config_ext::MockConfigExt;
use crate::dispatch::{DEFAULT_MAC, Dispatcher, PortalCall};
use crate::error::{MockError, Result};
use crate::store::DataStore;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Chemins du portail servis par le simulateur
pub const PORTAL_PATHS: [&str; 2] = ["/portal.php", "/stalker_portal/server/load.php"];

/// Adresse MAC portée par un en-tête `Cookie: mac=...; sn=...`
fn cookie_mac(headers: &HeaderMap) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "mac")
        .map(|(_, value)| value.replace("%3A", ":").replace("%3a", ":"))
        .filter(|mac| !mac.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn portal(
    State(dispatcher): State<Arc<Dispatcher>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    let mac = cookie_mac(&headers).unwrap_or_else(|| DEFAULT_MAC.to_string());
    let call = PortalCall {
        mac,
        params,
        token: bearer_token(&headers),
    };
    Json(dispatcher.dispatch(&call))
}

async fn stalker_proxy(
    State(dispatcher): State<Arc<Dispatcher>>,
    Query(mut params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    let mac = params
        .remove("macAddress")
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MAC.to_string());
    params.remove("url");
    let call = PortalCall {
        mac,
        params,
        token: bearer_token(&headers),
    };
    Json(json!({ "payload": dispatcher.dispatch(&call) }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": timestamp() }))
}

async fn reset(State(dispatcher): State<Arc<Dispatcher>>) -> Json<Value> {
    dispatcher.store().reset_all();
    Json(json!({ "status": "reset", "timestamp": timestamp() }))
}

/// Router servant `dispatcher`
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    let mut router = Router::new();
    for path in PORTAL_PATHS {
        router = router.route(path, get(portal));
    }
    router
        .route("/stalker", get(stalker_proxy))
        .route("/health", get(health))
        .route("/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Serveur HTTP du simulateur
pub struct MockServer {
    http_port: u16,
    dispatcher: Arc<Dispatcher>,
    local_addr: Option<SocketAddr>,
    join_handle: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn new(dispatcher: Arc<Dispatcher>, http_port: u16) -> Self {
        Self {
            http_port,
            dispatcher,
            local_addr: None,
            join_handle: None,
        }
    }

    /// Serveur construit depuis la section `mock` de la configuration globale
    pub fn from_config() -> Result<Self> {
        let config = pmoconfig::get_config();
        let store = Arc::new(DataStore::default());
        let dispatcher = Dispatcher::from_config(store, &config)?;
        let port = u16::try_from(config.get_mock_http_port()?)
            .map_err(|e| MockError::Config(anyhow::anyhow!("invalid http_port: {e}")))?;
        Ok(Self::new(Arc::new(dispatcher), port))
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Adresse d'écoute du serveur, une fois démarré
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Lie le port et sert en tâche de fond jusqu'à Ctrl+C
    ///
    /// Le port 0 choisit un port libre, voir [`MockServer::local_addr`].
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| MockError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("Stalker simulator listening on http://{}", local_addr);

        let app = router(self.dispatcher.clone());
        let server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                warn!("Simulator server stopped: {}", e);
            }
        });

        let shutdown_task = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C received, shutting down"),
                Err(e) => {
                    warn!("Cannot listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        });

        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = server_task => {},
                _ = shutdown_task => {},
            }
        }));
        Ok(local_addr)
    }

    /// Attend l'arrêt du serveur
    pub async fn wait(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_mac() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("sn=BEDACD4569BAF; mac=00%3A1A%3A79%3A00%3A00%3A02"),
        );
        assert_eq!(cookie_mac(&headers).as_deref(), Some("00:1A:79:00:00:02"));

        assert_eq!(cookie_mac(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer ABC"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("ABC"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
