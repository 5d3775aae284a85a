//! Simulateur derrière une vraie socket

use pmostalker::{ContentKind, HttpTransport, PortalSession, StalkerClient};
use pmostalkermock::{DataStore, Dispatcher, MockServer};
use serde_json::Value;
use std::sync::Arc;

async fn start() -> (MockServer, String) {
    let dispatcher = Dispatcher::new(Arc::new(DataStore::default())).with_enforce_tokens(true);
    let mut server = MockServer::new(Arc::new(dispatcher), 0);
    let addr = server.start().await.unwrap();
    (server, format!("http://127.0.0.1:{}", addr.port()))
}

#[tokio::test]
async fn test_health_and_reset() {
    let (_server, base) = start().await;
    let http = reqwest::Client::new();

    let health: Value = http
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert!(health["timestamp"].as_str().unwrap().ends_with('Z'));

    let reset: Value = http
        .post(format!("{base}/reset"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["status"], "reset");
}

#[tokio::test]
async fn test_proxy_route_wraps_payload() {
    let (_server, base) = start().await;

    let answer: Value = reqwest::get(format!(
        "{base}/stalker?macAddress=00:1A:79:00:00:03&action=handshake&type=stb"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();

    assert_eq!(answer["payload"]["js"]["token"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn test_client_over_http() {
    let (server, base) = start().await;
    let client = StalkerClient::new(Arc::new(HttpTransport::new().unwrap()));

    // Le scénario minimal a deux catégories de chaque type
    let session = PortalSession::new(
        format!("{base}/stalker_portal/server/load.php"),
        "00:1A:79:00:00:03",
    );
    let categories = client.categories(&session, ContentKind::Series).await.unwrap();
    assert_eq!(categories.len(), 2);

    let channels = client.channels(&session, "*", 1).await.unwrap();
    assert_eq!(channels.total_items, 10);

    // Tokens oubliés côté serveur, le client se réauthentifie une fois
    server.dispatcher().store().reset_all();
    let categories = client.categories(&session, ContentKind::Vod).await.unwrap();
    assert_eq!(categories.len(), 2);
}
