//! Établissement de session, partage des tokens et rejeu face à un portail scripté

use async_trait::async_trait;
use pmostalker::{
    ContentKind, PortalRequest, PortalSession, PortalTransport, Result, StalkerClient,
    StalkerError, StalkerSession,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PORTAL: &str = "http://portal.test/stalker_portal/server/load.php";
const MAC: &str = "00:1A:79:00:00:01";

/// Portail de test comptant chaque action à laquelle il répond
#[derive(Default)]
struct ScriptedPortal {
    handshakes: AtomicUsize,
    profiles: AtomicUsize,
    content_calls: AtomicUsize,
    /// Appels de contenu qui recevront encore "Authorization failed"
    auth_failures: AtomicUsize,
    /// Appels de contenu qui échoueront encore avec un statut HTTP
    http_failures: AtomicUsize,
    http_failure_status: u16,
    block_msg: Option<String>,
    /// Remplace la réponse au handshake si présent
    handshake_body: Option<Value>,
    handshake_delay: Duration,
    content_tokens: Mutex<Vec<Option<String>>>,
}

impl ScriptedPortal {
    fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PortalTransport for ScriptedPortal {
    async fn send(&self, request: PortalRequest) -> Result<Value> {
        match request.param("action") {
            Some("handshake") => {
                let n = self.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(self.handshake_delay).await;
                if let Some(body) = &self.handshake_body {
                    return Ok(body.clone());
                }
                Ok(json!({ "js": { "token": format!("TOKEN{n:04}"), "random": "f00dfeed" } }))
            }
            Some("get_profile") => {
                self.profiles.fetch_add(1, Ordering::SeqCst);
                assert!(request.token.is_some(), "profile must carry the handshake token");
                match &self.block_msg {
                    Some(msg) => Ok(json!({ "js": { "block_msg": msg } })),
                    None => Ok(json!({ "js": {
                        "id": "1",
                        "status": 0,
                        "account_info": { "login": "user1", "tariff_plan_name": "Full" }
                    }})),
                }
            }
            _ => {
                self.content_calls.fetch_add(1, Ordering::SeqCst);
                self.content_tokens
                    .lock()
                    .unwrap()
                    .push(request.token.clone());

                if Self::take(&self.http_failures) {
                    return Err(StalkerError::from_status_code(
                        self.http_failure_status,
                        "HTTP Error: scripted",
                    ));
                }
                if Self::take(&self.auth_failures) {
                    return Ok(json!({ "js": { "error": "Authorization failed. 75" } }));
                }
                Ok(json!({ "js": [{ "id": "2001", "title": "Drama", "alias": "drama" }] }))
            }
        }
    }
}

fn session() -> PortalSession {
    PortalSession::new(PORTAL, MAC)
}

#[tokio::test]
async fn test_concurrent_callers_share_one_handshake() {
    let portal = Arc::new(ScriptedPortal {
        handshake_delay: Duration::from_millis(30),
        ..Default::default()
    });
    let stalker = StalkerSession::new(portal.clone());
    let session = session();

    let calls = (0..10).map(|_| stalker.ensure_token(&session));
    let results = futures::future::join_all(calls).await;

    let tokens: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap().token)
        .collect();
    assert!(tokens.iter().all(|t| t == "TOKEN0001"));
    assert_eq!(portal.handshakes(), 1);
    assert_eq!(portal.profiles.load(Ordering::SeqCst), 1);
    assert!(!stalker.is_authenticating(&session));
}

#[tokio::test]
async fn test_cached_token_is_reused() {
    let portal = Arc::new(ScriptedPortal::default());
    let client = StalkerClient::new(portal.clone());
    let session = session();

    for _ in 0..3 {
        let categories = client.categories(&session, ContentKind::Vod).await.unwrap();
        assert_eq!(categories[0].id, "2001");
    }

    assert_eq!(portal.handshakes(), 1);
    assert_eq!(portal.content_calls(), 3);
    assert_eq!(
        client.session().cached_token(&session).as_deref(),
        Some("TOKEN0001")
    );
    // Un même boîtier écrit autrement partage le token
    let lower = PortalSession::new(PORTAL, MAC.to_lowercase());
    assert_eq!(
        client.session().cached_token(&lower).as_deref(),
        Some("TOKEN0001")
    );
}

#[tokio::test]
async fn test_authorization_failure_retried_once() {
    let portal = Arc::new(ScriptedPortal {
        auth_failures: AtomicUsize::new(1),
        ..Default::default()
    });
    let client = StalkerClient::new(portal.clone());
    let session = session();

    let categories = client.categories(&session, ContentKind::Vod).await.unwrap();
    assert_eq!(categories.len(), 1);

    assert_eq!(portal.handshakes(), 2);
    assert_eq!(portal.content_calls(), 2);
    let tokens = portal.content_tokens.lock().unwrap().clone();
    assert_eq!(
        tokens,
        vec![Some("TOKEN0001".to_string()), Some("TOKEN0002".to_string())]
    );
}

#[tokio::test]
async fn test_second_authorization_failure_is_fatal() {
    let portal = Arc::new(ScriptedPortal {
        auth_failures: AtomicUsize::new(10),
        ..Default::default()
    });
    let stalker = StalkerSession::new(portal.clone());
    let session = session();

    let err = stalker
        .make_authenticated_request(&session, &[("type", "vod"), ("action", "get_categories")], true)
        .await
        .unwrap_err();

    assert!(matches!(err, StalkerError::Authorization(_)), "{err:?}");
    assert_eq!(portal.content_calls(), 2);
    assert_eq!(portal.handshakes(), 2);
}

#[tokio::test]
async fn test_no_retry_when_disabled() {
    let portal = Arc::new(ScriptedPortal {
        auth_failures: AtomicUsize::new(1),
        ..Default::default()
    });
    let stalker = StalkerSession::new(portal.clone());

    let err = stalker
        .make_authenticated_request(&session(), &[("action", "get_categories")], false)
        .await
        .unwrap_err();

    assert!(matches!(err, StalkerError::Authorization(_)));
    assert_eq!(portal.content_calls(), 1);
    assert_eq!(portal.handshakes(), 1);
}

#[tokio::test]
async fn test_raised_401_is_retried() {
    let portal = Arc::new(ScriptedPortal {
        http_failures: AtomicUsize::new(1),
        http_failure_status: 401,
        ..Default::default()
    });
    let stalker = StalkerSession::new(portal.clone());

    let response = stalker
        .make_authenticated_request(&session(), &[("action", "get_categories")], true)
        .await
        .unwrap();

    assert!(response["js"].is_array());
    assert_eq!(portal.handshakes(), 2);
    assert_eq!(portal.content_calls(), 2);
}

#[tokio::test]
async fn test_transport_error_propagates_unchanged() {
    let portal = Arc::new(ScriptedPortal {
        http_failures: AtomicUsize::new(1),
        http_failure_status: 503,
        ..Default::default()
    });
    let stalker = StalkerSession::new(portal.clone());

    let err = stalker
        .make_authenticated_request(&session(), &[("action", "get_categories")], true)
        .await
        .unwrap_err();

    assert_eq!(err, StalkerError::from_status_code(503, "HTTP Error: scripted"));
    assert_eq!(portal.content_calls(), 1);
    assert_eq!(portal.handshakes(), 1);
}

#[tokio::test]
async fn test_blocked_profile_fails_and_is_not_cached() {
    let portal = Arc::new(ScriptedPortal {
        block_msg: Some("Account blocked".into()),
        ..Default::default()
    });
    let stalker = StalkerSession::new(portal.clone());
    let session = session();

    let err = stalker.ensure_token(&session).await.unwrap_err();
    assert_eq!(err, StalkerError::Profile("Account blocked".into()));
    assert_eq!(stalker.cached_token(&session), None);
    assert!(!stalker.is_authenticating(&session));

    // Une tentative échouée ne bloque pas la suivante
    let _ = stalker.ensure_token(&session).await;
    assert_eq!(portal.handshakes(), 2);
}

#[tokio::test]
async fn test_handshake_without_token() {
    let portal = Arc::new(ScriptedPortal {
        handshake_body: Some(json!({ "js": {} })),
        ..Default::default()
    });
    let stalker = StalkerSession::new(portal.clone());

    let err = stalker.authenticate(&session()).await.unwrap_err();
    assert!(matches!(err, StalkerError::Handshake(_)));
    assert_eq!(portal.profiles.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_handshake_is_a_handshake_error() {
    for body in [json!({}), json!({ "js": null }), json!("busy"), json!([1, 2])] {
        let portal = Arc::new(ScriptedPortal {
            handshake_body: Some(body.clone()),
            ..Default::default()
        });
        let stalker = StalkerSession::new(portal.clone());

        let err = stalker.perform_handshake(PORTAL, MAC).await.unwrap_err();
        assert!(
            matches!(err, StalkerError::Handshake(_)),
            "body {body} gave {err:?}"
        );
        assert_eq!(portal.profiles.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_rejected_token_does_not_evict_a_newer_one() {
    let portal = Arc::new(ScriptedPortal::default());
    let stalker = StalkerSession::new(portal.clone());
    let session = session();

    stalker.set_cached_token(&session, "FRESH");
    assert!(!stalker.invalidate_token(&session, "STALE"));
    assert_eq!(stalker.cached_token(&session).as_deref(), Some("FRESH"));

    assert!(stalker.invalidate_token(&session, "FRESH"));
    assert_eq!(stalker.cached_token(&session), None);
}

#[tokio::test]
async fn test_simple_portal_needs_no_token() {
    let portal = Arc::new(ScriptedPortal {
        auth_failures: AtomicUsize::new(1),
        ..Default::default()
    });
    let stalker = StalkerSession::new(portal.clone());
    let session = PortalSession::new("http://portal.test/portal.php", MAC);

    assert_eq!(stalker.ensure_token(&session).await.unwrap(), None);

    // Sans portail complet il n'y a rien à réauthentifier
    let err = stalker
        .make_authenticated_request(&session, &[("action", "get_categories")], true)
        .await
        .unwrap_err();
    assert!(matches!(err, StalkerError::Authorization(_)));
    assert_eq!(portal.handshakes(), 0);
    assert_eq!(portal.content_tokens.lock().unwrap()[0], None);
}

#[tokio::test]
async fn test_tokens_are_scoped_per_identity() {
    let portal = Arc::new(ScriptedPortal::default());
    let stalker = StalkerSession::new(portal.clone());

    let a = stalker.ensure_token(&session()).await.unwrap().unwrap();
    let b = stalker
        .ensure_token(&PortalSession::new(PORTAL, "00:1A:79:00:00:02"))
        .await
        .unwrap()
        .unwrap();
    let c = stalker
        .ensure_token(&PortalSession::new(
            "http://other.test/stalker_portal/server/load.php",
            MAC,
        ))
        .await
        .unwrap()
        .unwrap();

    assert_ne!(a.token, b.token);
    assert_ne!(a.token, c.token);
    assert_eq!(portal.handshakes(), 3);
}

#[tokio::test]
async fn test_account_info_from_profile() {
    let portal = Arc::new(ScriptedPortal::default());
    let client = StalkerClient::new(portal);

    let info = client.account_info(&session()).await.unwrap().unwrap();
    assert_eq!(info.login.as_deref(), Some("user1"));
    assert_eq!(info.tariff_plan_name.as_deref(), Some("Full"));
}

#[tokio::test]
async fn test_invalid_session() {
    let stalker = StalkerSession::new(Arc::new(ScriptedPortal::default()));
    let session = PortalSession::new(PORTAL, "").with_full_portal(true);

    let err = stalker.ensure_token(&session).await.unwrap_err();
    assert!(matches!(err, StalkerError::InvalidSession(_)));
}
