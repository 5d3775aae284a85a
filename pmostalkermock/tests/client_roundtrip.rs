//! Le client de portail face au simulateur en mémoire

use pmostalker::{
    ContentItem, ContentKind, ListQuery, PortalSession, RecentItem, StalkerClient, StalkerError,
};
use pmostalkermock::{DataStore, Dispatcher, LocalTransport, TEST_HLS_STREAMS};
use std::sync::Arc;

const PORTAL: &str = "http://mock.local/stalker_portal/server/load.php";
const DEFAULT_MAC: &str = "00:1A:79:00:00:01";

fn simulator(enforce_tokens: bool) -> (StalkerClient, Arc<LocalTransport>) {
    let dispatcher =
        Dispatcher::new(Arc::new(DataStore::default())).with_enforce_tokens(enforce_tokens);
    let transport = Arc::new(LocalTransport::new(Arc::new(dispatcher)));
    (StalkerClient::new(transport.clone()), transport)
}

fn session(mac: &str) -> PortalSession {
    PortalSession::new(PORTAL, mac)
}

#[tokio::test]
async fn test_browse_default_scenario() {
    let (client, _) = simulator(false);
    let session = session(DEFAULT_MAC);

    let vod_categories = client.categories(&session, ContentKind::Vod).await.unwrap();
    assert_eq!(vod_categories.len(), 8);

    let genres = client.categories(&session, ContentKind::Itv).await.unwrap();
    assert_eq!(genres[0].id, "*");

    let channels = client.channels(&session, "1001", 1).await.unwrap();
    assert_eq!(channels.data.len(), 14);
    assert_eq!(channels.total_items, 40);
    assert_eq!(channels.total_pages, 3);

    let page4 = client
        .vod_items(&session, &ListQuery::new(ContentKind::Vod, "2001").page(4))
        .await
        .unwrap();
    assert!(page4.data.is_empty());
    assert_eq!(page4.total_items, 40);

    let series = client
        .series_items(&session, &ListQuery::new(ContentKind::Series, "*"))
        .await
        .unwrap();
    assert_eq!(series.total_items, 8 * 40);

    let seasons = client
        .seasons(&session, ContentKind::Series, &series.data[0].id)
        .await
        .unwrap();
    assert_eq!(seasons.len(), 3);
    assert_eq!(seasons[0].series.len(), 8);

    let info = client.account_info(&session).await.unwrap().unwrap();
    assert_eq!(info.status, Some(1));
    assert_eq!(info.tariff_plan_name.as_deref(), Some("Full"));
}

#[tokio::test]
async fn test_same_mac_same_catalog_across_simulators() {
    let (a, _) = simulator(false);
    let (b, _) = simulator(false);
    let query = ListQuery::new(ContentKind::Vod, "2003").page(2);

    let left = a.vod_items(&session(DEFAULT_MAC), &query).await.unwrap();
    let right = b.vod_items(&session(DEFAULT_MAC), &query).await.unwrap();
    assert_eq!(left, right);

    let other = a
        .vod_items(&session("00:1A:79:AB:CD:EF"), &query)
        .await
        .unwrap();
    assert_ne!(left.data, other.data);
}

#[tokio::test]
async fn test_search() {
    let (client, _) = simulator(false);
    let session = session(DEFAULT_MAC);
    let first = client
        .vod_items(&session, &ListQuery::new(ContentKind::Vod, "2002"))
        .await
        .unwrap();
    let name = first.data[3].name.clone();

    let found = client
        .vod_items(
            &session,
            &ListQuery::new(ContentKind::Vod, "*").search(name.to_lowercase()),
        )
        .await
        .unwrap();
    assert!(found.data.iter().any(|v| v.name == name));
    assert!(found.total_items < 8 * 40);
}

#[tokio::test]
async fn test_series_layouts() {
    let (client, _) = simulator(false);

    let flagged = session("00:1A:79:00:00:04");
    let items = client
        .vod_items(&flagged, &ListQuery::new(ContentKind::Vod, "2001"))
        .await
        .unwrap();
    let item = items.data.iter().find(|v| v.is_series).unwrap();
    let seasons = client
        .seasons(&flagged, ContentKind::Vod, &item.id)
        .await
        .unwrap();
    assert_eq!(seasons.len(), 3);
    assert_eq!(seasons[0].series.len(), 6);

    let embedded = session("00:1A:79:00:00:05");
    let items = client
        .vod_items(&embedded, &ListQuery::new(ContentKind::Vod, "2001"))
        .await
        .unwrap();
    assert!(items.data[0].has_embedded_episodes());
    assert_eq!(items.data[0].series.as_ref().unwrap().len(), 10);
}

#[tokio::test]
async fn test_links_and_guide() {
    let (client, _) = simulator(false);
    let session = session(DEFAULT_MAC);

    let channels = client.channels(&session, "*", 1).await.unwrap();
    let channel = &channels.data[0];

    let link = client
        .create_link(&session, ContentKind::Itv, &channel.cmd, None)
        .await
        .unwrap();
    assert!(TEST_HLS_STREAMS.iter().any(|s| *s == link.stream_url()));

    let guide = client.short_epg(&session, &channel.id, None).await.unwrap();
    assert_eq!(guide.len(), 12);
    assert!(guide[0].name.starts_with(&channel.name));
}

#[tokio::test]
async fn test_favorites_and_recently_viewed() {
    let (client, _) = simulator(false);
    let session = session(DEFAULT_MAC);

    client.add_favorite(&session, ContentKind::Vod, "20005").await.unwrap();
    client.add_favorite(&session, ContentKind::Itv, "10001").await.unwrap();
    client.add_favorite(&session, ContentKind::Vod, "20005").await.unwrap();
    client
        .remove_favorite(&session, ContentKind::Vod, "99999")
        .await
        .unwrap();

    let favorites = client.favorites(&session, ContentKind::Vod).await.unwrap();
    assert_eq!(favorites.total_items, 2);
    assert!(matches!(&favorites.data[0], ContentItem::Vod(v) if v.id == "20005"));
    assert!(matches!(&favorites.data[1], ContentItem::Channel(c) if c.id == "10001"));

    client
        .remove_favorite(&session, ContentKind::Vod, "20005")
        .await
        .unwrap();
    let favorites = client.favorites(&session, ContentKind::Vod).await.unwrap();
    assert_eq!(favorites.total_items, 1);

    let item = favorites.data[0].clone();
    client.mark_viewed(
        &session,
        RecentItem::new(item.id(), item.kind(), item.name()),
    );
    assert!(client.recently_viewed().contains(&session, "10001"));
}

#[tokio::test]
async fn test_reset_forces_reauthentication() {
    let (client, transport) = simulator(true);
    let session = session(DEFAULT_MAC);

    client.categories(&session, ContentKind::Vod).await.unwrap();
    let first_token = client.session().cached_token(&session).unwrap();
    // handshake, profil, catégories
    assert_eq!(transport.request_count(), 3);

    transport.dispatcher().store().reset_all();

    // appel refusé, handshake, profil, appel rejoué
    client.categories(&session, ContentKind::Vod).await.unwrap();
    assert_eq!(transport.request_count(), 7);
    assert_ne!(client.session().cached_token(&session).unwrap(), first_token);
}

#[tokio::test]
async fn test_blocked_device() {
    let (client, _) = simulator(false);
    let err = client
        .categories(&session("00:1A:79:00:00:06"), ContentKind::Vod)
        .await
        .unwrap_err();
    assert!(matches!(err, StalkerError::Profile(msg) if msg.contains("blocked")));
}

#[tokio::test]
async fn test_do_auth_accounts() {
    let (client, _) = simulator(false);
    let session = session(DEFAULT_MAC);
    let stalker = client.session();

    let auth = stalker.ensure_token(&session).await.unwrap().unwrap();
    let identity = session.identity();

    assert!(
        !stalker
            .do_auth(PORTAL, &auth.token, "expired", "expired", &identity)
            .await
            .unwrap()
    );
    assert!(
        !stalker
            .do_auth(PORTAL, &auth.token, "inactive", "inactive", &identity)
            .await
            .unwrap()
    );
    assert!(
        stalker
            .do_auth(PORTAL, &auth.token, "user1", "pass1", &identity)
            .await
            .unwrap()
    );
}
