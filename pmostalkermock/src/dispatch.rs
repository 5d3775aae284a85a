//! Aiguillage des actions
//!
//! [`Dispatcher::dispatch`] résout l'`action` d'un appel au portail, construit la
//! [`PortalResponse`] correspondante depuis le [`DataStore`] et la rend sous forme du
//! document `{ "js": ... }` qu'enverrait un vrai portail.

use crate::config_ext::MockConfigExt;
use crate::generator::{EPG_PROGRAMS_PER_CHANNEL, resolve_stream_url};
use crate::scenarios::normalize_mac;
use crate::store::{DataStore, TokenCheck};
use anyhow::Result;
use pmoconfig::Config;
use pmostalker::{
    AccountInfo, Category, ContentKind, FavoriteOp, FavoritesData, HandshakeData, LinkData,
    OrderedList, PortalAction, PortalResponse, ProfileData,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Réponse aux appels sans token confirmé quand les tokens sont exigés
pub const AUTH_FAILED_MESSAGE: &str = "Authorization failed. 75";

/// Boîtier supposé quand une requête ne porte pas d'adresse MAC
pub const DEFAULT_MAC: &str = "00:1a:79:00:00:01";

/// Une requête au portail, débarrassée de son enveloppe HTTP
#[derive(Debug, Clone, Default)]
pub struct PortalCall {
    pub mac: String,
    pub params: HashMap<String, String>,
    /// Bearer token, s'il y en a un
    pub token: Option<String>,
}

impl PortalCall {
    pub fn new<I, K, V>(mac: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            mac: mac.into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

pub struct Dispatcher {
    store: Arc<DataStore>,
    page_size: usize,
    enforce_tokens: bool,
}

impl Dispatcher {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self {
            store,
            page_size: crate::config_ext::DEFAULT_PAGE_SIZE as usize,
            enforce_tokens: false,
        }
    }

    pub fn from_config(store: Arc<DataStore>, config: &Config) -> Result<Self> {
        Ok(Self::new(store)
            .with_page_size(config.get_mock_page_size()? as usize)
            .with_enforce_tokens(config.get_mock_enforce_tokens()?))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_enforce_tokens(mut self, enforce: bool) -> Self {
        self.enforce_tokens = enforce;
        self
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn enforces_tokens(&self) -> bool {
        self.enforce_tokens
    }

    /// Répond à `call` avec un document `{ "js": ... }`
    pub fn dispatch(&self, call: &PortalCall) -> Value {
        let action = PortalAction::from_params(&call.params);
        debug!(mac = %call.mac, action = action.name(), "Dispatching portal call");
        self.respond(&action, call).to_json()
    }

    /// Construit la réponse typée à `call`
    pub fn respond(&self, action: &PortalAction, call: &PortalCall) -> PortalResponse {
        if self.enforce_tokens && !self.authorized(action, call) {
            warn!(mac = %call.mac, action = action.name(), "Rejected call without a valid token");
            return PortalResponse::Error(AUTH_FAILED_MESSAGE.to_string());
        }

        match action {
            PortalAction::Handshake => self.handshake(call),
            PortalAction::GetProfile => self.profile(call),
            PortalAction::DoAuth => self.do_auth(call),
            PortalAction::GetCategories(kind) => PortalResponse::Categories(
                self.store.catalog(&call.mac).categories(*kind).to_vec(),
            ),
            PortalAction::GetGenres => self.genres(call),
            PortalAction::GetOrderedList(kind) => self.ordered_list(*kind, call),
            PortalAction::GetSeasons => {
                let movie_id = call.param("movie_id").unwrap_or_default();
                PortalResponse::Seasons(self.store.seasons(&call.mac, movie_id).to_vec())
            }
            PortalAction::CreateLink(_) => {
                let cmd = call.param("cmd").unwrap_or_default();
                PortalResponse::Link(LinkData {
                    cmd: resolve_stream_url(cmd).to_string(),
                    streamer_id: "1".to_string(),
                    load: String::new(),
                    error: String::new(),
                })
            }
            PortalAction::GetShortEpg => self.short_epg(call),
            PortalAction::Favorites(op) => self.favorites(*op, call),
            PortalAction::Unknown(name) => PortalResponse::Error(format!("Unknown action: {name}")),
        }
    }

    fn authorized(&self, action: &PortalAction, call: &PortalCall) -> bool {
        if *action == PortalAction::Handshake {
            return true;
        }
        let Some(token) = call.token.as_deref() else {
            return false;
        };
        match (action, self.store.check_token(&call.mac, token)) {
            (_, TokenCheck::Valid) => true,
            (PortalAction::GetProfile, TokenCheck::Pending) => true,
            _ => false,
        }
    }

    fn handshake(&self, call: &PortalCall) -> PortalResponse {
        let token = self.store.issue_token(&call.mac);
        PortalResponse::Handshake(HandshakeData {
            token,
            random: Some(uuid::Uuid::new_v4().simple().to_string()),
            not_valid: Some(0),
        })
    }

    fn profile(&self, call: &PortalCall) -> PortalResponse {
        let catalog = self.store.catalog(&call.mac);
        let scenario = &catalog.scenario;
        if let Some(block_msg) = &scenario.block_msg {
            return PortalResponse::Profile(ProfileData {
                status: Some(1),
                block_msg: Some(block_msg.clone()),
                ..Default::default()
            });
        }

        if let Some(token) = call.token.as_deref() {
            self.store.activate_token(&call.mac, token);
        }

        let (login, account) = match self.store.bound_account(&call.mac) {
            Some((login, bound)) => (Some(login), bound.account),
            None => (None, scenario.account.clone()),
        };

        PortalResponse::Profile(ProfileData {
            id: Some(scenario.seed.to_string()),
            name: Some(scenario.name.clone()),
            mac: Some(normalize_mac(&call.mac).to_uppercase()),
            status: Some(0),
            msg: None,
            block_msg: None,
            account_info: Some(AccountInfo {
                login,
                expire_date: Some(account.expiry_timestamp()),
                tariff_plan_name: Some(account.tariff_plan.clone()),
                status: Some(account.status.code()),
            }),
        })
    }

    fn do_auth(&self, call: &PortalCall) -> PortalResponse {
        let login = call.param("login").unwrap_or_default();
        let password = call.param("password").unwrap_or_default();
        let scenario = self.store.registry().for_account(login, password);

        let ok = !login.is_empty() && scenario.account.is_usable(self.store.now());
        if ok {
            self.store.bind_account(&call.mac, login, scenario);
        }
        debug!(login, ok, "do_auth");
        PortalResponse::DoAuth(ok)
    }

    fn genres(&self, call: &PortalCall) -> PortalResponse {
        let catalog = self.store.catalog(&call.mac);
        let mut genres = vec![Category {
            id: "*".to_string(),
            title: "All".to_string(),
            alias: "*".to_string(),
        }];
        genres.extend(catalog.categories(ContentKind::Itv).iter().cloned());
        PortalResponse::Categories(genres)
    }

    fn ordered_list(&self, kind: ContentKind, call: &PortalCall) -> PortalResponse {
        let catalog = self.store.catalog(&call.mac);
        let category = call
            .param("category")
            .or_else(|| match kind {
                ContentKind::Itv => call.param("genre"),
                _ => None,
            })
            .unwrap_or("*");
        let page = call
            .param("p")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1);
        let search = call
            .param("search")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let matches = |name: &str| {
            search
                .as_deref()
                .is_none_or(|phrase| name.to_lowercase().contains(phrase))
        };

        match kind {
            ContentKind::Itv => {
                let mut items = catalog.channels_in(category).unwrap_or_default();
                items.retain(|c| matches(&c.name));
                PortalResponse::Channels(OrderedList::paginate(items, page, self.page_size))
            }
            ContentKind::Vod => {
                let mut items = catalog.vod_in(category).unwrap_or_default();
                items.retain(|v| matches(&v.name));
                PortalResponse::Vod(OrderedList::paginate(items, page, self.page_size))
            }
            ContentKind::Series => {
                let mut items = catalog.series_in(category).unwrap_or_default();
                items.retain(|s| matches(&s.name));
                PortalResponse::Series(OrderedList::paginate(items, page, self.page_size))
            }
        }
    }

    fn short_epg(&self, call: &PortalCall) -> PortalResponse {
        let channel_id = call.param("ch_id").unwrap_or_default();
        let size = call
            .param("size")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(EPG_PROGRAMS_PER_CHANNEL);
        let programs = self.store.epg(&call.mac, channel_id);
        PortalResponse::Epg(programs.iter().take(size).cloned().collect())
    }

    fn favorites(&self, op: FavoriteOp, call: &PortalCall) -> PortalResponse {
        let id = call.param("item_id").or_else(|| call.param("id"));
        match (op, id) {
            (FavoriteOp::Get, _) => {
                let data = self.store.favorites(&call.mac);
                PortalResponse::Favorites(FavoritesData {
                    total_items: data.len(),
                    data,
                })
            }
            (FavoriteOp::Add, Some(id)) => {
                self.store.add_favorite(&call.mac, id);
                PortalResponse::Ack
            }
            (FavoriteOp::Remove, Some(id)) => {
                self.store.remove_favorite(&call.mac, id);
                PortalResponse::Ack
            }
            (_, None) => PortalResponse::Ack,
        }
    }
}
