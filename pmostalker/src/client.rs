//! Client de portail haut niveau
//!
//! [`StalkerClient`] traduit les questions sur le catalogue en actions du protocole,
//! les envoie via [`StalkerSession::make_authenticated_request`] et retourne des
//! charges utiles typées.

use crate::error::{Result, StalkerError};
use crate::models::{
    AccountInfo, Category, Channel, ContentKind, EpgProgram, FavoriteOp, FavoritesData, LinkData,
    OrderedList, PortalAction, PortalResponse, Season, SeriesItem, VodItem,
};
use crate::recent::{RecentItem, RecentlyViewed};
use crate::session::{PortalSession, StalkerSession};
use crate::transport::PortalTransport;
use std::sync::Arc;
use tracing::debug;

/// Nombre de programmes demandés par défaut par [`StalkerClient::short_epg`]
pub const DEFAULT_EPG_SIZE: usize = 12;

/// Paramètres d'un appel `get_ordered_list`
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub kind: ContentKind,
    /// Id de catégorie, `*` pour toutes
    pub category: String,
    /// Page, à partir de 1
    pub page: usize,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn new(kind: ContentKind, category: impl Into<String>) -> Self {
        Self {
            kind,
            category: category.into(),
            page: 1,
            search: None,
        }
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn search(mut self, phrase: impl Into<String>) -> Self {
        let phrase = phrase.into();
        self.search = Some(phrase).filter(|p| !p.trim().is_empty());
        self
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let category = if self.category.is_empty() {
            "*".to_string()
        } else {
            self.category.clone()
        };

        let mut params = vec![
            ("type", self.kind.as_str().to_string()),
            ("action", "get_ordered_list".to_string()),
            ("sortby", "added".to_string()),
            ("p", self.page.to_string()),
        ];
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        match self.kind {
            ContentKind::Vod => {
                params.push(("genre", "0".to_string()));
                params.push(("category", category));
            }
            ContentKind::Series => params.push(("category", category)),
            ContentKind::Itv => {
                params.push(("category", category.clone()));
                params.push(("genre", category));
            }
        }
        params
    }
}

/// Client de portail typé
#[derive(Clone)]
pub struct StalkerClient {
    session: StalkerSession,
    recent: Arc<RecentlyViewed>,
}

impl StalkerClient {
    pub fn new(transport: Arc<dyn PortalTransport>) -> Self {
        Self::with_session(StalkerSession::new(transport))
    }

    pub fn with_session(session: StalkerSession) -> Self {
        Self {
            session,
            recent: Arc::new(RecentlyViewed::default()),
        }
    }

    /// Client HTTP, configuré depuis le pmoconfig global
    pub fn from_config() -> Result<Self> {
        let config = pmoconfig::get_config();
        Ok(Self::with_session(StalkerSession::from_config(&config)?))
    }

    pub fn session(&self) -> &StalkerSession {
        &self.session
    }

    pub fn recently_viewed(&self) -> &RecentlyViewed {
        &self.recent
    }

    /// Envoie `params` et lit la réponse comme charge utile de `action`
    ///
    /// Une réponse `{ js: { error } }` devient [`StalkerError::UnexpectedResponse`].
    async fn call(
        &self,
        session: &PortalSession,
        action: PortalAction,
        params: &[(&str, String)],
    ) -> Result<PortalResponse> {
        let value = self
            .session
            .make_authenticated_request(session, params, true)
            .await?;

        match PortalResponse::parse(&action, value)? {
            PortalResponse::Error(message) => Err(StalkerError::unexpected(action.name(), message)),
            response => Ok(response),
        }
    }

    fn mismatch(action: &PortalAction, response: PortalResponse) -> StalkerError {
        StalkerError::unexpected(action.name(), format!("unexpected payload {response:?}"))
    }

    /// Informations de compte rapportées par le profil, en s'authentifiant si besoin
    pub async fn account_info(&self, session: &PortalSession) -> Result<Option<AccountInfo>> {
        Ok(self
            .session
            .ensure_token(session)
            .await?
            .and_then(|auth| auth.account_info))
    }

    /// Catégories de `kind` ; les chaînes live passent par `get_genres`
    pub async fn categories(
        &self,
        session: &PortalSession,
        kind: ContentKind,
    ) -> Result<Vec<Category>> {
        let (action, name) = match kind {
            ContentKind::Itv => (PortalAction::GetGenres, "get_genres"),
            _ => (PortalAction::GetCategories(kind), "get_categories"),
        };
        let params = [
            ("type", kind.as_str().to_string()),
            ("action", name.to_string()),
            ("JsHttpRequest", "1-xml".to_string()),
        ];

        match self.call(session, action.clone(), &params).await? {
            PortalResponse::Categories(categories) => {
                debug!("{} {} categories", categories.len(), kind);
                Ok(categories)
            }
            other => Err(Self::mismatch(&action, other)),
        }
    }

    /// Une page d'une liste de contenus, quel que soit son type
    pub async fn ordered_list(
        &self,
        session: &PortalSession,
        query: &ListQuery,
    ) -> Result<PortalResponse> {
        self.call(
            session,
            PortalAction::GetOrderedList(query.kind),
            &query.params(),
        )
        .await
    }

    pub async fn channels(
        &self,
        session: &PortalSession,
        category: &str,
        page: usize,
    ) -> Result<OrderedList<Channel>> {
        let query = ListQuery::new(ContentKind::Itv, category).page(page);
        match self.ordered_list(session, &query).await? {
            PortalResponse::Channels(list) => Ok(list),
            other => Err(Self::mismatch(&PortalAction::GetOrderedList(query.kind), other)),
        }
    }

    pub async fn vod_items(
        &self,
        session: &PortalSession,
        query: &ListQuery,
    ) -> Result<OrderedList<VodItem>> {
        let query = ListQuery {
            kind: ContentKind::Vod,
            ..query.clone()
        };
        match self.ordered_list(session, &query).await? {
            PortalResponse::Vod(list) => Ok(list),
            other => Err(Self::mismatch(&PortalAction::GetOrderedList(query.kind), other)),
        }
    }

    pub async fn series_items(
        &self,
        session: &PortalSession,
        query: &ListQuery,
    ) -> Result<OrderedList<SeriesItem>> {
        let query = ListQuery {
            kind: ContentKind::Series,
            ..query.clone()
        };
        match self.ordered_list(session, &query).await? {
            PortalResponse::Series(list) => Ok(list),
            other => Err(Self::mismatch(&PortalAction::GetOrderedList(query.kind), other)),
        }
    }

    /// Saisons d'une série, ou d'un item VOD marqué `is_series`
    pub async fn seasons(
        &self,
        session: &PortalSession,
        kind: ContentKind,
        movie_id: &str,
    ) -> Result<Vec<Season>> {
        let params = [
            ("type", kind.as_str().to_string()),
            ("action", "get_ordered_list".to_string()),
            ("movie_id", movie_id.to_string()),
            ("p", "1".to_string()),
        ];

        match self.call(session, PortalAction::GetSeasons, &params).await? {
            PortalResponse::Seasons(seasons) => Ok(seasons),
            other => Err(Self::mismatch(&PortalAction::GetSeasons, other)),
        }
    }

    /// Résout un lien jouable pour `cmd`
    ///
    /// `episode` choisit un épisode d'une saison de série.
    pub async fn create_link(
        &self,
        session: &PortalSession,
        kind: ContentKind,
        cmd: &str,
        episode: Option<u32>,
    ) -> Result<LinkData> {
        let mut params = vec![
            ("type", kind.as_str().to_string()),
            ("action", "create_link".to_string()),
            ("cmd", cmd.to_string()),
            ("disable_ad", "0".to_string()),
            ("download", "0".to_string()),
            ("JsHttpRequest", "1-xml".to_string()),
        ];
        if let Some(episode) = episode {
            params.push(("series", episode.to_string()));
        }

        let action = PortalAction::CreateLink(kind);
        match self.call(session, action.clone(), &params).await? {
            PortalResponse::Link(link) => Ok(link),
            other => Err(Self::mismatch(&action, other)),
        }
    }

    /// Programmes à venir d'une chaîne
    pub async fn short_epg(
        &self,
        session: &PortalSession,
        channel_id: &str,
        size: Option<usize>,
    ) -> Result<Vec<EpgProgram>> {
        let params = [
            ("type", "itv".to_string()),
            ("action", "get_short_epg".to_string()),
            ("ch_id", channel_id.to_string()),
            ("size", size.unwrap_or(DEFAULT_EPG_SIZE).to_string()),
        ];

        match self.call(session, PortalAction::GetShortEpg, &params).await? {
            PortalResponse::Epg(programs) => Ok(programs),
            other => Err(Self::mismatch(&PortalAction::GetShortEpg, other)),
        }
    }

    async fn favorites_call(
        &self,
        session: &PortalSession,
        kind: ContentKind,
        op: FavoriteOp,
        id: Option<&str>,
    ) -> Result<PortalResponse> {
        let mut params = vec![
            ("type", kind.as_str().to_string()),
            ("action", "favorites".to_string()),
            ("fav_action", op.as_str().to_string()),
        ];
        if let Some(id) = id {
            params.push(("item_id", id.to_string()));
        }
        self.call(session, PortalAction::Favorites(op), &params).await
    }

    pub async fn favorites(
        &self,
        session: &PortalSession,
        kind: ContentKind,
    ) -> Result<FavoritesData> {
        match self
            .favorites_call(session, kind, FavoriteOp::Get, None)
            .await?
        {
            PortalResponse::Favorites(favorites) => Ok(favorites),
            other => Err(Self::mismatch(&PortalAction::Favorites(FavoriteOp::Get), other)),
        }
    }

    /// Ajoute `id` aux favoris ; deux ajouts gardent une seule entrée
    pub async fn add_favorite(
        &self,
        session: &PortalSession,
        kind: ContentKind,
        id: &str,
    ) -> Result<()> {
        self.favorites_call(session, kind, FavoriteOp::Add, Some(id))
            .await
            .map(|_| ())
    }

    /// Retire `id` des favoris ; les ids absents sont ignorés
    pub async fn remove_favorite(
        &self,
        session: &PortalSession,
        kind: ContentKind,
        id: &str,
    ) -> Result<()> {
        self.favorites_call(session, kind, FavoriteOp::Remove, Some(id))
            .await
            .map(|_| ())
    }

    /// Enregistre `item` dans la liste des vus récemment de `session`
    pub fn mark_viewed(&self, session: &PortalSession, item: RecentItem) {
        self.recent.add(session, item);
    }
}
