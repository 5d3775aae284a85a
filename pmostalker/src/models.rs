//! Structures de données du protocole des portails Stalker
//!
//! Chaque réponse est enveloppée dans `{ "js": ... }`. [`PortalResponse`] est
//! l'union étiquetée des charges utiles, une variante par action, lue par
//! [`PortalResponse::parse`] et réécrite par [`PortalResponse::to_json`]
//! (le simulateur répond avec les types que lit le client).

use crate::error::{Result, StalkerError};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============ Désérialiseurs tolérants ============

/// Accepte chaînes, nombres, booléens et null (chaîne vide)
pub(crate) fn de_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(D::Error::custom("expected a string or a number")),
    }
}

fn de_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(de_string(deserializer)?).filter(|s| !s.is_empty()))
}

fn de_opt_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => Ok(n.as_i64()),
        Value::String(s) => Ok(s.trim().parse().ok()),
        _ => Ok(None),
    }
}

fn de_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_i64(deserializer)?.unwrap_or_default())
}

fn de_usize<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_i64(deserializer)?
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default())
}

/// `is_series` / `has_files` arrivent en `0`, `1`, `"1"` ou booléen selon le middleware
fn de_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

fn ser_flag<S: Serializer>(flag: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

// ============ Types de contenu et actions ============

/// Famille de contenu désignée par le paramètre `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Itv,
    #[default]
    Vod,
    Series,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Itv => "itv",
            ContentKind::Vod => "vod",
            ContentKind::Series => "series",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = StalkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "itv" => Ok(ContentKind::Itv),
            "vod" => Ok(ContentKind::Vod),
            "series" => Ok(ContentKind::Series),
            other => Err(StalkerError::Other(format!("unknown content type: {other}"))),
        }
    }
}

/// Opération demandée via l'action `favorites`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOp {
    Get,
    Add,
    Remove,
}

impl FavoriteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteOp::Get => "get",
            FavoriteOp::Add => "add",
            FavoriteOp::Remove => "remove",
        }
    }

    /// Certains portails disent `set` / `unset` au lieu de `add` / `remove`
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("add" | "set") => FavoriteOp::Add,
            Some("remove" | "unset" | "del") => FavoriteOp::Remove,
            _ => FavoriteOp::Get,
        }
    }
}

/// Action du protocole déduite des paramètres de la requête
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalAction {
    Handshake,
    GetProfile,
    DoAuth,
    /// `get_categories`, `get_genres_vod`, `get_genres_itv`
    GetCategories(ContentKind),
    /// `get_genres` : genres live avec l'entrée joker `*`
    GetGenres,
    GetOrderedList(ContentKind),
    /// `get_ordered_list` avec un `movie_id`
    GetSeasons,
    CreateLink(ContentKind),
    /// `get_short_epg` / `get_epg_info`
    GetShortEpg,
    /// `favorites` / `set_favorites`
    Favorites(FavoriteOp),
    Unknown(String),
}

impl PortalAction {
    /// Valeur du paramètre `action` sur le fil
    pub fn name(&self) -> &str {
        match self {
            PortalAction::Handshake => "handshake",
            PortalAction::GetProfile => "get_profile",
            PortalAction::DoAuth => "do_auth",
            PortalAction::GetCategories(_) => "get_categories",
            PortalAction::GetGenres => "get_genres",
            PortalAction::GetOrderedList(_) | PortalAction::GetSeasons => "get_ordered_list",
            PortalAction::CreateLink(_) => "create_link",
            PortalAction::GetShortEpg => "get_short_epg",
            PortalAction::Favorites(_) => "favorites",
            PortalAction::Unknown(name) => name,
        }
    }

    /// Déduit l'action des paramètres de requête
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let get = |k: &str| params.get(k).map(String::as_str);
        let kind = || -> ContentKind {
            get("type")
                .and_then(|t| t.parse().ok())
                .unwrap_or_default()
        };

        match get("action").unwrap_or_default() {
            "handshake" => PortalAction::Handshake,
            "get_profile" => PortalAction::GetProfile,
            "do_auth" => PortalAction::DoAuth,
            "get_categories" => PortalAction::GetCategories(kind()),
            "get_genres_vod" => PortalAction::GetCategories(ContentKind::Vod),
            "get_genres_itv" => PortalAction::GetCategories(ContentKind::Itv),
            "get_genres" => PortalAction::GetGenres,
            "get_ordered_list" if get("movie_id").is_some_and(|m| !m.is_empty()) => {
                PortalAction::GetSeasons
            }
            "get_ordered_list" => PortalAction::GetOrderedList(kind()),
            "create_link" => PortalAction::CreateLink(kind()),
            "get_short_epg" | "get_epg_info" => PortalAction::GetShortEpg,
            "favorites" => PortalAction::Favorites(FavoriteOp::parse(get("fav_action"))),
            "set_favorites" => PortalAction::Favorites(match get("fav_action") {
                Some(_) => FavoriteOp::parse(get("fav_action")),
                None => FavoriteOp::Add,
            }),
            other => PortalAction::Unknown(other.to_string()),
        }
    }
}

// ============ Charges utiles de session ============

/// Charge utile de `handshake`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandshakeData {
    #[serde(default, deserialize_with = "de_string")]
    pub token: String,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub random: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub not_valid: Option<i64>,
}

/// Informations d'abonnement renvoyées par `get_profile`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Timestamp Unix
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub expire_date: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub tariff_plan_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

/// Charge utile de `get_profile`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub block_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_info: Option<AccountInfo>,
}

impl ProfileData {
    /// Erreur signalée par le serveur, `msg` d'abord puis `block_msg`
    pub fn error_message(&self) -> Option<&str> {
        self.msg.as_deref().or(self.block_msg.as_deref())
    }
}

// ============ Charges utiles du catalogue ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string")]
    pub alias: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub o_name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub cmd: String,
    #[serde(default, deserialize_with = "de_string")]
    pub logo: String,
    #[serde(default, deserialize_with = "de_string")]
    pub category_id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub tv_genre_id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub xmltv_id: String,
}

/// Épisode inclus directement dans un item VOD (variante tableau `series`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedEpisode {
    #[serde(deserialize_with = "de_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub cmd: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VodItem {
    #[serde(deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub o_name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string")]
    pub cmd: String,
    #[serde(default, deserialize_with = "de_string")]
    pub screenshot_uri: String,
    #[serde(default, deserialize_with = "de_string")]
    pub cover: String,
    #[serde(default, deserialize_with = "de_string")]
    pub description: String,
    #[serde(default, deserialize_with = "de_string")]
    pub actors: String,
    #[serde(default, deserialize_with = "de_string")]
    pub director: String,
    #[serde(default, deserialize_with = "de_string")]
    pub year: String,
    #[serde(default, deserialize_with = "de_string")]
    pub genre: String,
    #[serde(default, deserialize_with = "de_string")]
    pub genres_str: String,
    #[serde(default, deserialize_with = "de_string")]
    pub rating_imdb: String,
    #[serde(default, deserialize_with = "de_string")]
    pub rating_kinopoisk: String,
    #[serde(default, deserialize_with = "de_string")]
    pub category_id: String,
    /// Drapeau du plugin Ministra : les saisons se récupèrent avec `movie_id`
    #[serde(default, deserialize_with = "de_flag", serialize_with = "ser_flag")]
    pub is_series: bool,
    #[serde(default, deserialize_with = "de_flag", serialize_with = "ser_flag")]
    pub has_files: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<EmbeddedEpisode>>,
}

impl VodItem {
    /// Vrai quand les épisodes sont inclus plutôt que rangés en saisons
    pub fn has_embedded_episodes(&self) -> bool {
        self.series.as_ref().is_some_and(|eps| !eps.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesItem {
    #[serde(deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub o_name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string")]
    pub cmd: String,
    #[serde(default, deserialize_with = "de_string")]
    pub screenshot_uri: String,
    #[serde(default, deserialize_with = "de_string")]
    pub cover: String,
    #[serde(default, deserialize_with = "de_string")]
    pub description: String,
    #[serde(default, deserialize_with = "de_string")]
    pub actors: String,
    #[serde(default, deserialize_with = "de_string")]
    pub director: String,
    #[serde(default, deserialize_with = "de_string")]
    pub year: String,
    #[serde(default, deserialize_with = "de_string")]
    pub genres_str: String,
    #[serde(default, deserialize_with = "de_string")]
    pub rating_imdb: String,
    #[serde(default, deserialize_with = "de_string")]
    pub rating_kinopoisk: String,
    #[serde(default, deserialize_with = "de_string")]
    pub category_id: String,
    #[serde(default, deserialize_with = "de_flag", serialize_with = "ser_flag")]
    pub is_series: bool,
    #[serde(default, deserialize_with = "de_flag", serialize_with = "ser_flag")]
    pub has_files: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Season {
    #[serde(deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub cmd: String,
    #[serde(default, deserialize_with = "de_string")]
    pub description: String,
    #[serde(default, deserialize_with = "de_string")]
    pub director: String,
    #[serde(default, deserialize_with = "de_string")]
    pub actors: String,
    #[serde(default, deserialize_with = "de_string")]
    pub year: String,
    #[serde(default, deserialize_with = "de_string")]
    pub genres_str: String,
    #[serde(default, deserialize_with = "de_string")]
    pub age: String,
    #[serde(default, deserialize_with = "de_string")]
    pub rating_imdb: String,
    #[serde(default, deserialize_with = "de_string")]
    pub rating_kinopoisk: String,
    #[serde(default, deserialize_with = "de_string")]
    pub screenshot_uri: String,
    #[serde(default, deserialize_with = "de_string")]
    pub added: String,
    /// Ids des épisodes de la saison
    #[serde(default)]
    pub series: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpgProgram {
    #[serde(deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub start: String,
    #[serde(default, deserialize_with = "de_string")]
    pub stop: String,
    #[serde(default, deserialize_with = "de_i64")]
    pub start_timestamp: i64,
    #[serde(default, deserialize_with = "de_i64")]
    pub stop_timestamp: i64,
    #[serde(default, deserialize_with = "de_string")]
    pub descr: String,
    #[serde(default, deserialize_with = "de_string")]
    pub category: String,
}

/// Entrée quelconque du catalogue, telle que renvoyée par une liste de favoris mixte
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentItem {
    Channel(Channel),
    Vod(VodItem),
    Series(SeriesItem),
}

impl ContentItem {
    pub fn id(&self) -> &str {
        match self {
            ContentItem::Channel(c) => &c.id,
            ContentItem::Vod(v) => &v.id,
            ContentItem::Series(s) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ContentItem::Channel(c) => &c.name,
            ContentItem::Vod(v) => &v.name,
            ContentItem::Series(s) => &s.name,
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Channel(_) => ContentKind::Itv,
            ContentItem::Vod(_) => ContentKind::Vod,
            ContentItem::Series(_) => ContentKind::Series,
        }
    }
}

impl<'de> Deserialize<'de> for ContentItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let has = |key: &str| value.get(key).is_some();

        let item = if has("xmltv_id") || has("logo") || has("tv_genre_id") {
            ContentItem::Channel(Channel::deserialize(value).map_err(D::Error::custom)?)
        } else if has("genre") || has("series") || value.get("has_files").is_some_and(flag_set) {
            ContentItem::Vod(VodItem::deserialize(value).map_err(D::Error::custom)?)
        } else {
            ContentItem::Series(SeriesItem::deserialize(value).map_err(D::Error::custom)?)
        };
        Ok(item)
    }
}

fn flag_set(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => s == "1",
        _ => false,
    }
}

/// Charge utile paginée de `get_ordered_list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct OrderedList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default, deserialize_with = "de_usize")]
    pub total_items: usize,
    #[serde(default, deserialize_with = "de_usize")]
    pub max_page_items: usize,
    #[serde(default, deserialize_with = "de_usize")]
    pub cur_page: usize,
    #[serde(default, deserialize_with = "de_usize")]
    pub total_pages: usize,
    #[serde(default, deserialize_with = "de_usize")]
    pub selected_item: usize,
}

impl<T> OrderedList<T> {
    /// Découpe la page `page` (à partir de 1) dans `items`
    ///
    /// Les pages hors de `1..=total_pages` donnent un `data` vide avec les
    /// mêmes totaux.
    pub fn paginate(items: Vec<T>, page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total_items = items.len();
        let total_pages = total_items.div_ceil(page_size);
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let data = if page == 0 {
            Vec::new()
        } else {
            items.into_iter().skip(offset).take(page_size).collect()
        };

        Self {
            data,
            total_items,
            max_page_items: page_size,
            cur_page: page,
            total_pages,
            selected_item: 0,
        }
    }
}

/// Charge utile de `create_link`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkData {
    #[serde(default, deserialize_with = "de_string")]
    pub cmd: String,
    #[serde(default, deserialize_with = "de_string")]
    pub streamer_id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub load: String,
    #[serde(default, deserialize_with = "de_string")]
    pub error: String,
}

impl LinkData {
    /// URL jouable, sans le préfixe `ffmpeg ` / `auto ` ajouté par certains portails
    pub fn stream_url(&self) -> &str {
        let cmd = self.cmd.trim();
        cmd.rsplit_once(' ').map(|(_, url)| url).unwrap_or(cmd)
    }
}

/// Charge utile de `favorites` (lecture)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FavoritesData {
    #[serde(default)]
    pub data: Vec<ContentItem>,
    #[serde(default, deserialize_with = "de_usize")]
    pub total_items: usize,
}

// ============ Union étiquetée ============

/// Charge utile de réponse, une variante par action
#[derive(Debug, Clone, PartialEq)]
pub enum PortalResponse {
    Handshake(HandshakeData),
    Profile(ProfileData),
    DoAuth(bool),
    Categories(Vec<Category>),
    Channels(OrderedList<Channel>),
    Vod(OrderedList<VodItem>),
    Series(OrderedList<SeriesItem>),
    Seasons(Vec<Season>),
    Link(LinkData),
    Epg(Vec<EpgProgram>),
    Favorites(FavoritesData),
    /// Accusé `{ js: { error: "" } }` d'une modification des favoris
    Ack,
    /// `{ js: { error: "..." } }` avec un message non vide
    Error(String),
}

impl PortalResponse {
    /// Lit un corps de réponse brut comme charge utile de `action`
    pub fn parse(action: &PortalAction, value: Value) -> Result<Self> {
        let name = action.name().to_string();
        let Value::Object(mut body) = value else {
            return Err(StalkerError::unexpected(name, "response is not an object"));
        };
        let js = body
            .remove("js")
            .ok_or_else(|| StalkerError::unexpected(&name, "missing `js` field"))?;

        if let Some(error) = js.get("error").and_then(Value::as_str) {
            if !error.is_empty() {
                return Ok(PortalResponse::Error(error.to_string()));
            }
        }

        let wrong = |e: serde_json::Error| StalkerError::unexpected(&name, e.to_string());
        let parsed = match action {
            PortalAction::Handshake => {
                PortalResponse::Handshake(serde_json::from_value(js).map_err(wrong)?)
            }
            PortalAction::GetProfile => {
                PortalResponse::Profile(serde_json::from_value(js).map_err(wrong)?)
            }
            PortalAction::DoAuth => PortalResponse::DoAuth(js.as_bool().unwrap_or(false)),
            PortalAction::GetCategories(_) | PortalAction::GetGenres => {
                PortalResponse::Categories(serde_json::from_value(js).map_err(wrong)?)
            }
            PortalAction::GetOrderedList(ContentKind::Itv) => {
                PortalResponse::Channels(serde_json::from_value(js).map_err(wrong)?)
            }
            PortalAction::GetOrderedList(ContentKind::Vod) => {
                PortalResponse::Vod(serde_json::from_value(js).map_err(wrong)?)
            }
            PortalAction::GetOrderedList(ContentKind::Series) => {
                PortalResponse::Series(serde_json::from_value(js).map_err(wrong)?)
            }
            PortalAction::GetSeasons => {
                // Certains portails enveloppent les saisons dans une liste paginée
                let seasons = match js {
                    Value::Object(mut obj) if obj.contains_key("data") => {
                        obj.remove("data").unwrap_or(Value::Array(Vec::new()))
                    }
                    other => other,
                };
                PortalResponse::Seasons(serde_json::from_value(seasons).map_err(wrong)?)
            }
            PortalAction::CreateLink(_) => {
                PortalResponse::Link(serde_json::from_value(js).map_err(wrong)?)
            }
            PortalAction::GetShortEpg => {
                let programs = match js {
                    Value::Object(mut obj) => obj.remove("data").unwrap_or(Value::Array(Vec::new())),
                    other => other,
                };
                PortalResponse::Epg(serde_json::from_value(programs).map_err(wrong)?)
            }
            PortalAction::Favorites(FavoriteOp::Get) => {
                PortalResponse::Favorites(serde_json::from_value(js).map_err(wrong)?)
            }
            PortalAction::Favorites(_) => PortalResponse::Ack,
            PortalAction::Unknown(_) => {
                return Err(StalkerError::unexpected(&name, "unknown action"));
            }
        };
        Ok(parsed)
    }

    /// Rend la charge utile enveloppée dans `{ "js": ... }`
    pub fn to_json(&self) -> Value {
        let js = match self {
            PortalResponse::Handshake(d) => json!(d),
            PortalResponse::Profile(d) => json!(d),
            PortalResponse::DoAuth(ok) => json!(ok),
            PortalResponse::Categories(d) => json!(d),
            PortalResponse::Channels(d) => json!(d),
            PortalResponse::Vod(d) => json!(d),
            PortalResponse::Series(d) => json!(d),
            PortalResponse::Seasons(d) => json!(d),
            PortalResponse::Link(d) => json!(d),
            PortalResponse::Epg(d) => json!({ "data": d }),
            PortalResponse::Favorites(d) => json!(d),
            PortalResponse::Ack => json!({ "error": "" }),
            PortalResponse::Error(msg) => json!({ "error": msg }),
        };
        json!({ "js": js })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_action_resolution() {
        assert_eq!(
            PortalAction::from_params(&params(&[("action", "get_ordered_list"), ("type", "itv")])),
            PortalAction::GetOrderedList(ContentKind::Itv)
        );
        assert_eq!(
            PortalAction::from_params(&params(&[
                ("action", "get_ordered_list"),
                ("type", "series"),
                ("movie_id", "30001")
            ])),
            PortalAction::GetSeasons
        );
        assert_eq!(
            PortalAction::from_params(&params(&[("action", "get_genres_itv")])),
            PortalAction::GetCategories(ContentKind::Itv)
        );
        assert_eq!(
            PortalAction::from_params(&params(&[("action", "favorites"), ("fav_action", "unset")])),
            PortalAction::Favorites(FavoriteOp::Remove)
        );
        assert_eq!(
            PortalAction::from_params(&params(&[("action", "set_favorites")])),
            PortalAction::Favorites(FavoriteOp::Add)
        );
        assert_eq!(
            PortalAction::from_params(&params(&[("action", "bogus")])),
            PortalAction::Unknown("bogus".into())
        );
    }

    #[test]
    fn test_parse_handshake() {
        let value = json!({ "js": { "token": "ABC123", "random": "f00d" } });
        match PortalResponse::parse(&PortalAction::Handshake, value).unwrap() {
            PortalResponse::Handshake(d) => {
                assert_eq!(d.token, "ABC123");
                assert_eq!(d.random.as_deref(), Some("f00d"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_flexible_vod_item() {
        let value = json!({ "js": {
            "data": [
                { "id": 20001, "name": "A", "is_series": "1", "has_files": 0 },
                { "id": "20002", "name": "B", "is_series": 0, "has_files": 1,
                  "series": [{ "id": 2000200, "name": "Episode 1", "cmd": "x" }] }
            ],
            "total_items": "2", "max_page_items": 14, "cur_page": 1, "total_pages": 1
        }});
        let PortalResponse::Vod(list) =
            PortalResponse::parse(&PortalAction::GetOrderedList(ContentKind::Vod), value).unwrap()
        else {
            panic!("expected VOD list");
        };
        assert_eq!(list.total_items, 2);
        assert_eq!(list.data[0].id, "20001");
        assert!(list.data[0].is_series);
        assert!(!list.data[0].has_embedded_episodes());
        assert!(list.data[1].has_embedded_episodes());
    }

    #[test]
    fn test_parse_error_payload() {
        let value = json!({ "js": { "error": "Authorization failed. 75" } });
        assert_eq!(
            PortalResponse::parse(&PortalAction::GetCategories(ContentKind::Vod), value).unwrap(),
            PortalResponse::Error("Authorization failed. 75".into())
        );
    }

    #[test]
    fn test_parse_missing_js() {
        let err = PortalResponse::parse(&PortalAction::Handshake, json!({ "token": "x" }));
        assert!(matches!(err, Err(StalkerError::UnexpectedResponse { .. })));
    }

    #[test]
    fn test_content_item_discrimination() {
        let items: Vec<ContentItem> = serde_json::from_value(json!([
            { "id": "10000", "name": "Acme TV", "logo": "l", "xmltv_id": "x" },
            { "id": "20000", "name": "Movie", "genre": "Jazz", "has_files": 1 },
            { "id": "30000", "name": "Show", "has_files": 0 }
        ]))
        .unwrap();
        assert_eq!(items[0].kind(), ContentKind::Itv);
        assert_eq!(items[1].kind(), ContentKind::Vod);
        assert_eq!(items[2].kind(), ContentKind::Series);
        assert_eq!(items[2].name(), "Show");
    }

    #[test]
    fn test_paginate_boundaries() {
        let items: Vec<u32> = (0..40).collect();
        let first = OrderedList::paginate(items.clone(), 1, 14);
        assert_eq!(first.data.len(), 14);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_items, 40);

        let last = OrderedList::paginate(items.clone(), 3, 14);
        assert_eq!(last.data, (28..40).collect::<Vec<_>>());

        let beyond = OrderedList::paginate(items, 4, 14);
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total_items, 40);
        assert_eq!(beyond.total_pages, 3);

        let empty = OrderedList::<u32>::paginate(Vec::new(), 1, 14);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.data.is_empty());
    }

    #[test]
    fn test_link_stream_url() {
        let link = LinkData {
            cmd: "ffmpeg http://host/stream.m3u8".into(),
            ..Default::default()
        };
        assert_eq!(link.stream_url(), "http://host/stream.m3u8");
    }
}
