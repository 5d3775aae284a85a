//! État du simulateur par identité
//!
//! Les catalogues sont générés paresseusement, une fois par adresse MAC, et partagés
//! en instantanés `Arc`. Les saisons construites à la demande, les guides des chaînes
//! hors catalogue, les favoris, les tokens émis et les comptes liés vivent à côté
//! jusqu'à [`DataStore::reset_all`].

use crate::generator::{GeneratedCatalog, SeasonParent, detail_rng, generate_epg, generate_seasons};
use crate::scenarios::{ScenarioConfig, ScenarioRegistry, normalize_mac};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use pmostalker::{ContentItem, EpgProgram, Season};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Source de l'ancre EPG
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Token remis par `handshake`
#[derive(Debug, Clone, PartialEq, Eq)]
struct IssuedToken {
    mac: String,
    /// Positionné quand `get_profile` a confirmé le token
    active: bool,
}

/// Résultat de la vérification d'un bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    Valid,
    Unknown,
    /// Émis mais `get_profile` pas encore appelé
    Pending,
}

#[derive(Default)]
struct State {
    catalogs: HashMap<String, Arc<GeneratedCatalog>>,
    details: HashMap<(String, String), Arc<Vec<Season>>>,
    epg: HashMap<(String, String), Arc<Vec<EpgProgram>>>,
    favorites: HashMap<String, IndexSet<String>>,
    tokens: HashMap<String, IssuedToken>,
    accounts: HashMap<String, (String, ScenarioConfig)>,
}

pub struct DataStore {
    registry: ScenarioRegistry,
    clock: Clock,
    state: Mutex<State>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(ScenarioRegistry::builtin())
    }
}

impl DataStore {
    pub fn new(registry: ScenarioRegistry) -> Self {
        Self::with_clock(registry, Arc::new(Utc::now))
    }

    /// Store dont l'EPG est ancré sur `clock` plutôt que sur l'horloge murale
    pub fn with_clock(registry: ScenarioRegistry, clock: Clock) -> Self {
        Self {
            registry,
            clock,
            state: Mutex::new(State::default()),
        }
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // L'état reste cohérent entre deux instructions, un verrou empoisonné reste utilisable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Catalogue de `mac`, généré au premier usage
    pub fn catalog(&self, mac: &str) -> Arc<GeneratedCatalog> {
        let mac = normalize_mac(mac);
        let mut state = self.state();
        if let Some(catalog) = state.catalogs.get(&mac) {
            return catalog.clone();
        }

        let scenario = self.registry.for_mac(&mac);
        let catalog = Arc::new(GeneratedCatalog::generate(&scenario, self.now()));
        info!(
            "Generated '{}' catalog for {} (seed {}): {} channels, {} VOD, {} series",
            scenario.name,
            mac,
            scenario.seed,
            catalog.channels.values().map(Vec::len).sum::<usize>(),
            catalog.vod.values().map(Vec::len).sum::<usize>(),
            catalog.series.values().map(Vec::len).sum::<usize>(),
        );
        state.catalogs.insert(mac, catalog.clone());
        catalog
    }

    /// Saisons de `movie_id` : précalculées pour les séries, construites une fois pour la VOD
    ///
    /// Les ids inconnus donnent une liste vide.
    pub fn seasons(&self, mac: &str, movie_id: &str) -> Arc<Vec<Season>> {
        let catalog = self.catalog(mac);
        if let Some(seasons) = catalog.seasons.get(movie_id) {
            return Arc::new(seasons.clone());
        }
        let Some(item) = catalog.find_vod(movie_id) else {
            return Arc::new(Vec::new());
        };

        let key = (normalize_mac(mac), movie_id.to_string());
        let mut state = self.state();
        if let Some(seasons) = state.details.get(&key) {
            return seasons.clone();
        }

        let scenario = &catalog.scenario;
        let seasons = Arc::new(generate_seasons(
            &mut detail_rng(scenario.seed, movie_id),
            &SeasonParent::from(item),
            scenario.seasons_per_series,
            scenario.episodes_per_season,
        ));
        debug!("Built {} seasons for VOD item {}", seasons.len(), movie_id);
        state.details.insert(key, seasons.clone());
        seasons
    }

    /// Guide de `channel_id` ; les chaînes hors catalogue reçoivent un nom générique
    pub fn epg(&self, mac: &str, channel_id: &str) -> Arc<Vec<EpgProgram>> {
        let catalog = self.catalog(mac);
        if let Some(programs) = catalog.epg.get(channel_id) {
            return Arc::new(programs.clone());
        }

        let key = (normalize_mac(mac), channel_id.to_string());
        let mut state = self.state();
        state
            .epg
            .entry(key)
            .or_insert_with(|| {
                Arc::new(generate_epg(
                    &mut detail_rng(catalog.scenario.seed, channel_id),
                    &format!("Channel {channel_id}"),
                    self.now(),
                ))
            })
            .clone()
    }

    // ============ Favoris ============

    /// Ajoute `id` ; un id déjà présent garde une seule entrée, à sa place
    pub fn add_favorite(&self, mac: &str, id: &str) {
        self.state()
            .favorites
            .entry(normalize_mac(mac))
            .or_default()
            .insert(id.to_string());
    }

    /// Retire `id` ; les ids absents sont ignorés
    pub fn remove_favorite(&self, mac: &str, id: &str) {
        if let Some(favorites) = self.state().favorites.get_mut(&normalize_mac(mac)) {
            favorites.shift_remove(id);
        }
    }

    /// Favoris dans l'ordre d'ajout, ids absents du catalogue ignorés
    pub fn favorites(&self, mac: &str) -> Vec<ContentItem> {
        let ids: Vec<String> = self
            .state()
            .favorites
            .get(&normalize_mac(mac))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        let catalog = self.catalog(mac);
        ids.iter().filter_map(|id| catalog.find_item(id)).collect()
    }

    // ============ Tokens et comptes ============

    pub fn issue_token(&self, mac: &str) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        self.state().tokens.insert(
            token.clone(),
            IssuedToken {
                mac: normalize_mac(mac),
                active: false,
            },
        );
        token
    }

    /// Confirme un token de handshake de `mac` ; false s'il ne lui a jamais été émis
    pub fn activate_token(&self, mac: &str, token: &str) -> bool {
        match self.state().tokens.get_mut(token) {
            Some(issued) if issued.mac == normalize_mac(mac) => {
                issued.active = true;
                true
            }
            _ => false,
        }
    }

    pub fn check_token(&self, mac: &str, token: &str) -> TokenCheck {
        match self.state().tokens.get(token) {
            Some(issued) if issued.mac != normalize_mac(mac) => TokenCheck::Unknown,
            Some(issued) if issued.active => TokenCheck::Valid,
            Some(_) => TokenCheck::Pending,
            None => TokenCheck::Unknown,
        }
    }

    /// Mémorise un `do_auth` réussi pour que le profil rapporte ce compte
    pub fn bind_account(&self, mac: &str, login: &str, scenario: ScenarioConfig) {
        self.state()
            .accounts
            .insert(normalize_mac(mac), (login.to_string(), scenario));
    }

    pub fn bound_account(&self, mac: &str) -> Option<(String, ScenarioConfig)> {
        self.state().accounts.get(&normalize_mac(mac)).cloned()
    }

    /// Oublie catalogues, caches, favoris, tokens et comptes liés
    pub fn reset_all(&self) {
        *self.state() = State::default();
        info!("Simulator state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const MAC: &str = "00:1A:79:00:00:01";

    fn store() -> DataStore {
        let anchor = Utc.with_ymd_and_hms(2026, 3, 14, 20, 0, 0).unwrap();
        DataStore::with_clock(ScenarioRegistry::builtin(), Arc::new(move || anchor))
    }

    #[test]
    fn test_catalog_is_generated_once() {
        let store = store();
        let a = store.catalog(MAC);
        let b = store.catalog(&MAC.to_lowercase());
        assert!(Arc::ptr_eq(&a, &b));

        store.reset_all();
        let c = store.catalog(MAC);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(*a, *c);
    }

    #[test]
    fn test_favorites_are_idempotent() {
        let store = store();
        store.add_favorite(MAC, "20001");
        store.add_favorite(MAC, "10000");
        store.add_favorite(MAC, "20001");
        store.remove_favorite(MAC, "99999");

        let ids: Vec<String> = store
            .favorites(MAC)
            .iter()
            .map(|item| item.id().to_string())
            .collect();
        assert_eq!(ids, vec!["20001", "10000"]);

        store.remove_favorite(MAC, "20001");
        assert_eq!(store.favorites(MAC).len(), 1);
        assert!(store.favorites("00:1a:79:00:00:02").is_empty());
    }

    #[test]
    fn test_vod_seasons_are_cached() {
        let store = store();
        let a = store.seasons(MAC, "20003");
        let b = store.seasons(MAC, "20003");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 3);
        assert!(store.seasons(MAC, "nope").is_empty());
        assert_eq!(store.seasons(MAC, "30000").len(), 3);
    }

    #[test]
    fn test_unknown_channel_epg() {
        let store = store();
        let programs = store.epg(MAC, "777");
        assert!(programs[0].name.starts_with("Channel 777: "));
        assert!(Arc::ptr_eq(&programs, &store.epg(MAC, "777")));
    }

    #[test]
    fn test_token_lifecycle() {
        let store = store();
        let token = store.issue_token(MAC);
        assert_eq!(token.len(), 32);
        assert_eq!(store.check_token(MAC, &token), TokenCheck::Pending);
        assert!(!store.activate_token("00:1a:79:00:00:02", &token));
        assert!(store.activate_token(MAC, &token));
        assert_eq!(store.check_token(MAC, &token), TokenCheck::Valid);
        assert_eq!(store.check_token("00:1a:79:00:00:02", &token), TokenCheck::Unknown);

        store.reset_all();
        assert_eq!(store.check_token(MAC, &token), TokenCheck::Unknown);
    }
}
