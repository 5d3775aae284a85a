//! Registre des scénarios
//!
//! Un scénario fixe la forme d'un portail généré : graine, nombre de catégories,
//! items par catégorie, profondeur des saisons et part des items VOD selon
//! chaque présentation des séries. Les scénarios sont cherchés par adresse MAC ou par
//! `username:password` ; un identifiant inconnu reçoit un scénario dérivé de ses
//! octets, donc il voit toujours les mêmes données.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// État de l'abonnement rapporté dans `account_info` du profil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccountStatus {
    Active,
    Disabled,
}

impl AccountStatus {
    /// Code numérique utilisé sur le fil
    pub fn code(&self) -> i64 {
        match self {
            AccountStatus::Active => 1,
            AccountStatus::Disabled => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSettings {
    pub status: AccountStatus,
    pub expiry: NaiveDate,
    pub tariff_plan: String,
}

impl AccountSettings {
    fn active_until(expiry: NaiveDate) -> Self {
        Self {
            status: AccountStatus::Active,
            expiry,
            tariff_plan: "Full".to_string(),
        }
    }

    /// Actif et pas expiré à `now`
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == AccountStatus::Active && self.expiry >= now.date_naive()
    }

    /// Expiration en timestamp Unix (fin de journée, UTC)
    pub fn expiry_timestamp(&self) -> i64 {
        self.expiry
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub itv: usize,
    pub vod: usize,
    pub series: usize,
}

impl CategoryCounts {
    pub const fn uniform(n: usize) -> Self {
        Self {
            itv: n,
            vod: n,
            series: n,
        }
    }
}

/// Description immuable d'un portail généré
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub description: String,
    pub seed: u64,
    pub categories: CategoryCounts,
    pub items_per_category: usize,
    pub seasons_per_series: usize,
    pub episodes_per_season: usize,
    /// Part des items VOD marqués `is_series` (saisons récupérées par `movie_id`)
    pub is_series_fraction: f64,
    /// Part des items VOD portant une liste d'épisodes incluse
    pub embedded_series_fraction: f64,
    /// Message renvoyé par `get_profile` à la place du compte
    pub block_msg: Option<String>,
    pub account: AccountSettings,
}

impl ScenarioConfig {
    fn new(name: &str, description: &str, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            seed,
            categories: CategoryCounts::uniform(6),
            items_per_category: 30,
            seasons_per_series: 3,
            episodes_per_season: 8,
            is_series_fraction: 0.0,
            embedded_series_fraction: 0.0,
            block_msg: None,
            account: AccountSettings::active_until(far_future()),
        }
    }

    fn categories(mut self, itv: usize, vod: usize, series: usize) -> Self {
        self.categories = CategoryCounts { itv, vod, series };
        self
    }

    fn items(mut self, items_per_category: usize) -> Self {
        self.items_per_category = items_per_category;
        self
    }

    fn seasons(mut self, seasons: usize, episodes: usize) -> Self {
        self.seasons_per_series = seasons;
        self.episodes_per_season = episodes;
        self
    }

    fn is_series(mut self, fraction: f64) -> Self {
        self.is_series_fraction = fraction;
        self
    }

    fn embedded(mut self, fraction: f64) -> Self {
        self.embedded_series_fraction = fraction;
        self
    }

    fn blocked(mut self, message: &str) -> Self {
        self.block_msg = Some(message.to_string());
        self
    }

    fn account(mut self, status: AccountStatus, expiry: NaiveDate) -> Self {
        self.account.status = status;
        self.account.expiry = expiry;
        self
    }
}

fn far_future() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn long_ago() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Identifiant servant à chercher un scénario
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Credential {
    Mac(String),
    Account { username: String, password: String },
}

impl Credential {
    pub fn mac(mac: &str) -> Self {
        Credential::Mac(normalize_mac(mac))
    }

    pub fn account(username: &str, password: &str) -> Self {
        Credential::Account {
            username: username.trim().to_lowercase(),
            password: password.to_string(),
        }
    }

    fn key(&self) -> String {
        match self {
            Credential::Mac(mac) => mac.clone(),
            Credential::Account { username, password } => format!("{username}:{password}"),
        }
    }
}

pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_lowercase()
}

/// Somme des octets de l'adresse, `AA:BB:..` lus comme paires hexadécimales
///
/// Les segments non hexadécimaux comptent pour zéro.
pub fn mac_to_seed(mac: &str) -> u64 {
    normalize_mac(mac)
        .split([':', '-'])
        .map(|byte| u64::from_str_radix(byte, 16).unwrap_or(0))
        .sum()
}

/// Hash glissant base 31 de `username:password`, ramené à 32 bits
pub fn account_to_seed(username: &str, password: &str) -> u64 {
    let seed = format!("{username}:{password}")
        .encode_utf16()
        .fold(0u32, |acc, unit| acc.wrapping_mul(31).wrapping_add(u32::from(unit)));
    u64::from(seed)
}

/// Table fixe des identifiants connus
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    by_mac: IndexMap<String, ScenarioConfig>,
    by_account: IndexMap<String, ScenarioConfig>,
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScenarioRegistry {
    pub fn builtin() -> Self {
        let mut by_mac = IndexMap::new();
        by_mac.insert(
            "00:1a:79:00:00:01".to_string(),
            ScenarioConfig::new("default", "Balanced portal, 8 categories of 40 items", 1001)
                .categories(8, 8, 8)
                .items(40)
                .seasons(3, 8),
        );
        by_mac.insert(
            "00:1a:79:ff:ff:ff".to_string(),
            ScenarioConfig::new("large", "Large catalog, 20 categories of 200 items", 9999)
                .categories(20, 20, 20)
                .items(200)
                .seasons(5, 12),
        );
        by_mac.insert(
            "00:1a:79:00:00:02".to_string(),
            ScenarioConfig::new("series-heavy", "Many series with deep seasons", 2002)
                .categories(3, 5, 15)
                .items(30)
                .seasons(6, 10),
        );
        by_mac.insert(
            "00:1a:79:00:00:03".to_string(),
            ScenarioConfig::new("minimal", "2 categories of 5 items", 3003)
                .categories(2, 2, 2)
                .items(5)
                .seasons(1, 3),
        );
        by_mac.insert(
            "00:1a:79:00:00:04".to_string(),
            ScenarioConfig::new("is-series", "VOD items flagged is_series=1", 4004)
                .categories(4, 6, 4)
                .items(20)
                .seasons(3, 6)
                .is_series(0.6),
        );
        by_mac.insert(
            "00:1a:79:00:00:05".to_string(),
            ScenarioConfig::new("embedded-series", "VOD items with embedded episode lists", 5005)
                .categories(4, 6, 4)
                .items(20)
                .seasons(2, 5)
                .embedded(0.5),
        );
        by_mac.insert(
            "00:1a:79:00:00:06".to_string(),
            ScenarioConfig::new("blocked", "Profile answers with block_msg", 6006)
                .categories(2, 2, 2)
                .items(5)
                .seasons(1, 3)
                .blocked("Your STB is blocked. Call the provider."),
        );

        let mut by_account = IndexMap::new();
        by_account.insert(
            "user1:pass1".to_string(),
            ScenarioConfig::new("default", "Active account", 1001)
                .categories(8, 8, 8)
                .items(40),
        );
        by_account.insert(
            "expired:expired".to_string(),
            ScenarioConfig::new("expired", "Subscription expired on 2020-01-01", 4004)
                .categories(4, 4, 4)
                .items(10)
                .seasons(2, 5)
                .account(AccountStatus::Active, long_ago()),
        );
        by_account.insert(
            "inactive:inactive".to_string(),
            ScenarioConfig::new("inactive", "Disabled account", 5005)
                .categories(4, 4, 4)
                .items(10)
                .seasons(2, 5)
                .account(AccountStatus::Disabled, long_ago()),
        );

        Self { by_mac, by_account }
    }

    /// Scénario de `credential`, dérivé de ses octets s'il est inconnu
    pub fn resolve(&self, credential: &Credential) -> ScenarioConfig {
        let known = match credential {
            Credential::Mac(_) => self.by_mac.get(&credential.key()),
            Credential::Account { .. } => self.by_account.get(&credential.key()),
        };
        if let Some(scenario) = known {
            return scenario.clone();
        }

        match credential {
            Credential::Mac(mac) => {
                ScenarioConfig::new("auto", &format!("Generated from MAC {mac}"), mac_to_seed(mac))
            }
            Credential::Account { username, password } => ScenarioConfig::new(
                "auto",
                &format!("Generated for {username}"),
                account_to_seed(username, password),
            ),
        }
    }

    pub fn for_mac(&self, mac: &str) -> ScenarioConfig {
        self.resolve(&Credential::mac(mac))
    }

    pub fn for_account(&self, username: &str, password: &str) -> ScenarioConfig {
        self.resolve(&Credential::account(username, password))
    }

    /// Scénarios MAC prédéfinis, dans l'ordre de déclaration
    pub fn mac_scenarios(&self) -> impl Iterator<Item = (&str, &ScenarioConfig)> {
        self.by_mac.iter().map(|(mac, s)| (mac.as_str(), s))
    }

    pub fn account_scenarios(&self) -> impl Iterator<Item = (&str, &ScenarioConfig)> {
        self.by_account.iter().map(|(key, s)| (key.as_str(), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_known_mac_is_case_insensitive() {
        let registry = ScenarioRegistry::builtin();
        let scenario = registry.for_mac("00:1A:79:00:00:01");
        assert_eq!(scenario.name, "default");
        assert_eq!(scenario.seed, 1001);
        assert_eq!(scenario.categories, CategoryCounts::uniform(8));
        assert_eq!(scenario.items_per_category, 40);
    }

    #[test]
    fn test_unknown_mac_is_derived_from_bytes() {
        let registry = ScenarioRegistry::builtin();
        let scenario = registry.for_mac("AA:BB:CC:DD:EE:FF");
        assert_eq!(scenario.name, "auto");
        assert_eq!(scenario.seed, 0xaa + 0xbb + 0xcc + 0xdd + 0xee + 0xff);
        assert_eq!(scenario, registry.for_mac("aa:bb:cc:dd:ee:ff"));
        assert_eq!(scenario.categories, CategoryCounts::uniform(6));
        assert_eq!(scenario.items_per_category, 30);
    }

    #[test]
    fn test_account_seed() {
        // "a:b" = ((97 * 31) + 58) * 31 + 98
        assert_eq!(account_to_seed("a", "b"), (97 * 31 + 58) * 31 + 98);
        assert_eq!(account_to_seed("x", "y"), account_to_seed("x", "y"));
        assert_ne!(account_to_seed("x", "y"), account_to_seed("y", "x"));
    }

    #[test]
    fn test_account_scenarios() {
        let registry = ScenarioRegistry::builtin();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

        assert!(registry.for_account("user1", "pass1").account.is_usable(now));
        assert!(registry.for_account("USER1", "pass1").account.is_usable(now));
        assert!(!registry.for_account("expired", "expired").account.is_usable(now));
        assert_eq!(
            registry.for_account("inactive", "inactive").account.status,
            AccountStatus::Disabled
        );

        let auto = registry.for_account("someone", "secret");
        assert_eq!(auto.name, "auto");
        assert_eq!(auto.seed, account_to_seed("someone", "secret"));
        assert!(auto.account.is_usable(now));
    }

    #[test]
    fn test_blocked_scenario() {
        let registry = ScenarioRegistry::builtin();
        assert!(registry.for_mac("00:1a:79:00:00:06").block_msg.is_some());
        assert_eq!(registry.mac_scenarios().count(), 7);
    }
}
