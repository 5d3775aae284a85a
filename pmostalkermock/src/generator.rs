//! Génération déterministe du catalogue
//!
//! [`GeneratedCatalog::generate`] parcourt un scénario avec un RNG ChaCha8 initialisé
//! par la graine du scénario. L'ordre des tirages est fixe : deux catalogues construits
//! à partir du même scénario et de la même ancre EPG sont identiques.

use crate::fake;
use crate::scenarios::ScenarioConfig;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use pmostalker::{
    Category, Channel, ContentItem, ContentKind, EmbeddedEpisode, EpgProgram, Season, SeriesItem,
    VodItem,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Flux HLS publics de test distribués par `create_link`
pub const TEST_HLS_STREAMS: [&str; 4] = [
    "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8",
    "https://devstreaming-cdn.apple.com/videos/streaming/examples/bipbop_4x3/bipbop_4x3_variant.m3u8",
    "https://playertest.longtailvideo.com/adaptive/oceans/oceans.m3u8",
    "https://playertest.longtailvideo.com/adaptive/bbbfull/bbbfull.m3u8",
];

pub const EPG_PROGRAMS_PER_CHANNEL: usize = 12;
const EPG_SLOT_MINUTES: i64 = 30;
/// Créneaux avant l'ancre, pour que le guide montre ce qui passe maintenant
const EPG_SLOTS_BEFORE: i64 = 6;

const ITV_CATEGORY_BASE: usize = 1000;
const VOD_CATEGORY_BASE: usize = 2000;
const SERIES_CATEGORY_BASE: usize = 3000;
const CHANNEL_ID_BASE: usize = 10000;
const VOD_ID_BASE: usize = 20000;
const SERIES_ID_BASE: usize = 30000;

/// Années et dates `added` sont tirées en arrière d'un point fixe, pas d'aujourd'hui
const REFERENCE_YEAR: i32 = 2025;
const REFERENCE_TIMESTAMP: i64 = 1_735_689_600;

const ITV_GENRE_NAMES: &[&str] = &[
    "News", "Sports", "Movies", "Entertainment", "Kids", "Documentary", "Music", "Comedy",
    "Drama", "Reality TV", "Lifestyle", "Travel", "Food", "Tech", "Science", "History", "Nature",
    "Animation", "Gaming", "Shopping",
];

const VOD_GENRE_NAMES: &[&str] = &[
    "Action", "Comedy", "Drama", "Horror", "Thriller", "Romance", "Sci-Fi", "Fantasy",
    "Animation", "Documentary", "Biography", "Crime", "Mystery", "Adventure", "Family", "War",
    "Western", "Musical", "Sport", "History",
];

const SERIES_GENRE_NAMES: &[&str] = &[
    "Drama Series", "Comedy Series", "Crime Series", "Sci-Fi Series", "Reality Shows", "Anime",
    "Soap Opera", "Mini Series", "Documentary Series", "Kids Shows", "Action Series",
    "Fantasy Series", "Medical", "Legal", "Political", "Romance Series", "Historical",
    "Thriller Series", "Horror Series", "Western Series",
];

const EPG_PROGRAM_TYPES: &[&str] = &[
    "News", "Movie", "Documentary", "Entertainment", "Sports", "Kids", "Series",
];

/// RNG des données générées après le catalogue (saisons à la demande, EPG de chaînes inconnues)
///
/// Initialisé par la graine du scénario et la clé de l'item : le résultat ne
/// dépend pas de l'ordre des requêtes.
pub fn detail_rng(seed: u64, key: &str) -> ChaCha8Rng {
    let mixed = key
        .bytes()
        .fold(seed, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    ChaCha8Rng::seed_from_u64(mixed)
}

/// Choisit un flux de test pour `cmd`
///
/// Les commandes internes `ffrt4://` sont réparties sur la table des flux selon la
/// somme de leurs caractères ; tout le reste reçoit le premier flux.
pub fn resolve_stream_url(cmd: &str) -> &'static str {
    if !cmd.starts_with("ffrt4://") {
        return TEST_HLS_STREAMS[0];
    }
    let index: usize = cmd.chars().map(|c| c as usize).sum();
    TEST_HLS_STREAMS[index % TEST_HLS_STREAMS.len()]
}

fn rating<R: Rng>(rng: &mut R) -> String {
    format!("{:.1}", rng.random_range(5.0_f64..9.0))
}

fn iso(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn categories(base: usize, names: &[&str], count: usize) -> Vec<Category> {
    (0..count)
        .map(|i| {
            let title = names[i % names.len()];
            Category {
                id: (base + i + 1).to_string(),
                title: title.to_string(),
                alias: title
                    .to_lowercase()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("_"),
            }
        })
        .collect()
}

/// Champs qu'une saison reprend de l'item auquel elle appartient
#[derive(Debug, Clone)]
pub struct SeasonParent {
    pub id: String,
    pub director: String,
    pub actors: String,
    pub year: String,
    pub genres_str: String,
    pub rating_imdb: String,
    pub rating_kinopoisk: String,
}

impl From<&SeriesItem> for SeasonParent {
    fn from(item: &SeriesItem) -> Self {
        Self {
            id: item.id.clone(),
            director: item.director.clone(),
            actors: item.actors.clone(),
            year: item.year.clone(),
            genres_str: item.genres_str.clone(),
            rating_imdb: item.rating_imdb.clone(),
            rating_kinopoisk: item.rating_kinopoisk.clone(),
        }
    }
}

impl From<&VodItem> for SeasonParent {
    fn from(item: &VodItem) -> Self {
        let genres_str = if item.genres_str.is_empty() {
            item.genre.clone()
        } else {
            item.genres_str.clone()
        };
        Self {
            id: item.id.clone(),
            director: item.director.clone(),
            actors: item.actors.clone(),
            year: item.year.clone(),
            genres_str,
            rating_imdb: item.rating_imdb.clone(),
            rating_kinopoisk: item.rating_kinopoisk.clone(),
        }
    }
}

/// Arbre de saisons de `parent` : `seasons` saisons de `episodes` ids d'épisodes chacune
pub fn generate_seasons<R: Rng>(
    rng: &mut R,
    parent: &SeasonParent,
    seasons: usize,
    episodes: usize,
) -> Vec<Season> {
    (1..=seasons)
        .map(|n| {
            let id = format!("{}-s{}", parent.id, n);
            let added = REFERENCE_TIMESTAMP - rng.random_range(0..365 * 24 * 3600);
            Season {
                name: format!("Season {n}"),
                cmd: format!("ffrt4://series/{}/season/{}", parent.id, n),
                description: fake::sentence(rng),
                director: parent.director.clone(),
                actors: parent.actors.clone(),
                year: parent.year.clone(),
                genres_str: parent.genres_str.clone(),
                age: "16".to_string(),
                rating_imdb: parent.rating_imdb.clone(),
                rating_kinopoisk: parent.rating_kinopoisk.clone(),
                screenshot_uri: format!("https://picsum.photos/seed/{id}/300/200"),
                added: iso(added),
                series: (1..=episodes).map(|m| format!("{id}-e{m}")).collect(),
                id,
            }
        })
        .collect()
}

/// Douze programmes de 30 minutes autour de `anchor`
///
/// Le premier créneau commence trois heures avant la demi-heure contenant
/// l'ancre.
pub fn generate_epg<R: Rng>(
    rng: &mut R,
    channel_name: &str,
    anchor: DateTime<Utc>,
) -> Vec<EpgProgram> {
    let slot = EPG_SLOT_MINUTES * 60;
    let first = anchor.timestamp() - anchor.timestamp().rem_euclid(slot) - EPG_SLOTS_BEFORE * slot;

    (0..EPG_PROGRAMS_PER_CHANNEL)
        .map(|i| {
            let start = first + i as i64 * slot;
            let stop = start + slot;
            EpgProgram {
                id: (i + 1).to_string(),
                name: format!("{}: {}", channel_name, fake::catch_phrase(rng)),
                start: iso(start),
                stop: iso(stop),
                start_timestamp: start,
                stop_timestamp: stop,
                descr: fake::sentence(rng),
                category: EPG_PROGRAM_TYPES[i % EPG_PROGRAM_TYPES.len()].to_string(),
            }
        })
        .collect()
}

/// Tout ce que sert un scénario
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCatalog {
    pub scenario: ScenarioConfig,
    pub itv_categories: Vec<Category>,
    pub vod_categories: Vec<Category>,
    pub series_categories: Vec<Category>,
    /// Items par id de catégorie, dans l'ordre des catégories
    pub channels: IndexMap<String, Vec<Channel>>,
    pub vod: IndexMap<String, Vec<VodItem>>,
    pub series: IndexMap<String, Vec<SeriesItem>>,
    /// Arbres de saisons des séries, par id de série
    pub seasons: HashMap<String, Vec<Season>>,
    /// Guide des programmes par id de chaîne
    pub epg: HashMap<String, Vec<EpgProgram>>,
}

impl GeneratedCatalog {
    pub fn generate(scenario: &ScenarioConfig, anchor: DateTime<Utc>) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(scenario.seed);
        let n = scenario.items_per_category;

        let itv_categories = categories(ITV_CATEGORY_BASE, ITV_GENRE_NAMES, scenario.categories.itv);
        let vod_categories = categories(VOD_CATEGORY_BASE, VOD_GENRE_NAMES, scenario.categories.vod);
        let series_categories = categories(
            SERIES_CATEGORY_BASE,
            SERIES_GENRE_NAMES,
            scenario.categories.series,
        );

        let mut channels = IndexMap::new();
        let mut epg = HashMap::new();
        let mut index = 0;
        for category in &itv_categories {
            let mut list = Vec::with_capacity(n);
            for _ in 0..n {
                let id = CHANNEL_ID_BASE + index;
                index += 1;
                let name = format!("{} TV", fake::company(&mut rng));
                epg.insert(id.to_string(), generate_epg(&mut rng, &name, anchor));
                list.push(Channel {
                    id: id.to_string(),
                    o_name: name.clone(),
                    name,
                    cmd: format!("ffrt4://ch/live/{id}/index.m3u8"),
                    logo: format!("https://picsum.photos/seed/logo-ch-{id}/100/100"),
                    category_id: category.id.clone(),
                    tv_genre_id: category.id.clone(),
                    xmltv_id: format!("channel-{id}.example"),
                });
            }
            channels.insert(category.id.clone(), list);
        }

        let mut vod = IndexMap::new();
        let mut index = 0;
        for category in &vod_categories {
            let mut list = Vec::with_capacity(n);
            for j in 0..n {
                let id = VOD_ID_BASE + index;
                index += 1;
                let share = j as f64 / n as f64;
                let is_series = share < scenario.is_series_fraction;
                let embedded = !is_series
                    && share < scenario.is_series_fraction + scenario.embedded_series_fraction;
                list.push(vod_item(&mut rng, scenario, id, &category.id, is_series, embedded));
            }
            vod.insert(category.id.clone(), list);
        }

        let mut series = IndexMap::new();
        let mut seasons = HashMap::new();
        let mut index = 0;
        for category in &series_categories {
            let mut list = Vec::with_capacity(n);
            for _ in 0..n {
                let id = SERIES_ID_BASE + index;
                index += 1;
                let item = series_item(&mut rng, id, &category.id);
                seasons.insert(
                    item.id.clone(),
                    generate_seasons(
                        &mut rng,
                        &SeasonParent::from(&item),
                        scenario.seasons_per_series,
                        scenario.episodes_per_season,
                    ),
                );
                list.push(item);
            }
            series.insert(category.id.clone(), list);
        }

        Self {
            scenario: scenario.clone(),
            itv_categories,
            vod_categories,
            series_categories,
            channels,
            vod,
            series,
            seasons,
            epg,
        }
    }

    pub fn categories(&self, kind: ContentKind) -> &[Category] {
        match kind {
            ContentKind::Itv => &self.itv_categories,
            ContentKind::Vod => &self.vod_categories,
            ContentKind::Series => &self.series_categories,
        }
    }

    /// Chaînes de `category`, `*` pour toutes ; `None` pour une catégorie inconnue
    pub fn channels_in(&self, category: &str) -> Option<Vec<Channel>> {
        listing(&self.channels, category)
    }

    pub fn vod_in(&self, category: &str) -> Option<Vec<VodItem>> {
        listing(&self.vod, category)
    }

    pub fn series_in(&self, category: &str) -> Option<Vec<SeriesItem>> {
        listing(&self.series, category)
    }

    pub fn find_channel(&self, id: &str) -> Option<&Channel> {
        self.channels.values().flatten().find(|c| c.id == id)
    }

    pub fn find_vod(&self, id: &str) -> Option<&VodItem> {
        self.vod.values().flatten().find(|v| v.id == id)
    }

    pub fn find_series(&self, id: &str) -> Option<&SeriesItem> {
        self.series.values().flatten().find(|s| s.id == id)
    }

    /// Cherche `id` parmi les chaînes, puis la VOD, puis les séries
    pub fn find_item(&self, id: &str) -> Option<ContentItem> {
        self.find_channel(id)
            .cloned()
            .map(ContentItem::Channel)
            .or_else(|| self.find_vod(id).cloned().map(ContentItem::Vod))
            .or_else(|| self.find_series(id).cloned().map(ContentItem::Series))
    }

    pub fn item_count(&self, kind: ContentKind) -> usize {
        match kind {
            ContentKind::Itv => self.channels.values().map(Vec::len).sum(),
            ContentKind::Vod => self.vod.values().map(Vec::len).sum(),
            ContentKind::Series => self.series.values().map(Vec::len).sum(),
        }
    }
}

fn listing<T: Clone>(items: &IndexMap<String, Vec<T>>, category: &str) -> Option<Vec<T>> {
    match category {
        "" | "*" => Some(items.values().flatten().cloned().collect()),
        id => items.get(id).cloned(),
    }
}

fn vod_item<R: Rng>(
    rng: &mut R,
    scenario: &ScenarioConfig,
    id: usize,
    category_id: &str,
    is_series: bool,
    embedded: bool,
) -> VodItem {
    let title = format!("{}: {}", fake::song_name(rng), fake::words(rng, 2));
    let description = fake::paragraph(rng);
    let actors = (0..4)
        .map(|_| fake::full_name(rng))
        .collect::<Vec<_>>()
        .join(", ");
    let director = fake::full_name(rng);
    let year = REFERENCE_YEAR - rng.random_range(0..20);
    let genre = fake::music_genre(rng).to_string();
    let genres_str = format!("{}, {}", fake::music_genre(rng), fake::music_genre(rng));
    let rating_imdb = rating(rng);
    let rating_kinopoisk = rating(rng);

    let series = embedded.then(|| {
        let count = scenario.seasons_per_series * scenario.episodes_per_season;
        (0..count)
            .map(|i| EmbeddedEpisode {
                id: id as i64 * 100 + i as i64,
                name: format!("Episode {}", i + 1),
                cmd: format!("ffrt4://vod/{}/ep{}/index.m3u8", id, i + 1),
            })
            .collect()
    });

    VodItem {
        id: id.to_string(),
        name: title.clone(),
        o_name: title.clone(),
        title,
        cmd: format!("ffrt4://vod/{id}/index.m3u8"),
        screenshot_uri: format!("https://picsum.photos/seed/vod-{id}/300/200"),
        cover: format!("https://picsum.photos/seed/vod-cover-{id}/300/450"),
        description,
        actors,
        director,
        year: year.to_string(),
        genre,
        genres_str,
        rating_imdb,
        rating_kinopoisk,
        category_id: category_id.to_string(),
        is_series,
        has_files: !is_series,
        series,
    }
}

fn series_item<R: Rng>(rng: &mut R, id: usize, category_id: &str) -> SeriesItem {
    let title = fake::catch_phrase(rng);
    let description = fake::paragraph(rng);
    let actors = (0..4)
        .map(|_| fake::full_name(rng))
        .collect::<Vec<_>>()
        .join(", ");
    let director = fake::full_name(rng);
    let year = REFERENCE_YEAR - rng.random_range(0..10);
    let genres_str = format!("{}, {}", fake::music_genre(rng), fake::music_genre(rng));
    let rating_imdb = rating(rng);
    let rating_kinopoisk = rating(rng);

    SeriesItem {
        id: id.to_string(),
        name: title.clone(),
        o_name: title.clone(),
        title,
        cmd: format!("ffrt4://series/{id}"),
        screenshot_uri: format!("https://picsum.photos/seed/series-{id}/300/200"),
        cover: format!("https://picsum.photos/seed/series-cover-{id}/300/450"),
        description,
        actors,
        director,
        year: year.to_string(),
        genres_str,
        rating_imdb,
        rating_kinopoisk,
        category_id: category_id.to_string(),
        is_series: false,
        has_files: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioRegistry;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 20, 47, 12).unwrap()
    }

    #[test]
    fn test_same_seed_same_catalog() {
        let scenario = ScenarioRegistry::builtin().for_mac("00:1a:79:00:00:01");
        let a = GeneratedCatalog::generate(&scenario, anchor());
        let b = GeneratedCatalog::generate(&scenario, anchor());
        assert_eq!(a, b);

        assert_eq!(a.vod_categories.len(), 8);
        assert_eq!(a.item_count(ContentKind::Vod), 8 * 40);
        assert_eq!(a.item_count(ContentKind::Itv), 8 * 40);
        assert_eq!(a.vod_categories[0].id, "2001");
        assert_eq!(a.vod_categories[0].title, "Action");
        assert_eq!(a.series_categories[4].alias, "reality_shows");
    }

    #[test]
    fn test_different_seeds_differ() {
        let registry = ScenarioRegistry::builtin();
        let a = GeneratedCatalog::generate(&registry.for_mac("aa:00:00:00:00:01"), anchor());
        let b = GeneratedCatalog::generate(&registry.for_mac("aa:00:00:00:00:02"), anchor());
        assert_ne!(a.vod_in("*"), b.vod_in("*"));
    }

    #[test]
    fn test_item_ids_and_commands() {
        let scenario = ScenarioRegistry::builtin().for_mac("00:1a:79:00:00:03");
        let catalog = GeneratedCatalog::generate(&scenario, anchor());

        let channels = catalog.channels_in("*").unwrap();
        assert_eq!(channels.len(), 10);
        assert_eq!(channels[0].id, "10000");
        assert_eq!(channels[5].id, "10005");
        assert_eq!(channels[5].category_id, "1002");
        assert_eq!(channels[0].cmd, "ffrt4://ch/live/10000/index.m3u8");
        assert!(channels[0].name.ends_with(" TV"));

        let vod = catalog.vod_in("2001").unwrap();
        assert_eq!(vod[0].cmd, "ffrt4://vod/20000/index.m3u8");
        assert!(vod.iter().all(|v| v.has_files && !v.is_series));

        assert!(catalog.vod_in("9999").is_none());
        assert!(matches!(catalog.find_item("30000"), Some(ContentItem::Series(_))));
        assert!(catalog.find_item("nope").is_none());
    }

    #[test]
    fn test_series_seasons_shape() {
        let scenario = ScenarioRegistry::builtin().for_mac("00:1a:79:00:00:01");
        let catalog = GeneratedCatalog::generate(&scenario, anchor());

        let seasons = &catalog.seasons["30000"];
        assert_eq!(seasons.len(), 3);
        assert_eq!(seasons[0].id, "30000-s1");
        assert_eq!(seasons[0].name, "Season 1");
        assert_eq!(seasons[0].series.len(), 8);
        assert_eq!(seasons[0].series[7], "30000-s1-e8");
        assert_eq!(seasons[2].cmd, "ffrt4://series/30000/season/3");
    }

    #[test]
    fn test_is_series_shape() {
        let scenario = ScenarioRegistry::builtin().for_mac("00:1a:79:00:00:04");
        let catalog = GeneratedCatalog::generate(&scenario, anchor());
        let vod = catalog.vod_in("2001").unwrap();

        assert_eq!(vod.iter().filter(|v| v.is_series).count(), 12);
        assert!(vod[0].is_series && !vod[0].has_files);
        assert!(!vod[19].is_series && vod[19].has_files);
        assert!(vod.iter().all(|v| v.series.is_none()));
    }

    #[test]
    fn test_embedded_series_shape() {
        let scenario = ScenarioRegistry::builtin().for_mac("00:1a:79:00:00:05");
        let catalog = GeneratedCatalog::generate(&scenario, anchor());
        let vod = catalog.vod_in("2001").unwrap();

        assert_eq!(vod.iter().filter(|v| v.has_embedded_episodes()).count(), 10);
        let episodes = vod[0].series.as_ref().unwrap();
        assert_eq!(episodes.len(), 2 * 5);
        assert_eq!(episodes[0].id, 2_000_000);
        assert_eq!(episodes[0].name, "Episode 1");
        assert_eq!(episodes[9].cmd, "ffrt4://vod/20000/ep10/index.m3u8");
        assert!(!vod[19].has_embedded_episodes());
    }

    #[test]
    fn test_epg_slots() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let programs = generate_epg(&mut rng, "Acme TV", anchor());

        assert_eq!(programs.len(), EPG_PROGRAMS_PER_CHANNEL);
        // 20:30 est le créneau courant, six créneaux avant donne 17:30
        let first = Utc.with_ymd_and_hms(2026, 3, 14, 17, 30, 0).unwrap();
        assert_eq!(programs[0].start_timestamp, first.timestamp());
        assert_eq!(programs[0].start, "2026-03-14T17:30:00Z");
        assert_eq!(programs[1].start_timestamp, programs[0].stop_timestamp);
        assert_eq!(programs[0].category, "News");
        assert_eq!(programs[7].category, "News");
        assert!(programs[0].name.starts_with("Acme TV: "));
        assert!(programs.iter().any(|p| {
            p.start_timestamp <= anchor().timestamp() && anchor().timestamp() < p.stop_timestamp
        }));
    }

    #[test]
    fn test_stream_resolution() {
        assert_eq!(resolve_stream_url("http://elsewhere/x"), TEST_HLS_STREAMS[0]);
        let cmd = "ffrt4://vod/20000/index.m3u8";
        let expected: usize = cmd.chars().map(|c| c as usize).sum::<usize>() % 4;
        assert_eq!(resolve_stream_url(cmd), TEST_HLS_STREAMS[expected]);
        assert_eq!(resolve_stream_url(cmd), resolve_stream_url(cmd));
    }

    #[test]
    fn test_detail_rng_is_stable() {
        let parent = SeasonParent {
            id: "20001".into(),
            director: "D".into(),
            actors: "A".into(),
            year: "2020".into(),
            genres_str: "Jazz".into(),
            rating_imdb: "7.0".into(),
            rating_kinopoisk: "6.5".into(),
        };
        let a = generate_seasons(&mut detail_rng(4004, "20001"), &parent, 2, 3);
        let b = generate_seasons(&mut detail_rng(4004, "20001"), &parent, 2, 3);
        assert_eq!(a, b);
        assert_eq!(a[1].genres_str, "Jazz");
        assert_eq!(a[1].series, vec!["20001-s2-e1", "20001-s2-e2", "20001-s2-e3"]);
    }
}
