//! Texte factice déterministe
//!
//! Petites tables de mots combinées avec un RNG fourni par l'appelant. Chaque fonction
//! tire dans le RNG dans un ordre fixe : une graine produit toujours le même texte.

use rand::Rng;

const COMPANY_STEMS: &[&str] = &[
    "Northwind", "Blue Harbor", "Redwood", "Silverline", "Summit", "Crescent", "Ironbridge",
    "Lakeshore", "Evergreen", "Golden Gate", "Highland", "Starlight", "Riverside", "Oakmont",
    "Pinecrest", "Brightwater", "Stonefield", "Maple", "Horizon", "Cobalt", "Falcon", "Granite",
    "Harborview", "Juniper", "Keystone", "Meridian", "Pioneer", "Sapphire", "Westbrook", "Zenith",
];

const COMPANY_SUFFIXES: &[&str] = &[
    "Media", "Broadcasting", "Network", "Group", "Studios", "Channel", "Vision", "Entertainment",
];

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Chloe", "Dmitri", "Elena", "Farid", "Grace", "Hugo", "Ingrid", "Jonas",
    "Keiko", "Liam", "Maya", "Nadia", "Oscar", "Paula", "Quentin", "Rosa", "Samuel", "Tessa",
    "Umar", "Vera", "Walter", "Ximena", "Yusuf", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Anderson", "Bennett", "Carvalho", "Dubois", "Eriksen", "Fischer", "Garcia", "Hoffman",
    "Ivanova", "Jensen", "Kowalski", "Lambert", "Moreau", "Novak", "Okafor", "Petrov", "Quinn",
    "Rossi", "Schmidt", "Tanaka", "Usman", "Varga", "Weber", "Young", "Zhang",
];

const SONG_WORDS: &[&str] = &[
    "Midnight", "River", "Echoes", "Summer", "Shadows", "Heart", "Fire", "Rain", "Golden",
    "Highway", "Dreams", "Ocean", "Silver", "Wild", "Thunder", "Lonely", "Electric", "Paradise",
    "Broken", "Northern", "Lights", "City", "Stars", "Wind",
];

const MUSIC_GENRES: &[&str] = &[
    "Rock", "Jazz", "Blues", "Classical", "Country", "Electronic", "Folk", "Hip Hop", "Latin",
    "Metal", "Pop", "Reggae", "Soul", "Funk", "World",
];

const ADJECTIVES: &[&str] = &[
    "Adaptive", "Balanced", "Centralized", "Distributed", "Enhanced", "Focused", "Horizontal",
    "Innovative", "Managed", "Optimized", "Persistent", "Reactive", "Seamless", "Synergized",
    "Universal", "Virtual",
];

const DESCRIPTORS: &[&str] = &[
    "asynchronous", "bifurcated", "coherent", "dynamic", "global", "heuristic", "modular",
    "multimedia", "neutral", "regional", "stable", "tangible", "transitional", "zero-defect",
];

const NOUNS: &[&str] = &[
    "alliance", "approach", "archive", "circuit", "frontier", "framework", "horizon", "journey",
    "legacy", "matrix", "network", "paradigm", "signal", "strategy", "voyage",
];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in",
    "reprehenderit", "voluptate", "velit", "esse", "cillum", "fugiat", "nulla", "pariatur",
];

fn pick<R: Rng>(rng: &mut R, table: &'static [&'static str]) -> &'static str {
    table[rng.random_range(0..table.len())]
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn company<R: Rng>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, COMPANY_STEMS), pick(rng, COMPANY_SUFFIXES))
}

pub fn full_name<R: Rng>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

pub fn song_name<R: Rng>(rng: &mut R) -> String {
    let count = rng.random_range(1..=3);
    (0..count)
        .map(|_| pick(rng, SONG_WORDS))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn music_genre<R: Rng>(rng: &mut R) -> &'static str {
    pick(rng, MUSIC_GENRES)
}

pub fn catch_phrase<R: Rng>(rng: &mut R) -> String {
    format!(
        "{} {} {}",
        pick(rng, ADJECTIVES),
        pick(rng, DESCRIPTORS),
        pick(rng, NOUNS)
    )
}

pub fn words<R: Rng>(rng: &mut R, count: usize) -> String {
    (0..count)
        .map(|_| pick(rng, LOREM))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn sentence<R: Rng>(rng: &mut R) -> String {
    let count = rng.random_range(6..=12);
    format!("{}.", capitalize(&words(rng, count)))
}

pub fn paragraph<R: Rng>(rng: &mut R) -> String {
    let count = rng.random_range(3..=5);
    (0..count)
        .map(|_| sentence(rng))
        .collect::<Vec<_>>()
        .join(" ")
}
