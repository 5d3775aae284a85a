//! Dérivation de l'identité du boîtier
//!
//! Un portail lie une session à un décodeur via quelques identifiants que les
//! vrais boîtiers reçoivent en usine. Ici ils sont dérivés de l'adresse MAC :
//! une même MAC présente toujours le même boîtier.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Numéro de série présenté quand aucun n'est configuré (13 caractères hexadécimaux)
pub const DEFAULT_SERIAL_NUMBER: &str = "BEDACD4569BAF";

/// Modèle annoncé dans les métriques du profil
pub const DEVICE_MODEL: &str = "MAG250";

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";
const NONCE_CHARS: &[u8; 16] = b"abcdef0123456789";

/// Calcule le prehash du handshake : SHA-1 de la MAC en majuscules, 40 caractères hexadécimaux majuscules
pub fn derive_prehash(mac_address: &str) -> String {
    let digest = Sha1::digest(mac_address.to_uppercase().as_bytes());
    hex::encode_upper(digest)
}

/// Dérive un device id hexadécimal de 64 caractères depuis l'adresse MAC
///
/// Les séparateurs sont retirés et l'adresse passée en majuscules, puis un hash
/// glissant base 31 initialise une expansion congruentielle linéaire.
pub fn derive_device_id(mac_address: &str) -> String {
    let canonical: String = mac_address
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .flat_map(char::to_uppercase)
        .collect();

    let mut seed = canonical
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    (0..64)
        .map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            HEX_UPPER[(seed % 16) as usize] as char
        })
        .collect()
}

/// Numéro de série de la session, `override_sn` s'il n'est pas vide
pub fn derive_serial_number(override_sn: Option<&str>) -> String {
    non_blank(override_sn).unwrap_or_else(|| DEFAULT_SERIAL_NUMBER.to_string())
}

/// Nonce de 40 caractères utilisé quand le handshake ne fournit pas `random`
pub fn generate_random_nonce() -> String {
    let mut rng = rand::rng();
    (0..40)
        .map(|_| NONCE_CHARS[rng.random_range(0..NONCE_CHARS.len())] as char)
        .collect()
}

/// Vrai quand l'URL désigne un portail Stalker complet qui exige handshake + profil
pub fn is_full_stalker_portal(url: &str) -> bool {
    url.contains("/stalker_portal/") || url.contains("/server/load.php")
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Identifiants fournis par l'appelant ; les valeurs vides comptent comme absentes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityOverrides {
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub device_id1: Option<String>,
    #[serde(default)]
    pub device_id2: Option<String>,
    #[serde(default)]
    pub signature1: Option<String>,
    #[serde(default)]
    pub signature2: Option<String>,
}

/// Empreinte complète du boîtier envoyée avec la requête de profil
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub mac_address: String,
    pub serial_number: String,
    pub device_id1: String,
    pub device_id2: String,
    pub signature1: String,
    pub signature2: String,
}

impl DeviceIdentity {
    /// Identité entièrement dérivée de l'adresse MAC
    pub fn derive(mac_address: &str) -> Self {
        Self::with_overrides(mac_address, &IdentityOverrides::default())
    }

    /// Identité où les valeurs explicites priment sur la dérivation
    ///
    /// `device_id2` retombe sur `device_id1` ; les signatures sont vides par défaut.
    pub fn with_overrides(mac_address: &str, overrides: &IdentityOverrides) -> Self {
        let device_id1 = non_blank(overrides.device_id1.as_deref())
            .unwrap_or_else(|| derive_device_id(mac_address));
        let device_id2 =
            non_blank(overrides.device_id2.as_deref()).unwrap_or_else(|| device_id1.clone());

        Self {
            mac_address: mac_address.to_string(),
            serial_number: derive_serial_number(overrides.serial_number.as_deref()),
            device_id1,
            device_id2,
            signature1: non_blank(overrides.signature1.as_deref()).unwrap_or_default(),
            signature2: non_blank(overrides.signature2.as_deref()).unwrap_or_default(),
        }
    }

    pub fn prehash(&self) -> String {
        derive_prehash(&self.mac_address)
    }
}
