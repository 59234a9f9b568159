// src/models.rs
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Maksymalna liczba zdjęć produktu (zapisane + oczekujące).
pub const MAX_IMAGES: usize = 5;

/// Stała cena pakietu startowego, wpisywana po wybraniu kategorii.
pub const STARTER_PRICE: &str = "499";

/// Stały opis pakietu startowego, wpisywany po wybraniu kategorii.
pub const STARTER_DESCRIPTION: &str = "Pakiet startowy: konfiguracja sklepu, \
jeden szablon strony produktu, podpięcie płatności online oraz 30 dni wsparcia technicznego.";

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, EnumIter, AsRefStr,
)]
pub enum Category {
    #[strum(serialize = "Starter Package")]
    StarterPackage,
    #[strum(serialize = "Standard Package")]
    StandardPackage,
    #[strum(serialize = "Premium Package")]
    PremiumPackage,
    Inne,
}

impl Category {
    /// Czy wybór tej kategorii nadpisuje cenę i opis.
    pub fn has_preset(&self) -> bool {
        matches!(self, Category::StarterPackage)
    }
}

/// Produkt w kształcie, w jakim zwraca go katalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub payment_link: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Rekord przekazywany do katalogu po zatwierdzeniu formularza.
/// `id` jest obecne tylko przy edycji.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    pub price: String,
    pub payment_link: String,
    pub category: String,
    pub images: Vec<String>,
}

/// Zdjęcie zakodowane lokalnie (data URL), jeszcze niewysłane.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// Plik wybrany przez użytkownika w polu `images`.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Wartości pól tekstowych przesyłane przez formularz.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFormFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub payment_link: String,
    #[serde(default)]
    pub category: String,
}
