// src/draft.rs

use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{
    Category, MAX_IMAGES, PendingImage, Product, ProductFormFields, ProductRecord,
    STARTER_DESCRIPTION, STARTER_PRICE,
};

/// Szkic produktu edytowany w formularzu.
///
/// Zdjęcia są trzymane w dwóch listach: już zapisane (URL-e) i oczekujące
/// na wysłanie (data URL). Kolejność wyświetlania to najpierw zapisane,
/// potem oczekujące; pierwsze zdjęcie jest zdjęciem głównym.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDraft {
    product_id: Option<i64>,
    name: String,
    description: String,
    price: String,
    payment_link: String,
    category: String,
    persisted_images: Vec<String>,
    pending_images: Vec<PendingImage>,
}

/// Jedno zdjęcie w kolejności wyświetlania.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayImage<'a> {
    pub index: usize,
    pub src: &'a str,
    pub is_main: bool,
    pub is_pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemovedImage {
    Persisted(String),
    Pending(PendingImage),
}

impl ProductDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Szkic edycji istniejącego produktu. Zdjęcia ponad `MAX_IMAGES` są
    /// pomijane, żeby zapisany rekord nie przekroczył limitu.
    pub fn from_product(product: &Product) -> Self {
        let mut persisted_images = product.images.clone();
        if persisted_images.len() > MAX_IMAGES {
            tracing::warn!(
                "Produkt {} ma {} zdjęć, w formularzu zostaje pierwszych {}",
                product.id,
                persisted_images.len(),
                MAX_IMAGES
            );
            persisted_images.truncate(MAX_IMAGES);
        }
        Self {
            product_id: Some(product.id),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.clone(),
            payment_link: product.payment_link.clone(),
            category: product.category.clone(),
            persisted_images,
            pending_images: Vec::new(),
        }
    }

    pub fn product_id(&self) -> Option<i64> {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> &str {
        &self.price
    }

    pub fn payment_link(&self) -> &str {
        &self.payment_link
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn persisted_images(&self) -> &[String] {
        &self.persisted_images
    }

    pub fn pending_images(&self) -> &[PendingImage] {
        &self.pending_images
    }

    pub fn set_name(&mut self, value: impl Into<String>) {
        self.name = value.into();
    }

    pub fn set_description(&mut self, value: impl Into<String>) {
        self.description = value.into();
    }

    pub fn set_price(&mut self, value: impl Into<String>) {
        self.price = value.into();
    }

    pub fn set_payment_link(&mut self, value: impl Into<String>) {
        self.payment_link = value.into();
    }

    /// Ustawia kategorię. Kategoria z presetem (Starter Package) nadpisuje
    /// cenę i opis stałymi wartościami, pozostałe ich nie ruszają.
    pub fn set_category(&mut self, value: impl Into<String>) {
        self.category = value.into();
        if let Ok(category) = Category::from_str(&self.category) {
            if category.has_preset() {
                tracing::debug!("Kategoria '{}' nadpisuje cenę i opis", category);
                self.price = STARTER_PRICE.to_string();
                self.description = STARTER_DESCRIPTION.to_string();
            }
        }
    }

    /// Przenosi wartości przesłane z formularza do szkicu.
    ///
    /// Kategoria jest ustawiana tylko wtedy, gdy się zmieniła: ponowne
    /// przesłanie tej samej kategorii nie jest jej wyborem i nie nadpisuje
    /// ręcznie poprawionej ceny ani opisu.
    pub fn apply_fields(&mut self, fields: &ProductFormFields) {
        self.set_name(fields.name.as_str());
        self.set_description(fields.description.as_str());
        self.set_price(fields.price.as_str());
        self.set_payment_link(fields.payment_link.as_str());
        if fields.category != self.category {
            self.set_category(fields.category.as_str());
        }
    }

    pub fn total_images(&self) -> usize {
        self.persisted_images.len() + self.pending_images.len()
    }

    pub fn remaining_capacity(&self) -> usize {
        MAX_IMAGES.saturating_sub(self.total_images())
    }

    /// Sprawdza, czy do szkicu zmieści się `count` nowych zdjęć.
    pub fn ensure_capacity_for(&self, count: usize) -> Result<(), AppError> {
        if self.total_images() + count > MAX_IMAGES {
            tracing::warn!(
                "Odrzucono {} zdjęć: szkic ma już {} z {}",
                count,
                self.total_images(),
                MAX_IMAGES
            );
            return Err(AppError::TooManyImages(MAX_IMAGES));
        }
        Ok(())
    }

    /// Dopisuje całą partię na koniec listy oczekujących albo nic.
    pub fn append_pending(&mut self, images: Vec<PendingImage>) -> Result<(), AppError> {
        self.ensure_capacity_for(images.len())?;
        self.pending_images.extend(images);
        Ok(())
    }

    pub fn display_images(&self) -> Vec<DisplayImage<'_>> {
        let persisted = self.persisted_images.iter().map(|url| (url.as_str(), false));
        let pending = self
            .pending_images
            .iter()
            .map(|image| (image.data_url.as_str(), true));
        persisted
            .chain(pending)
            .enumerate()
            .map(|(index, (src, is_pending))| DisplayImage {
                index,
                src,
                is_main: index == 0,
                is_pending,
            })
            .collect()
    }

    /// Usuwa zdjęcie o indeksie w kolejności wyświetlania z tej listy,
    /// do której należy.
    pub fn remove_image(&mut self, index: usize) -> Result<RemovedImage, AppError> {
        let persisted_len = self.persisted_images.len();
        if index < persisted_len {
            return Ok(RemovedImage::Persisted(self.persisted_images.remove(index)));
        }
        let pending_index = index - persisted_len;
        if pending_index < self.pending_images.len() {
            return Ok(RemovedImage::Pending(self.pending_images.remove(pending_index)));
        }
        Err(AppError::NotFound)
    }

    pub fn pending_data_urls(&self) -> Vec<String> {
        self.pending_images
            .iter()
            .map(|image| image.data_url.clone())
            .collect()
    }

    /// Zapisane zdjęcia, a po nich świeżo wysłane, każda grupa w swojej kolejności.
    pub fn merged_images(&self, uploaded: Vec<String>) -> Vec<String> {
        let mut images = self.persisted_images.clone();
        images.extend(uploaded);
        images
    }

    pub fn to_record(&self, images: Vec<String>) -> ProductRecord {
        ProductRecord {
            id: self.product_id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price.clone(),
            payment_link: self.payment_link.clone(),
            category: self.category.clone(),
            images,
        }
    }

    /// Po udanym zapisie oczekujące zdjęcia stają się zapisanymi.
    pub fn promote_pending(&mut self, images: Vec<String>) {
        self.persisted_images = images;
        self.pending_images.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn pending(tag: &str) -> PendingImage {
        PendingImage {
            data_url: format!("data:image/jpeg;base64,{}", tag),
            width: 10,
            height: 10,
        }
    }

    fn draft_with(persisted: &[&str], pending_tags: &[&str]) -> ProductDraft {
        let mut draft = ProductDraft::from_product(&Product {
            id: 7,
            name: "Sklep".to_string(),
            description: "Opis".to_string(),
            price: "100".to_string(),
            payment_link: "https://pay.example.com/7".to_string(),
            category: "Inne".to_string(),
            images: persisted.iter().map(|s| s.to_string()).collect(),
        });
        draft
            .append_pending(pending_tags.iter().map(|t| pending(t)).collect())
            .unwrap();
        draft
    }

    #[test]
    fn loading_product_caps_images_at_limit() {
        let urls = ["u1", "u2", "u3", "u4", "u5", "u6", "u7"];
        let draft = draft_with(&urls, &[]);
        assert_eq!(draft.total_images(), MAX_IMAGES);
        assert_eq!(draft.persisted_images(), &urls[..MAX_IMAGES]);
        assert_eq!(draft.remaining_capacity(), 0);
    }

    #[test]
    fn starter_category_overwrites_price_and_description() {
        let mut draft = ProductDraft::new();
        draft.set_price("1");
        draft.set_description("własny opis");
        draft.set_category("Starter Package");
        assert_eq!(draft.price(), STARTER_PRICE);
        assert_eq!(draft.description(), STARTER_DESCRIPTION);

        // deterministycznie, niezależnie od wcześniejszych wartości
        let mut other = ProductDraft::new();
        other.set_price("999");
        other.set_category("Starter Package");
        assert_eq!(other.price(), draft.price());
        assert_eq!(other.description(), draft.description());
    }

    #[test]
    fn other_categories_leave_price_and_description() {
        for category in ["Standard Package", "Premium Package", "Inne", "coś innego"] {
            let mut draft = ProductDraft::new();
            draft.set_price("120");
            draft.set_description("opis");
            draft.set_category(category);
            assert_eq!(draft.price(), "120");
            assert_eq!(draft.description(), "opis");
            assert_eq!(draft.category(), category);
        }
    }

    #[test]
    fn reposting_same_category_keeps_edited_price() {
        let mut draft = ProductDraft::new();
        draft.apply_fields(&ProductFormFields {
            category: "Starter Package".to_string(),
            ..Default::default()
        });
        assert_eq!(draft.price(), STARTER_PRICE);

        draft.apply_fields(&ProductFormFields {
            price: "450".to_string(),
            description: draft.description().to_string(),
            category: "Starter Package".to_string(),
            ..Default::default()
        });
        assert_eq!(draft.price(), "450");
    }

    #[test]
    fn batch_over_limit_is_rejected_without_change() {
        let mut draft = draft_with(&["a", "b"], &["c", "d"]);
        let before = draft.clone();
        let result = draft.append_pending(vec![pending("e"), pending("f")]);
        assert!(matches!(result, Err(AppError::TooManyImages(5))));
        assert_eq!(draft, before);

        draft.append_pending(vec![pending("e")]).unwrap();
        assert_eq!(draft.total_images(), MAX_IMAGES);
        assert_eq!(draft.remaining_capacity(), 0);
    }

    #[test]
    fn removing_first_pending_keeps_the_second() {
        let mut draft = draft_with(&[], &["first", "second"]);
        let removed = draft.remove_image(0).unwrap();
        assert_eq!(removed, RemovedImage::Pending(pending("first")));
        assert_eq!(draft.pending_images(), &[pending("second")]);
    }

    #[test]
    fn removal_targets_the_list_owning_the_index() {
        let mut draft = draft_with(&["u1", "u2"], &["p1", "p2"]);

        draft.remove_image(2).unwrap();
        assert_eq!(draft.persisted_images(), &["u1".to_string(), "u2".to_string()]);
        assert_eq!(draft.pending_images(), &[pending("p2")]);

        draft.remove_image(0).unwrap();
        assert_eq!(draft.persisted_images(), &["u2".to_string()]);
        assert_eq!(draft.pending_images().len(), 1);

        let display = draft.display_images();
        assert!(display[0].is_main);
        assert_eq!(display[0].src, "u2");
        assert!(!display[1].is_main);
        assert!(display[1].is_pending);
    }

    #[test]
    fn main_image_moves_to_pending_when_persisted_are_gone() {
        let mut draft = draft_with(&["u1"], &["p1"]);
        draft.remove_image(0).unwrap();
        let display = draft.display_images();
        assert_eq!(display.len(), 1);
        assert!(display[0].is_main);
        assert!(display[0].is_pending);
    }

    #[test]
    fn removing_out_of_range_is_not_found() {
        let mut draft = draft_with(&["u1"], &["p1"]);
        assert!(matches!(draft.remove_image(2), Err(AppError::NotFound)));
        assert_eq!(draft.total_images(), 2);
    }

    #[test]
    fn merge_keeps_persisted_before_uploaded() {
        let draft = draft_with(&["u1", "u2"], &["p1"]);
        let merged = draft.merged_images(vec!["n1".to_string()]);
        assert_eq!(merged, vec!["u1", "u2", "n1"]);

        let record = draft.to_record(merged);
        assert_eq!(record.id, Some(7));
        assert_eq!(record.images.len(), 3);
    }

    #[test]
    fn promote_pending_clears_pending_list() {
        let mut draft = draft_with(&["u1"], &["p1"]);
        draft.promote_pending(vec!["u1".to_string(), "n1".to_string()]);
        assert!(draft.pending_images().is_empty());
        assert_eq!(draft.persisted_images().len(), 2);
    }
}
