// src/catalog.rs

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};

use crate::errors::AppError;
use crate::models::{Product, ProductRecord};

/// Katalog produktów, do którego formularz oddaje gotowy rekord.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn fetch_product(&self, product_id: i64) -> Result<Product, AppError>;

    /// Zapisuje rekord: nowy produkt, gdy `record.id` jest puste,
    /// w przeciwnym razie aktualizacja istniejącego.
    async fn save_product(&self, record: ProductRecord) -> Result<(), AppError>;
}

/// Klient JSON-owego API katalogu.
#[derive(Clone)]
pub struct CatalogApiClient {
    base_url: String,
    client: Client,
}

impl CatalogApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn products_url(&self) -> String {
        format!("{}/products", self.base_url)
    }

    fn product_url(&self, product_id: i64) -> String {
        format!("{}/products/{}", self.base_url, product_id)
    }

    /// Nowy produkt idzie przez POST na kolekcję, istniejący przez PUT.
    fn save_target(&self, product_id: Option<i64>) -> (Method, String) {
        match product_id {
            Some(product_id) => (Method::PUT, self.product_url(product_id)),
            None => (Method::POST, self.products_url()),
        }
    }
}

#[async_trait]
impl ProductCatalog for CatalogApiClient {
    async fn fetch_product(&self, product_id: i64) -> Result<Product, AppError> {
        let resp = self
            .client
            .get(self.product_url(product_id))
            .send()
            .await
            .map_err(|e| {
                AppError::Catalog(format!("pobieranie produktu {}: {}", product_id, e))
            })?;

        match resp.status() {
            StatusCode::NOT_FOUND => {
                tracing::warn!("Katalog nie zna produktu o ID: {}", product_id);
                Err(AppError::NotFound)
            }
            status if status.is_success() => resp.json::<Product>().await.map_err(|e| {
                AppError::Catalog(format!(
                    "nie można odczytać produktu {}: {}",
                    product_id, e
                ))
            }),
            status => Err(AppError::Catalog(format!(
                "pobieranie produktu {} zwróciło status {}",
                product_id, status
            ))),
        }
    }

    async fn save_product(&self, record: ProductRecord) -> Result<(), AppError> {
        let (method, url) = self.save_target(record.id);

        let resp = self
            .client
            .request(method, url)
            .json(&record)
            .send()
            .await
            .map_err(|e| AppError::Catalog(format!("zapis produktu: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "Brak treści błędu".to_string());
            return Err(AppError::Catalog(format!(
                "zapis produktu zwrócił status {}: {}",
                status, error_text
            )));
        }

        tracing::info!(
            "Katalog przyjął produkt '{}' (ID: {:?}, zdjęć: {})",
            record.name,
            record.id,
            record.images.len()
        );
        Ok(())
    }
}
