// src.cloudinary

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{blob_store::BlobStore, errors::AppError, state::CloudinaryConfig};

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
}

/// Podpis Cloudinary: parametry posortowane po kluczu, złączone `&`,
/// z doklejonym sekretem, SHA-1 w hex.
pub fn sign_params(params: &BTreeMap<String, String>, api_secret: &str) -> String {
    let mut signature_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<String>>()
        .join("&");
    signature_string.push_str(api_secret);

    let mut hasher = Sha1::new();
    hasher.update(signature_string.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct CloudinaryStore {
    config: CloudinaryConfig,
    client: Client,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }

    /// Wysyła jedno zdjęcie (data URL) podpisanym żądaniem upload.
    pub async fn upload_data_url(&self, data_url: String) -> Result<String, AppError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AppError::InternalServerError("Błąd czasu systemowego".to_string()))?
            .as_secs();

        let mut params_to_sign = BTreeMap::new();
        params_to_sign.insert("timestamp".to_string(), timestamp.to_string());
        if let Some(folder) = &self.config.folder {
            params_to_sign.insert("folder".to_string(), folder.clone());
        }
        let signature = sign_params(&params_to_sign, &self.config.api_secret);

        // Cloudinary przyjmuje data URL bezpośrednio w polu `file`
        let mut form = reqwest::multipart::Form::new()
            .text("file", data_url)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (key, value) in params_to_sign {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    let upload_result = resp.json::<CloudinaryUploadResponse>().await;
                    match upload_result {
                        Ok(result) => Ok(result.secure_url),
                        Err(e) => {
                            tracing::error!("Błąd deserializacji odpowiedzi Cloudinary: {}", e);
                            Err(AppError::Upload(
                                "Nie można przetworzyć odpowiedzi z serwera obrazów".to_string(),
                            ))
                        }
                    }
                } else {
                    let status = resp.status();
                    let error_text = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "Brak treści błędu".to_string());
                    tracing::error!(
                        "Błąd uploadu do Cloudinary: Status={}, Treść={}",
                        status,
                        error_text
                    );
                    Err(AppError::Upload(format!(
                        "Błąd podczas wysyłania obrazu (status: {})",
                        status
                    )))
                }
            }
            Err(e) => {
                tracing::error!("Błąd sieci podczas komunikacji z Cloudinary: {}", e);
                Err(AppError::Upload(
                    "Błąd połączenia z serwerem obrazów".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl BlobStore for CloudinaryStore {
    async fn upload_multiple_images(&self, images: Vec<String>) -> Result<Vec<String>, AppError> {
        let count = images.len();
        let upload_futures = images
            .into_iter()
            .map(|data_url| self.upload_data_url(data_url));
        let urls = try_join_all(upload_futures).await?;
        tracing::info!("Wysłano {} zdjęć do Cloudinary: {:?}", count, urls);
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_params_and_appends_secret() {
        let mut params = BTreeMap::new();
        params.insert("timestamp".to_string(), "1315060510".to_string());
        params.insert("folder".to_string(), "produkty".to_string());

        let mut hasher = Sha1::new();
        hasher.update(b"folder=produkty&timestamp=1315060510abcd");
        let expected = hex::encode(hasher.finalize());

        assert_eq!(sign_params(&params, "abcd"), expected);
        assert_eq!(expected.len(), 40);
    }

    #[test]
    fn upload_url_uses_cloud_name() {
        let store = CloudinaryStore::new(CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: None,
        });
        assert_eq!(
            store.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }
}
