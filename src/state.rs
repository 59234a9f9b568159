// src/state.rs

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use crate::blob_store::BlobStore;
use crate::catalog::ProductCatalog;
use crate::errors::AppError;
use crate::forms::SharedSession;
use crate::image_pipeline::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, ImageSettings};

const MAX_OPEN_FORMS: u64 = 10_000;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub forms: Cache<Uuid, SharedSession>,
    pub blob_store: Arc<dyn BlobStore>,
    pub catalog: Arc<dyn ProductCatalog>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        blob_store: Arc<dyn BlobStore>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        let forms = Cache::builder()
            .max_capacity(MAX_OPEN_FORMS)
            .time_to_idle(config.form_idle_timeout)
            .build();
        Self {
            config: Arc::new(config),
            forms,
            blob_store,
            catalog,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub catalog_api_url: String,
    pub cloudinary: CloudinaryConfig,
    pub return_path: String,
    pub form_idle_timeout: Duration,
    pub image: ImageSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{} must be set", key)))
        };

        let cloudinary = CloudinaryConfig {
            cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            api_key: required("CLOUDINARY_API_KEY")?,
            api_secret: required("CLOUDINARY_API_SECRET")?,
            folder: lookup("CLOUDINARY_FOLDER").filter(|v| !v.trim().is_empty()),
        };

        let jpeg_quality: u8 = parse_or(&lookup, "IMAGE_JPEG_QUALITY", DEFAULT_JPEG_QUALITY)?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(AppError::Config(
                "IMAGE_JPEG_QUALITY must be between 1 and 100".to_string(),
            ));
        }
        let max_dimension: u32 = parse_or(&lookup, "IMAGE_MAX_DIMENSION", DEFAULT_MAX_DIMENSION)?;
        if max_dimension == 0 {
            return Err(AppError::Config(
                "IMAGE_MAX_DIMENSION must be positive".to_string(),
            ));
        }

        let idle_minutes: u64 = parse_or(&lookup, "FORM_IDLE_MINUTES", 60)?;

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            catalog_api_url: required("CATALOG_API_URL")?,
            cloudinary,
            return_path: lookup("FORM_RETURN_PATH").unwrap_or_else(|| "/admin/products".to_string()),
            form_idle_timeout: Duration::from_secs(idle_minutes * 60),
            image: ImageSettings {
                max_dimension,
                jpeg_quality,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{} must be a valid value, got '{}'", key, raw))),
        None => Ok(default),
    }
}
