// src/blob_store.rs

use async_trait::async_trait;

use crate::errors::AppError;

/// Zewnętrzny magazyn zdjęć.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Wysyła zdjęcia zakodowane jako data URL i zwraca trwałe URL-e
    /// w tej samej kolejności. Błąd dowolnego zdjęcia to błąd całości.
    async fn upload_multiple_images(&self, images: Vec<String>) -> Result<Vec<String>, AppError>;
}
