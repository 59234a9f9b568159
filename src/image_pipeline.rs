// src/image_pipeline.rs

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use futures::future::try_join_all;
use image::{ColorType, GenericImageView, codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::errors::AppError;
use crate::models::{PendingImage, SelectedFile};

pub const DEFAULT_MAX_DIMENSION: u32 = 1920;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSettings {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Wymiary docelowe z zachowaniem proporcji: dłuższy bok skalowany do
/// `max_dimension`, krótszy zaokrąglany, nigdy poniżej 1 px.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let scale = |side: u32, longest: u32| -> u32 {
        let scaled = (side as f64 * max_dimension as f64 / longest as f64).round() as u32;
        scaled.clamp(1, max_dimension)
    };
    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

/// Dekoduje jeden plik, zmniejsza go w razie potrzeby i koduje jako JPEG
/// w postaci data URL.
pub fn encode_image(file: &SelectedFile, settings: ImageSettings) -> Result<PendingImage, AppError> {
    let decoded = image::load_from_memory(&file.bytes).map_err(|e| {
        AppError::ImageDecode(format!("plik '{}': {}", file.filename, e))
    })?;
    let (width, height) = decoded.dimensions();
    let (target_width, target_height) = target_dimensions(width, height, settings.max_dimension);

    let resized = if (target_width, target_height) != (width, height) {
        tracing::debug!(
            "Zmniejszanie '{}' z {}x{} do {}x{}",
            file.filename,
            width,
            height,
            target_width,
            target_height
        );
        decoded.resize_exact(target_width, target_height, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = resized.to_rgb8();
    let mut jpeg_bytes = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut jpeg_bytes, settings.jpeg_quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    let jpeg_bytes = jpeg_bytes.into_inner();

    tracing::debug!(
        "Zakodowano '{}' ({}, {} -> {} bajtów)",
        file.filename,
        file.content_type.as_deref().unwrap_or("brak typu"),
        file.bytes.len(),
        jpeg_bytes.len()
    );

    Ok(PendingImage {
        data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg_bytes)),
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Przetwarza całą partię równolegle. Wynik jest w kolejności wejścia;
/// błąd dowolnego pliku odrzuca całą partię.
pub async fn process_batch(
    files: Vec<SelectedFile>,
    settings: ImageSettings,
) -> Result<Vec<PendingImage>, AppError> {
    let tasks = files.into_iter().map(|file| async move {
        tokio::task::spawn_blocking(move || encode_image(&file, settings)).await?
    });
    try_join_all(tasks).await
}
