// src/errors.rs

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinError;

use crate::response::{ToastKind, toast_header};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Nie znaleziono zasobu")]
    NotFound,

    #[error("Formularz wygasł lub nie istnieje")]
    FormNotFound,

    #[error("Nieprawidłowe dane wejściowe: {0}")]
    UnprocessableEntity(String),

    #[error("Przekroczono limit {0} zdjęć")]
    TooManyImages(usize),

    #[error("Nie można odczytać obrazu: {0}")]
    ImageDecode(String),

    #[error("Błąd wysyłania obrazów: {0}")]
    Upload(String),

    #[error("Błąd katalogu produktów: {0}")]
    Catalog(String),

    #[error("Trwa inna operacja na formularzu")]
    Busy,

    #[error("Wewnętrzny błąd serwera")]
    InternalServerError(String),

    #[error("Błąd konfiguracji: {0}")]
    Config(String),
}

impl AppError {
    /// Komunikat dla użytkownika. Szczegóły błędów zewnętrznych trafiają
    /// wyłącznie do logów.
    fn user_message(&self) -> String {
        match self {
            AppError::NotFound => "Nie znaleziono zasobu".to_string(),
            AppError::FormNotFound => {
                "Formularz wygasł. Odśwież stronę i spróbuj ponownie.".to_string()
            }
            AppError::UnprocessableEntity(message) => message.clone(),
            AppError::TooManyImages(max) => {
                format!("Możesz dodać maksymalnie {} zdjęć.", max)
            }
            AppError::ImageDecode(_) => {
                "Nie udało się przetworzyć wybranych zdjęć. Spróbuj ponownie.".to_string()
            }
            AppError::Upload(_) | AppError::Catalog(_) => {
                "Nie udało się zapisać produktu. Spróbuj ponownie.".to_string()
            }
            AppError::Busy => {
                "Poczekaj na zakończenie trwającej operacji.".to_string()
            }
            AppError::InternalServerError(message) => message.clone(),
            AppError::Config(message) => message.clone(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound | AppError::FormNotFound => StatusCode::NOT_FOUND,
            AppError::UnprocessableEntity(_)
            | AppError::TooManyImages(_)
            | AppError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upload(_) | AppError::Catalog(_) => StatusCode::BAD_GATEWAY,
            AppError::Busy => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Upload(detail) | AppError::Catalog(detail) => {
                tracing::error!("{}: {}", self, detail);
            }
            AppError::InternalServerError(detail) | AppError::Config(detail) => {
                tracing::error!("Wewnętrzny błąd serwera: {}", detail);
            }
            AppError::ImageDecode(detail) => {
                tracing::warn!("Odrzucono partię zdjęć: {}", detail);
            }
            _ => tracing::warn!("Żądanie odrzucone: {}", self),
        }

        let error_message = self.user_message();
        let mut response = (status, Json(json!({ "error": error_message }))).into_response();

        // HTMX pokazuje komunikat jako toast, nawet gdy nie podmienia treści
        if let Some(val) = toast_header(&error_message, ToastKind::Error) {
            response.headers_mut().insert("HX-Trigger", val);
        }
        response
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        tracing::error!("Błąd przetwarzania Multipart: {:?}", err);
        AppError::UnprocessableEntity(format!("Błąd przetwarzania danych formularza: {}", err))
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::ImageDecode(err.to_string())
    }
}

impl From<JoinError> for AppError {
    fn from(err: JoinError) -> Self {
        AppError::InternalServerError(format!("Zadanie przetwarzania przerwane: {}", err))
    }
}
