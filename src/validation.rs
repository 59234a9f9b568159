// src/validation.rs

use std::collections::BTreeMap;

use validator::{Validate, ValidationError};

use crate::draft::ProductDraft;

/// Nazwa pola -> komunikat błędu. Pusta mapa oznacza poprawny szkic.
pub type FieldErrors = BTreeMap<String, String>;

pub const IMAGES_FIELD: &str = "images";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Widok pól tekstowych szkicu sprawdzany przez `validator`.
#[derive(Debug, Validate)]
struct DraftTextFields<'a> {
    #[validate(custom(function = "not_blank", message = "Nazwa produktu jest wymagana"))]
    name: &'a str,

    #[validate(custom(function = "not_blank", message = "Opis produktu jest wymagany"))]
    description: &'a str,

    #[validate(custom(function = "not_blank", message = "Cena jest wymagana"))]
    price: &'a str,

    #[validate(custom(function = "not_blank", message = "Link do płatności jest wymagany"))]
    payment_link: &'a str,
}

/// Sprawdza szkic przed zapisem: wymagane pola tekstowe i co najmniej
/// jedno zdjęcie (zapisane lub oczekujące).
pub fn validate_draft(draft: &ProductDraft) -> FieldErrors {
    let fields = DraftTextFields {
        name: draft.name(),
        description: draft.description(),
        price: draft.price(),
        payment_link: draft.payment_link(),
    };

    let mut errors = FieldErrors::new();
    if let Err(validation_errors) = fields.validate() {
        for (field, field_errors) in validation_errors.field_errors() {
            if let Some(error) = field_errors.first() {
                let message = error.message.as_ref().map_or_else(
                    || format!("Pole '{}' jest wymagane", field),
                    |m| m.to_string(),
                );
                errors.insert(field.to_string(), message);
            }
        }
    }

    if draft.total_images() == 0 {
        errors.insert(
            IMAGES_FIELD.to_string(),
            "Dodaj co najmniej jedno zdjęcie".to_string(),
        );
    }

    if !errors.is_empty() {
        tracing::debug!("Szkic niepoprawny, pola: {:?}", errors.keys());
    }
    errors
}
