// src/response.rs

use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use maud::{DOCTYPE, Markup, html};
use serde_json::json;
use strum_macros::AsRefStr;

#[derive(Debug, Clone, Copy, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

/// Nagłówek `HX-Trigger` z komunikatem `showMessage`.
///
/// Znaki spoza ASCII są zapisywane jako `\uXXXX`, bo przeglądarka czyta
/// nagłówki jako Latin-1.
pub fn toast_header(message: &str, kind: ToastKind) -> Option<HeaderValue> {
    let payload = json!({
        "showMessage": {
            "message": message,
            "type": kind.as_ref()
        }
    })
    .to_string();

    let mut escaped = String::with_capacity(payload.len());
    for c in payload.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    HeaderValue::from_str(&escaped).ok()
}

fn page_shell(content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="pl" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Panel administracyjny" }
                script src="https://unpkg.com/htmx.org@2.0.4" {}
                script src="https://cdn.tailwindcss.com" {}
            }
            body ."bg-gray-50" {
                div #admin-content { (content) }
                div #toast-container ."fixed bottom-4 right-4 space-y-2" {}
            }
        }
    }
}

/// Dla żądań HTMX zwraca sam fragment, dla pełnego odświeżenia całą stronę.
pub fn build_response(headers: &HeaderMap, page_content: Markup) -> Response {
    if headers.contains_key("HX-Request") {
        page_content.into_response()
    } else {
        page_shell(page_content).into_response()
    }
}
