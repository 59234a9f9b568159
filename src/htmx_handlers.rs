// src/htmx_handlers.rs

use std::sync::Arc;

use axum::{
    Form,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use serde_json::json;
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::errors::AppError;
use crate::forms::{self, FormSession, SharedSession, SubmitOutcome};
use crate::models::{Category, MAX_IMAGES, ProductFormFields, SelectedFile};
use crate::response::{ToastKind, build_response, toast_header};
use crate::state::AppState;
use crate::draft::ProductDraft;
use crate::validation::{FieldErrors, IMAGES_FIELD};

const IMAGE_FIELD_NAME: &str = "images";
// Kontrolki wyłączane na czas wysyłki zdjęć i zapisu.
const BUSY_CONTROLS: &str = "#product-submit, #images";

fn form_url(form_id: Uuid, action: &str) -> String {
    format!("/htmx/forms/{}/{}", form_id, action)
}

async fn find_session(app_state: &AppState, form_id: Uuid) -> Result<SharedSession, AppError> {
    app_state.forms.get(&form_id).await.ok_or_else(|| {
        tracing::warn!("Nie znaleziono formularza o ID: {}", form_id);
        AppError::FormNotFound
    })
}

async fn open_form(app_state: &AppState, draft: ProductDraft) -> (Uuid, SharedSession) {
    let form_id = Uuid::new_v4();
    let session = FormSession::shared(draft);
    app_state.forms.insert(form_id, session.clone()).await;
    (form_id, session)
}

/// Odpowiedź kończąca formularz: komunikat i powrót do listy produktów.
fn leave_form_response(return_path: &str, message: Option<&str>) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(message) = message {
        if let Some(val) = toast_header(message, ToastKind::Success) {
            headers.insert("HX-Trigger", val);
        }
    }
    let location_payload = json!({
        "path": return_path,
        "target": "#admin-content",
        "swap": "innerHTML"
    });
    if let Ok(val) = HeaderValue::from_str(&location_payload.to_string()) {
        headers.insert("HX-Location", val);
    }
    (StatusCode::OK, headers, String::new()).into_response()
}

pub async fn new_product_form_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (form_id, session) = open_form(&app_state, ProductDraft::new()).await;
    tracing::info!("Otwarto formularz nowego produktu: {}", form_id);

    let guard = session.lock().await;
    Ok(build_response(&headers, render_product_form_maud(form_id, &guard)))
}

pub async fn edit_product_form_handler(
    State(app_state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let product = app_state.catalog.fetch_product(product_id).await?;
    let (form_id, session) = open_form(&app_state, ProductDraft::from_product(&product)).await;
    tracing::info!(
        "Otwarto formularz edycji produktu {} ({} zdjęć): {}",
        product_id,
        product.images.len(),
        form_id
    );

    let guard = session.lock().await;
    Ok(build_response(&headers, render_product_form_maud(form_id, &guard)))
}

pub async fn update_form_fields_handler(
    State(app_state): State<Arc<AppState>>,
    Path(form_id): Path<Uuid>,
    Form(fields): Form<ProductFormFields>,
) -> Result<Markup, AppError> {
    let session = find_session(&app_state, form_id).await?;
    forms::update_fields(&session, &fields).await?;

    let guard = session.lock().await;
    Ok(render_product_form_maud(form_id, &guard))
}

pub async fn upload_form_images_handler(
    State(app_state): State<Arc<AppState>>,
    Path(form_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Markup, AppError> {
    let session = find_session(&app_state, form_id).await?;
    let remaining = session.lock().await.draft.remaining_capacity();

    let mut files: Vec<SelectedFile> = Vec::new();
    while let Some(mut field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => {
                tracing::warn!("Odebrano pole multipart bez nazwy, pomijam");
                continue;
            }
        };
        if field_name != IMAGE_FIELD_NAME {
            continue;
        }
        if files.len() == remaining {
            // Limit już osiągnięty: reszty plików nie buforujemy.
            if field.chunk().await?.is_some_and(|chunk| !chunk.is_empty()) {
                tracing::warn!(
                    "Partia przekracza limit zdjęć formularza {} (wolnych miejsc: {})",
                    form_id,
                    remaining
                );
                return Err(AppError::TooManyImages(MAX_IMAGES));
            }
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("zdjecie_{}", files.len() + 1));
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            tracing::warn!("Odebrano puste pole pliku: {}", filename);
            continue;
        }
        tracing::info!(
            "Odebrano plik: {}, typ: {:?}, rozmiar: {} bajtów",
            filename,
            content_type,
            bytes.len()
        );
        files.push(SelectedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    forms::ingest_images(&session, files, app_state.config.image).await?;

    let guard = session.lock().await;
    Ok(render_product_form_maud(form_id, &guard))
}

pub async fn remove_form_image_handler(
    State(app_state): State<Arc<AppState>>,
    Path((form_id, index)): Path<(Uuid, usize)>,
) -> Result<Markup, AppError> {
    let session = find_session(&app_state, form_id).await?;
    forms::remove_image(&session, index).await?;

    let guard = session.lock().await;
    Ok(render_product_form_maud(form_id, &guard))
}

pub async fn submit_form_handler(
    State(app_state): State<Arc<AppState>>,
    Path(form_id): Path<Uuid>,
    Form(fields): Form<ProductFormFields>,
) -> Result<Response, AppError> {
    let session = find_session(&app_state, form_id).await?;
    tracing::info!("Zatwierdzanie formularza {}", form_id);

    let outcome = forms::submit(
        &session,
        Some(&fields),
        app_state.blob_store.clone(),
        app_state.catalog.clone(),
    )
    .await?;

    match outcome {
        SubmitOutcome::Invalid(errors) => {
            tracing::info!(
                "Formularz {} ma błędy w polach: {:?}",
                form_id,
                errors.keys()
            );
            let guard = session.lock().await;
            Ok(render_product_form_maud(form_id, &guard).into_response())
        }
        SubmitOutcome::Saved(record) => {
            app_state.forms.invalidate(&form_id).await;
            let message = if record.id.is_some() {
                "Zapisano zmiany w produkcie."
            } else {
                "Pomyślnie dodano produkt."
            };
            Ok(leave_form_response(&app_state.config.return_path, Some(message)))
        }
    }
}

pub async fn cancel_form_handler(
    State(app_state): State<Arc<AppState>>,
    Path(form_id): Path<Uuid>,
) -> Result<Response, AppError> {
    if let Some(session) = app_state.forms.remove(&form_id).await {
        let guard = session.lock().await;
        tracing::info!(
            "Anulowano formularz {} (odrzucono {} oczekujących zdjęć)",
            form_id,
            guard.draft.pending_images().len()
        );
    }
    Ok(leave_form_response(&app_state.config.return_path, None))
}

fn render_field_error(errors: &FieldErrors, field: &str) -> Markup {
    html! {
        @if let Some(message) = errors.get(field) {
            p ."mt-1 text-xs text-red-600" id=(format!("{}-error", field)) { (message) }
        }
    }
}

fn render_text_input(
    label: &str,
    name: &str,
    value: &str,
    input_type: &str,
    errors: &FieldErrors,
    fields_url: &str,
    disabled: bool,
) -> Markup {
    html! {
        div {
            label for=(name) ."block text-sm font-medium text-gray-700 mb-1" { (label) " *" }
            input type=(input_type) name=(name) id=(name) value=(value)
                  class="admin-filter-input"
                  hx-post=(fields_url) hx-trigger="change" hx-include="closest form"
                  hx-target="#product-form" hx-swap="outerHTML"
                  disabled[disabled];
            (render_field_error(errors, name))
        }
    }
}

pub fn render_product_form_maud(form_id: Uuid, session: &FormSession) -> Markup {
    let draft = &session.draft;
    let errors = &session.errors;
    let busy = session.is_busy();
    let is_new = draft.product_id().is_none();
    let fields_url = form_url(form_id, "fields");
    let images = draft.display_images();
    let can_add_images = !busy && draft.remaining_capacity() > 0;

    let form_title = if is_new {
        "Dodaj Nowy Produkt"
    } else {
        "Edytuj Produkt"
    };
    let button_text = if is_new {
        "Dodaj Produkt"
    } else {
        "Zapisz Zmiany"
    };

    html! {
        div #product-form ."max-w-4xl mx-auto p-4 sm:p-6 lg:p-8" data-phase=(session.phase.to_string()) {
            h2 ."text-2xl sm:text-3xl font-semibold text-gray-800 mb-6" { (form_title)
                @if !is_new { ": " span ."text-pink-600" { (draft.name()) } }
            }

            form hx-post=(form_url(form_id, "submit")) hx-target="#product-form" hx-swap="outerHTML"
                 hx-disabled-elt=(BUSY_CONTROLS) hx-sync="this:drop"
                 class="space-y-8 bg-white p-6 sm:p-8 rounded-xl shadow-xl border border-gray-200" {

                section ."space-y-5" {
                    (render_text_input("Nazwa produktu", "name", draft.name(), "text", errors, &fields_url, busy))

                    div {
                        label for="category" ."block text-sm font-medium text-gray-700 mb-1" { "Kategoria" }
                        select name="category" id="category" class="admin-filter-select"
                               hx-post=(fields_url) hx-trigger="change" hx-include="closest form"
                               hx-target="#product-form" hx-swap="outerHTML"
                               disabled[busy] {
                            option value="" selected[draft.category().is_empty()] { "Wybierz kategorię" }
                            @for v in Category::iter() {
                                option value=(v.as_ref()) selected[draft.category() == v.as_ref()] { (v.to_string()) }
                            }
                        }
                    }

                    (render_text_input("Cena", "price", draft.price(), "text", errors, &fields_url, busy))

                    div {
                        label for="description" ."block text-sm font-medium text-gray-700 mb-1" { "Opis produktu *" }
                        textarea name="description" id="description" rows="6" class="admin-filter-input"
                                 hx-post=(fields_url) hx-trigger="change" hx-include="closest form"
                                 hx-target="#product-form" hx-swap="outerHTML"
                                 disabled[busy] { (draft.description()) }
                        (render_field_error(errors, "description"))
                    }

                    (render_text_input("Link do płatności", "payment_link", draft.payment_link(), "url", errors, &fields_url, busy))
                }

                section {
                    h3 ."text-xl font-semibold text-gray-700 mb-2 pb-2 border-b border-gray-200" { "Zdjęcia Produktu" }
                    p ."text-xs text-gray-500 mb-4" {
                        "Dodaj od 1 do " (MAX_IMAGES) " zdjęć. Pierwsze zdjęcie będzie zdjęciem głównym."
                    }
                    div #product-images ."grid grid-cols-2 sm:grid-cols-3 md:grid-cols-5 gap-4" {
                        @for image in &images {
                            @let border = if image.is_main { "border-pink-500" } else { "border-gray-300" };
                            div class=(format!("relative aspect-square border-2 rounded-lg group {}", border)) {
                                img src=(image.src) alt=(format!("Zdjęcie {}", image.index + 1))
                                    class="w-full h-full object-cover rounded-md";
                                @if image.is_main {
                                    span ."absolute bottom-1 left-1 px-1.5 py-0.5 text-xs bg-pink-600 text-white rounded" { "Główne" }
                                }
                                @if image.is_pending {
                                    span ."absolute bottom-1 right-1 px-1.5 py-0.5 text-xs bg-gray-700 text-white rounded" { "Nowe" }
                                }
                                button type="button"
                                       hx-post=(form_url(form_id, &format!("images/{}/remove", image.index)))
                                       hx-target="#product-form" hx-swap="outerHTML"
                                       disabled[busy]
                                       class="absolute top-1 right-1 bg-red-600 text-white rounded-full w-5 h-5 text-xs"
                                       title="Usuń to zdjęcie" { "×" }
                            }
                        }
                    }
                    div ."mt-4" {
                        label for="images" ."block text-sm font-medium text-gray-700 mb-1" {
                            "Dodaj zdjęcia (" (draft.total_images()) "/" (MAX_IMAGES) ")"
                        }
                        input type="file" name=(IMAGE_FIELD_NAME) id="images" multiple
                              accept="image/jpeg,image/png,image/webp"
                              hx-post=(form_url(form_id, "images")) hx-encoding="multipart/form-data"
                              hx-trigger="change" hx-target="#product-form" hx-swap="outerHTML"
                              hx-disabled-elt=(BUSY_CONTROLS) hx-sync="closest form:drop"
                              disabled[!can_add_images];
                        (render_field_error(errors, IMAGES_FIELD))
                    }
                }

                section ."pt-8 border-t border-gray-200 mt-8" {
                    div ."flex flex-col sm:flex-row justify-end items-center gap-3" {
                        button type="button" hx-post=(form_url(form_id, "cancel"))
                               class="px-6 py-2.5 text-sm font-medium text-gray-700 bg-white border border-gray-300 rounded-lg" {
                            "Anuluj"
                        }
                        button type="submit" disabled[busy] id="product-submit"
                               class="px-8 py-2.5 text-sm font-medium rounded-lg text-white bg-pink-600 hover:bg-pink-700" {
                            @if session.phase == forms::FormPhase::Submitting { "Zapisywanie..." } @else { (button_text) }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::tests::pending;
    use crate::forms::FormPhase;
    use crate::forms::tests::{FakeBlobStore, FakeCatalog};
    use crate::image_pipeline::tests::png_file;
    use crate::models::{Product, STARTER_PRICE};
    use crate::router;
    use crate::image_pipeline::ImageSettings;
    use crate::state::{AppConfig, CloudinaryConfig};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config() -> AppConfig {
        AppConfig {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            catalog_api_url: "http://catalog.local".to_string(),
            cloudinary: CloudinaryConfig {
                cloud_name: "demo".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
                folder: None,
            },
            return_path: "/admin/products".to_string(),
            form_idle_timeout: Duration::from_secs(600),
            image: ImageSettings::default(),
        }
    }

    fn test_state(catalog: FakeCatalog) -> (Arc<AppState>, Arc<FakeCatalog>) {
        let catalog = Arc::new(catalog);
        let state = Arc::new(AppState::new(
            test_config(),
            Arc::new(FakeBlobStore::default()),
            catalog.clone(),
        ));
        (state, catalog)
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form_post(uri: String, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("HX-Request", "true")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn images_post(form_id: Uuid, files: &[SelectedFile]) -> Request<Body> {
        let boundary = "X-GRANICA";
        let mut body = Vec::new();
        for file in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                    boundary, file.filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(&file.bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method("POST")
            .uri(form_url(form_id, "images"))
            .header("HX-Request", "true")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn new_form_renders_empty_draft() {
        let (state, _) = test_state(FakeCatalog::default());
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/admin/products/new")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Dodaj Nowy Produkt"));
        state.forms.run_pending_tasks().await;
        assert_eq!(state.forms.entry_count(), 1);
    }

    #[tokio::test]
    async fn edit_form_loads_product_from_catalog() {
        let catalog = FakeCatalog {
            products: vec![Product {
                id: 5,
                name: "Sklep z kawą".to_string(),
                description: "Opis".to_string(),
                price: "250".to_string(),
                payment_link: "https://pay.example.com/5".to_string(),
                category: "Inne".to_string(),
                images: vec!["https://img.example.com/kawa.jpg".to_string()],
            }],
            ..Default::default()
        };
        let (state, _) = test_state(catalog);
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/products/5/edit")
                    .header("HX-Request", "true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("Sklep z kawą"));
        assert!(html.contains("https://img.example.com/kawa.jpg"));
        assert!(!html.starts_with("<!DOCTYPE html>"));

        let missing = app
            .oneshot(
                Request::builder()
                    .uri("/admin/products/99/edit")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn choosing_starter_category_fills_price() {
        let (state, _) = test_state(FakeCatalog::default());
        let (form_id, session) = open_form(&state, ProductDraft::new()).await;

        let response = router(state)
            .oneshot(form_post(
                form_url(form_id, "fields"),
                "name=Sklep&price=10&description=x&payment_link=&category=Starter+Package",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains(&format!("value=\"{}\"", STARTER_PRICE)));

        let guard = session.lock().await;
        assert_eq!(guard.draft.price(), STARTER_PRICE);
        assert_eq!(guard.draft.name(), "Sklep");
    }

    #[tokio::test]
    async fn invalid_submit_renders_inline_errors() {
        let (state, catalog) = test_state(FakeCatalog::default());
        let (form_id, _) = open_form(&state, ProductDraft::new()).await;

        let response = router(state)
            .oneshot(form_post(
                form_url(form_id, "submit"),
                "name=Sklep&price=&description=Opis&payment_link=https%3A%2F%2Fpay.example.com&category=",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("price-error"));
        assert!(html.contains("images-error"));
        assert!(!html.contains("name-error"));
        assert!(catalog.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_submit_saves_and_closes_form() {
        let (state, catalog) = test_state(FakeCatalog::default());
        let mut draft = ProductDraft::new();
        draft.append_pending(vec![pending("a")]).unwrap();
        let (form_id, _) = open_form(&state, draft).await;

        let response = router(state.clone())
            .oneshot(form_post(
                form_url(form_id, "submit"),
                "name=Sklep&price=100&description=Opis&payment_link=https%3A%2F%2Fpay.example.com&category=Inne",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("HX-Location"));
        assert!(response.headers().contains_key("HX-Trigger"));

        let saved = catalog.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, None);
        assert_eq!(saved[0].payment_link, "https://pay.example.com");
        assert_eq!(saved[0].images, vec!["https://img.example.com/0.jpg".to_string()]);
        assert!(state.forms.get(&form_id).await.is_none());
    }

    #[tokio::test]
    async fn image_upload_adds_pending_images() {
        let (state, _) = test_state(FakeCatalog::default());
        let (form_id, session) = open_form(&state, ProductDraft::new()).await;

        let response = router(state)
            .oneshot(images_post(form_id, &[png_file("logo.png", 40, 20)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("data:image/jpeg;base64,"));

        let guard = session.lock().await;
        assert_eq!(guard.draft.pending_images().len(), 1);
        assert_eq!(guard.draft.pending_images()[0].width, 40);
    }

    #[tokio::test]
    async fn image_upload_over_limit_is_rejected() {
        let (state, _) = test_state(FakeCatalog::default());
        let mut draft = ProductDraft::new();
        draft
            .append_pending(vec![pending("a"), pending("b"), pending("c"), pending("d")])
            .unwrap();
        let (form_id, session) = open_form(&state, draft.clone()).await;

        let files = [png_file("x.png", 8, 8), png_file("y.png", 8, 8)];
        let response = router(state)
            .oneshot(images_post(form_id, &files))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let guard = session.lock().await;
        assert_eq!(guard.draft, draft);
        assert!(!guard.is_busy());
    }

    #[tokio::test]
    async fn remove_and_cancel() {
        let (state, _) = test_state(FakeCatalog::default());
        let mut draft = ProductDraft::new();
        draft.append_pending(vec![pending("a"), pending("b")]).unwrap();
        let (form_id, session) = open_form(&state, draft).await;
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(form_post(form_url(form_id, "images/0/remove"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(session.lock().await.draft.pending_images(), &[pending("b")]);

        let response = app
            .clone()
            .oneshot(form_post(form_url(form_id, "images/4/remove"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(form_post(form_url(form_id, "cancel"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("HX-Location"));
        assert!(state.forms.get(&form_id).await.is_none());

        let response = app
            .oneshot(form_post(form_url(form_id, "fields"), "name=x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upload_and_submit_share_disabled_controls() {
        let session = FormSession::new(ProductDraft::new());
        let html = render_product_form_maud(Uuid::new_v4(), &session).into_string();
        assert!(html.contains("id=\"product-submit\""));
        assert_eq!(
            html.matches("hx-disabled-elt=\"#product-submit, #images\"").count(),
            2
        );
    }

    #[test]
    fn busy_form_disables_controls() {
        let mut session = FormSession::new(ProductDraft::new());
        session.phase = FormPhase::Submitting;
        let html = render_product_form_maud(Uuid::new_v4(), &session).into_string();
        assert!(html.contains("Zapisywanie..."));
        assert!(html.contains("data-phase=\"Submitting\""));
        assert!(html.contains("type=\"submit\" disabled"));
    }
}
