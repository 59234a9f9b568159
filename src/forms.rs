// src/forms.rs

use std::sync::Arc;

use strum_macros::Display;
use tokio::sync::Mutex;

use crate::blob_store::BlobStore;
use crate::catalog::ProductCatalog;
use crate::draft::{ProductDraft, RemovedImage};
use crate::errors::AppError;
use crate::image_pipeline::{ImageSettings, process_batch};
use crate::models::{ProductFormFields, ProductRecord, SelectedFile};
use crate::validation::{FieldErrors, validate_draft};

pub type SharedSession = Arc<Mutex<FormSession>>;

/// Faza formularza. Poza `Idle` wszystkie zmiany szkicu są blokowane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FormPhase {
    Idle,
    Ingesting,
    Submitting,
}

/// Stan jednego otwartego formularza.
#[derive(Debug, Clone)]
pub struct FormSession {
    pub draft: ProductDraft,
    pub phase: FormPhase,
    pub errors: FieldErrors,
}

impl FormSession {
    pub fn new(draft: ProductDraft) -> Self {
        Self {
            draft,
            phase: FormPhase::Idle,
            errors: FieldErrors::new(),
        }
    }

    pub fn shared(draft: ProductDraft) -> SharedSession {
        Arc::new(Mutex::new(Self::new(draft)))
    }

    pub fn is_busy(&self) -> bool {
        self.phase != FormPhase::Idle
    }

    /// Odświeża komunikaty tylko wtedy, gdy są już wyświetlane.
    fn refresh_errors(&mut self) {
        if !self.errors.is_empty() {
            self.errors = validate_draft(&self.draft);
        }
    }

    fn ensure_idle(&self) -> Result<(), AppError> {
        if self.is_busy() {
            tracing::warn!("Formularz zajęty ({}), odrzucam zmianę", self.phase);
            return Err(AppError::Busy);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Rekord oddany do katalogu.
    Saved(ProductRecord),
    /// Szkic niepoprawny, nic nie zostało wysłane.
    Invalid(FieldErrors),
}

pub async fn update_fields(
    session: &SharedSession,
    fields: &ProductFormFields,
) -> Result<(), AppError> {
    let mut guard = session.lock().await;
    guard.ensure_idle()?;
    guard.draft.apply_fields(fields);
    guard.refresh_errors();
    Ok(())
}

pub async fn remove_image(session: &SharedSession, index: usize) -> Result<(), AppError> {
    let mut guard = session.lock().await;
    guard.ensure_idle()?;
    match guard.draft.remove_image(index)? {
        RemovedImage::Persisted(url) => {
            tracing::info!("Usunięto zapisane zdjęcie z formularza: {}", url)
        }
        RemovedImage::Pending(image) => tracing::info!(
            "Usunięto oczekujące zdjęcie {}x{} z formularza",
            image.width,
            image.height
        ),
    }
    guard.refresh_errors();
    Ok(())
}

/// Przyjmuje partię wybranych plików: całą albo wcale.
///
/// Blokada nie jest trzymana w trakcie dekodowania; faza `Ingesting`
/// wyklucza w tym czasie inne zmiany formularza. Dekodowanie i zapis wyniku
/// działają w osobnym zadaniu, które zawsze przywraca `Idle`, nawet gdy
/// klient rozłączy się w trakcie.
pub async fn ingest_images(
    session: &SharedSession,
    files: Vec<SelectedFile>,
    settings: ImageSettings,
) -> Result<usize, AppError> {
    if files.is_empty() {
        return Ok(0);
    }

    {
        let mut guard = session.lock().await;
        guard.ensure_idle()?;
        guard.draft.ensure_capacity_for(files.len())?;
        guard.phase = FormPhase::Ingesting;
    }

    tokio::spawn(decode_and_commit(session.clone(), files, settings)).await?
}

async fn decode_and_commit(
    session: SharedSession,
    files: Vec<SelectedFile>,
    settings: ImageSettings,
) -> Result<usize, AppError> {
    let count = files.len();
    tracing::info!("Przetwarzanie partii {} zdjęć", count);
    let result = process_batch(files, settings).await;

    let mut guard = session.lock().await;
    guard.phase = FormPhase::Idle;
    let images = result?;
    guard.draft.append_pending(images)?;
    guard.refresh_errors();
    tracing::info!(
        "Dodano {} zdjęć, w formularzu jest ich {}",
        count,
        guard.draft.total_images()
    );
    Ok(count)
}

/// Zatwierdza formularz: walidacja, wysłanie oczekujących zdjęć, scalenie
/// URL-i i przekazanie rekordu do katalogu.
///
/// Przy błędzie wysyłki lub zapisu szkic zostaje bez zmian, a formularz
/// wraca do `Idle`. Wysyłka i zatwierdzenie wyniku działają w osobnym
/// zadaniu, więc zerwane żądanie nie zostawia formularza w `Submitting`.
pub async fn submit(
    session: &SharedSession,
    fields: Option<&ProductFormFields>,
    blob_store: Arc<dyn BlobStore>,
    catalog: Arc<dyn ProductCatalog>,
) -> Result<SubmitOutcome, AppError> {
    let snapshot = {
        let mut guard = session.lock().await;
        guard.ensure_idle()?;
        if let Some(fields) = fields {
            guard.draft.apply_fields(fields);
        }
        let errors = validate_draft(&guard.draft);
        guard.errors = errors.clone();
        if !errors.is_empty() {
            return Ok(SubmitOutcome::Invalid(errors));
        }
        guard.phase = FormPhase::Submitting;
        guard.draft.clone()
    };

    tokio::spawn(upload_and_commit(session.clone(), snapshot, blob_store, catalog)).await?
}

async fn upload_and_commit(
    session: SharedSession,
    snapshot: ProductDraft,
    blob_store: Arc<dyn BlobStore>,
    catalog: Arc<dyn ProductCatalog>,
) -> Result<SubmitOutcome, AppError> {
    let result = upload_and_save(&snapshot, blob_store.as_ref(), catalog.as_ref()).await;

    let mut guard = session.lock().await;
    guard.phase = FormPhase::Idle;
    let record = result?;
    guard.draft.promote_pending(record.images.clone());
    Ok(SubmitOutcome::Saved(record))
}

async fn upload_and_save(
    draft: &ProductDraft,
    blob_store: &dyn BlobStore,
    catalog: &dyn ProductCatalog,
) -> Result<ProductRecord, AppError> {
    let pending = draft.pending_data_urls();
    let uploaded = if pending.is_empty() {
        Vec::new()
    } else {
        let expected = pending.len();
        tracing::info!("Wysyłanie {} oczekujących zdjęć", expected);
        let urls = blob_store.upload_multiple_images(pending).await?;
        if urls.len() != expected {
            return Err(AppError::Upload(format!(
                "magazyn zwrócił {} URL-i dla {} zdjęć",
                urls.len(),
                expected
            )));
        }
        urls
    };

    let record = draft.to_record(draft.merged_images(uploaded));
    catalog.save_product(record.clone()).await?;
    Ok(record)
}
