#![forbid(unsafe_code)]

use async_trait::async_trait;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use contactd_model::{ContactDocument, ContactId};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

mod config;
mod context;
mod http;
mod store;
mod telemetry;

pub const CRATE_NAME: &str = "contactd-server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Connectivity or timeout talking to the store.
    Unavailable,
    /// The store rejected or failed the query itself.
    QueryFailed,
    /// The document at the target identity belongs to another record kind.
    Conflict,
    /// The store answered with something the model cannot accept.
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Unavailable,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::QueryFailed,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Conflict,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Corrupt,
            message: message.into(),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}

/// The sole boundary between the service and the document store. Identity
/// is the store key; `upsert` with no id asks the store to assign one.
#[async_trait]
pub trait ContactStoreBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn query_by_type(
        &self,
        doc_type: &str,
    ) -> Result<Vec<(ContactId, ContactDocument)>, StoreError>;

    async fn get(&self, id: &ContactId) -> Result<Option<ContactDocument>, StoreError>;

    async fn upsert(
        &self,
        id: Option<&ContactId>,
        doc: &ContactDocument,
    ) -> Result<ContactId, StoreError>;

    async fn delete(&self, id: &ContactId) -> Result<(), StoreError>;
}

pub use config::{validate_startup_config, ApiConfig, CONFIG_SCHEMA_VERSION};
pub use context::ContactContext;
pub use store::backends::{HttpStoreBackend, RetryPolicy};
pub use store::memory::MemoryStore;

use telemetry::RequestMetrics;

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ContactContext>,
    pub api: ApiConfig,
    pub ready: Arc<AtomicBool>,
    pub accepting_requests: Arc<AtomicBool>,
    pub(crate) metrics: Arc<RequestMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(context: Arc<ContactContext>) -> Self {
        Self::with_config(context, ApiConfig::default())
    }

    #[must_use]
    pub fn with_config(context: Arc<ContactContext>, api: ApiConfig) -> Self {
        Self {
            context,
            api,
            ready: Arc::new(AtomicBool::new(true)),
            accepting_requests: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/readyz", get(http::handlers::readyz_handler))
        .route("/metrics", get(http::handlers::metrics_handler))
        .route("/v1/version", get(http::handlers::version_handler))
        .route(
            "/contacts",
            get(http::handlers::list_contacts_handler).post(http::handlers::create_contact_handler),
        )
        .route("/contacts/new", get(http::handlers::new_contact_form_handler))
        .route(
            "/contacts/:id",
            get(http::handlers::contact_details_handler)
                .put(http::handlers::update_contact_handler)
                .delete(http::handlers::delete_contact_handler),
        )
        .route(
            "/contacts/:id/edit",
            get(http::handlers::edit_contact_form_handler),
        )
        .route(
            "/contacts/:id/delete",
            get(http::handlers::delete_confirm_handler),
        )
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .with_state(state)
}
