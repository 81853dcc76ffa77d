//! Fetch → paginate → mutate → refetch for one server-paginated collection.
//!
//! State lives in a `watch` channel; every write goes through that single
//! sender, and each fetch carries a monotonic request id so that only the most
//! recently issued request may overwrite the page. A detached controller (its
//! screen was left) ignores late responses entirely.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use shared::{
    domain::{Order, OrderId, OrderStatus},
    error::ApiError,
    protocol::PageData,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::ApiFailure,
    transport::{OrderStatusBackend, ResourceBackend},
    Resource,
};

/// Records per page; fixed by the backend contract.
pub const PAGE_SIZE: u32 = 5;

/// The create/edit form a screen currently has open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormSurface<Id> {
    Closed,
    Create,
    Edit(Id),
}

#[derive(Debug, Clone)]
pub struct ResourceListState<R: Resource> {
    pub items: Vec<R>,
    pub page: u32,
    pub total_pages: u32,
    pub loading: bool,
    pub error: Option<ApiError>,
    pub form: FormSurface<R::Id>,
    /// Last failed mutation; kept apart from `error` so the table stays visible.
    pub mutation_error: Option<ApiError>,
}

impl<R: Resource> Default for ResourceListState<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            total_pages: 1,
            loading: false,
            error: None,
            form: FormSurface::Closed,
            mutation_error: None,
        }
    }
}

impl<R: Resource> ResourceListState<R> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// What happened to the response of one `fetch_page` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed(ApiError),
    /// A newer request was issued before this one answered.
    Superseded,
    Detached,
}

struct ListCell<R: Resource> {
    state: watch::Sender<ResourceListState<R>>,
    latest_request: AtomicU64,
    mounted: AtomicBool,
}

impl<R: Resource> ListCell<R> {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    fn begin_request(&self) -> Option<u64> {
        if !self.is_mounted() {
            return None;
        }
        let mut request_id = 0;
        self.state.send_modify(|state| {
            request_id = self.latest_request.fetch_add(1, Ordering::AcqRel) + 1;
            state.loading = true;
            state.error = None;
        });
        Some(request_id)
    }

    fn finish_fetch(
        &self,
        request_id: u64,
        result: Result<PageData<R>, ApiFailure>,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::Superseded;
        self.state.send_if_modified(|state| {
            if !self.is_mounted() {
                outcome = FetchOutcome::Detached;
                return false;
            }
            if self.latest_request.load(Ordering::Acquire) != request_id {
                return false;
            }

            state.loading = false;
            match result {
                Ok(page) => {
                    state.items = page.docs;
                    state.total_pages = page.total_pages;
                    state.page = page.page;
                    outcome = FetchOutcome::Applied;
                }
                Err(failure) => {
                    let error = failure.into_api_error(format!("Failed to fetch {}.", R::COLLECTION));
                    state.error = Some(error.clone());
                    outcome = FetchOutcome::Failed(error);
                }
            }
            true
        });
        outcome
    }

    fn modify_if_mounted(&self, apply: impl FnOnce(&mut ResourceListState<R>)) {
        if self.is_mounted() {
            self.state.send_modify(apply);
        }
    }
}

pub struct PaginatedResourceController<R: Resource, B> {
    backend: Arc<B>,
    cell: Arc<ListCell<R>>,
}

impl<R: Resource, B> Clone for PaginatedResourceController<R, B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<R, B> PaginatedResourceController<R, B>
where
    R: Resource,
    B: ResourceBackend<R> + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        let (state, _) = watch::channel(ResourceListState::default());
        Self {
            backend,
            cell: Arc::new(ListCell {
                state,
                latest_request: AtomicU64::new(0),
                mounted: AtomicBool::new(true),
            }),
        }
    }

    pub fn snapshot(&self) -> ResourceListState<R> {
        self.cell.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceListState<R>> {
        self.cell.state.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.cell.is_mounted()
    }

    /// Marks the owning screen as gone. In-flight requests still complete but
    /// their responses are dropped.
    pub fn detach(&self) {
        if self.cell.mounted.swap(false, Ordering::AcqRel) {
            debug!(collection = R::COLLECTION, "controller detached");
        }
    }

    /// Loads `page_no`. The page reported by the server replaces the requested
    /// one. Presentation code should navigate through [`Self::change_page`].
    pub async fn fetch_page(&self, page_no: u32) -> FetchOutcome {
        let page_no = page_no.max(1);
        let Some(request_id) = self.cell.begin_request() else {
            return FetchOutcome::Detached;
        };
        debug!(collection = R::COLLECTION, page = page_no, request_id, "fetching page");

        let result = self.backend.fetch_page(page_no, PAGE_SIZE).await;
        let outcome = self.cell.finish_fetch(request_id, result);
        match &outcome {
            FetchOutcome::Superseded => debug!(
                collection = R::COLLECTION,
                request_id, "discarding superseded page response"
            ),
            FetchOutcome::Detached => debug!(
                collection = R::COLLECTION,
                request_id, "discarding response for detached controller"
            ),
            FetchOutcome::Failed(error) => warn!(
                collection = R::COLLECTION,
                page = page_no,
                kind = ?error.kind,
                message = %error.message,
                "page fetch failed"
            ),
            FetchOutcome::Applied => {}
        }
        outcome
    }

    /// Moves `delta` pages if the target stays inside `[1, total_pages]`;
    /// returns `None` without touching the network otherwise.
    pub async fn change_page(&self, delta: i32) -> Option<FetchOutcome> {
        let (page, total_pages) = {
            let state = self.cell.state.borrow();
            (state.page, state.total_pages)
        };
        let target = i64::from(page) + i64::from(delta);
        if target < 1 || target > i64::from(total_pages) {
            debug!(
                collection = R::COLLECTION,
                page, delta, total_pages, "page change out of range ignored"
            );
            return None;
        }
        let target = u32::try_from(target).ok()?;
        Some(self.fetch_page(target).await)
    }

    pub async fn refresh(&self) -> FetchOutcome {
        let page = self.cell.state.borrow().page;
        self.fetch_page(page).await
    }

    pub fn open_create_form(&self) {
        self.cell.modify_if_mounted(|state| {
            state.form = FormSurface::Create;
            state.mutation_error = None;
        });
    }

    pub fn open_edit_form(&self, id: R::Id) {
        self.cell.modify_if_mounted(|state| {
            state.form = FormSurface::Edit(id);
            state.mutation_error = None;
        });
    }

    pub fn close_form(&self) {
        self.cell.modify_if_mounted(|state| {
            state.form = FormSurface::Closed;
            state.mutation_error = None;
        });
    }

    pub async fn create(&self, draft: &R::Draft) -> Result<FetchOutcome, ApiError> {
        let result = self.backend.create(draft).await;
        self.settle_mutation("create", Self::fallback("create"), result)
            .await
    }

    pub async fn update(&self, id: &R::Id, patch: &R::Patch) -> Result<FetchOutcome, ApiError> {
        let result = self.backend.update(id, patch).await;
        self.settle_mutation("update", Self::fallback("update"), result)
            .await
    }

    fn fallback(verb: &str) -> String {
        format!("Failed to {verb} {}.", R::SINGULAR)
    }

    /// Success closes the form and reloads the page the operator is on;
    /// failure leaves both the form and the listed items alone.
    async fn settle_mutation(
        &self,
        verb: &'static str,
        fallback: String,
        result: Result<(), ApiFailure>,
    ) -> Result<FetchOutcome, ApiError> {
        match result {
            Ok(()) => {
                info!(collection = R::COLLECTION, verb, "mutation accepted; refreshing current page");
                self.close_form();
                Ok(self.refresh().await)
            }
            Err(failure) => {
                let error = failure.into_api_error(fallback);
                warn!(
                    collection = R::COLLECTION,
                    verb,
                    kind = ?error.kind,
                    message = %error.message,
                    "mutation failed"
                );
                let recorded = error.clone();
                self.cell
                    .modify_if_mounted(|state| state.mutation_error = Some(recorded));
                Err(error)
            }
        }
    }
}

impl<B> PaginatedResourceController<Order, B>
where
    B: ResourceBackend<Order> + OrderStatusBackend + 'static,
{
    pub async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<FetchOutcome, ApiError> {
        let result = self.backend.update_status(id, status).await;
        self.settle_mutation(
            "update status",
            "Failed to update order status.".to_owned(),
            result,
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
