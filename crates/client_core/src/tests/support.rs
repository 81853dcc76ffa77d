//! In-memory backends shared by the session, guard and controller tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Customer, CustomerId, Order, OrderId, OrderStatus},
    protocol::{CustomerDraft, CustomerPatch, NewOrder, OrderPatch, PageData},
};
use tokio::sync::oneshot;

use crate::{
    error::ApiFailure,
    transport::{AuthBackend, OrderStatusBackend, ResourceBackend},
};

pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn pass_gate(gate: &Mutex<Option<oneshot::Receiver<()>>>) {
    let waiting = gate.lock().expect("gate lock").take();
    if let Some(waiting) = waiting {
        let _ = waiting.await;
    }
}

fn hold_gate(gate: &Mutex<Option<oneshot::Receiver<()>>>) -> oneshot::Sender<()> {
    let (release, waiting) = oneshot::channel();
    *gate.lock().expect("gate lock") = Some(waiting);
    release
}

/// Auth backend for a session nobody wired up; every call fails as a
/// transport error.
pub(crate) struct MissingAuthBackend;

#[async_trait]
impl AuthBackend for MissingAuthBackend {
    async fn check_auth(&self) -> Result<bool, ApiFailure> {
        Err(ApiFailure::Transport("auth backend is unavailable".into()))
    }

    async fn logout(&self) -> Result<(), ApiFailure> {
        Err(ApiFailure::Transport("auth backend is unavailable".into()))
    }
}

pub(crate) struct ScriptedAuth {
    checks: Mutex<VecDeque<Result<bool, ApiFailure>>>,
    logout_result: Mutex<Result<(), ApiFailure>>,
    check_gate: Mutex<Option<oneshot::Receiver<()>>>,
    logout_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub check_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl ScriptedAuth {
    pub(crate) fn new(checks: impl IntoIterator<Item = Result<bool, ApiFailure>>) -> Self {
        Self {
            checks: Mutex::new(checks.into_iter().collect()),
            logout_result: Mutex::new(Ok(())),
            check_gate: Mutex::new(None),
            logout_gate: Mutex::new(None),
            check_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_logout(self, failure: ApiFailure) -> Self {
        *self.logout_result.lock().expect("logout lock") = Err(failure);
        self
    }

    pub(crate) fn hold_check(&self) -> oneshot::Sender<()> {
        hold_gate(&self.check_gate)
    }

    pub(crate) fn hold_logout(&self) -> oneshot::Sender<()> {
        hold_gate(&self.logout_gate)
    }
}

#[async_trait]
impl AuthBackend for ScriptedAuth {
    async fn check_auth(&self) -> Result<bool, ApiFailure> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.check_gate).await;
        self.checks
            .lock()
            .expect("checks lock")
            .pop_front()
            .unwrap_or(Ok(false))
    }

    async fn logout(&self) -> Result<(), ApiFailure> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.logout_gate).await;
        self.logout_result.lock().expect("logout lock").clone()
    }
}

pub(crate) fn customer(n: usize) -> Customer {
    Customer {
        id: CustomerId::new(format!("c-{n}")),
        first_name: format!("First{n}"),
        last_name: Some(format!("Last{n}")),
        email: format!("c{n}@example.com"),
        phone: format!("555-{n:04}"),
        address: format!("{n} Main St"),
        hearing_loss_level: None,
        budget_range: None,
    }
}

pub(crate) fn order(n: usize) -> Order {
    Order {
        id: OrderId::new(format!("o-{n}")),
        customer_id: CustomerId::new(format!("c-{n}")),
        status: OrderStatus::Ordered,
        total_amount: 100.0 * n as f64,
        insurance_discount: 0.0,
        delivery_date: None,
        tracking_number: None,
        notes: String::new(),
    }
}

pub(crate) fn paginate<T: Clone>(records: &[T], page: u32, limit: u32) -> PageData<T> {
    let limit = limit.max(1) as usize;
    let total_pages = records.len().div_ceil(limit).max(1) as u32;
    let page = page.clamp(1, total_pages);
    let docs = records
        .iter()
        .skip((page as usize - 1) * limit)
        .take(limit)
        .cloned()
        .collect();
    PageData {
        docs,
        page,
        total_pages,
    }
}

/// Paginating record store that clamps out-of-range pages like the real
/// backend, with hooks to fail or hold individual requests.
pub(crate) struct FakeStore<T> {
    records: Mutex<Vec<T>>,
    requested_pages: Mutex<Vec<u32>>,
    limits: Mutex<Vec<u32>>,
    page_gates: Mutex<HashMap<u32, oneshot::Receiver<()>>>,
    fail_next_fetch: Mutex<Option<ApiFailure>>,
    fail_next_mutation: Mutex<Option<ApiFailure>>,
    next_id: AtomicUsize,
}

impl<T: Clone> FakeStore<T> {
    pub(crate) fn seeded(count: usize, make: impl Fn(usize) -> T) -> Self {
        Self {
            records: Mutex::new((1..=count).map(make).collect()),
            requested_pages: Mutex::new(Vec::new()),
            limits: Mutex::new(Vec::new()),
            page_gates: Mutex::new(HashMap::new()),
            fail_next_fetch: Mutex::new(None),
            fail_next_mutation: Mutex::new(None),
            next_id: AtomicUsize::new(count + 1),
        }
    }

    pub(crate) fn records(&self) -> Vec<T> {
        self.records.lock().expect("records lock").clone()
    }

    pub(crate) fn requested_pages(&self) -> Vec<u32> {
        self.requested_pages.lock().expect("pages lock").clone()
    }

    pub(crate) fn limits(&self) -> Vec<u32> {
        self.limits.lock().expect("limits lock").clone()
    }

    pub(crate) fn hold_page(&self, page: u32) -> oneshot::Sender<()> {
        let (release, waiting) = oneshot::channel();
        self.page_gates
            .lock()
            .expect("gates lock")
            .insert(page, waiting);
        release
    }

    pub(crate) fn fail_next_fetch(&self, failure: ApiFailure) {
        *self.fail_next_fetch.lock().expect("fail lock") = Some(failure);
    }

    pub(crate) fn fail_next_mutation(&self, failure: ApiFailure) {
        *self.fail_next_mutation.lock().expect("fail lock") = Some(failure);
    }

    async fn serve_page(&self, page: u32, limit: u32) -> Result<PageData<T>, ApiFailure> {
        self.requested_pages.lock().expect("pages lock").push(page);
        self.limits.lock().expect("limits lock").push(limit);

        let gate = self.page_gates.lock().expect("gates lock").remove(&page);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if let Some(failure) = self.fail_next_fetch.lock().expect("fail lock").take() {
            return Err(failure);
        }
        Ok(paginate(&self.records(), page, limit))
    }

    fn take_mutation_failure(&self) -> Result<(), ApiFailure> {
        match self.fail_next_mutation.lock().expect("fail lock").take() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn allocate_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn modify(&self, matches: impl Fn(&T) -> bool, apply: impl FnOnce(&mut T)) -> Result<(), ApiFailure> {
        let mut records = self.records.lock().expect("records lock");
        match records.iter_mut().find(|record| matches(record)) {
            Some(record) => {
                apply(record);
                Ok(())
            }
            None => Err(ApiFailure::Rejected {
                status: Some(404),
                message: Some("Record not found".into()),
            }),
        }
    }
}

#[async_trait]
impl ResourceBackend<Customer> for FakeStore<Customer> {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<PageData<Customer>, ApiFailure> {
        self.serve_page(page, limit).await
    }

    async fn create(&self, draft: &CustomerDraft) -> Result<(), ApiFailure> {
        self.take_mutation_failure()?;
        let id = CustomerId::new(format!("c-{}", self.allocate_id()));
        self.records.lock().expect("records lock").push(Customer {
            id,
            first_name: draft.first_name.clone(),
            last_name: draft.last_name.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
            address: draft.address.clone(),
            hearing_loss_level: draft.hearing_loss_level.clone(),
            budget_range: draft.budget_range.clone(),
        });
        Ok(())
    }

    async fn update(&self, id: &CustomerId, patch: &CustomerPatch) -> Result<(), ApiFailure> {
        self.take_mutation_failure()?;
        let patch = patch.clone();
        self.modify(
            |customer| &customer.id == id,
            move |customer| {
                if let Some(first_name) = patch.first_name {
                    customer.first_name = first_name;
                }
                if let Some(last_name) = patch.last_name {
                    customer.last_name = Some(last_name);
                }
                if let Some(email) = patch.email {
                    customer.email = email;
                }
                if let Some(phone) = patch.phone {
                    customer.phone = phone;
                }
                if let Some(address) = patch.address {
                    customer.address = address;
                }
            },
        )
    }
}

#[async_trait]
impl ResourceBackend<Order> for FakeStore<Order> {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<PageData<Order>, ApiFailure> {
        self.serve_page(page, limit).await
    }

    async fn create(&self, draft: &NewOrder) -> Result<(), ApiFailure> {
        self.take_mutation_failure()?;
        let id = OrderId::new(format!("o-{}", self.allocate_id()));
        self.records.lock().expect("records lock").push(Order {
            id,
            customer_id: draft.customer_id.clone(),
            status: OrderStatus::Ordered,
            total_amount: draft.total_amount,
            insurance_discount: draft.insurance_discount,
            delivery_date: draft.delivery_date.clone(),
            tracking_number: draft.tracking_number.clone(),
            notes: draft.notes.clone(),
        });
        Ok(())
    }

    async fn update(&self, id: &OrderId, patch: &OrderPatch) -> Result<(), ApiFailure> {
        self.take_mutation_failure()?;
        let patch = patch.clone();
        self.modify(
            |order| &order.id == id,
            move |order| {
                if let Some(notes) = patch.notes {
                    order.notes = notes;
                }
                if let Some(tracking_number) = patch.tracking_number {
                    order.tracking_number = Some(tracking_number);
                }
            },
        )
    }
}

#[async_trait]
impl OrderStatusBackend for FakeStore<Order> {
    async fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), ApiFailure> {
        self.take_mutation_failure()?;
        self.modify(|order| &order.id == id, |order| order.status = status)
    }
}
