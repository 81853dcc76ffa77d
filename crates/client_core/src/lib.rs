use std::fmt::{Debug, Display};

use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Customer, CustomerId, Order, OrderId},
    protocol::{CustomerDraft, CustomerPatch, NewOrder, OrderPatch},
};

pub mod controller;
pub mod error;
pub mod guard;
pub mod session;
pub mod transport;

pub use controller::{
    FetchOutcome, FormSurface, PaginatedResourceController, ResourceListState, PAGE_SIZE,
};
pub use error::ApiFailure;
pub use guard::{GuardDecision, RouteGuard, SIGN_IN_PATH};
pub use session::{SessionAuthority, SessionStatus};
pub use transport::{AuthBackend, HttpApi, OrderStatusBackend, ResourceBackend};

/// A server-paginated collection the console can list and mutate.
pub trait Resource: DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    type Id: Clone + Debug + Display + PartialEq + Send + Sync + 'static;
    type Draft: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;

    /// Path segment under `/api/v1`.
    const COLLECTION: &'static str;
    /// Used in operator-facing fallback messages.
    const SINGULAR: &'static str;

    fn id(&self) -> &Self::Id;
}

impl Resource for Customer {
    type Id = CustomerId;
    type Draft = CustomerDraft;
    type Patch = CustomerPatch;

    const COLLECTION: &'static str = "customers";
    const SINGULAR: &'static str = "customer";

    fn id(&self) -> &CustomerId {
        &self.id
    }
}

impl Resource for Order {
    type Id = OrderId;
    type Draft = NewOrder;
    type Patch = OrderPatch;

    const COLLECTION: &'static str = "orders";
    const SINGULAR: &'static str = "order";

    fn id(&self) -> &OrderId {
        &self.id
    }
}

pub type CustomersController<B> = PaginatedResourceController<Customer, B>;
pub type OrdersController<B> = PaginatedResourceController<Order, B>;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
