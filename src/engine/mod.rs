mod availability;
mod conflict;
mod error;
mod mutations;
pub mod policy;
mod queries;
pub mod window;

pub use availability::{classify, resolve_statuses, status_for};
pub use error::{BookingError, ValidationError};
pub use policy::{Policy, select_policy};
pub use window::{format_instant, now_ms, overlap_window, parse_instant};

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::model::*;
use crate::store::ReservationStore;

/// Booking or edit input as it arrives from a terminal. Party size and date
/// are unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub client_id: Option<ClientId>,
    pub party_size: i64,
    pub at: String,
    pub table_ids: Vec<TableId>,
    pub employee_id: Option<EmployeeId>,
}

/// Reservation engine for one restaurant. Terminals share it behind an `Arc`.
pub struct Engine {
    pub(crate) store: Arc<dyn ReservationStore>,
    pub(crate) restaurant_id: RestaurantId,
    /// Held from conflict detection through the write, so two bookings cannot
    /// both pass the check for the same tables.
    booking_gate: Mutex<()>,
}

impl Engine {
    pub fn new(store: Arc<dyn ReservationStore>, restaurant_id: RestaurantId) -> Self {
        Self {
            store,
            restaurant_id,
            booking_gate: Mutex::new(()),
        }
    }

    pub fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }
}
