mod state;
mod wal_store;

pub use state::RestaurantState;
pub use wal_store::WalStore;

use async_trait::async_trait;

use crate::model::*;

/// Persistence contract the booking engine depends on.
///
/// Every write is a single durable unit: a reservation's header and its table
/// links are never observable apart from each other.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    // ── Catalog ──────────────────────────────────────────────

    async fn add_restaurant(&self, restaurant: Restaurant) -> Result<(), StoreError>;
    async fn fetch_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>, StoreError>;
    async fn add_table(&self, table: Table) -> Result<(), StoreError>;
    /// Tables of a restaurant ordered by display number.
    async fn fetch_tables(&self, restaurant_id: RestaurantId) -> Result<Vec<Table>, StoreError>;
    async fn add_client(&self, client: Client) -> Result<(), StoreError>;
    async fn fetch_client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;
    async fn add_employee(&self, employee: Employee) -> Result<(), StoreError>;
    async fn fetch_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError>;

    // ── Schedule queries ─────────────────────────────────────

    /// Distinct `(table, state)` links of reservations whose time lies inside
    /// `window` and whose state is one of `states`.
    async fn fetch_overlapping_links(
        &self,
        restaurant_id: RestaurantId,
        window: Window,
        states: &[ReservationState],
        exclude: Option<ReservationId>,
    ) -> Result<Vec<(TableId, ReservationState)>, StoreError>;

    /// Like `fetch_overlapping_links`, restricted to `table_ids` and returning
    /// only the distinct table ids.
    async fn fetch_overlapping_links_for_tables(
        &self,
        restaurant_id: RestaurantId,
        table_ids: &[TableId],
        window: Window,
        states: &[ReservationState],
        exclude: Option<ReservationId>,
    ) -> Result<Vec<TableId>, StoreError>;

    // ── Reservations ─────────────────────────────────────────

    async fn create_reservation(
        &self,
        header: ReservationHeader,
        table_ids: &[TableId],
    ) -> Result<ReservationId, StoreError>;

    /// Rewrite the header and replace all table links.
    async fn update_reservation(
        &self,
        id: ReservationId,
        header: ReservationHeader,
        table_ids: &[TableId],
    ) -> Result<(), StoreError>;

    async fn update_state(
        &self,
        id: ReservationId,
        state: ReservationState,
        policy_id: PolicyId,
    ) -> Result<(), StoreError>;

    async fn delete_reservation(&self, id: ReservationId) -> Result<(), StoreError>;
    async fn fetch_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError>;
    async fn list_reservations(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<Reservation>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound { kind: &'static str, id: i64 },
    AlreadyExists { kind: &'static str, id: i64 },
    Invalid(&'static str),
    Journal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { kind, id } => write!(f, "{kind} {id} not found"),
            StoreError::AlreadyExists { kind, id } => write!(f, "{kind} {id} already exists"),
            StoreError::Invalid(msg) => write!(f, "invalid write: {msg}"),
            StoreError::Journal(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
