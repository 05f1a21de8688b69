use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::limits::*;
use crate::model::*;
use crate::observability::BOOKINGS_REJECTED_TOTAL;

use super::conflict::check_capacity;
use super::policy::select_policy;
use super::window::{now_ms, parse_instant};
use super::{BookingError, BookingRequest, Engine, ValidationError};

/// A request that passed input validation.
struct Prepared {
    client_id: ClientId,
    employee_id: Option<EmployeeId>,
    party_size: u32,
    at: Ms,
    tables: Vec<Table>,
}

impl Prepared {
    fn table_ids(&self) -> Vec<TableId> {
        self.tables.iter().map(|t| t.id).collect()
    }
}

fn check_name(value: &str, what: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Invalid(what));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ValidationError::LimitExceeded("name too long"));
    }
    Ok(())
}

impl Engine {
    // ── Catalog ──────────────────────────────────────────────

    pub async fn register_restaurant(
        &self,
        id: RestaurantId,
        name: String,
        address: String,
    ) -> Result<(), BookingError> {
        check_name(&name, "restaurant name is empty")?;
        if address.len() > MAX_ADDRESS_LEN {
            return Err(ValidationError::LimitExceeded("address too long").into());
        }
        self.store
            .add_restaurant(Restaurant { id, name, address })
            .await?;
        info!(restaurant_id = id, "restaurant registered");
        Ok(())
    }

    /// Add a table to this engine's restaurant.
    pub async fn add_table(&self, id: TableId, number: u32, capacity: u32) -> Result<(), BookingError> {
        if capacity == 0 {
            return Err(ValidationError::Invalid("table capacity must be positive").into());
        }
        if capacity > MAX_TABLE_CAPACITY {
            return Err(ValidationError::LimitExceeded("table capacity too large").into());
        }
        self.store
            .add_table(Table {
                id,
                number,
                capacity,
                restaurant_id: self.restaurant_id,
            })
            .await?;
        info!(table_id = id, number, capacity, "table added");
        Ok(())
    }

    pub async fn register_client(&self, client: Client) -> Result<(), BookingError> {
        check_name(&client.first_name, "client first name is empty")?;
        check_name(&client.last_name, "client last name is empty")?;
        if client.id_card.len() > MAX_NAME_LEN || client.phone.len() > MAX_NAME_LEN {
            return Err(ValidationError::LimitExceeded("client field too long").into());
        }
        let id = client.id;
        self.store.add_client(client).await?;
        info!(client_id = id, "client registered");
        Ok(())
    }

    pub async fn register_employee(&self, id: EmployeeId, name: String) -> Result<(), BookingError> {
        check_name(&name, "employee name is empty")?;
        self.store
            .add_employee(Employee {
                id,
                name,
                restaurant_id: self.restaurant_id,
            })
            .await?;
        info!(employee_id = id, "employee registered");
        Ok(())
    }

    // ── Reservation lifecycle ────────────────────────────────

    /// Book tables for a client. The date must not be in the past.
    pub async fn create_reservation(&self, req: BookingRequest) -> Result<ReservationId, BookingError> {
        self.create_reservation_at(req, now_ms()).await
    }

    /// `create_reservation` against an explicit clock.
    pub async fn create_reservation_at(
        &self,
        req: BookingRequest,
        now: Ms,
    ) -> Result<ReservationId, BookingError> {
        self.try_create(req, now)
            .await
            .inspect_err(|e| self.note_rejection("create", e))
    }

    async fn try_create(&self, req: BookingRequest, now: Ms) -> Result<ReservationId, BookingError> {
        let prepared = self.prepare(&req, Some(now)).await?;
        check_capacity(&prepared.tables, prepared.party_size)?;

        let table_ids = prepared.table_ids();
        let _gate = self.booking_gate.lock().await;
        self.check_no_conflict(prepared.at, &table_ids, None).await?;

        let state = ReservationState::Pending;
        let header = ReservationHeader {
            client_id: prepared.client_id,
            employee_id: prepared.employee_id,
            party_size: prepared.party_size,
            at: prepared.at,
            state,
            policy_id: select_policy(prepared.party_size, state),
            restaurant_id: self.restaurant_id,
        };
        let id = self.store.create_reservation(header, &table_ids).await?;
        info!(reservation_id = id, tables = ?table_ids, party_size = prepared.party_size, "reservation created");
        Ok(id)
    }

    /// Rewrite a reservation. Past dates are allowed; the reservation's own
    /// links never conflict with it. State goes back to Pending.
    pub async fn edit_reservation(&self, id: ReservationId, req: BookingRequest) -> Result<(), BookingError> {
        self.try_edit(id, req)
            .await
            .inspect_err(|e| self.note_rejection("edit", e))
    }

    async fn try_edit(&self, id: ReservationId, req: BookingRequest) -> Result<(), BookingError> {
        self.existing(id).await?;
        let prepared = self.prepare(&req, None).await?;
        check_capacity(&prepared.tables, prepared.party_size)?;

        let table_ids = prepared.table_ids();
        let _gate = self.booking_gate.lock().await;
        self.check_no_conflict(prepared.at, &table_ids, Some(id)).await?;

        let state = ReservationState::Pending;
        let header = ReservationHeader {
            client_id: prepared.client_id,
            employee_id: prepared.employee_id,
            party_size: prepared.party_size,
            at: prepared.at,
            state,
            policy_id: select_policy(prepared.party_size, state),
            restaurant_id: self.restaurant_id,
        };
        self.store.update_reservation(id, header, &table_ids).await?;
        info!(reservation_id = id, tables = ?table_ids, "reservation edited");
        Ok(())
    }

    /// Move a reservation to `state` and recompute its policy. Any transition
    /// is allowed.
    pub async fn transition(
        &self,
        id: ReservationId,
        state: ReservationState,
    ) -> Result<PolicyId, BookingError> {
        let existing = self.existing(id).await?;
        let policy_id = select_policy(existing.header.party_size, state);
        self.store.update_state(id, state, policy_id).await?;
        info!(
            reservation_id = id,
            from = existing.header.state.label(),
            to = state.label(),
            policy_id,
            "reservation state changed"
        );
        Ok(policy_id)
    }

    /// Physically remove a reservation and its links.
    pub async fn delete_reservation(&self, id: ReservationId) -> Result<(), BookingError> {
        self.existing(id).await?;
        self.store.delete_reservation(id).await?;
        info!(reservation_id = id, "reservation deleted");
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────

    /// Fetch a reservation of this restaurant.
    pub(super) async fn existing(&self, id: ReservationId) -> Result<Reservation, BookingError> {
        match self.store.fetch_reservation(id).await? {
            Some(r) if r.header.restaurant_id == self.restaurant_id => Ok(r),
            _ => Err(BookingError::NotFound(id)),
        }
    }

    /// Input validation shared by create and edit. `now` is set only for new
    /// bookings, which may not be in the past.
    async fn prepare(&self, req: &BookingRequest, now: Option<Ms>) -> Result<Prepared, BookingError> {
        let client_id = req.client_id.ok_or(ValidationError::MissingClient)?;

        let requested: BTreeSet<TableId> = req.table_ids.iter().copied().collect();
        if requested.is_empty() {
            return Err(ValidationError::NoTables.into());
        }
        if requested.len() > MAX_TABLES_PER_RESERVATION {
            return Err(ValidationError::LimitExceeded("too many tables").into());
        }

        if req.party_size <= 0 {
            return Err(ValidationError::NonPositivePartySize(req.party_size).into());
        }
        let party_size = u32::try_from(req.party_size)
            .ok()
            .filter(|&n| n <= MAX_PARTY_SIZE)
            .ok_or(ValidationError::LimitExceeded("party size too large"))?;

        let at = parse_instant(&req.at).ok_or_else(|| ValidationError::BadDateTime(req.at.clone()))?;
        if let Some(now) = now
            && at < now
        {
            return Err(ValidationError::PastDate.into());
        }

        if self.store.fetch_client(client_id).await?.is_none() {
            return Err(ValidationError::UnknownClient(client_id).into());
        }
        if let Some(employee_id) = req.employee_id {
            match self.store.fetch_employee(employee_id).await? {
                Some(e) if e.restaurant_id == self.restaurant_id => {}
                _ => return Err(ValidationError::UnknownEmployee(employee_id).into()),
            }
        }

        let catalog = self.store.fetch_tables(self.restaurant_id).await?;
        let mut tables = Vec::with_capacity(requested.len());
        for id in requested {
            let table = catalog
                .iter()
                .find(|t| t.id == id)
                .ok_or(ValidationError::UnknownTable(id))?;
            tables.push(table.clone());
        }

        Ok(Prepared {
            client_id,
            employee_id: req.employee_id,
            party_size,
            at,
            tables,
        })
    }

    fn note_rejection(&self, op: &'static str, e: &BookingError) {
        metrics::counter!(BOOKINGS_REJECTED_TOTAL, "reason" => e.kind()).increment(1);
        match e {
            BookingError::Persistence(_) => warn!(op, error = %e, "booking failed"),
            _ => info!(op, reason = e.kind(), error = %e, "booking rejected"),
        }
    }
}
