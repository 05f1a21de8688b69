use std::collections::{BTreeMap, HashMap};

use crate::model::*;

/// Everything the store knows about one restaurant.
#[derive(Debug, Clone)]
pub struct RestaurantState {
    pub restaurant: Restaurant,
    pub tables: BTreeMap<TableId, Table>,
    pub employees: BTreeMap<EmployeeId, Employee>,
    pub reservations: HashMap<ReservationId, Reservation>,
    /// `(at, id)` of every reservation, sorted.
    schedule: Vec<(Ms, ReservationId)>,
}

impl RestaurantState {
    pub fn new(restaurant: Restaurant) -> Self {
        Self {
            restaurant,
            tables: BTreeMap::new(),
            employees: BTreeMap::new(),
            reservations: HashMap::new(),
            schedule: Vec::new(),
        }
    }

    /// Tables ordered by display number, then id.
    pub fn sorted_tables(&self) -> Vec<Table> {
        let mut tables: Vec<Table> = self.tables.values().cloned().collect();
        tables.sort_by_key(|t| (t.number, t.id));
        tables
    }

    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let key = (reservation.header.at, reservation.id);
        let pos = self.schedule.binary_search(&key).unwrap_or_else(|e| e);
        self.schedule.insert(pos, key);
        self.reservations.insert(reservation.id, reservation);
    }

    pub fn remove_reservation(&mut self, id: ReservationId) -> Option<Reservation> {
        let removed = self.reservations.remove(&id)?;
        if let Ok(pos) = self.schedule.binary_search(&(removed.header.at, id)) {
            self.schedule.remove(pos);
        }
        Some(removed)
    }

    /// Reservations whose time lies inside `window`, in time order.
    /// Binary search bounds the scan to the window.
    pub fn within(&self, window: &Window) -> impl Iterator<Item = &Reservation> {
        let lo = self.schedule.partition_point(|(at, _)| *at < window.start);
        let hi = self.schedule.partition_point(|(at, _)| *at <= window.end);
        self.schedule[lo..hi.max(lo)]
            .iter()
            .filter_map(|(_, id)| self.reservations.get(id))
    }

    /// Apply a journal record. Caller holds the lock.
    /// Restaurant and client registration live above this level.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::TableAdded { table } => {
                self.tables.insert(table.id, table.clone());
            }
            Event::EmployeeRegistered { employee } => {
                self.employees.insert(employee.id, employee.clone());
            }
            Event::ReservationCreated { reservation } => {
                self.insert_reservation(reservation.clone());
            }
            Event::ReservationUpdated { reservation } => {
                self.remove_reservation(reservation.id);
                self.insert_reservation(reservation.clone());
            }
            Event::ReservationStateChanged {
                id,
                state,
                policy_id,
            } => {
                if let Some(r) = self.reservations.get_mut(id) {
                    r.header.state = *state;
                    r.header.policy_id = *policy_id;
                }
            }
            Event::ReservationDeleted { id } => {
                self.remove_reservation(*id);
            }
            Event::RestaurantRegistered { .. }
            | Event::ClientRegistered { .. }
            | Event::ReservationIdFloor { .. } => {}
        }
    }
}
