use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};

use super::{ReservationStore, RestaurantState, StoreError};
use crate::journal::Journal;
use crate::model::*;
use crate::observability::{JOURNAL_FLUSH_BATCH_SIZE, JOURNAL_FLUSH_DURATION_SECONDS};

pub type SharedRestaurantState = Arc<RwLock<RestaurantState>>;

// ── Group-commit journal channel ─────────────────────────

enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the journal and batches appends: everything already queued when the
/// first append arrives is written with a single fsync.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            JournalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut journal, other);
                continue;
            }
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(JournalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut journal, &batch);
        metrics::histogram!(JOURNAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        respond_batch(batch, &result);

        if let Some(other) = deferred {
            handle_non_append(&mut journal, other);
        }
    }
}

fn flush_batch(journal: &mut Journal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = journal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so buffered bytes don't leak into the
    // next batch.
    let flush_err = journal.flush_sync().err();
    match append_err.or(flush_err) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn respond_batch(batch: Vec<PendingAppend>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let result = Journal::write_compact_file(journal.path(), &events)
                .and_then(|()| journal.swap_compact_file());
            let _ = response.send(result);
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        JournalCommand::Append { response, .. } => {
            let _ = response.send(Err(io::Error::other("append routed outside a batch")));
        }
    }
}

// ── Store ────────────────────────────────────────────────

/// Journal-backed store. State lives in memory and is rebuilt on open by
/// replaying the journal.
pub struct WalStore {
    restaurants: DashMap<RestaurantId, SharedRestaurantState>,
    clients: DashMap<ClientId, Client>,
    /// Entity id → owning restaurant.
    table_owner: DashMap<TableId, RestaurantId>,
    employee_owner: DashMap<EmployeeId, RestaurantId>,
    reservation_owner: DashMap<ReservationId, RestaurantId>,
    next_reservation_id: AtomicI64,
    journal_tx: mpsc::Sender<JournalCommand>,
    /// Serializes catalog registration so uniqueness checks hold across the
    /// journal append.
    catalog_gate: Mutex<()>,
    /// Writers hold it shared; compaction holds it exclusively so the snapshot
    /// and the journal swap see no write in between.
    compaction_gate: RwLock<()>,
}

impl WalStore {
    /// Replay the journal at `path` and start the writer task. Must be called
    /// inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events: Vec<Event> = Journal::replay(path)?;
        let journal = Journal::open(path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let store = Self {
            restaurants: DashMap::new(),
            clients: DashMap::new(),
            table_owner: DashMap::new(),
            employee_owner: DashMap::new(),
            reservation_owner: DashMap::new(),
            next_reservation_id: AtomicI64::new(1),
            journal_tx,
            catalog_gate: Mutex::new(()),
            compaction_gate: RwLock::new(()),
        };

        // Replay into plain maps; nothing else can see them yet.
        let mut states: HashMap<RestaurantId, RestaurantState> = HashMap::new();
        let mut max_reservation_id = 0;
        for event in &events {
            match event {
                Event::RestaurantRegistered { restaurant } => {
                    states
                        .entry(restaurant.id)
                        .or_insert_with(|| RestaurantState::new(restaurant.clone()));
                }
                Event::ClientRegistered { client } => {
                    store.clients.insert(client.id, client.clone());
                }
                Event::ReservationIdFloor { next } => {
                    max_reservation_id = max_reservation_id.max(next - 1);
                }
                other => {
                    if let Event::ReservationCreated { reservation } = other {
                        max_reservation_id = max_reservation_id.max(reservation.id);
                    }
                    if let Some(rid) = store.owner_of(other)
                        && let Some(rs) = states.get_mut(&rid)
                    {
                        rs.apply(other);
                        store.index(other, rid);
                    }
                }
            }
        }
        for (rid, rs) in states {
            store.restaurants.insert(rid, Arc::new(RwLock::new(rs)));
        }
        store
            .next_reservation_id
            .store(max_reservation_id + 1, Ordering::SeqCst);

        tracing::info!(
            path = %path.display(),
            events = events.len(),
            restaurants = store.restaurants.len(),
            "journal replayed"
        );
        Ok(store)
    }

    fn restaurant(&self, id: RestaurantId) -> Option<SharedRestaurantState> {
        self.restaurants.get(&id).map(|e| e.value().clone())
    }

    fn restaurant_or_not_found(&self, id: RestaurantId) -> Result<SharedRestaurantState, StoreError> {
        self.restaurant(id)
            .ok_or(StoreError::NotFound { kind: "restaurant", id })
    }

    fn reservation_restaurant(&self, id: ReservationId) -> Result<SharedRestaurantState, StoreError> {
        let rid = self
            .reservation_owner
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound { kind: "reservation", id })?;
        self.restaurant_or_not_found(rid)
    }

    /// Restaurant an event belongs to. Registration events have none.
    fn owner_of(&self, event: &Event) -> Option<RestaurantId> {
        match event {
            Event::TableAdded { table } => Some(table.restaurant_id),
            Event::EmployeeRegistered { employee } => Some(employee.restaurant_id),
            Event::ReservationCreated { reservation } | Event::ReservationUpdated { reservation } => {
                Some(reservation.header.restaurant_id)
            }
            Event::ReservationStateChanged { id, .. } | Event::ReservationDeleted { id } => {
                self.reservation_owner.get(id).map(|e| *e.value())
            }
            Event::RestaurantRegistered { .. }
            | Event::ClientRegistered { .. }
            | Event::ReservationIdFloor { .. } => None,
        }
    }

    fn index(&self, event: &Event, restaurant_id: RestaurantId) {
        match event {
            Event::TableAdded { table } => {
                self.table_owner.insert(table.id, restaurant_id);
            }
            Event::EmployeeRegistered { employee } => {
                self.employee_owner.insert(employee.id, restaurant_id);
            }
            Event::ReservationCreated { reservation } => {
                self.reservation_owner.insert(reservation.id, restaurant_id);
            }
            Event::ReservationDeleted { id } => {
                self.reservation_owner.remove(id);
            }
            _ => {}
        }
    }

    async fn journal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Journal("journal writer dropped response".into()))?
            .map_err(|e| StoreError::Journal(e.to_string()))
    }

    /// Journal first, then apply. Caller holds the restaurant's write lock.
    async fn persist_and_apply(&self, rs: &mut RestaurantState, event: &Event) -> Result<(), StoreError> {
        self.journal_append(event).await?;
        rs.apply(event);
        self.index(event, rs.restaurant.id);
        Ok(())
    }

    fn check_tables(rs: &RestaurantState, table_ids: &[TableId]) -> Result<Vec<TableId>, StoreError> {
        if table_ids.is_empty() {
            return Err(StoreError::Invalid("reservation without tables"));
        }
        if let Some(&id) = table_ids.iter().find(|id| !rs.tables.contains_key(id)) {
            return Err(StoreError::NotFound { kind: "table", id });
        }
        let set: BTreeSet<TableId> = table_ids.iter().copied().collect();
        Ok(set.into_iter().collect())
    }

    /// Records that recreate the current state from an empty journal.
    pub async fn snapshot(&self) -> Vec<Event> {
        let mut events = vec![Event::ReservationIdFloor {
            next: self.next_reservation_id.load(Ordering::SeqCst),
        }];

        let mut clients: Vec<Client> = self.clients.iter().map(|e| e.value().clone()).collect();
        clients.sort_by_key(|c| c.id);
        events.extend(clients.into_iter().map(|client| Event::ClientRegistered { client }));

        let mut restaurants: Vec<(RestaurantId, SharedRestaurantState)> = self
            .restaurants
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        restaurants.sort_by_key(|(id, _)| *id);

        for (_, shared) in restaurants {
            let rs = shared.read().await;
            events.push(Event::RestaurantRegistered {
                restaurant: rs.restaurant.clone(),
            });
            events.extend(rs.tables.values().map(|t| Event::TableAdded { table: t.clone() }));
            events.extend(
                rs.employees
                    .values()
                    .map(|e| Event::EmployeeRegistered { employee: e.clone() }),
            );
            let mut reservations: Vec<&Reservation> = rs.reservations.values().collect();
            reservations.sort_by_key(|r| r.id);
            events.extend(reservations.into_iter().map(|r| Event::ReservationCreated {
                reservation: r.clone(),
            }));
        }
        events
    }

    /// Rewrite the journal with only the records needed for the current state.
    /// Returns the number of records written.
    pub async fn compact(&self) -> Result<usize, StoreError> {
        let _exclusive = self.compaction_gate.write().await;
        let events = self.snapshot().await;
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Journal("journal writer dropped response".into()))?
            .map_err(|e| StoreError::Journal(e.to_string()))?;
        Ok(count)
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl ReservationStore for WalStore {
    async fn add_restaurant(&self, restaurant: Restaurant) -> Result<(), StoreError> {
        let _writer = self.compaction_gate.read().await;
        let _catalog = self.catalog_gate.lock().await;
        if self.restaurants.contains_key(&restaurant.id) {
            return Err(StoreError::AlreadyExists {
                kind: "restaurant",
                id: restaurant.id,
            });
        }
        let event = Event::RestaurantRegistered {
            restaurant: restaurant.clone(),
        };
        self.journal_append(&event).await?;
        self.restaurants
            .insert(restaurant.id, Arc::new(RwLock::new(RestaurantState::new(restaurant))));
        Ok(())
    }

    async fn fetch_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>, StoreError> {
        match self.restaurant(id) {
            Some(shared) => Ok(Some(shared.read().await.restaurant.clone())),
            None => Ok(None),
        }
    }

    async fn add_table(&self, table: Table) -> Result<(), StoreError> {
        let _writer = self.compaction_gate.read().await;
        let _catalog = self.catalog_gate.lock().await;
        if self.table_owner.contains_key(&table.id) {
            return Err(StoreError::AlreadyExists { kind: "table", id: table.id });
        }
        let shared = self.restaurant_or_not_found(table.restaurant_id)?;
        let mut rs = shared.write().await;
        self.persist_and_apply(&mut rs, &Event::TableAdded { table }).await
    }

    async fn fetch_tables(&self, restaurant_id: RestaurantId) -> Result<Vec<Table>, StoreError> {
        match self.restaurant(restaurant_id) {
            Some(shared) => Ok(shared.read().await.sorted_tables()),
            None => Ok(Vec::new()),
        }
    }

    async fn add_client(&self, client: Client) -> Result<(), StoreError> {
        let _writer = self.compaction_gate.read().await;
        let _catalog = self.catalog_gate.lock().await;
        if self.clients.contains_key(&client.id) {
            return Err(StoreError::AlreadyExists { kind: "client", id: client.id });
        }
        self.journal_append(&Event::ClientRegistered {
            client: client.clone(),
        })
        .await?;
        self.clients.insert(client.id, client);
        Ok(())
    }

    async fn fetch_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.get(&id).map(|e| e.value().clone()))
    }

    async fn add_employee(&self, employee: Employee) -> Result<(), StoreError> {
        let _writer = self.compaction_gate.read().await;
        let _catalog = self.catalog_gate.lock().await;
        if self.employee_owner.contains_key(&employee.id) {
            return Err(StoreError::AlreadyExists {
                kind: "employee",
                id: employee.id,
            });
        }
        let shared = self.restaurant_or_not_found(employee.restaurant_id)?;
        let mut rs = shared.write().await;
        self.persist_and_apply(&mut rs, &Event::EmployeeRegistered { employee })
            .await
    }

    async fn fetch_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        let Some(rid) = self.employee_owner.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        match self.restaurant(rid) {
            Some(shared) => Ok(shared.read().await.employees.get(&id).cloned()),
            None => Ok(None),
        }
    }

    async fn fetch_overlapping_links(
        &self,
        restaurant_id: RestaurantId,
        window: Window,
        states: &[ReservationState],
        exclude: Option<ReservationId>,
    ) -> Result<Vec<(TableId, ReservationState)>, StoreError> {
        let Some(shared) = self.restaurant(restaurant_id) else {
            return Ok(Vec::new());
        };
        let rs = shared.read().await;
        let links: BTreeSet<(TableId, ReservationState)> = rs
            .within(&window)
            .filter(|r| Some(r.id) != exclude && states.contains(&r.header.state))
            .flat_map(|r| r.table_ids.iter().map(move |&t| (t, r.header.state)))
            .collect();
        Ok(links.into_iter().collect())
    }

    async fn fetch_overlapping_links_for_tables(
        &self,
        restaurant_id: RestaurantId,
        table_ids: &[TableId],
        window: Window,
        states: &[ReservationState],
        exclude: Option<ReservationId>,
    ) -> Result<Vec<TableId>, StoreError> {
        let Some(shared) = self.restaurant(restaurant_id) else {
            return Ok(Vec::new());
        };
        let rs = shared.read().await;
        let hits: BTreeSet<TableId> = rs
            .within(&window)
            .filter(|r| Some(r.id) != exclude && states.contains(&r.header.state))
            .flat_map(|r| r.table_ids.iter().copied())
            .filter(|t| table_ids.contains(t))
            .collect();
        Ok(hits.into_iter().collect())
    }

    async fn create_reservation(
        &self,
        header: ReservationHeader,
        table_ids: &[TableId],
    ) -> Result<ReservationId, StoreError> {
        let _writer = self.compaction_gate.read().await;
        let shared = self.restaurant_or_not_found(header.restaurant_id)?;
        let mut rs = shared.write().await;
        let table_ids = Self::check_tables(&rs, table_ids)?;

        let id = self.next_reservation_id.fetch_add(1, Ordering::SeqCst);
        let event = Event::ReservationCreated {
            reservation: Reservation { id, header, table_ids },
        };
        self.persist_and_apply(&mut rs, &event).await?;
        Ok(id)
    }

    async fn update_reservation(
        &self,
        id: ReservationId,
        header: ReservationHeader,
        table_ids: &[TableId],
    ) -> Result<(), StoreError> {
        let _writer = self.compaction_gate.read().await;
        let shared = self.reservation_restaurant(id)?;
        let mut rs = shared.write().await;
        if !rs.reservations.contains_key(&id) {
            return Err(StoreError::NotFound { kind: "reservation", id });
        }
        if header.restaurant_id != rs.restaurant.id {
            return Err(StoreError::Invalid("reservation cannot move between restaurants"));
        }
        let table_ids = Self::check_tables(&rs, table_ids)?;

        let event = Event::ReservationUpdated {
            reservation: Reservation { id, header, table_ids },
        };
        self.persist_and_apply(&mut rs, &event).await
    }

    async fn update_state(
        &self,
        id: ReservationId,
        state: ReservationState,
        policy_id: PolicyId,
    ) -> Result<(), StoreError> {
        let _writer = self.compaction_gate.read().await;
        let shared = self.reservation_restaurant(id)?;
        let mut rs = shared.write().await;
        if !rs.reservations.contains_key(&id) {
            return Err(StoreError::NotFound { kind: "reservation", id });
        }
        let event = Event::ReservationStateChanged { id, state, policy_id };
        self.persist_and_apply(&mut rs, &event).await
    }

    async fn delete_reservation(&self, id: ReservationId) -> Result<(), StoreError> {
        let _writer = self.compaction_gate.read().await;
        let shared = self.reservation_restaurant(id)?;
        let mut rs = shared.write().await;
        if !rs.reservations.contains_key(&id) {
            return Err(StoreError::NotFound { kind: "reservation", id });
        }
        self.persist_and_apply(&mut rs, &Event::ReservationDeleted { id })
            .await
    }

    async fn fetch_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        let Ok(shared) = self.reservation_restaurant(id) else {
            return Ok(None);
        };
        Ok(shared.read().await.reservations.get(&id).cloned())
    }

    async fn list_reservations(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<Reservation>, StoreError> {
        let Some(shared) = self.restaurant(restaurant_id) else {
            return Ok(Vec::new());
        };
        let rs = shared.read().await;
        let mut all: Vec<Reservation> = rs.reservations.values().cloned().collect();
        all.sort_by_key(|r| r.id);
        Ok(all)
    }
}
