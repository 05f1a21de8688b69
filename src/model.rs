use serde::{Deserialize, Serialize};

/// Restaurant wall-clock time as milliseconds since the Unix epoch.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;

pub type RestaurantId = i64;
pub type TableId = i64;
pub type ClientId = i64;
pub type EmployeeId = i64;
pub type ReservationId = i64;
pub type PolicyId = u8;

/// Closed interval `[start, end]`. Both bounds are inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: Ms,
    pub end: Ms,
}

impl Window {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start <= end, "Window start must not be after end");
        Self { start, end }
    }

    pub fn width_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn contains(&self, t: Ms) -> bool {
        self.start <= t && t <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReservationState {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationState {
    /// States that hold a table inside the overlap window.
    pub const BLOCKING: [ReservationState; 3] = [
        ReservationState::Pending,
        ReservationState::Confirmed,
        ReservationState::Completed,
    ];

    pub fn code(self) -> u8 {
        match self {
            ReservationState::Pending => 1,
            ReservationState::Confirmed => 2,
            ReservationState::Cancelled => 3,
            ReservationState::Completed => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ReservationState::Pending),
            2 => Some(ReservationState::Confirmed),
            3 => Some(ReservationState::Cancelled),
            4 => Some(ReservationState::Completed),
            _ => None,
        }
    }

    /// Accepts either the numeric code or the lowercase name.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code);
        }
        match trimmed.to_lowercase().as_str() {
            "pending" => Some(ReservationState::Pending),
            "confirmed" => Some(ReservationState::Confirmed),
            "cancelled" | "canceled" => Some(ReservationState::Cancelled),
            "completed" => Some(ReservationState::Completed),
            _ => None,
        }
    }

    pub fn is_blocking(self) -> bool {
        self != ReservationState::Cancelled
    }

    pub fn label(self) -> &'static str {
        match self {
            ReservationState::Pending => "Pending",
            ReservationState::Confirmed => "Confirmed",
            ReservationState::Cancelled => "Cancelled",
            ReservationState::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    /// Number painted on the table; listings are ordered by it.
    pub number: u32,
    pub capacity: u32,
    pub restaurant_id: RestaurantId,
}

impl Table {
    pub fn label(&self) -> String {
        format!("Table {}", self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub id_card: String,
    pub phone: String,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub restaurant_id: RestaurantId,
}

/// Everything about a reservation except its id and table links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationHeader {
    pub client_id: ClientId,
    pub employee_id: Option<EmployeeId>,
    pub party_size: u32,
    pub at: Ms,
    pub state: ReservationState,
    pub policy_id: PolicyId,
    pub restaurant_id: RestaurantId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub header: ReservationHeader,
    /// Linked tables, ascending and without duplicates.
    pub table_ids: Vec<TableId>,
}

/// The journal record format. Each variant is applied atomically on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RestaurantRegistered {
        restaurant: Restaurant,
    },
    TableAdded {
        table: Table,
    },
    ClientRegistered {
        client: Client,
    },
    EmployeeRegistered {
        employee: Employee,
    },
    /// Header and table links in one record.
    ReservationCreated {
        reservation: Reservation,
    },
    /// Header rewritten and links replaced wholesale.
    ReservationUpdated {
        reservation: Reservation,
    },
    ReservationStateChanged {
        id: ReservationId,
        state: ReservationState,
        policy_id: PolicyId,
    },
    ReservationDeleted {
        id: ReservationId,
    },
    /// Lowest id the next reservation may take. Compaction writes it so ids
    /// of deleted reservations stay retired.
    ReservationIdFloor {
        next: ReservationId,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Display status of a table for a target time. Ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TableStatus {
    Available,
    Reserved,
    Occupied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableAvailability {
    pub id: TableId,
    pub number: u32,
    pub label: String,
    pub capacity: u32,
    pub status: TableStatus,
}

/// One row of the reservation monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationSummary {
    pub id: ReservationId,
    pub client_name: String,
    pub party_size: u32,
    pub at: Ms,
    /// Comma-joined table numbers, `-` when the reservation has none.
    pub tables: String,
    pub state: ReservationState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationDetail {
    pub id: ReservationId,
    pub restaurant_name: String,
    pub restaurant_address: String,
    pub client_name: String,
    pub client_id_card: String,
    pub client_phone: String,
    pub policy_description: String,
    pub policy_value_cents: i64,
    pub at: Ms,
    pub party_size: u32,
    pub state: ReservationState,
    pub employee_name: String,
    pub tables: String,
}
