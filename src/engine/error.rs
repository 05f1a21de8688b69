use crate::model::{ClientId, EmployeeId, ReservationId, TableId};
use crate::store::StoreError;

/// Input problems caught before any capacity or conflict check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingClient,
    UnknownClient(ClientId),
    UnknownEmployee(EmployeeId),
    NoTables,
    UnknownTable(TableId),
    NonPositivePartySize(i64),
    BadDateTime(String),
    PastDate,
    LimitExceeded(&'static str),
    Invalid(&'static str),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingClient => write!(f, "a client must be selected"),
            ValidationError::UnknownClient(id) => write!(f, "unknown client: {id}"),
            ValidationError::UnknownEmployee(id) => write!(f, "unknown employee: {id}"),
            ValidationError::NoTables => write!(f, "at least one table must be selected"),
            ValidationError::UnknownTable(id) => write!(f, "unknown table: {id}"),
            ValidationError::NonPositivePartySize(n) => {
                write!(f, "party size must be greater than zero (got {n})")
            }
            ValidationError::BadDateTime(s) => write!(f, "invalid date/time: {s:?}"),
            ValidationError::PastDate => write!(f, "reservation date is in the past"),
            ValidationError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            ValidationError::Invalid(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    Validation(ValidationError),
    Capacity { party_size: u32, capacity: u32 },
    /// Offending table ids, ascending.
    Conflict(Vec<TableId>),
    NotFound(ReservationId),
    Persistence(StoreError),
}

impl BookingError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation",
            BookingError::Capacity { .. } => "capacity",
            BookingError::Conflict(_) => "conflict",
            BookingError::NotFound(_) => "not_found",
            BookingError::Persistence(_) => "persistence",
        }
    }

    /// Seats missing for a capacity failure, zero otherwise.
    pub fn shortfall(&self) -> u32 {
        match self {
            BookingError::Capacity {
                party_size,
                capacity,
            } => party_size.saturating_sub(*capacity),
            _ => 0,
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Validation(e) => write!(f, "{e}"),
            BookingError::Capacity {
                party_size,
                capacity,
            } => write!(
                f,
                "selected tables seat {capacity} but the party has {party_size} ({} short)",
                party_size.saturating_sub(*capacity)
            ),
            BookingError::Conflict(ids) => {
                let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(
                    f,
                    "tables already booked within the time window: {}",
                    list.join(", ")
                )
            }
            BookingError::NotFound(id) => write!(f, "reservation not found: {id}"),
            BookingError::Persistence(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl std::error::Error for BookingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookingError::Validation(e) => Some(e),
            BookingError::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for BookingError {
    fn from(e: ValidationError) -> Self {
        BookingError::Validation(e)
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        BookingError::Persistence(e)
    }
}
