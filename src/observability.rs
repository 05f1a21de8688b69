use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::sql::Command;

// ── Command metrics ─────────────────────────────────────────────

/// Counter: console commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "tablebook_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "tablebook_command_duration_seconds";

/// Counter: create/edit attempts that were refused. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "tablebook_bookings_rejected_total";

// ── Journal metrics ─────────────────────────────────────────────

/// Histogram: group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "tablebook_journal_flush_duration_seconds";

/// Histogram: records per group-commit flush.
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "tablebook_journal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short metrics label for a command.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRestaurant { .. } => "insert_restaurant",
        Command::InsertTable { .. } => "insert_table",
        Command::InsertClient { .. } => "insert_client",
        Command::InsertEmployee { .. } => "insert_employee",
        Command::InsertReservation { .. } => "insert_reservation",
        Command::EditReservation { .. } => "edit_reservation",
        Command::TransitionReservation { .. } => "transition_reservation",
        Command::DeleteReservation { .. } => "delete_reservation",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectConflicts { .. } => "select_conflicts",
        Command::SelectReservations => "select_reservations",
        Command::SelectReservation { .. } => "select_reservation",
    }
}
