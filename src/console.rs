use serde_json::{Value, json};

use crate::engine::{BookingError, Engine, ValidationError, format_instant, parse_instant};
use crate::model::*;
use crate::observability::{COMMAND_DURATION_SECONDS, COMMANDS_TOTAL, command_label};
use crate::sql::{self, Command, SqlError};

#[derive(Debug)]
pub enum ConsoleError {
    Sql(SqlError),
    Booking(BookingError),
}

impl ConsoleError {
    fn kind(&self) -> &'static str {
        match self {
            ConsoleError::Sql(_) => "syntax",
            ConsoleError::Booking(e) => e.kind(),
        }
    }

    fn to_json(&self) -> Value {
        let mut out = json!({
            "ok": false,
            "kind": self.kind(),
            "error": self.to_string(),
        });
        match self {
            ConsoleError::Booking(BookingError::Conflict(tables)) => {
                out["tables"] = json!(tables);
            }
            ConsoleError::Booking(e @ BookingError::Capacity { .. }) => {
                out["shortfall"] = json!(e.shortfall());
            }
            _ => {}
        }
        out
    }
}

impl std::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleError::Sql(e) => write!(f, "{e}"),
            ConsoleError::Booking(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConsoleError {}

impl From<SqlError> for ConsoleError {
    fn from(e: SqlError) -> Self {
        ConsoleError::Sql(e)
    }
}

impl From<BookingError> for ConsoleError {
    fn from(e: BookingError) -> Self {
        ConsoleError::Booking(e)
    }
}

fn parse_target(raw: &str) -> Result<Ms, BookingError> {
    parse_instant(raw).ok_or_else(|| ValidationError::BadDateTime(raw.to_string()).into())
}

fn summary_json(s: &ReservationSummary) -> Value {
    json!({
        "id": s.id,
        "client": s.client_name,
        "party_size": s.party_size,
        "at": format_instant(s.at),
        "tables": s.tables,
        "state": s.state.label(),
    })
}

fn detail_json(d: &ReservationDetail) -> Value {
    json!({
        "id": d.id,
        "restaurant": d.restaurant_name,
        "address": d.restaurant_address,
        "client": d.client_name,
        "id_card": d.client_id_card,
        "phone": d.client_phone,
        "policy": d.policy_description,
        "policy_value_cents": d.policy_value_cents,
        "at": format_instant(d.at),
        "party_size": d.party_size,
        "state": d.state.label(),
        "employee": d.employee_name,
        "tables": d.tables,
    })
}

/// Run one parsed command. Each returned value is one output line.
pub async fn execute(engine: &Engine, cmd: Command) -> Result<Vec<Value>, ConsoleError> {
    let rows = match cmd {
        Command::InsertRestaurant { id, name, address } => {
            engine.register_restaurant(id, name, address).await?;
            vec![json!({ "ok": true, "restaurant_id": id })]
        }
        Command::InsertTable { id, number, capacity } => {
            engine.add_table(id, number, capacity).await?;
            vec![json!({ "ok": true, "table_id": id })]
        }
        Command::InsertClient { client } => {
            let id = client.id;
            engine.register_client(client).await?;
            vec![json!({ "ok": true, "client_id": id })]
        }
        Command::InsertEmployee { id, name } => {
            engine.register_employee(id, name).await?;
            vec![json!({ "ok": true, "employee_id": id })]
        }
        Command::InsertReservation { request } => {
            let id = engine.create_reservation(request).await?;
            vec![json!({ "ok": true, "reservation_id": id })]
        }
        Command::EditReservation { id, request } => {
            engine.edit_reservation(id, request).await?;
            vec![json!({ "ok": true, "reservation_id": id })]
        }
        Command::TransitionReservation { id, state } => {
            let policy_id = engine.transition(id, state).await?;
            vec![json!({
                "ok": true,
                "reservation_id": id,
                "state": state.label(),
                "policy_id": policy_id,
            })]
        }
        Command::DeleteReservation { id } => {
            engine.delete_reservation(id).await?;
            vec![json!({ "ok": true, "reservation_id": id })]
        }
        Command::SelectAvailability { at, ignore } => {
            let target = at.as_deref().map(parse_target).transpose()?;
            engine
                .table_statuses(target, ignore)
                .await?
                .iter()
                .map(|a| json!(a))
                .collect()
        }
        Command::SelectConflicts { at, table_ids, ignore } => {
            let target = parse_target(&at)?;
            let conflicts = engine.conflicting_tables(target, &table_ids, ignore).await?;
            vec![json!({ "at": format_instant(target), "conflicts": conflicts })]
        }
        Command::SelectReservations => engine
            .list_reservations()
            .await?
            .iter()
            .map(summary_json)
            .collect(),
        Command::SelectReservation { id } => vec![detail_json(&engine.reservation_detail(id).await?)],
    };
    Ok(rows)
}

/// Parse and run one console line, rendering the result as JSON lines.
/// Blank lines produce no output.
pub async fn run_line(engine: &Engine, line: &str) -> String {
    let line = line.trim();
    if line.is_empty() {
        return String::new();
    }

    let cmd = match sql::parse_sql(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => "unparsed", "status" => "error").increment(1);
            return ConsoleError::Sql(e).to_json().to_string();
        }
    };

    let label = command_label(&cmd);
    let start = std::time::Instant::now();
    let result = execute(engine, cmd).await;
    metrics::histogram!(COMMAND_DURATION_SECONDS, "command" => label).record(start.elapsed().as_secs_f64());

    match result {
        Ok(rows) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "ok").increment(1);
            rows.iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        }
        Err(e) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "error").increment(1);
            tracing::debug!(command = label, error = %e, "command failed");
            e.to_json().to_string()
        }
    }
}
