use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::engine::BookingRequest;
use crate::model::*;

/// Parsed console command.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRestaurant {
        id: RestaurantId,
        name: String,
        address: String,
    },
    InsertTable {
        id: TableId,
        number: u32,
        capacity: u32,
    },
    InsertClient {
        client: Client,
    },
    InsertEmployee {
        id: EmployeeId,
        name: String,
    },
    InsertReservation {
        request: BookingRequest,
    },
    EditReservation {
        id: ReservationId,
        request: BookingRequest,
    },
    TransitionReservation {
        id: ReservationId,
        state: ReservationState,
    },
    DeleteReservation {
        id: ReservationId,
    },
    SelectAvailability {
        at: Option<String>,
        ignore: Option<ReservationId>,
    },
    SelectConflicts {
        at: String,
        table_ids: Vec<TableId>,
        ignore: Option<ReservationId>,
    },
    SelectReservations,
    SelectReservation {
        id: ReservationId,
    },
}

/// Column order assumed when an INSERT names no columns.
const RESTAURANT_COLUMNS: &[&str] = &["id", "name", "address"];
const TABLE_COLUMNS: &[&str] = &["id", "number", "capacity"];
const CLIENT_COLUMNS: &[&str] = &["id", "first_name", "last_name", "id_card", "phone"];
const EMPLOYEE_COLUMNS: &[&str] = &["id", "name"];
const RESERVATION_COLUMNS: &[&str] = &["client_id", "party_size", "at", "tables", "employee_id"];

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── Column/value pairs ────────────────────────────────────────

/// Named values from an INSERT row, SET list or WHERE clause.
struct Fields<'a> {
    pairs: Vec<(String, &'a Expr)>,
}

impl<'a> Fields<'a> {
    fn get(&self, column: &str) -> Option<&'a Expr> {
        self.pairs
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, expr)| *expr)
    }

    fn required(&self, column: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(column))
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(name, _)| name.as_str())
    }
}

fn insert_fields<'a>(
    insert: &'a ast::Insert,
    table: &'static str,
    default_columns: &[&str],
) -> Result<Fields<'a>, SqlError> {
    let values = extract_insert_values(insert)?;
    let columns: Vec<String> = if insert.columns.is_empty() {
        default_columns.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|i| i.value.to_lowercase()).collect()
    };
    // Positional rows may leave trailing optional columns out.
    if values.len() > columns.len() || (!insert.columns.is_empty() && values.len() != columns.len()) {
        return Err(SqlError::WrongArity(table, columns.len(), values.len()));
    }
    if let Some(unknown) = columns.iter().find(|c| !default_columns.contains(&c.as_str())) {
        return Err(SqlError::UnknownColumn(unknown.clone()));
    }
    Ok(Fields {
        pairs: columns.into_iter().zip(values.iter()).collect(),
    })
}

fn booking_request(fields: &Fields<'_>) -> Result<BookingRequest, SqlError> {
    Ok(BookingRequest {
        client_id: parse_i64_or_null(fields.required("client_id")?)?,
        party_size: parse_i64_expr(fields.required("party_size")?)?,
        at: parse_string_expr(fields.required("at")?)?,
        table_ids: parse_id_list(fields.required("tables")?)?,
        employee_id: match fields.get("employee_id") {
            Some(expr) => parse_i64_or_null(expr)?,
            None => None,
        },
    })
}

// ── Statements ────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;

    match table.as_str() {
        "restaurants" => {
            let f = insert_fields(insert, "restaurants", RESTAURANT_COLUMNS)?;
            Ok(Command::InsertRestaurant {
                id: parse_i64_expr(f.required("id")?)?,
                name: parse_string_expr(f.required("name")?)?,
                address: match f.get("address") {
                    Some(expr) => parse_string_expr(expr)?,
                    None => String::new(),
                },
            })
        }
        "tables" => {
            let f = insert_fields(insert, "tables", TABLE_COLUMNS)?;
            Ok(Command::InsertTable {
                id: parse_i64_expr(f.required("id")?)?,
                number: parse_u32(f.required("number")?)?,
                capacity: parse_u32(f.required("capacity")?)?,
            })
        }
        "clients" => {
            let f = insert_fields(insert, "clients", CLIENT_COLUMNS)?;
            let optional = |column: &str| match f.get(column) {
                Some(expr) => parse_string_expr(expr),
                None => Ok(String::new()),
            };
            Ok(Command::InsertClient {
                client: Client {
                    id: parse_i64_expr(f.required("id")?)?,
                    first_name: parse_string_expr(f.required("first_name")?)?,
                    last_name: parse_string_expr(f.required("last_name")?)?,
                    id_card: optional("id_card")?,
                    phone: optional("phone")?,
                },
            })
        }
        "employees" => {
            let f = insert_fields(insert, "employees", EMPLOYEE_COLUMNS)?;
            Ok(Command::InsertEmployee {
                id: parse_i64_expr(f.required("id")?)?,
                name: parse_string_expr(f.required("name")?)?,
            })
        }
        "reservations" => {
            let f = insert_fields(insert, "reservations", RESERVATION_COLUMNS)?;
            Ok(Command::InsertReservation {
                request: booking_request(&f)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    if table != "reservations" {
        return Err(SqlError::UnknownTable(table));
    }
    let id = extract_where_id(selection)?;

    let mut pairs = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let column = match &assignment.target {
            ast::AssignmentTarget::ColumnName(name) => object_name_last(name),
            _ => None,
        }
        .ok_or_else(|| SqlError::Unsupported("tuple assignment".into()))?;
        pairs.push((column, &assignment.value));
    }
    let fields = Fields { pairs };

    if let Some(state_expr) = fields.get("state") {
        if fields.names().any(|n| n != "state") {
            return Err(SqlError::Unsupported(
                "state cannot be changed together with other columns".into(),
            ));
        }
        let raw = parse_string_expr(state_expr)?;
        let state = ReservationState::parse(&raw).ok_or(SqlError::BadState(raw))?;
        return Ok(Command::TransitionReservation { id, state });
    }

    if let Some(unknown) = fields.names().find(|n| !RESERVATION_COLUMNS.contains(n)) {
        return Err(SqlError::UnknownColumn(unknown.to_string()));
    }
    Ok(Command::EditReservation {
        id,
        request: booking_request(&fields)?,
    })
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "reservations" => Ok(Command::DeleteReservation { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let mut pairs = Vec::new();
    if let Some(selection) = &select.selection {
        extract_filters(selection, &mut pairs)?;
    }
    let filters = Fields { pairs };
    let ignore = match filters.get("ignore") {
        Some(expr) => parse_i64_or_null(expr)?,
        None => None,
    };

    match table.as_str() {
        "availability" => Ok(Command::SelectAvailability {
            at: filters.get("at").map(parse_string_expr).transpose()?,
            ignore,
        }),
        "conflicts" => Ok(Command::SelectConflicts {
            at: parse_string_expr(filters.get("at").ok_or(SqlError::MissingFilter("at"))?)?,
            table_ids: parse_id_list(filters.get("tables").ok_or(SqlError::MissingFilter("tables"))?)?,
            ignore,
        }),
        "reservations" => match filters.get("id") {
            Some(expr) => Ok(Command::SelectReservation {
                id: parse_i64_expr(expr)?,
            }),
            None => Ok(Command::SelectReservations),
        },
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Collect `column = value` terms joined by AND.
fn extract_filters<'a>(expr: &'a Expr, out: &mut Vec<(String, &'a Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            extract_filters(left, out)?;
            extract_filters(right, out)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let column = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push((column, right.as_ref()));
            Ok(())
        }
        Expr::Nested(inner) => extract_filters(inner, out),
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<&[Expr], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [row] => Ok(row.as_slice()),
            [] => Err(SqlError::Parse("empty VALUES".into())),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<i64, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_i64_expr(right),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

fn parse_i64_or_null(expr: &Expr) -> Result<Option<i64>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_i64_expr(expr)?)),
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of range")))
}

fn parse_string_expr(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s.clone()),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

/// Table ids as `'1,2,3'` or a single number. An empty string is an empty list.
fn parse_id_list(expr: &Expr) -> Result<Vec<TableId>, SqlError> {
    match extract_value(expr) {
        Some(Value::Number(s, _)) => s
            .parse()
            .map(|id| vec![id])
            .map_err(|e| SqlError::Parse(format!("bad table id {s:?}: {e}"))),
        Some(Value::SingleQuotedString(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse()
                    .map_err(|e| SqlError::Parse(format!("bad table id {part:?}: {e}")))
            })
            .collect(),
        _ => Err(SqlError::Parse(format!("expected table list, got {expr}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
    BadState(String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::BadState(s) => write!(f, "unknown reservation state: {s}"),
        }
    }
}

impl std::error::Error for SqlError {}
