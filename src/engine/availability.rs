use std::collections::HashMap;

use crate::model::*;

use super::window::overlap_window;
use super::{BookingError, Engine};

/// Display status a single link imposes on its table.
pub fn status_for(state: ReservationState) -> TableStatus {
    match state {
        ReservationState::Completed => TableStatus::Occupied,
        ReservationState::Pending | ReservationState::Confirmed => TableStatus::Reserved,
        ReservationState::Cancelled => TableStatus::Available,
    }
}

/// Highest-priority status per table. Occupied is never downgraded.
pub fn resolve_statuses(links: &[(TableId, ReservationState)]) -> HashMap<TableId, TableStatus> {
    let mut resolved: HashMap<TableId, TableStatus> = HashMap::new();
    for &(table_id, state) in links {
        let status = status_for(state);
        resolved
            .entry(table_id)
            .and_modify(|current| *current = (*current).max(status))
            .or_insert(status);
    }
    resolved
}

/// Classify every table. `links` is `None` when no target time was given, in
/// which case every table is Available. Output is ordered by display number,
/// then id.
pub fn classify(
    tables: &[Table],
    links: Option<&[(TableId, ReservationState)]>,
) -> Vec<TableAvailability> {
    let resolved = links.map(resolve_statuses).unwrap_or_default();
    let mut out: Vec<TableAvailability> = tables
        .iter()
        .map(|t| TableAvailability {
            id: t.id,
            number: t.number,
            label: t.label(),
            capacity: t.capacity,
            status: resolved
                .get(&t.id)
                .copied()
                .unwrap_or(TableStatus::Available),
        })
        .collect();
    out.sort_by_key(|a| (a.number, a.id));
    out
}

impl Engine {
    /// Status snapshot of the restaurant's tables at `target`, ignoring the
    /// reservation being edited.
    pub async fn table_statuses(
        &self,
        target: Option<Ms>,
        ignore: Option<ReservationId>,
    ) -> Result<Vec<TableAvailability>, BookingError> {
        let tables = self.store.fetch_tables(self.restaurant_id).await?;
        let Some(target) = target else {
            return Ok(classify(&tables, None));
        };
        let links = self
            .store
            .fetch_overlapping_links(
                self.restaurant_id,
                overlap_window(target),
                &ReservationState::BLOCKING,
                ignore,
            )
            .await?;
        Ok(classify(&tables, Some(&links)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: TableId, number: u32) -> Table {
        Table {
            id,
            number,
            capacity: 4,
            restaurant_id: 1,
        }
    }

    fn status_of(out: &[TableAvailability], id: TableId) -> TableStatus {
        out.iter().find(|a| a.id == id).unwrap().status
    }

    #[test]
    fn no_target_means_all_available() {
        let out = classify(&[table(1, 1), table(2, 2)], None);
        assert!(out.iter().all(|a| a.status == TableStatus::Available));
    }

    #[test]
    fn completed_dominates_regardless_of_order() {
        let tables = [table(1, 1)];
        let a = [
            (1, ReservationState::Completed),
            (1, ReservationState::Pending),
        ];
        let b = [
            (1, ReservationState::Confirmed),
            (1, ReservationState::Completed),
        ];
        assert_eq!(status_of(&classify(&tables, Some(&a)), 1), TableStatus::Occupied);
        assert_eq!(status_of(&classify(&tables, Some(&b)), 1), TableStatus::Occupied);
    }

    #[test]
    fn pending_and_confirmed_are_reserved() {
        let tables = [table(1, 1), table(2, 2), table(3, 3)];
        let links = [
            (1, ReservationState::Pending),
            (2, ReservationState::Confirmed),
        ];
        let out = classify(&tables, Some(&links));
        assert_eq!(status_of(&out, 1), TableStatus::Reserved);
        assert_eq!(status_of(&out, 2), TableStatus::Reserved);
        assert_eq!(status_of(&out, 3), TableStatus::Available);
    }

    #[test]
    fn cancelled_link_does_not_change_status() {
        let tables = [table(1, 1)];
        let links = [(1, ReservationState::Cancelled)];
        assert_eq!(status_of(&classify(&tables, Some(&links)), 1), TableStatus::Available);
    }

    #[test]
    fn ordered_by_number_then_id() {
        let tables = [table(9, 2), table(3, 1), table(1, 2)];
        let ids: Vec<TableId> = classify(&tables, None).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 1, 9]);
    }

    #[test]
    fn labels_use_display_number() {
        let out = classify(&[table(7, 12)], None);
        assert_eq!(out[0].label, "Table 12");
        assert_eq!(out[0].capacity, 4);
    }
}
