use std::collections::BTreeSet;

use crate::model::*;

use super::window::overlap_window;
use super::{BookingError, Engine};

/// Sum of the selected tables' seats must cover the party.
pub(crate) fn check_capacity(tables: &[Table], party_size: u32) -> Result<(), BookingError> {
    let capacity = tables.iter().map(|t| t.capacity).sum::<u32>();
    if capacity < party_size {
        return Err(BookingError::Capacity {
            party_size,
            capacity,
        });
    }
    Ok(())
}

impl Engine {
    /// Candidate tables already held by a blocking reservation inside the
    /// window around `target`. Empty means bookable.
    pub async fn conflicting_tables(
        &self,
        target: Ms,
        table_ids: &[TableId],
        ignore: Option<ReservationId>,
    ) -> Result<BTreeSet<TableId>, BookingError> {
        if table_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let hits = self
            .store
            .fetch_overlapping_links_for_tables(
                self.restaurant_id,
                table_ids,
                overlap_window(target),
                &ReservationState::BLOCKING,
                ignore,
            )
            .await?;
        Ok(hits.into_iter().collect())
    }

    pub(super) async fn check_no_conflict(
        &self,
        target: Ms,
        table_ids: &[TableId],
        ignore: Option<ReservationId>,
    ) -> Result<(), BookingError> {
        let conflicts = self.conflicting_tables(target, table_ids, ignore).await?;
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(BookingError::Conflict(conflicts.into_iter().collect()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: TableId, capacity: u32) -> Table {
        Table {
            id,
            number: id as u32,
            capacity,
            restaurant_id: 1,
        }
    }

    #[test]
    fn capacity_sums_selected_tables() {
        let tables = [table(1, 4), table(2, 6)];
        assert!(check_capacity(&tables, 10).is_ok());
        assert_eq!(
            check_capacity(&tables, 11),
            Err(BookingError::Capacity {
                party_size: 11,
                capacity: 10
            })
        );
    }

    #[test]
    fn exact_fit_is_enough() {
        assert!(check_capacity(&[table(1, 4)], 4).is_ok());
    }
}
