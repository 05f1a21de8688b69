use std::collections::HashMap;

use crate::model::*;

use super::policy::policy;
use super::{BookingError, Engine};

/// Comma-joined display numbers of `table_ids`, `-` when empty.
fn table_numbers(table_ids: &[TableId], numbers: &HashMap<TableId, u32>) -> String {
    if table_ids.is_empty() {
        return "-".to_string();
    }
    let mut shown: Vec<u32> = table_ids
        .iter()
        .filter_map(|id| numbers.get(id).copied())
        .collect();
    shown.sort_unstable();
    if shown.is_empty() {
        return "-".to_string();
    }
    shown
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Engine {
    async fn table_numbers(&self) -> Result<HashMap<TableId, u32>, BookingError> {
        Ok(self
            .store
            .fetch_tables(self.restaurant_id)
            .await?
            .into_iter()
            .map(|t| (t.id, t.number))
            .collect())
    }

    /// Reservation monitor: every reservation, newest date first.
    pub async fn list_reservations(&self) -> Result<Vec<ReservationSummary>, BookingError> {
        let numbers = self.table_numbers().await?;
        let mut reservations = self.store.list_reservations(self.restaurant_id).await?;
        reservations.sort_by(|a, b| b.header.at.cmp(&a.header.at).then(b.id.cmp(&a.id)));

        let mut out = Vec::with_capacity(reservations.len());
        for r in reservations {
            let client_name = match self.store.fetch_client(r.header.client_id).await? {
                Some(c) => c.full_name(),
                None => format!("client {}", r.header.client_id),
            };
            out.push(ReservationSummary {
                id: r.id,
                client_name,
                party_size: r.header.party_size,
                at: r.header.at,
                tables: table_numbers(&r.table_ids, &numbers),
                state: r.header.state,
            });
        }
        Ok(out)
    }

    /// Everything the detail sheet shows for one reservation.
    pub async fn reservation_detail(&self, id: ReservationId) -> Result<ReservationDetail, BookingError> {
        let r = self.existing(id).await?;
        let restaurant = self.store.fetch_restaurant(self.restaurant_id).await?;
        let client = self.store.fetch_client(r.header.client_id).await?;
        let employee = match r.header.employee_id {
            Some(eid) => self.store.fetch_employee(eid).await?,
            None => None,
        };
        let numbers = self.table_numbers().await?;
        let policy = policy(r.header.policy_id);

        Ok(ReservationDetail {
            id: r.id,
            restaurant_name: restaurant.as_ref().map(|x| x.name.clone()).unwrap_or_default(),
            restaurant_address: restaurant.map(|x| x.address).unwrap_or_default(),
            client_name: client.as_ref().map(Client::full_name).unwrap_or_default(),
            client_id_card: client.as_ref().map(|c| c.id_card.clone()).unwrap_or_default(),
            client_phone: client.map(|c| c.phone).unwrap_or_default(),
            policy_description: policy.map(|p| p.description.to_string()).unwrap_or_default(),
            policy_value_cents: policy.map_or(0, |p| p.value_cents),
            at: r.header.at,
            party_size: r.header.party_size,
            state: r.header.state,
            employee_name: employee.map_or_else(|| "unassigned".to_string(), |e| e.name),
            tables: table_numbers(&r.table_ids, &numbers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_numbers_are_sorted_and_joined() {
        let numbers = HashMap::from([(10, 3), (11, 1), (12, 2)]);
        assert_eq!(table_numbers(&[10, 11], &numbers), "1, 3");
        assert_eq!(table_numbers(&[], &numbers), "-");
        assert_eq!(table_numbers(&[99], &numbers), "-");
    }
}
