//! Grouping fetched cell states into availability zones.

use std::collections::BTreeMap;
use std::sync::Arc;

use corral_rep::{CellClient, CellState};
use tracing::debug;

use crate::cell::Cell;

/// The cells of one availability zone, in cell-id order.
pub type Zone = Vec<Cell>;

/// Build the round's zone map from fetched snapshots.
///
/// Cells whose fetch failed are simply absent from `states`. Evacuating
/// cells are excluded: they accept no new work. A `BTreeMap` keyed by zone
/// name keeps iteration deterministic, which in turn keeps scheduling
/// deterministic for identical inputs.
pub fn build_zones(
    clients: &BTreeMap<String, Arc<dyn CellClient>>,
    states: Vec<CellState>,
) -> BTreeMap<String, Zone> {
    let mut zones: BTreeMap<String, Zone> = BTreeMap::new();

    for state in states {
        if state.evacuating {
            debug!(cell_id = %state.cell_id, "Skipping evacuating cell");
            continue;
        }

        let Some(client) = clients.get(&state.cell_id) else {
            debug!(cell_id = %state.cell_id, "Skipping state for unknown cell");
            continue;
        };

        zones
            .entry(state.zone.clone())
            .or_default()
            .push(Cell::new(Arc::clone(client), state));
    }

    for zone in zones.values_mut() {
        zone.sort_by(|a, b| a.cell_id().cmp(b.cell_id()));
    }

    zones
}
