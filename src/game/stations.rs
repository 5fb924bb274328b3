use serde::{Deserialize, Serialize};

use crate::coords::{TilePos, TileRect};
use crate::types::{CompanyId, StationId, TownId, Transport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub owner: CompanyId,
    pub transport: Transport,
    pub tiles: Vec<TilePos>,
    pub town: Option<TownId>,
}

impl Station {
    pub fn xy(&self) -> TilePos {
        self.tiles.first().copied().unwrap_or(TilePos::new(0, 0))
    }

    pub fn rect(&self) -> TileRect {
        let mut rect = TileRect::around(self.xy());
        for tile in &self.tiles {
            rect.include(*tile);
        }
        rect
    }

    /// Catchment radius around the station footprint.
    pub fn catchment_radius(transport: Transport) -> i32 {
        match transport {
            Transport::Road => 3,
            _ => 4,
        }
    }
}

/// Stations keyed by id; removed stations leave a hole so ids stay stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationList {
    slots: Vec<Option<Station>>,
}

impl StationList {
    pub fn add(&mut self, owner: CompanyId, transport: Transport, tiles: Vec<TilePos>, town: Option<TownId>) -> StationId {
        let id = self
            .slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len());
        let station = Station {
            id,
            owner,
            transport,
            tiles,
            town,
        };
        if id == self.slots.len() {
            self.slots.push(Some(station));
        } else {
            self.slots[id] = Some(station);
        }
        id
    }

    pub fn get(&self, id: StationId) -> Option<&Station> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: StationId) -> Option<&mut Station> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, id: StationId) -> Option<Station> {
        self.slots.get_mut(id).and_then(Option::take)
    }

    pub fn next_id(&self) -> StationId {
        self.slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}
