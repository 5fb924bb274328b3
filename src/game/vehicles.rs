use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::coords::TilePos;
use crate::game::engines::EngineId;
use crate::types::{CompanyId, Money, StationId, VehicleClass};

/// Generation-checked handle into the vehicle pool. A handle to a sold
/// vehicle stops resolving once its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct OrderFlags(u8);

impl OrderFlags {
    pub const NONE: OrderFlags = OrderFlags(0);
    pub const FULL_LOAD: OrderFlags = OrderFlags(1);
    pub const UNLOAD: OrderFlags = OrderFlags(2);

    pub const fn contains(self, other: OrderFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for OrderFlags {
    type Output = OrderFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        OrderFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for OrderFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub station: StationId,
    pub flags: OrderFlags,
}

pub type OrderList = SmallVec<[Order; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    Stopped,
    Running,
    /// Heading for its depot; arrives after the given number of days.
    GoingToDepot {
        days_left: u8,
        stop_there: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub owner: CompanyId,
    pub engine: EngineId,
    pub class: VehicleClass,
    pub depot: TilePos,
    pub in_depot: bool,
    pub status: VehicleStatus,
    pub age_days: u32,
    pub max_age_days: u32,
    pub reliability: u16,
    pub days_since_service: u32,
    pub service_interval: u16,
    pub profit_this_year: Money,
    pub profit_last_year: Money,
    pub value: Money,
    pub capacity: u16,
    pub orders: OrderList,
    pub cur_order: u8,
    /// Wagons pulled by this engine, front to back.
    pub wagons: SmallVec<[VehicleId; 8]>,
    pub attached_to: Option<VehicleId>,
}

impl Vehicle {
    pub fn is_stopped_in_depot(&self) -> bool {
        self.in_depot && self.status == VehicleStatus::Stopped
    }

    pub fn is_primary(&self) -> bool {
        self.attached_to.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    vehicle: Option<Vehicle>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehiclePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl VehiclePool {
    /// Reserves the id the next insertion will receive.
    pub fn next_id(&self) -> VehicleId {
        match self.free.last() {
            Some(&index) => VehicleId {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => VehicleId {
                index: self.slots.len() as u32,
                generation: 0,
            },
        }
    }

    pub fn insert(&mut self, build: impl FnOnce(VehicleId) -> Vehicle) -> VehicleId {
        let id = self.next_id();
        let vehicle = build(id);
        if id.index as usize == self.slots.len() {
            self.slots.push(Slot {
                generation: 0,
                vehicle: Some(vehicle),
            });
        } else {
            self.free.pop();
            self.slots[id.index as usize].vehicle = Some(vehicle);
        }
        id
    }

    pub fn remove(&mut self, id: VehicleId) -> Option<Vehicle> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let vehicle = slot.vehicle.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(vehicle)
    }

    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.vehicle.as_ref())
    }

    pub fn get_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.vehicle.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.slots.iter().filter_map(|slot| slot.vehicle.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vehicle> {
        self.slots.iter_mut().filter_map(|slot| slot.vehicle.as_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(id: VehicleId) -> Vehicle {
        Vehicle {
            id,
            owner: 0,
            engine: EngineId(0),
            class: VehicleClass::Train,
            depot: TilePos::new(1, 1),
            in_depot: true,
            status: VehicleStatus::Stopped,
            age_days: 0,
            max_age_days: 100,
            reliability: 40_000,
            days_since_service: 0,
            service_interval: 150,
            profit_this_year: 0,
            profit_last_year: 0,
            value: 1_000,
            capacity: 0,
            orders: OrderList::new(),
            cur_order: 0,
            wagons: SmallVec::new(),
            attached_to: None,
        }
    }

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut pool = VehiclePool::default();
        let first = pool.insert(dummy);
        assert!(pool.remove(first).is_some());
        let second = pool.insert(dummy);
        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);
        assert!(pool.get(first).is_none());
        assert!(pool.get(second).is_some());
        assert_eq!(pool.len(), 1);
    }
}
