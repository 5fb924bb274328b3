use smallvec::SmallVec;

use crate::coords::TilePos;
use crate::game::command::{CommandError, CommandFlags, CommandOutcome};
use crate::game::engines::EngineId;
use crate::game::vehicles::{Order, OrderList, Vehicle, VehicleId, VehicleStatus};
use crate::game::world::World;
use crate::map::{StationPart, TileKind};
use crate::types::{CompanyId, Money, VehicleClass};

pub const MAX_ORDERS: usize = 16;
/// Days a vehicle needs to reach its depot once sent there.
const DAYS_TO_DEPOT: u8 = 4;

impl World {
    fn own_vehicle(&self, company: CompanyId, id: VehicleId) -> Result<&Vehicle, CommandError> {
        match self.vehicles.get(id) {
            Some(v) if v.owner == company => Ok(v),
            _ => Err(CommandError::UnknownVehicle),
        }
    }

    /// Whether `tile` can house vehicles of `class` for `company`.
    pub fn is_depot_for(&self, company: CompanyId, tile: TilePos, class: VehicleClass) -> bool {
        match self.map.kind(tile) {
            TileKind::Depot {
                owner, transport, ..
            } => owner == company && transport == class.transport(),
            TileKind::Station {
                owner,
                part: StationPart::Airport,
                ..
            } => owner == company && class == VehicleClass::Aircraft,
            _ => false,
        }
    }

    pub(crate) fn build_vehicle(
        &mut self,
        company: CompanyId,
        depot: TilePos,
        engine: EngineId,
        flags: CommandFlags,
    ) -> Result<CommandOutcome, CommandError> {
        let info = engine.lookup().ok_or(CommandError::UnknownEngine)?;
        if !info.is_available(self.year()) {
            return Err(CommandError::EngineUnavailable);
        }
        if info.class == VehicleClass::Ship {
            return Err(CommandError::IncompatibleVehicle);
        }
        if !self.is_depot_for(company, depot, info.class) {
            return Err(CommandError::NoDepot(depot));
        }
        let mut outcome = CommandOutcome::cost(info.cost);
        if flags.is_exec() {
            let service_interval = self.config.ai.service_interval;
            let id = self.vehicles.insert(|id| Vehicle {
                id,
                owner: company,
                engine,
                class: info.class,
                depot,
                in_depot: true,
                status: VehicleStatus::Stopped,
                age_days: 0,
                max_age_days: info.max_age_days(),
                reliability: info.reliability,
                days_since_service: 0,
                service_interval,
                profit_this_year: 0,
                profit_last_year: 0,
                value: info.cost,
                capacity: info.capacity,
                orders: OrderList::new(),
                cur_order: 0,
                wagons: SmallVec::new(),
                attached_to: None,
            });
            outcome.new_vehicle = Some(id);
        }
        Ok(outcome)
    }

    /// Sells one vehicle. Wagons of a sold engine stay behind in the depot.
    pub(crate) fn sell_vehicle(
        &mut self,
        company: CompanyId,
        id: VehicleId,
        flags: CommandFlags,
    ) -> Result<Money, CommandError> {
        let v = self.own_vehicle(company, id)?;
        let head_in_depot = match v.attached_to {
            Some(head) => self
                .vehicles
                .get(head)
                .is_none_or(Vehicle::is_stopped_in_depot),
            None => v.is_stopped_in_depot(),
        };
        if !head_in_depot {
            return Err(CommandError::NotInDepot);
        }
        let refund = -v.value;
        if flags.is_exec() {
            if let Some(sold) = self.vehicles.remove(id) {
                for wagon in &sold.wagons {
                    if let Some(w) = self.vehicles.get_mut(*wagon) {
                        w.attached_to = None;
                    }
                }
                if let Some(head) = sold.attached_to.and_then(|h| self.vehicles.get_mut(h)) {
                    head.wagons.retain(|w| *w != id);
                }
            }
        }
        Ok(refund)
    }

    pub(crate) fn attach_wagon(
        &mut self,
        company: CompanyId,
        wagon: VehicleId,
        head: VehicleId,
        flags: CommandFlags,
    ) -> Result<Money, CommandError> {
        let w = self.own_vehicle(company, wagon)?;
        let h = self.own_vehicle(company, head)?;
        let wagon_ok = w.engine.lookup().is_some_and(|e| e.is_wagon);
        let head_ok = h.engine.lookup().is_some_and(|e| !e.is_wagon) && h.class == VehicleClass::Train;
        if !wagon_ok || !head_ok || w.attached_to.is_some() {
            return Err(CommandError::IncompatibleVehicle);
        }
        if !w.is_stopped_in_depot() || !h.is_stopped_in_depot() || w.depot != h.depot {
            return Err(CommandError::NotInDepot);
        }
        if flags.is_exec() {
            if let Some(w) = self.vehicles.get_mut(wagon) {
                w.attached_to = Some(head);
            }
            if let Some(h) = self.vehicles.get_mut(head) {
                h.wagons.push(wagon);
            }
        }
        Ok(0)
    }

    pub(crate) fn insert_order(
        &mut self,
        company: CompanyId,
        id: VehicleId,
        index: u8,
        order: Order,
        flags: CommandFlags,
    ) -> Result<Money, CommandError> {
        let v = self.own_vehicle(company, id)?;
        if !v.is_primary() {
            return Err(CommandError::IncompatibleVehicle);
        }
        let station = self
            .stations
            .get(order.station)
            .ok_or(CommandError::UnknownStation(order.station))?;
        if station.owner != company || station.transport != v.class.transport() {
            return Err(CommandError::IncompatibleVehicle);
        }
        if v.orders.len() >= MAX_ORDERS || index as usize > v.orders.len() {
            return Err(CommandError::IncompatibleVehicle);
        }
        if flags.is_exec() {
            if let Some(v) = self.vehicles.get_mut(id) {
                v.orders.insert(index as usize, order);
            }
        }
        Ok(0)
    }

    pub(crate) fn start_stop_vehicle(
        &mut self,
        company: CompanyId,
        id: VehicleId,
        flags: CommandFlags,
    ) -> Result<Money, CommandError> {
        let v = self.own_vehicle(company, id)?;
        if !v.is_primary() {
            return Err(CommandError::IncompatibleVehicle);
        }
        if flags.is_exec() {
            if let Some(v) = self.vehicles.get_mut(id) {
                v.status = match v.status {
                    VehicleStatus::Stopped => {
                        v.in_depot = false;
                        VehicleStatus::Running
                    }
                    _ => VehicleStatus::Stopped,
                };
            }
        }
        Ok(0)
    }

    pub(crate) fn change_service_interval(
        &mut self,
        company: CompanyId,
        id: VehicleId,
        days: u16,
        flags: CommandFlags,
    ) -> Result<Money, CommandError> {
        self.own_vehicle(company, id)?;
        if flags.is_exec() {
            if let Some(v) = self.vehicles.get_mut(id) {
                v.service_interval = days.max(1);
            }
        }
        Ok(0)
    }

    pub(crate) fn send_to_depot(
        &mut self,
        company: CompanyId,
        id: VehicleId,
        cancel: bool,
        flags: CommandFlags,
    ) -> Result<Money, CommandError> {
        let v = self.own_vehicle(company, id)?;
        if !v.is_primary() {
            return Err(CommandError::IncompatibleVehicle);
        }
        let next = match (v.status, cancel) {
            (VehicleStatus::GoingToDepot { .. }, true) => VehicleStatus::Running,
            (status, true) => status,
            (VehicleStatus::Running, false) => VehicleStatus::GoingToDepot {
                days_left: DAYS_TO_DEPOT,
                stop_there: true,
            },
            (status @ VehicleStatus::GoingToDepot { .. }, false) => status,
            (VehicleStatus::Stopped, false) if v.in_depot => VehicleStatus::Stopped,
            (VehicleStatus::Stopped, false) => return Err(CommandError::IncompatibleVehicle),
        };
        if flags.is_exec() {
            if let Some(v) = self.vehicles.get_mut(id) {
                v.status = next;
            }
        }
        Ok(0)
    }
}
