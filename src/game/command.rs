use serde::{Deserialize, Serialize};

use crate::coords::TilePos;
use crate::game::engines::EngineId;
use crate::game::vehicles::{Order, VehicleId};
use crate::map::{Corner, RoadBits};
use crate::types::{Axis, CompanyId, DiagDir, Money, Track, Transport};

/// Every world mutation a company can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    BuildRail {
        tile: TilePos,
        track: Track,
    },
    RemoveRail {
        tile: TilePos,
        track: Track,
    },
    BuildRailStation {
        tile: TilePos,
        axis: Axis,
        length: u8,
    },
    BuildRailDepot {
        tile: TilePos,
        dir: DiagDir,
    },
    BuildRoad {
        tile: TilePos,
        bits: RoadBits,
    },
    RemoveRoad {
        tile: TilePos,
        bits: RoadBits,
    },
    BuildRoadDepot {
        tile: TilePos,
        dir: DiagDir,
    },
    BuildRoadStop {
        tile: TilePos,
        dir: DiagDir,
        truck: bool,
    },
    BuildAirport {
        tile: TilePos,
    },
    BuildBridge {
        start: TilePos,
        end: TilePos,
        transport: Transport,
        kind: u8,
    },
    /// The far portal is located by the command and reported in the outcome.
    BuildTunnel {
        start: TilePos,
        transport: Transport,
    },
    ClearTile {
        tile: TilePos,
    },
    Terraform {
        tile: TilePos,
        corner: Corner,
        raise: bool,
    },
    BuildVehicle {
        depot: TilePos,
        engine: EngineId,
    },
    SellVehicle {
        vehicle: VehicleId,
    },
    AttachWagon {
        wagon: VehicleId,
        head: VehicleId,
    },
    InsertOrder {
        vehicle: VehicleId,
        index: u8,
        order: Order,
    },
    StartStopVehicle {
        vehicle: VehicleId,
    },
    ChangeServiceInterval {
        vehicle: VehicleId,
        days: u16,
    },
    SendToDepot {
        vehicle: VehicleId,
        cancel: bool,
    },
    IncreaseLoan,
    DecreaseLoan,
    BuyCompany {
        target: CompanyId,
    },
    BuildHeadquarters {
        tile: TilePos,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct CommandFlags(u8);

impl CommandFlags {
    /// Cost query only; nothing is changed.
    pub const QUERY: CommandFlags = CommandFlags(0);
    pub const EXEC: CommandFlags = CommandFlags(1);
    /// Refuse to terraform next to water.
    pub const NO_WATER: CommandFlags = CommandFlags(4);
    pub const NO_TOWN_RATING: CommandFlags = CommandFlags(8);

    pub const fn contains(self, other: CommandFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_exec(self) -> bool {
        self.contains(Self::EXEC)
    }

    pub const fn without(self, other: CommandFlags) -> Self {
        CommandFlags(self.0 & !other.0)
    }

    pub const fn union(self, other: CommandFlags) -> Self {
        CommandFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for CommandFlags {
    type Output = CommandFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub cost: Money,
    pub new_vehicle: Option<VehicleId>,
    pub end_tile: Option<TilePos>,
}

impl CommandOutcome {
    pub fn cost(cost: Money) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("invalid company {0}")]
    InvalidCompany(CompanyId),
    #[error("tile {0} is off the map")]
    OffMap(TilePos),
    #[error("tile {0} is occupied")]
    Occupied(TilePos),
    #[error("tile {0} is water")]
    Water(TilePos),
    #[error("land at {0} is sloped the wrong way")]
    BadSlope(TilePos),
    #[error("tile {0} is at sea level")]
    SeaLevel(TilePos),
    #[error("owned by another company at {0}")]
    NotOwner(TilePos),
    #[error("nothing to remove at {0}")]
    NothingToRemove(TilePos),
    #[error("piece already built at {0}")]
    AlreadyBuilt(TilePos),
    #[error("town buildings at {0} cannot be demolished")]
    TownBuilding(TilePos),
    #[error("local authority refuses at {0}")]
    TownRefuses(TilePos),
    #[error("no suitable end for bridge or tunnel from {0}")]
    NoCrossingEnd(TilePos),
    #[error("terraforming limit reached at {0}")]
    TerraformLimit(TilePos),
    #[error("not enough money: need {needed}, have {available}")]
    NotEnoughMoney { needed: Money, available: Money },
    #[error("unknown engine")]
    UnknownEngine,
    #[error("engine not available yet")]
    EngineUnavailable,
    #[error("no depot at {0}")]
    NoDepot(TilePos),
    #[error("vehicle does not exist")]
    UnknownVehicle,
    #[error("vehicle must be stopped inside a depot")]
    NotInDepot,
    #[error("incompatible vehicle")]
    IncompatibleVehicle,
    #[error("station {0} does not exist")]
    UnknownStation(usize),
    #[error("loan limit reached")]
    LoanLimit,
    #[error("company is not for sale")]
    NotForSale,
    #[error("headquarters already built")]
    HeadquartersExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_compose() {
        let flags = CommandFlags::EXEC | CommandFlags::NO_TOWN_RATING;
        assert!(flags.is_exec());
        assert!(flags.contains(CommandFlags::NO_TOWN_RATING));
        assert!(!flags.without(CommandFlags::EXEC).is_exec());
        assert!(!CommandFlags::QUERY.is_exec());
    }
}
