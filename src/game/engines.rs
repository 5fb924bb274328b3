use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::types::{Cargo, Money, VehicleClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EngineId(pub u16);

#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub id: EngineId,
    pub name: &'static str,
    pub class: VehicleClass,
    pub cost: Money,
    pub running_cost: Money,
    /// Out of 65535.
    pub reliability: u16,
    pub max_age_years: u32,
    pub capacity: u16,
    pub cargo: Option<Cargo>,
    /// Pulling power used to rank locomotives; zero for everything else.
    pub score: u16,
    pub speed: u16,
    pub is_wagon: bool,
    pub intro_year: u32,
}

impl EngineInfo {
    pub fn is_available(&self, year: u32) -> bool {
        self.intro_year <= year
    }

    pub fn max_age_days(&self) -> u32 {
        self.max_age_years * 365
    }

    pub fn carries(&self, cargo: Cargo) -> bool {
        self.cargo == Some(cargo)
    }
}

impl EngineId {
    pub fn lookup(self) -> Option<&'static EngineInfo> {
        ENGINES.get(self.0 as usize)
    }
}

struct Spec(
    &'static str,
    VehicleClass,
    Money,
    u16,
    u16,
    Option<Cargo>,
    u16,
    u16,
    u32,
);

pub static ENGINES: Lazy<Vec<EngineInfo>> = Lazy::new(|| {
    use Cargo::*;
    use VehicleClass::*;
    let locos = [
        Spec("Kirby Paul Tank", Train, 7_500, 42_000, 0, None, 24, 64, 1920),
        Spec("Chaney Jubilee", Train, 9_500, 37_000, 0, None, 32, 80, 1935),
        Spec("Ploddyphut Mk I", Train, 12_000, 33_000, 0, None, 40, 100, 1950),
        Spec("MJS 250 Diesel", Train, 16_000, 38_500, 0, None, 48, 112, 1955),
    ];
    let wagons = [
        Spec("Passenger Carriage", Train, 1_400, 0, 30, Some(Passengers), 0, 0, 1920),
        Spec("Mail Van", Train, 1_300, 0, 30, Some(Mail), 0, 0, 1920),
        Spec("Coal Truck", Train, 1_200, 0, 30, Some(Coal), 0, 0, 1920),
        Spec("Wood Truck", Train, 1_200, 0, 30, Some(Wood), 0, 0, 1920),
        Spec("Livestock Van", Train, 1_300, 0, 25, Some(Livestock), 0, 0, 1920),
        Spec("Grain Hopper", Train, 1_200, 0, 30, Some(Grain), 0, 0, 1920),
        Spec("Iron Ore Hopper", Train, 1_250, 0, 30, Some(IronOre), 0, 0, 1920),
        Spec("Steel Truck", Train, 1_350, 0, 20, Some(Steel), 0, 0, 1920),
        Spec("Oil Tanker", Train, 1_400, 0, 21, Some(Oil), 0, 0, 1920),
        Spec("Goods Van", Train, 1_500, 0, 15, Some(Goods), 0, 0, 1920),
    ];
    let road = [
        Spec("MPS Regal Bus", Road, 4_300, 40_000, 31, Some(Passengers), 0, 56, 1930),
        Spec("Hereford Leopard Bus", Road, 5_200, 36_000, 35, Some(Passengers), 0, 88, 1963),
        Spec("MPS Mail Truck", Road, 4_000, 39_000, 22, Some(Mail), 0, 48, 1930),
        Spec("Balogh Coal Truck", Road, 4_500, 40_000, 20, Some(Coal), 0, 48, 1930),
        Spec("Witcombe Wood Truck", Road, 4_500, 39_000, 20, Some(Wood), 0, 48, 1930),
        Spec("Talbott Livestock Van", Road, 4_400, 38_000, 14, Some(Livestock), 0, 48, 1930),
        Spec("Hereford Grain Truck", Road, 4_400, 39_500, 20, Some(Grain), 0, 48, 1930),
        Spec("MPS Iron Ore Truck", Road, 4_600, 38_000, 22, Some(IronOre), 0, 48, 1930),
        Spec("Balogh Steel Truck", Road, 4_700, 37_500, 15, Some(Steel), 0, 48, 1930),
        Spec("Witcombe Oil Tanker", Road, 4_800, 38_000, 21, Some(Oil), 0, 48, 1930),
        Spec("Balogh Goods Truck", Road, 4_900, 39_000, 14, Some(Goods), 0, 48, 1930),
    ];
    let air = [
        Spec("Sampson U52", Aircraft, 28_000, 38_000, 25, Some(Passengers), 0, 238, 1930),
        Spec("Darwin 100", Aircraft, 36_000, 34_000, 30, Some(Passengers), 0, 476, 1953),
        Spec("Coleman Count", Aircraft, 44_000, 37_000, 65, Some(Passengers), 0, 476, 1955),
    ];
    let ships = [Spec("MPS Oil Tanker", Ship, 30_000, 40_000, 220, Some(Oil), 0, 24, 1920)];

    locos
        .into_iter()
        .map(|s| (s, false, 20))
        .chain(wagons.into_iter().map(|s| (s, true, 30)))
        .chain(road.into_iter().map(|s| (s, false, 12)))
        .chain(air.into_iter().map(|s| (s, false, 20)))
        .chain(ships.into_iter().map(|s| (s, false, 30)))
        .enumerate()
        .map(|(idx, (s, is_wagon, max_age_years))| EngineInfo {
            id: EngineId(idx as u16),
            name: s.0,
            class: s.1,
            cost: s.2,
            running_cost: s.2 / 12,
            reliability: if is_wagon { u16::MAX } else { s.3 },
            max_age_years,
            capacity: s.4,
            cargo: s.5,
            score: s.6,
            speed: s.7,
            is_wagon,
            intro_year: s.8,
        })
        .collect()
});

pub fn engines_of(class: VehicleClass) -> impl Iterator<Item = &'static EngineInfo> {
    ENGINES.iter().filter(move |e| e.class == class)
}

pub fn wagon_for(cargo: Cargo) -> Option<&'static EngineInfo> {
    engines_of(VehicleClass::Train).find(|e| e.is_wagon && e.carries(cargo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_cargo_has_a_wagon() {
        for cargo in Cargo::ALL {
            assert!(wagon_for(cargo).is_some(), "no wagon for {cargo}");
        }
    }

    #[test]
    fn ids_match_catalog_positions() {
        for (idx, engine) in ENGINES.iter().enumerate() {
            assert_eq!(engine.id.0 as usize, idx);
            assert_eq!(engine.id.lookup().map(|e| e.name), Some(engine.name));
        }
    }
}
