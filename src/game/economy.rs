use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::coords::{TilePos, TileRect};
use crate::types::{Cargo, CompanyId, IndustryId, Money, TownId};

pub const MAX_COMPANIES: usize = 8;

/// Base prices of the construction and fleet economy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prices {
    pub clear_grass: Money,
    pub clear_trees: Money,
    pub clear_structure: Money,
    pub terraform: Money,
    pub build_rail: Money,
    pub remove_rail: Money,
    pub build_road: Money,
    pub remove_road: Money,
    pub build_station: Money,
    pub build_depot: Money,
    pub build_airport: Money,
    pub build_bridge: Money,
    pub build_tunnel: Money,
    pub build_headquarters: Money,
    /// Reference used by the computer players for their money thresholds.
    pub station_value: Money,
    pub loan_step: Money,
    pub max_loan: Money,
}

impl Default for Prices {
    fn default() -> Self {
        Self {
            clear_grass: 20,
            clear_trees: 40,
            clear_structure: 150,
            terraform: 250,
            build_rail: 100,
            remove_rail: 20,
            build_road: 80,
            remove_road: 20,
            build_station: 300,
            build_depot: 400,
            build_airport: 900,
            build_bridge: 360,
            build_tunnel: 500,
            build_headquarters: 4_000,
            station_value: 250,
            loan_step: 10_000,
            max_loan: 300_000,
        }
    }
}

impl Prices {
    /// Price unit the computer players scale their money thresholds by.
    pub fn ai_base(&self) -> Money {
        self.station_value >> 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum IndustryKind {
    CoalMine,
    PowerStation,
    Forest,
    Sawmill,
    Farm,
    Factory,
    IronOreMine,
    SteelMill,
    OilWells,
    Refinery,
}

impl IndustryKind {
    pub fn produces(self) -> &'static [Cargo] {
        match self {
            IndustryKind::CoalMine => &[Cargo::Coal],
            IndustryKind::Forest => &[Cargo::Wood],
            IndustryKind::Farm => &[Cargo::Livestock, Cargo::Grain],
            IndustryKind::IronOreMine => &[Cargo::IronOre],
            IndustryKind::OilWells => &[Cargo::Oil],
            IndustryKind::Sawmill | IndustryKind::Factory | IndustryKind::Refinery => {
                &[Cargo::Goods]
            }
            IndustryKind::SteelMill => &[Cargo::Steel],
            IndustryKind::PowerStation => &[],
        }
    }

    pub fn accepts(self) -> &'static [Cargo] {
        match self {
            IndustryKind::PowerStation => &[Cargo::Coal],
            IndustryKind::Sawmill => &[Cargo::Wood],
            IndustryKind::Factory => &[Cargo::Livestock, Cargo::Grain, Cargo::Steel],
            IndustryKind::SteelMill => &[Cargo::IronOre],
            IndustryKind::Refinery => &[Cargo::Oil],
            _ => &[],
        }
    }

    /// Raw producers start working immediately; processors only output what
    /// gets delivered to them.
    pub fn base_production(self) -> u16 {
        match self {
            IndustryKind::CoalMine | IndustryKind::IronOreMine => 120,
            IndustryKind::Forest | IndustryKind::Farm | IndustryKind::OilWells => 90,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Industry {
    pub id: IndustryId,
    pub kind: IndustryKind,
    /// North tile of the 2x2 footprint.
    pub tile: TilePos,
    pub production_rate: [u16; 2],
    pub last_month_production: [u16; 2],
    pub last_month_transported: [u16; 2],
    /// Share of last month's production that was picked up, out of 255.
    pub pct_transported: [u8; 2],
}

impl Industry {
    pub fn footprint(&self) -> TileRect {
        TileRect {
            min: self.tile,
            max: self.tile.offset(1, 1),
        }
    }

    pub fn centre(&self) -> TilePos {
        self.tile
    }

    pub fn produced_slot(&self, cargo: Cargo) -> Option<usize> {
        self.kind.produces().iter().position(|c| *c == cargo)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Town {
    pub id: TownId,
    pub name: String,
    pub centre: TilePos,
    pub population: u32,
    /// Share of passengers picked up last month, out of 255.
    pub pct_pass_transported: u8,
    pub pct_mail_transported: u8,
    pub ratings: [i16; MAX_COMPANIES],
}

impl Town {
    pub const INITIAL_RATING: i16 = 500;
    pub const MIN_RATING: i16 = -1000;

    pub fn rating(&self, company: CompanyId) -> i16 {
        self.ratings
            .get(company)
            .copied()
            .unwrap_or(Self::INITIAL_RATING)
    }

    pub fn change_rating(&mut self, company: CompanyId, delta: i16) {
        if let Some(r) = self.ratings.get_mut(company) {
            *r = r.saturating_add(delta).clamp(Self::MIN_RATING, 1000);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Town(TownId),
    Industry(IndustryId),
}

/// Open and awarded offers the world keeps at once.
pub const MAX_SUBSIDIES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subsidy {
    pub cargo: Cargo,
    pub from: Endpoint,
    pub to: Endpoint,
    pub age_months: u8,
    pub awarded: Option<CompanyId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_processed_cargo_has_a_source() {
        for kind in IndustryKind::iter() {
            for cargo in kind.accepts() {
                assert!(
                    IndustryKind::iter().any(|k| k.produces().contains(cargo)),
                    "{kind} accepts {cargo} which nothing produces"
                );
            }
        }
    }

    #[test]
    fn rating_is_clamped() {
        let mut town = Town {
            id: 0,
            name: "Fort Blinwell".to_string(),
            centre: TilePos::new(10, 10),
            population: 500,
            pct_pass_transported: 0,
            pct_mail_transported: 0,
            ratings: [Town::INITIAL_RATING; MAX_COMPANIES],
        };
        town.change_rating(1, -3000);
        assert_eq!(town.rating(1), Town::MIN_RATING);
    }
}
