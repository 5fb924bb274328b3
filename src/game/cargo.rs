use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Cargo;

/// Per-cargo totals over an area. Acceptance is counted in eighths, so a
/// value of 8 means the area fully accepts that cargo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CargoAmounts {
    counts: [u16; Cargo::ALL.len()],
}

impl Default for CargoAmounts {
    fn default() -> Self {
        Self::zero()
    }
}

impl CargoAmounts {
    pub const fn zero() -> Self {
        Self {
            counts: [0; Cargo::ALL.len()],
        }
    }

    pub fn add(&mut self, cargo: Cargo, amount: u16) {
        let idx = cargo.index();
        self.counts[idx] = self.counts[idx].saturating_add(amount);
    }

    pub fn add_amounts(&mut self, other: &CargoAmounts) {
        for (idx, value) in other.counts.iter().enumerate() {
            self.counts[idx] = self.counts[idx].saturating_add(*value);
        }
    }

    pub fn get(&self, cargo: Cargo) -> u16 {
        self.counts[cargo.index()]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|&v| v as u32).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&value| value == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cargo, u16)> + '_ {
        Cargo::ALL.into_iter().zip(self.counts.iter().copied())
    }
}

impl fmt::Display for CargoAmounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .filter(|(_, amount)| *amount > 0)
            .map(|(cargo, amount)| format!("{amount}x{cargo}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_saturate_and_display() {
        let mut amounts = CargoAmounts::zero();
        amounts.add(Cargo::Coal, u16::MAX);
        amounts.add(Cargo::Coal, 5);
        amounts.add(Cargo::Mail, 3);
        assert_eq!(amounts.get(Cargo::Coal), u16::MAX);
        assert_eq!(amounts.to_string(), format!("3xMAIL, {}xCOAL", u16::MAX));
    }
}
