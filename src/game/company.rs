use serde::{Deserialize, Serialize};

use crate::ai::PlayerAiState;
use crate::coords::TilePos;
use crate::types::{CompanyId, Money};

pub const BANKRUPT_TIMEOUT_HUMAN: i32 = 4_440;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub is_ai: bool,
    pub active: bool,
    pub money: Money,
    pub loan: Money,
    pub hq: Option<TilePos>,
    /// Quarters spent in the red; the company goes up for sale after the third.
    pub months_of_bankruptcy: u8,
    /// Bit per company already offered this one; 255 once everybody was asked.
    pub bankrupt_asked: u8,
    pub bankrupt_timeout: i32,
    pub bankrupt_value: Money,
    /// Quarterly performance ratings, most recent first.
    pub performance_history: Vec<i32>,
    pub expenses_this_quarter: Money,
    /// Recent quarterly expenses, most recent first. Positive means spent.
    pub quarterly_expenses: Vec<Money>,
    pub ai: PlayerAiState,
}

impl Company {
    pub fn new(id: CompanyId, name: String, is_ai: bool, money: Money, loan: Money, seed: u64) -> Self {
        Self {
            id,
            name,
            is_ai,
            active: true,
            money,
            loan,
            hq: None,
            months_of_bankruptcy: 0,
            bankrupt_asked: 0,
            bankrupt_timeout: 0,
            bankrupt_value: 0,
            performance_history: Vec::new(),
            expenses_this_quarter: 0,
            quarterly_expenses: Vec::new(),
            ai: PlayerAiState::new(seed),
        }
    }

    pub fn spend(&mut self, cost: Money) {
        self.money -= cost;
        if cost > 0 {
            self.expenses_this_quarter += cost;
        }
    }

    pub fn performance(&self) -> i32 {
        self.performance_history.first().copied().unwrap_or(0)
    }

    pub fn is_for_sale(&self) -> bool {
        self.bankrupt_asked != 0
    }

    pub fn close_quarter(&mut self, performance: i32) {
        self.performance_history.insert(0, performance);
        self.performance_history.truncate(24);
        self.quarterly_expenses.insert(0, self.expenses_this_quarter);
        self.quarterly_expenses.truncate(24);
        self.expenses_this_quarter = 0;
    }
}
