use rand::Rng;
use tracing::{debug, info};

use crate::game::command::{Command, CommandFlags};
use crate::game::company::BANKRUPT_TIMEOUT_HUMAN;
use crate::game::world::World;
use crate::types::{CompanyId, Money};

/// Set once every possible buyer has turned the offer down.
pub const ALL_ASKED: u8 = 0xFF;
const HQ_SEARCH_RADIUS: u32 = 8;

/// Offers a company that is up for sale to the next candidate buyer.
pub fn handle_takeover(world: &mut World, seller: CompanyId) {
    let Some(c) = world.company_mut(seller) else {
        return;
    };
    if c.bankrupt_timeout != 0 {
        c.bankrupt_timeout -= 8;
        if c.bankrupt_timeout > 0 {
            return;
        }
        c.bankrupt_timeout = 0;
    }
    if c.bankrupt_asked == ALL_ASKED {
        return;
    }
    let asked = c.bankrupt_asked;
    let value = c.bankrupt_value;

    let buyer = world
        .companies
        .iter()
        .filter(|b| b.active && b.id < 8 && asked & (1 << b.id) == 0 && b.bankrupt_asked == 0)
        .max_by_key(|b| (b.performance(), std::cmp::Reverse(b.id)))
        .map(|b| (b.id, b.is_ai, b.money));
    let Some((buyer, buyer_is_ai, buyer_money)) = buyer else {
        debug!(company = seller, "nobody left to offer the company to");
        if let Some(c) = world.company_mut(seller) {
            c.bankrupt_asked = ALL_ASKED;
        }
        return;
    };
    if let Some(c) = world.company_mut(seller) {
        c.bankrupt_asked |= 1 << buyer;
    }
    if !buyer_is_ai {
        info!(company = seller, buyer, value, "company offered to player");
        if let Some(c) = world.company_mut(seller) {
            c.bankrupt_timeout = BANKRUPT_TIMEOUT_HUMAN;
        }
        return;
    }
    if buyer_money >> 1 >= value {
        match world.execute(buyer, Command::BuyCompany { target: seller }, CommandFlags::EXEC) {
            Ok(_) => info!(company = seller, buyer, value, "company bought"),
            Err(err) => debug!(company = seller, buyer, %err, "takeover failed"),
        }
    }
}

/// Repays when rich, borrows when poor and spending little.
pub fn adjust_loan(world: &mut World, company: CompanyId) {
    let base = world.prices.ai_base();
    let max_loan = world.prices.max_loan;
    let Some(c) = world.company(company) else {
        return;
    };
    let command = if c.money > base * 1400 {
        if c.loan == 0 {
            return;
        }
        Command::DecreaseLoan
    } else if c.money < base * 500 {
        let recent: Money = c.quarterly_expenses.iter().take(2).sum();
        if c.loan >= max_loan || c.performance_history.len() < 2 || recent >= base * 60 {
            return;
        }
        Command::IncreaseLoan
    } else {
        return;
    };
    if world.execute(company, command, CommandFlags::EXEC).is_ok() {
        debug!(company, ?command, loan = world.company(company).map(|c| c.loan), "loan adjusted");
    }
}

/// Now and then tries to put up headquarters near one of our stations.
pub fn build_headquarters(world: &mut World, company: CompanyId, rng: &mut impl Rng) {
    if world.company(company).is_none_or(|c| c.hq.is_some()) || !rng.gen_ratio(1, 5) {
        return;
    }
    let stations: Vec<_> = world.stations_of(company).map(|s| s.xy()).collect();
    if stations.is_empty() {
        return;
    }
    let near = stations[rng.gen_range(0..stations.len())];
    let tile = near.jitter(HQ_SEARCH_RADIUS, world.map.bounds(), rng);
    let flags = CommandFlags::EXEC.union(CommandFlags::NO_WATER);
    if world
        .execute(company, Command::BuildHeadquarters { tile }, flags)
        .is_ok()
    {
        info!(company, %tile, "headquarters built");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::map::Map;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world(ai: usize, human: usize) -> World {
        let config = GameConfig {
            num_ai_companies: ai,
            num_human_companies: human,
            ..GameConfig::default()
        };
        World::with_map(config, Map::flat(40, 40, 2))
    }

    #[test]
    fn repays_when_rich_and_borrows_when_poor() {
        let mut w = world(1, 0);
        let base = w.prices.ai_base();
        w.companies[0].money = base * 2000;
        let loan = w.companies[0].loan;
        adjust_loan(&mut w, 0);
        assert_eq!(w.companies[0].loan, loan - w.prices.loan_step);

        w.companies[0].money = base * 100;
        adjust_loan(&mut w, 0);
        assert_eq!(w.companies[0].loan, loan - w.prices.loan_step, "no history yet");

        w.companies[0].performance_history = vec![100, 100];
        w.companies[0].quarterly_expenses = vec![10, 10];
        adjust_loan(&mut w, 0);
        assert_eq!(w.companies[0].loan, loan);
    }

    #[test]
    fn never_borrows_past_the_limit() {
        let mut w = world(1, 0);
        w.companies[0].money = 0;
        w.companies[0].loan = w.prices.max_loan;
        w.companies[0].performance_history = vec![1, 1];
        adjust_loan(&mut w, 0);
        assert_eq!(w.companies[0].loan, w.prices.max_loan);
    }

    #[test]
    fn richest_performer_is_asked_first_and_buys() {
        let mut w = world(3, 0);
        w.companies[0].bankrupt_asked = 1;
        w.companies[0].bankrupt_value = 1_000;
        w.companies[1].performance_history = vec![10];
        w.companies[2].performance_history = vec![500];
        let station = w
            .stations
            .add(0, crate::types::Transport::Road, vec![crate::coords::TilePos::new(5, 5)], None);
        handle_takeover(&mut w, 0);
        assert!(!w.companies[0].active);
        assert_eq!(w.stations.get(station).map(|s| s.owner), Some(2));
        assert!(w.companies[1].active);
    }

    #[test]
    fn human_buyers_get_time_to_decide() {
        let mut w = world(1, 1);
        w.companies[1].bankrupt_asked = 1 << 1;
        w.companies[1].bankrupt_value = 1_000;
        handle_takeover(&mut w, 1);
        assert_eq!(w.companies[1].bankrupt_timeout, BANKRUPT_TIMEOUT_HUMAN);
        assert_eq!(w.companies[1].bankrupt_asked, 0b11);
        handle_takeover(&mut w, 1);
        assert_eq!(w.companies[1].bankrupt_timeout, BANKRUPT_TIMEOUT_HUMAN - 8);
        w.companies[1].bankrupt_timeout = 8;
        handle_takeover(&mut w, 1);
        assert_eq!(w.companies[1].bankrupt_asked, ALL_ASKED);
    }

    #[test]
    fn headquarters_go_up_near_a_station() {
        let mut w = world(1, 0);
        w.stations.add(0, crate::types::Transport::Road, vec![crate::coords::TilePos::new(20, 20)], None);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            build_headquarters(&mut w, 0, &mut rng);
        }
        let hq = w.companies[0].hq.expect("headquarters");
        assert!(hq.max_distance(crate::coords::TilePos::new(20, 20)) <= HQ_SEARCH_RADIUS);
    }
}
