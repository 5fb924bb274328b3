use tracing::trace;
use uuid::Uuid;

use crate::ai::CompanyController;
use crate::game::config::GameConfig;
use crate::game::world::World;
use crate::types::CompanyId;

/// A world plus the scheduler that hands computer companies their turns.
#[derive(Debug, Clone)]
pub struct Game {
    pub seed: u64,
    pub id: Uuid,
    pub world: World,
    ai_cursor: usize,
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        Self::from_world(World::new(config))
    }

    pub fn from_world(world: World) -> Self {
        Self {
            seed: world.config.seed,
            id: Uuid::new_v4(),
            world,
            ai_cursor: 0,
        }
    }

    /// Advances the world one tick. When the competitor speed allows it, the
    /// next active computer company gets exactly one turn; its id is
    /// returned.
    pub fn play_tick<C: CompanyController>(&mut self, controller: &C) -> Option<CompanyId> {
        self.world.tick();
        if !self.world.config.ai.turn_allowed(self.world.tick) {
            return None;
        }
        let company = self.next_ai_company()?;
        trace!(tick = self.world.tick, company, "ai turn");
        controller.run_turn(&mut self.world, company);
        Some(company)
    }

    pub fn play<C: CompanyController>(&mut self, ticks: u64, controller: &C) {
        for _ in 0..ticks {
            self.play_tick(controller);
        }
    }

    fn next_ai_company(&mut self) -> Option<CompanyId> {
        let n = self.world.companies.len();
        for offset in 0..n {
            let id = (self.ai_cursor + offset) % n;
            let c = &self.world.companies[id];
            if c.is_ai && c.active {
                self.ai_cursor = (id + 1) % n;
                return Some(id);
            }
        }
        None
    }

    pub fn ai_companies(&self) -> impl Iterator<Item = CompanyId> + '_ {
        self.world
            .companies
            .iter()
            .filter(|c| c.is_ai && c.active)
            .map(|c| c.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::PassiveController;
    use crate::map::Map;

    fn game(ai: usize, speed: u8) -> Game {
        let mut config = GameConfig {
            num_ai_companies: ai,
            num_human_companies: 1,
            ..GameConfig::default()
        };
        config.ai.speed = speed;
        Game::from_world(World::with_map(config, Map::flat(16, 16, 2)))
    }

    #[test]
    fn computer_companies_take_turns_in_order() {
        let mut g = game(2, 4);
        let turns: Vec<_> = (0..4).filter_map(|_| g.play_tick(&PassiveController)).collect();
        assert_eq!(turns, vec![1, 2, 1, 2]);
    }

    #[test]
    fn slow_competitors_move_every_sixteenth_tick() {
        let mut g = game(1, 0);
        let turns = (0..32).filter_map(|_| g.play_tick(&PassiveController)).count();
        assert_eq!(turns, 2);
    }

    #[test]
    fn closed_companies_are_skipped() {
        let mut g = game(2, 4);
        g.world.companies[1].active = false;
        let turns: Vec<_> = (0..3).filter_map(|_| g.play_tick(&PassiveController)).collect();
        assert_eq!(turns, vec![2, 2, 2]);
    }
}
