use super::Game;
use crate::types::{ItemKind, MapKnowledge, Position};

/// Radius of the knowledge patch granted by picking up a dropped map.
const FOUND_MAP_RADIUS: i32 = 5;

pub(crate) fn initial_map(start_position: Position) -> MapKnowledge {
    MapKnowledge {
        cells: Vec::new(),
        start_position,
    }
}

impl Game {
    fn blank_mask(&self) -> Vec<Vec<Vec<bool>>> {
        vec![
            vec![vec![false; self.maze.width as usize]; self.maze.height as usize];
            self.maze.levels as usize
        ]
    }

    /// Folds a fresh visibility mask into the player's cumulative map.
    pub(crate) fn update_player_map(&mut self, idx: usize, mask: &[Vec<Vec<bool>>]) {
        if self.players[idx].map.cells.is_empty() {
            self.players[idx].map.cells = self.blank_mask();
        }
        let cells = &mut self.players[idx].map.cells;
        for (level, mask_level) in mask.iter().enumerate() {
            for (y, mask_row) in mask_level.iter().enumerate() {
                for (x, &seen) in mask_row.iter().enumerate() {
                    if seen {
                        cells[level][y][x] = true;
                    }
                }
            }
        }
    }

    /// Map theft: the receiver merges the giver's knowledge into their own,
    /// the giver is left with an empty map anchored at their current cell.
    pub(crate) fn transfer_map(&mut self, from: usize, to: usize) {
        let taken = std::mem::take(&mut self.players[from].map.cells);
        if self.players[to].map.cells.is_empty() && !taken.is_empty() {
            self.players[to].map.cells = self.blank_mask();
        }
        for (level, taken_level) in taken.iter().enumerate() {
            for (y, taken_row) in taken_level.iter().enumerate() {
                for (x, &seen) in taken_row.iter().enumerate() {
                    if seen {
                        self.players[to].map.cells[level][y][x] = true;
                    }
                }
            }
        }
        self.players[from].map.start_position = self.players[from].view.position;
    }

    /// Rolls the per-move chance that the player fumbles their map. On a hit
    /// the knowledge is shed into a map item in the current cell.
    pub(crate) fn check_map_drop(&mut self, idx: usize) -> bool {
        if !self.rng.bool(self.settings.map_drop_chance) {
            return false;
        }
        let position = self.players[idx].view.position;
        self.spawn_item(ItemKind::Map, position);
        self.players[idx].map.cells = Vec::new();
        self.players[idx].map.start_position = position;
        true
    }

    /// A found map reveals a square patch around the pickup spot on the
    /// current level, wrapped across the edges.
    pub(crate) fn absorb_found_map(&mut self, idx: usize) {
        if self.players[idx].map.cells.is_empty() {
            self.players[idx].map.cells = self.blank_mask();
        }
        let position = self.players[idx].view.position;
        for dy in -FOUND_MAP_RADIUS..=FOUND_MAP_RADIUS {
            for dx in -FOUND_MAP_RADIUS..=FOUND_MAP_RADIUS {
                let x = self.maze.wrap_x(position.x + dx) as usize;
                let y = self.maze.wrap_y(position.y + dy) as usize;
                self.players[idx].map.cells[position.level as usize][y][x] = true;
            }
        }
    }
}
