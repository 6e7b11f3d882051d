use super::Game;
use crate::types::{ItemKind, MazeCell, Position, VisibleState};
use std::f32::consts::PI;

impl Game {
    /// Ray-cast fog of war: 360 one-degree rays fan out from the player and
    /// mark cells until a wall without a secret door blocks the line. A
    /// flashlight doubles the range. Sight never crosses levels.
    pub(crate) fn visibility_mask(&self, idx: usize) -> Vec<Vec<Vec<bool>>> {
        let mut mask = vec![
            vec![vec![false; self.maze.width as usize]; self.maze.height as usize];
            self.maze.levels as usize
        ];

        let player = &self.players[idx].view;
        let base = self.settings.player_visibility;
        let range = if player.holds(ItemKind::Flashlight) {
            base * 2
        } else {
            base
        };

        let position = player.position;
        mask[position.level as usize][position.y as usize][position.x as usize] = true;

        for degree in 0..360 {
            let angle = degree as f32 * PI / 180.0;
            self.cast_ray(position, angle, range, &mut mask);
        }
        mask
    }

    fn cast_ray(&self, start: Position, angle: f32, range: i32, mask: &mut [Vec<Vec<bool>>]) {
        let dx = angle.cos();
        let dy = angle.sin();
        for distance in 1..=range {
            let x = self
                .maze
                .wrap_x((start.x as f32 + dx * distance as f32).floor() as i32);
            let y = self
                .maze
                .wrap_y((start.y as f32 + dy * distance as f32).floor() as i32);
            mask[start.level as usize][y as usize][x as usize] = true;

            let cell = &self.maze.grid[start.level as usize][y as usize][x as usize];
            if blocks_ray(cell, angle) {
                break;
            }
        }
    }

    /// Snapshot of the game as one player sees it right now. Updates the
    /// player's cumulative map as a side effect, then blanks every cell and
    /// drops every entity outside the fresh visibility mask.
    pub fn visible_state(&mut self, player_id: &str) -> Option<VisibleState> {
        let idx = self.player_index(player_id)?;
        let mask = self.visibility_mask(idx);
        self.update_player_map(idx, &mask);

        let grid = self
            .maze
            .grid
            .iter()
            .enumerate()
            .map(|(level, rows)| {
                rows.iter()
                    .enumerate()
                    .map(|(y, row)| {
                        row.iter()
                            .enumerate()
                            .map(|(x, cell)| {
                                if mask[level][y][x] {
                                    cell.clone()
                                } else {
                                    MazeCell::blank()
                                }
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();

        let in_mask = |position: Position| {
            mask[position.level as usize][position.y as usize][position.x as usize]
        };
        let players = self
            .players
            .iter()
            .filter(|p| in_mask(p.view.position))
            .map(|p| p.view.clone())
            .collect();
        let monsters = self
            .monsters
            .iter()
            .filter(|m| in_mask(m.view.position))
            .map(|m| m.view.clone())
            .collect();

        Some(VisibleState {
            id: self.id.clone(),
            status: self.status,
            difficulty: self.difficulty,
            exit_position: self.exit_position,
            winner: self.winner.clone(),
            width: self.maze.width,
            height: self.maze.height,
            levels: self.maze.levels,
            grid,
            players,
            monsters,
            map: self.players[idx].map.clone(),
        })
    }
}

/// Quadrant test on the ray angle: a wall facing the ray stops it unless
/// a secret door sits in that wall.
fn blocks_ray(cell: &MazeCell, angle: f32) -> bool {
    let tau = 2.0 * PI;
    let normalized = angle.rem_euclid(tau);

    let (wall, door) = if normalized < PI / 4.0 || normalized > 7.0 * PI / 4.0 {
        (cell.walls.east, cell.secret_doors.east)
    } else if normalized < 3.0 * PI / 4.0 {
        (cell.walls.south, cell.secret_doors.south)
    } else if normalized < 5.0 * PI / 4.0 {
        (cell.walls.west, cell.secret_doors.west)
    } else {
        (cell.walls.north, cell.secret_doors.north)
    };
    wall && !door
}
