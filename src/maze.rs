use crate::rng::Rng;
use crate::types::{Direction, MazeCell, Position};

/// Torus maze: every level is a perfect maze whose edges wrap, so moving
/// off one side re-enters on the opposite side. `grid[level][y][x]`.
#[derive(Clone, Debug)]
pub struct Maze {
    pub width: i32,
    pub height: i32,
    pub levels: i32,
    pub grid: Vec<Vec<Vec<MazeCell>>>,
}

impl Maze {
    pub fn cell(&self, pos: Position) -> &MazeCell {
        &self.grid[pos.level as usize][pos.y as usize][pos.x as usize]
    }

    pub fn cell_mut(&mut self, pos: Position) -> &mut MazeCell {
        &mut self.grid[pos.level as usize][pos.y as usize][pos.x as usize]
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        (0..self.levels).contains(&pos.level)
            && (0..self.height).contains(&pos.y)
            && (0..self.width).contains(&pos.x)
    }

    /// Lateral neighbour with wraparound; up/down return the same cell.
    pub fn wrapped_neighbor(&self, pos: Position, dir: Direction) -> Position {
        let (dx, dy) = dir.delta();
        Position {
            x: (pos.x + dx).rem_euclid(self.width),
            y: (pos.y + dy).rem_euclid(self.height),
            level: pos.level,
        }
    }

    pub fn wrap_x(&self, x: i32) -> i32 {
        x.rem_euclid(self.width)
    }

    pub fn wrap_y(&self, y: i32) -> i32 {
        y.rem_euclid(self.height)
    }
}

/// Carves one perfect maze per level with a randomized depth-first
/// backtracker, links adjacent levels with one or two stair pairs, then
/// sprinkles mirrored secret doors over remaining walls.
pub fn generate_maze(
    width: i32,
    height: i32,
    levels: i32,
    secret_door_chance: f32,
    rng: &mut Rng,
) -> Maze {
    let mut maze = Maze {
        width,
        height,
        levels,
        grid: (0..levels)
            .map(|_| {
                (0..height)
                    .map(|_| (0..width).map(|_| MazeCell::sealed()).collect())
                    .collect()
            })
            .collect(),
    };

    for level in 0..levels {
        carve_level(&mut maze, level, rng);
    }
    place_stairs(&mut maze, rng);
    place_secret_doors(&mut maze, secret_door_chance, rng);
    maze
}

fn carve_level(maze: &mut Maze, level: i32, rng: &mut Rng) {
    let width = maze.width;
    let total = (maze.width * maze.height) as usize;
    let mut visited = vec![false; total];
    let index = move |pos: Position| (pos.y * width + pos.x) as usize;

    let start = Position {
        x: rng.below(maze.width),
        y: rng.below(maze.height),
        level,
    };
    visited[index(start)] = true;

    // Explicit stack instead of recursion; large mazes would otherwise
    // blow the call stack.
    let mut stack = vec![start];
    while let Some(&current) = stack.last() {
        let mut directions = Direction::LATERAL;
        rng.shuffle(&mut directions);

        let next = directions.iter().copied().find_map(|dir| {
            let neighbor = maze.wrapped_neighbor(current, dir);
            (!visited[index(neighbor)]).then_some((dir, neighbor))
        });

        match next {
            Some((dir, neighbor)) => {
                maze.cell_mut(current).walls.set(dir, false);
                maze.cell_mut(neighbor).walls.set(dir.opposite(), false);
                visited[index(neighbor)] = true;
                stack.push(neighbor);
            }
            None => {
                stack.pop();
            }
        }
    }
}

fn place_stairs(maze: &mut Maze, rng: &mut Rng) {
    for lower in 0..maze.levels - 1 {
        let pairs = 1 + rng.below(2);
        for _ in 0..pairs {
            let x = rng.below(maze.width);
            let y = rng.below(maze.height);
            maze.grid[lower as usize][y as usize][x as usize].stairs.up = true;
            maze.grid[(lower + 1) as usize][y as usize][x as usize]
                .stairs
                .down = true;
        }
    }
}

fn place_secret_doors(maze: &mut Maze, chance: f32, rng: &mut Rng) {
    let attempts = (chance * (maze.width * maze.height * maze.levels) as f32).floor() as i32;
    for _ in 0..attempts {
        let pos = Position {
            x: rng.below(maze.width),
            y: rng.below(maze.height),
            level: rng.below(maze.levels),
        };
        let dir = Direction::LATERAL[rng.pick_index(4)];

        // Secret doors only make sense on solid walls.
        if !maze.cell(pos).walls.get(dir) {
            continue;
        }
        let neighbor = maze.wrapped_neighbor(pos, dir);
        maze.cell_mut(pos).secret_doors.set(dir, true);
        maze.cell_mut(neighbor).secret_doors.set(dir.opposite(), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn open_passages(maze: &Maze, level: i32) -> i32 {
        let mut openings = 0;
        for y in 0..maze.height {
            for x in 0..maze.width {
                let cell = &maze.grid[level as usize][y as usize][x as usize];
                for dir in Direction::LATERAL {
                    if !cell.walls.get(dir) {
                        openings += 1;
                    }
                }
            }
        }
        // Every passage is recorded from both of its cells.
        openings / 2
    }

    #[test]
    fn each_level_is_a_spanning_tree() {
        let mut rng = Rng::new(42);
        let maze = generate_maze(11, 7, 3, 0.0, &mut rng);
        for level in 0..maze.levels {
            assert_eq!(open_passages(&maze, level), 11 * 7 - 1);
        }
    }

    #[test]
    fn every_cell_is_reachable_within_a_level() {
        let mut rng = Rng::new(7);
        let maze = generate_maze(9, 9, 2, 0.0, &mut rng);
        for level in 0..maze.levels {
            let mut seen = vec![false; (maze.width * maze.height) as usize];
            let start = Position { x: 0, y: 0, level };
            seen[0] = true;
            let mut queue = VecDeque::from([start]);
            let mut count = 1;
            while let Some(pos) = queue.pop_front() {
                for dir in Direction::LATERAL {
                    if maze.cell(pos).walls.get(dir) {
                        continue;
                    }
                    let next = maze.wrapped_neighbor(pos, dir);
                    let idx = (next.y * maze.width + next.x) as usize;
                    if !seen[idx] {
                        seen[idx] = true;
                        count += 1;
                        queue.push_back(next);
                    }
                }
            }
            assert_eq!(count, maze.width * maze.height);
        }
    }

    #[test]
    fn stairs_link_adjacent_levels_in_pairs() {
        let mut rng = Rng::new(1_234);
        let maze = generate_maze(8, 8, 4, 0.0, &mut rng);

        for level in 0..maze.levels {
            for y in 0..maze.height {
                for x in 0..maze.width {
                    let cell = &maze.grid[level as usize][y as usize][x as usize];
                    if cell.stairs.up {
                        assert!(level + 1 < maze.levels);
                        let above = &maze.grid[(level + 1) as usize][y as usize][x as usize];
                        assert!(above.stairs.down);
                    }
                    if cell.stairs.down {
                        assert!(level > 0);
                        let below = &maze.grid[(level - 1) as usize][y as usize][x as usize];
                        assert!(below.stairs.up);
                    }
                }
            }
        }

        // At least one way up from every non-top level.
        for level in 0..maze.levels - 1 {
            let has_up = maze.grid[level as usize]
                .iter()
                .flatten()
                .any(|cell| cell.stairs.up);
            assert!(has_up);
        }
    }

    #[test]
    fn top_and_bottom_levels_have_no_dangling_stairs() {
        let mut rng = Rng::new(77);
        let maze = generate_maze(6, 6, 3, 0.0, &mut rng);
        assert!(!maze.grid[0].iter().flatten().any(|cell| cell.stairs.down));
        assert!(!maze.grid[2].iter().flatten().any(|cell| cell.stairs.up));
    }

    #[test]
    fn secret_doors_are_mirrored_and_sit_on_walls() {
        let mut rng = Rng::new(2_024);
        let maze = generate_maze(10, 10, 2, 0.25, &mut rng);

        let mut found = 0;
        for level in 0..maze.levels {
            for y in 0..maze.height {
                for x in 0..maze.width {
                    let pos = Position { x, y, level };
                    let cell = maze.cell(pos);
                    for dir in Direction::LATERAL {
                        if !cell.secret_doors.get(dir) {
                            continue;
                        }
                        found += 1;
                        assert!(cell.walls.get(dir), "secret door without a wall");
                        let neighbor = maze.wrapped_neighbor(pos, dir);
                        assert!(maze.cell(neighbor).secret_doors.get(dir.opposite()));
                    }
                }
            }
        }
        assert!(found > 0, "chance of 0.25 should have produced doors");
    }

    #[test]
    fn same_seed_generates_identical_mazes() {
        let mut a = Rng::new(555);
        let mut b = Rng::new(555);
        let first = generate_maze(7, 5, 2, 0.1, &mut a);
        let second = generate_maze(7, 5, 2, 0.1, &mut b);
        for level in 0..first.levels as usize {
            for y in 0..first.height as usize {
                for x in 0..first.width as usize {
                    let lhs = &first.grid[level][y][x];
                    let rhs = &second.grid[level][y][x];
                    assert_eq!(lhs.walls, rhs.walls);
                    assert_eq!(lhs.secret_doors, rhs.secret_doors);
                    assert_eq!(lhs.stairs, rhs.stairs);
                }
            }
        }
    }

    #[test]
    fn wrapped_neighbor_crosses_edges() {
        let mut rng = Rng::new(3);
        let maze = generate_maze(5, 4, 1, 0.0, &mut rng);
        let corner = Position { x: 0, y: 0, level: 0 };
        assert_eq!(
            maze.wrapped_neighbor(corner, Direction::West),
            Position { x: 4, y: 0, level: 0 }
        );
        assert_eq!(
            maze.wrapped_neighbor(corner, Direction::North),
            Position { x: 0, y: 3, level: 0 }
        );
    }
}
