//! Spawn point selection and starting territory.

use crate::game::{BoardMut, BoardView};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Cell, PlayerId};

/// Spacing of the candidate grid.
pub const SPAWN_GRID: i32 = 5;
/// First candidate coordinate on each axis.
pub const SPAWN_OFFSET: i32 = 2;
/// Half-width of the neighbourhood that must be empty around a spawn point.
pub const SPAWN_CLEARANCE: i32 = 2;
/// Half-width of the starting territory block.
pub const START_RADIUS: i32 = 1;

fn neighbourhood_is_free<B: BoardView>(view: &B, cx: i32, cy: i32) -> bool {
    (cy - SPAWN_CLEARANCE..=cy + SPAWN_CLEARANCE).all(|y| {
        (cx - SPAWN_CLEARANCE..=cx + SPAWN_CLEARANCE).all(|x| view.cell(x, y) == Cell::EMPTY)
    })
}

/// Up to `count` spawn points whose 5x5 neighbourhood is completely empty,
/// picked at random from a grid of candidates.
pub fn find_spawn_points<B: BoardView, R: Rng + ?Sized>(
    view: &B,
    count: usize,
    rng: &mut R,
) -> Vec<(i32, i32)> {
    if count == 0 {
        return Vec::new();
    }
    let mut candidates: Vec<(i32, i32)> = (SPAWN_OFFSET..view.height())
        .step_by(SPAWN_GRID as usize)
        .flat_map(|y| {
            (SPAWN_OFFSET..view.width())
                .step_by(SPAWN_GRID as usize)
                .map(move |x| (x, y))
        })
        .filter(|&(x, y)| neighbourhood_is_free(view, x, y))
        .collect();
    candidates.shuffle(rng);
    candidates.truncate(count);
    candidates
}

/// Gives `id` the 3x3 block around `(cx, cy)`. Returns the cells granted,
/// which become the player's starting score.
pub fn grant_territory<B: BoardMut>(view: &mut B, id: PlayerId, cx: i32, cy: i32) -> u32 {
    let mut granted = 0;
    for y in cy - START_RADIUS..=cy + START_RADIUS {
        for x in cx - START_RADIUS..=cx + START_RADIUS {
            if view.set_owner(x, y, id) {
                granted += 1;
            }
        }
    }
    if let Some(player) = view.player_mut(id) {
        player.score += granted;
    }
    granted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::GameState;
    use crate::player::Controller;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game(width: usize, height: usize) -> GameState {
        GameState::new(GameConfig {
            width,
            height,
            ..GameConfig::default()
        })
    }

    #[test]
    fn test_candidates_sit_on_grid_with_clearance() {
        let state = game(18, 18);
        let mut rng = StdRng::seed_from_u64(7);
        let mut points = find_spawn_points(&state, 100, &mut rng);
        points.sort();
        // Centre 17 would need cells up to 19, past the edge of an 18-wide board.
        let mut expected = Vec::new();
        for y in [2, 7, 12] {
            for x in [2, 7, 12] {
                expected.push((x, y));
            }
        }
        expected.sort();
        assert_eq!(points, expected);
    }

    #[test]
    fn test_occupied_neighbourhoods_are_skipped() {
        let mut state = game(10, 10);
        state.set_owner(8, 8, 3);
        let mut rng = StdRng::seed_from_u64(1);
        let mut points = find_spawn_points(&state, 10, &mut rng);
        points.sort();
        assert_eq!(points, vec![(2, 2), (2, 7), (7, 2)]);
        assert_eq!(find_spawn_points(&state, 2, &mut rng).len(), 2);
    }

    #[test]
    fn test_grant_territory_scores_cells() {
        let mut state = game(10, 10);
        let id = state
            .add_player("ada".into(), Controller::Human, (2, 2))
            .unwrap();
        assert_eq!(grant_territory(&mut state, id, 2, 2), 9);
        assert_eq!(state.player(id).unwrap().score, 9);
        assert_eq!(state.accounted_cells(), 100);
        assert_eq!(state.cell(1, 3).owner(), id);
        assert_eq!(state.cell(4, 2).owner(), 0);
    }
}
