//! Movement legality: which cells a card can reach and whether reaching them
//! starts a combat.

use crate::engine::error::{GameError, Result};
use crate::engine::models::Position;

use super::catalog::{Catalog, MoveGeometry};
use super::types::{Board, Cell, Path};

/// A reachable cell and the path walked to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub position: Position,
    pub combat: bool,
    /// Walked cells, ending on `position`.
    pub path: Path,
}

/// Every legal destination for the card in `source`.
///
/// Each candidate path is walked outwards from the origin. The first occupied
/// landing cell ends the walk: an opponent there is a combat destination, a
/// friendly card blocks. Cells flagged as jumps are flown over.
pub fn legal_destinations(
    board: &Board,
    catalog: &dyn Catalog,
    geometry: &dyn MoveGeometry,
    source: &Cell,
    flip: bool,
) -> Result<Vec<Destination>> {
    let definition = catalog
        .card(&source.card)
        .ok_or_else(|| GameError::UnknownCard(source.card.to_string()))?;

    let mut destinations = Vec::new();
    for path in geometry.resolve_moves(source.position(), &definition.moves, flip) {
        let mut walked = Path::with_capacity(path.len());
        for step in path {
            walked.push(step);
            if step.jump {
                continue;
            }
            match board.at(step.position()) {
                Some(occupant) => {
                    if occupant.player != source.player {
                        destinations.push(Destination {
                            position: step.position(),
                            combat: true,
                            path: walked.clone(),
                        });
                    }
                    break;
                }
                None => destinations.push(Destination {
                    position: step.position(),
                    combat: false,
                    path: walked.clone(),
                }),
            }
        }
    }
    Ok(destinations)
}

/// The legal destination matching `target`, if there is one.
pub fn check_move(
    board: &Board,
    catalog: &dyn Catalog,
    geometry: &dyn MoveGeometry,
    source: &Cell,
    target: Position,
    flip: bool,
) -> Result<Option<Destination>> {
    Ok(legal_destinations(board, catalog, geometry, source, flip)?
        .into_iter()
        .find(|d| d.position == target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::zoondo::catalog::{OffsetGeometry, TribeCatalog};
    use crate::games::zoondo::types::{CardKind, CardRef};
    use std::collections::BTreeSet;

    const CATALOG: &str = r#"
        [tribes.t]
        name = "T"
        disposition = [["runner"]]

        [tribes.t.cards.runner]
        name = "Runner"
        corners = [1, 1, 1, 1]
        moves = [
            [{ dx = 0, dy = 1 }, { dx = 0, dy = 2 }, { dx = 0, dy = 3 }],
            [{ dx = 1, dy = 0 }],
        ]

        [tribes.t.cards.hopper]
        name = "Hopper"
        corners = [1, 1, 1, 1]
        moves = [[{ dx = 0, dy = 1, jump = true }, { dx = 0, dy = 2 }]]
    "#;

    fn card(player: &str, slug: &str, x: i32, y: i32) -> Cell {
        Cell {
            player: player.into(),
            x,
            y,
            card: CardRef {
                tribe: "t".into(),
                kind: CardKind::Fighters,
                slug: slug.into(),
            },
        }
    }

    fn positions(dests: &[Destination]) -> BTreeSet<(i32, i32, bool)> {
        dests.iter().map(|d| (d.position.x, d.position.y, d.combat)).collect()
    }

    #[test]
    fn test_path_stops_at_first_occupied_cell() {
        let catalog = TribeCatalog::from_toml_str(CATALOG).unwrap();
        let geometry = OffsetGeometry::new(6);
        let mut board = Board::new(6);
        let runner = card("p1", "runner", 1, 0);
        board.place(runner.clone());
        board.place(card("p2", "runner", 1, 2));
        board.place(card("p1", "runner", 2, 0));

        let dests = legal_destinations(&board, &catalog, &geometry, &runner, false).unwrap();
        // (1,1) free, (1,2) enemy ends the walk, (2,0) friendly blocks.
        assert_eq!(positions(&dests), BTreeSet::from([(1, 1, false), (1, 2, true)]));

        let combat = dests.iter().find(|d| d.combat).unwrap();
        assert_eq!(combat.path.len(), 2);
        assert_eq!(combat.path.last().unwrap().position(), Position::new(1, 2));
    }

    #[test]
    fn test_jump_flies_over_occupied_cell() {
        let catalog = TribeCatalog::from_toml_str(CATALOG).unwrap();
        let geometry = OffsetGeometry::new(6);
        let mut board = Board::new(6);
        let hopper = card("p1", "hopper", 0, 0);
        board.place(hopper.clone());
        board.place(card("p2", "runner", 0, 1));

        let dests = legal_destinations(&board, &catalog, &geometry, &hopper, false).unwrap();
        assert_eq!(positions(&dests), BTreeSet::from([(0, 2, false)]));
        assert!(check_move(&board, &catalog, &geometry, &hopper, Position::new(0, 1), false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_moves_are_symmetric_for_second_player() {
        let catalog = TribeCatalog::from_toml_str(CATALOG).unwrap();
        let geometry = OffsetGeometry::new(6);

        let mut board = Board::new(6);
        let mut mirrored = Board::new(6);
        let layout = [("p1", 2, 1), ("p2", 2, 3), ("p1", 3, 1), ("p2", 4, 4)];
        for (player, x, y) in layout {
            board.place(card(player, "runner", x, y));
            let m = Position::new(x, y).mirrored(6);
            let other = if player == "p1" { "p2" } else { "p1" };
            mirrored.place(card(other, "runner", m.x, m.y));
        }

        let first = legal_destinations(&board, &catalog, &geometry, &card("p1", "runner", 2, 1), false).unwrap();
        let origin = Position::new(2, 1).mirrored(6);
        let second = legal_destinations(
            &mirrored,
            &catalog,
            &geometry,
            &card("p2", "runner", origin.x, origin.y),
            true,
        )
        .unwrap();

        let reflected: BTreeSet<_> = positions(&first)
            .into_iter()
            .map(|(x, y, c)| {
                let m = Position::new(x, y).mirrored(6);
                (m.x, m.y, c)
            })
            .collect();
        assert_eq!(reflected, positions(&second));
        assert!(!reflected.is_empty());
    }

    #[test]
    fn test_unknown_card_is_an_error() {
        let catalog = TribeCatalog::from_toml_str(CATALOG).unwrap();
        let geometry = OffsetGeometry::new(6);
        let board = Board::new(6);
        let ghost = card("p1", "ghost", 0, 0);
        let err = legal_destinations(&board, &catalog, &geometry, &ghost, false).unwrap_err();
        assert_eq!(err, GameError::UnknownCard("t/ghost".into()));
    }
}
