//! Shared fixtures for the rules engine's unit tests.

use std::collections::HashSet;
use std::sync::Arc;

use crate::engine::config::EngineSettings;
use crate::engine::delivery::Recorder;
use crate::engine::models::Player;
use crate::engine::plugin::{PowerRegistry, PowerResolver};

use super::catalog::{Catalog, OffsetGeometry, TribeCatalog};
use super::game::{Game, GameContext};
use super::types::{Board, CardKind, CardRef, Cell};

/// Two small tribes. Deployed, the first player holds x 0..2, y 0..2 with
/// scout (0,2), guard (1,2) and the totem emblem (2,2); the second player is
/// mirrored into x 3..5, y 3..5 with the idol emblem on (3,3).
pub const TEST_CATALOG: &str = r#"
    [tribes.alpha]
    name = "Alpha"
    disposition = [
        ["scout", "guard", "totem"],
        ["guard", "guard", "guard"],
        ["guard", "guard", "guard"],
    ]

    [tribes.alpha.cards.scout]
    name = "Scout"
    corners = [3, 3, 3, 3]
    moves = [[{ dx = 0, dy = 1 }, { dx = 0, dy = 2 }]]

    [tribes.alpha.cards.guard]
    name = "Guard"
    corners = [5, 5, 5, 5]
    moves = [[{ dx = 0, dy = 1 }]]

    [tribes.alpha.cards.mage]
    name = "Mage"
    corners = ["*", "*", "*", "*"]
    power = "Arcane"
    moves = [[{ dx = 0, dy = 1 }]]

    [tribes.alpha.cards.totem]
    name = "Totem"
    type = "emblem"
    corners = [1, 1, 1, 1]
    moves = [[{ dx = 0, dy = 1 }]]

    [tribes.beta]
    name = "Beta"
    disposition = [
        ["archer", "wall", "idol"],
        ["wall", "wall", "wall"],
        ["wall", "wall", "wall"],
    ]

    [tribes.beta.cards.archer]
    name = "Archer"
    corners = [3, 3, 3, 3]
    moves = [[{ dx = 0, dy = 1 }]]

    [tribes.beta.cards.wall]
    name = "Wall"
    corners = [5, 5, 5, 5]
    moves = [[{ dx = 0, dy = 1 }]]

    [tribes.beta.cards.seer]
    name = "Seer"
    corners = ["*", "*", "*", "*"]
    power = "Foresight"
    moves = [[{ dx = 0, dy = 1 }]]

    [tribes.beta.cards.idol]
    name = "Idol"
    type = "emblem"
    corners = [1, 1, 1, 1]
    moves = [[{ dx = 0, dy = 1 }]]
"#;

pub fn test_catalog() -> TribeCatalog {
    TribeCatalog::from_toml_str(TEST_CATALOG).unwrap()
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        board_size: 6,
        combat_delay_ms: 10,
        random_seed: Some(7),
        ..EngineSettings::default()
    }
}

pub fn test_context(settings: EngineSettings, powers: PowerRegistry) -> GameContext {
    GameContext {
        geometry: Arc::new(OffsetGeometry::new(settings.board_size)),
        settings,
        catalog: Arc::new(test_catalog()),
        powers: Arc::new(powers),
    }
}

fn create_with(context: &GameContext) -> (Game, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::new());
    let game = Game::create(
        context,
        "room-1",
        Player::new("p1", "Alice", "alpha"),
        recorder.clone(),
    )
    .unwrap();
    (game, recorder)
}

fn start_with(context: &GameContext) -> (Game, Arc<Recorder>) {
    let (mut game, recorder) = create_with(context);
    game.join(Player::new("p2", "Bob", "beta")).unwrap();
    (game, recorder)
}

/// Alice (alpha) deployed, nobody else seated yet.
pub fn created_game() -> (Game, Arc<Recorder>) {
    create_with(&test_context(test_settings(), PowerRegistry::new()))
}

/// Alice (alpha) against Bob (beta), first turn started.
pub fn started_game() -> (Game, Arc<Recorder>) {
    started_game_with(test_settings())
}

pub fn started_game_with(settings: EngineSettings) -> (Game, Arc<Recorder>) {
    start_with(&test_context(settings, PowerRegistry::new()))
}

pub fn started_game_with_power(
    tribe: &str,
    slug: &str,
    resolver: Arc<dyn PowerResolver>,
) -> (Game, Arc<Recorder>) {
    let mut powers = PowerRegistry::new();
    powers.register(tribe, slug, resolver);
    start_with(&test_context(test_settings(), powers))
}

/// A started game whose board is replaced by `cells`, given as
/// `(player, tribe, slug, x, y)`.
pub fn arena_game(cells: &[(&str, &str, &str, i32, i32)]) -> (Game, Arc<Recorder>) {
    arena_game_with(test_settings(), cells)
}

pub fn arena_game_with(
    settings: EngineSettings,
    cells: &[(&str, &str, &str, i32, i32)],
) -> (Game, Arc<Recorder>) {
    arena_game_with_powers(settings, PowerRegistry::new(), cells)
}

pub fn arena_game_with_powers(
    settings: EngineSettings,
    powers: PowerRegistry,
    cells: &[(&str, &str, &str, i32, i32)],
) -> (Game, Arc<Recorder>) {
    let (mut game, recorder) = start_with(&test_context(settings, powers));
    let catalog = test_catalog();
    game.board = Board::new(game.board.size());
    for &(player, tribe, slug, x, y) in cells {
        let mut card = card_ref(tribe, slug);
        card.kind = catalog.card(&card).map(|d| d.kind).unwrap_or_default();
        assert!(game.board.place(Cell {
            player: player.into(),
            x,
            y,
            card,
        }));
    }
    recorder.take();
    (game, recorder)
}

pub fn card_ref(tribe: &str, slug: &str) -> CardRef {
    CardRef {
        tribe: tribe.into(),
        kind: CardKind::Fighters,
        slug: slug.into(),
    }
}

pub fn beta_card(slug: &str) -> CardRef {
    card_ref("beta", slug)
}

/// Hand the turn to `player_id` regardless of the starting draw.
pub fn force_turn(game: &mut Game, player_id: &str) -> String {
    game.start_turn(player_id);
    player_id.to_string()
}

pub fn assert_unique_cells(game: &Game) {
    let mut seen = HashSet::new();
    for cell in game.board().cells() {
        assert!(seen.insert(cell.position()), "two cards on {}", cell.position());
    }
}
