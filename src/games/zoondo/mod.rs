//! Zoondo: a two-player card battle on a square grid. Each player deploys a
//! tribe of Zoons; eliminating the opposing emblem wins the game.

pub mod catalog;
pub mod combat;
pub mod game;
pub mod movement;
pub mod powers;
pub mod stack;
pub mod turn;
pub mod types;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;
