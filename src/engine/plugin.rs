//! The interface every card power implements, and the
//! registry that binds resolvers to cards.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::models::Position;
use crate::games::zoondo::catalog::TribeCatalog;
use crate::games::zoondo::game::Game;
use crate::games::zoondo::powers::BUILTIN_POWERS;
use crate::games::zoondo::types::{CardRef, PowerAction};

/// Handed to a resolver together with the engine. Consuming it is the only
/// way to produce the [`Resumed`] token a resolver must return, so every
/// resolver resumes the engine exactly once.
#[must_use = "a power resolver must resume the engine"]
pub struct Continuation {
    _private: (),
}

impl Continuation {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Hand control back to the stack engine.
    pub fn resume(self) -> Resumed {
        Resumed { _private: () }
    }
}

/// Proof that a [`Continuation`] was consumed.
#[must_use]
pub struct Resumed {
    _private: (),
}

/// Trait that every card power must implement.
///
/// A resolver mutates the game through the engine's public operations
/// (eliminations, relocations, pushing further stack entries) and then
/// returns `next.resume()`. Resolvers that need player input push a
/// `SelectCard` entry whose handler points back at them; the engine calls
/// [`PowerResolver::on_selection`] once the prompted player answers.
pub trait PowerResolver: Send + Sync {
    fn name(&self) -> &str;

    fn resolve(&self, game: &mut Game, action: &PowerAction, next: Continuation) -> Resumed;

    fn on_selection(
        &self,
        _game: &mut Game,
        _action: &PowerAction,
        _choice: Position,
        next: Continuation,
    ) -> Resumed {
        next.resume()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PowerKey {
    pub tribe: String,
    pub slug: String,
}

impl PowerKey {
    pub fn of(card: &CardRef) -> Self {
        Self {
            tribe: card.tribe.clone(),
            slug: card.slug.clone(),
        }
    }
}

/// Registry of power resolvers keyed by tribe + card slug.
#[derive(Default, Clone)]
pub struct PowerRegistry {
    resolvers: HashMap<PowerKey, Arc<dyn PowerResolver>>,
}

impl PowerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every card whose definition names a built-in resolver.
    pub fn from_catalog(catalog: &TribeCatalog) -> Self {
        let mut registry = Self::new();
        for (tribe_id, tribe) in &catalog.tribes {
            for (slug, card) in &tribe.cards {
                let Some(resolver_name) = card.resolver.as_deref() else {
                    continue;
                };
                match BUILTIN_POWERS.get(resolver_name) {
                    Some(resolver) => registry.register(tribe_id, slug, Arc::clone(resolver)),
                    None => tracing::warn!(
                        tribe = %tribe_id,
                        card = %slug,
                        resolver = resolver_name,
                        "card names an unknown power resolver"
                    ),
                }
            }
        }
        tracing::info!(count = registry.len(), "bound power resolvers");
        registry
    }

    pub fn register(&mut self, tribe: &str, slug: &str, resolver: Arc<dyn PowerResolver>) {
        let key = PowerKey {
            tribe: tribe.to_string(),
            slug: slug.to_string(),
        };
        self.resolvers.insert(key, resolver);
    }

    pub fn get(&self, card: &CardRef) -> Option<Arc<dyn PowerResolver>> {
        self.resolvers.get(&PowerKey::of(card)).cloned()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
