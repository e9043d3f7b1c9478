//! Nicknames for AI players and for clients that never picked a name.

use rand::seq::SliceRandom;
use rand::Rng;

const NICKS: &[&str] = &[
    "Ace", "Badger", "Bolt", "Bramble", "Cinder", "Comet", "Crumb", "Dash", "Ember", "Fable",
    "Fern", "Flint", "Gadget", "Gizmo", "Glimmer", "Hazel", "Indigo", "Jinx", "Juniper",
    "Kestrel", "Lark", "Lumen", "Maple", "Marble", "Moss", "Nimbus", "Nova", "Onyx", "Otter",
    "Pebble", "Pixel", "Quill", "Raven", "Rook", "Rusty", "Sable", "Scout", "Sprocket",
    "Sparrow", "Tango", "Thistle", "Tinker", "Umber", "Vesper", "Wren", "Yarrow", "Zephyr",
    "Zigzag",
];

/// Hands out nicknames in a shuffled order, starting over once exhausted.
#[derive(Debug, Clone)]
pub struct NickPool {
    order: Vec<&'static str>,
    next: usize,
}

impl NickPool {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut order = NICKS.to_vec();
        order.shuffle(rng);
        Self { order, next: 0 }
    }

    pub fn next_nick(&mut self) -> String {
        let nick = self.order[self.next % self.order.len()];
        self.next = (self.next + 1) % self.order.len();
        nick.to_string()
    }
}

/// One nickname picked uniformly at random.
pub fn random_nick<R: Rng + ?Sized>(rng: &mut R) -> String {
    NICKS.choose(rng).copied().unwrap_or("Player").to_string()
}
