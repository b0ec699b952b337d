use glam::Vec2;

use crate::key::NavKey;

/// Boolean state of every [`NavKey`], plus a one-shot pick request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    keys: [bool; NavKey::COUNT],
    pick: Option<Vec2>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: NavKey, down: bool) {
        self.keys[key.index()] = down;
    }

    pub fn key_down(&mut self, key: NavKey) {
        self.set(key, true);
    }

    pub fn key_up(&mut self, key: NavKey) {
        self.set(key, false);
    }

    pub fn is_pressed(&self, key: NavKey) -> bool {
        self.keys[key.index()]
    }

    /// Apply a key event by name. Returns false for unbound names.
    pub fn handle_key(&mut self, name: &str, down: bool) -> bool {
        match NavKey::from_key_name(name) {
            Some(key) => {
                self.set(key, down);
                true
            }
            None => false,
        }
    }

    /// +1, -1 or 0 depending on which of the two keys is held.
    pub fn axis(&self, positive: NavKey, negative: NavKey) -> f32 {
        match (self.is_pressed(positive), self.is_pressed(negative)) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    pub fn any_pressed(&self) -> bool {
        self.keys.iter().any(|&k| k)
    }

    pub fn pressed(&self) -> impl Iterator<Item = NavKey> + '_ {
        NavKey::ALL.into_iter().filter(|k| self.is_pressed(*k))
    }

    /// Ask the next tick to pick at `pointer` (window pixels). Replaces any
    /// request not yet consumed.
    pub fn request_pick(&mut self, pointer: Vec2) {
        tracing::debug!(x = pointer.x, y = pointer.y, "pick requested");
        self.pick = Some(pointer);
    }

    pub fn take_pick(&mut self) -> Option<Vec2> {
        self.pick.take()
    }

    pub fn pending_pick(&self) -> Option<Vec2> {
        self.pick
    }

    /// Release every key and drop any pending pick.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
