use serde::{Deserialize, Serialize};

/// The closed set of navigation keys the player controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavKey {
    MoveForward,
    MoveBackward,
    TurnLeft,
    TurnRight,
    LookUp,
    LookDown,
    RiseUp,
    RiseDown,
    ModifierPrimary,
    ModifierSecondary,
}

impl NavKey {
    pub const COUNT: usize = 10;

    pub const ALL: [NavKey; Self::COUNT] = [
        NavKey::MoveForward,
        NavKey::MoveBackward,
        NavKey::TurnLeft,
        NavKey::TurnRight,
        NavKey::LookUp,
        NavKey::LookDown,
        NavKey::RiseUp,
        NavKey::RiseDown,
        NavKey::ModifierPrimary,
        NavKey::ModifierSecondary,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Map a DOM-style key name to its navigation key.
    pub fn from_key_name(name: &str) -> Option<Self> {
        let key = match name {
            "ArrowUp" => NavKey::MoveForward,
            "ArrowDown" => NavKey::MoveBackward,
            "ArrowLeft" => NavKey::TurnLeft,
            "ArrowRight" => NavKey::TurnRight,
            "PageUp" => NavKey::LookUp,
            "PageDown" => NavKey::LookDown,
            "+" => NavKey::RiseUp,
            "-" => NavKey::RiseDown,
            "Control" => NavKey::ModifierPrimary,
            "Shift" => NavKey::ModifierSecondary,
            _ => return None,
        };
        Some(key)
    }

    pub fn key_name(self) -> &'static str {
        match self {
            NavKey::MoveForward => "ArrowUp",
            NavKey::MoveBackward => "ArrowDown",
            NavKey::TurnLeft => "ArrowLeft",
            NavKey::TurnRight => "ArrowRight",
            NavKey::LookUp => "PageUp",
            NavKey::LookDown => "PageDown",
            NavKey::RiseUp => "+",
            NavKey::RiseDown => "-",
            NavKey::ModifierPrimary => "Control",
            NavKey::ModifierSecondary => "Shift",
        }
    }
}
