use lemuria_common::{Pose, UserRecord};

/// Seconds a remote entity takes to reach a new snapshot.
pub const BLEND_DURATION: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// At the target; advancing changes nothing.
    Idle,
    Interpolating,
}

/// Smooths one remote entity between sparse snapshots.
///
/// Blends position and each Euler angle linearly. Angles are not unwrapped,
/// so a turn across ±π sweeps the long way round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityInterpolator {
    previous: Pose,
    target: Pose,
    completion: f32,
}

impl EntityInterpolator {
    /// Start idle at `pose`.
    pub fn new(pose: Pose) -> Self {
        Self {
            previous: pose,
            target: pose,
            completion: 1.0,
        }
    }

    /// Resume a blend stored in a transport user record.
    pub fn from_user_record(record: &UserRecord) -> Self {
        Self {
            previous: record.previous(),
            target: record.target(),
            completion: record.completion.clamp(0.0, 1.0),
        }
    }

    /// Store the blend state back into the record's `old*` and `completion` fields.
    pub fn write_back(&self, record: &mut UserRecord) {
        record.set_previous(self.previous);
        record.completion = self.completion;
    }

    /// Retarget to a new snapshot, starting from wherever the entity is drawn now.
    pub fn on_snapshot(&mut self, target: Pose) {
        self.previous = self.current();
        self.target = target;
        self.completion = 0.0;
    }

    /// Advance by `dt` seconds of a `duration`-second blend and return the pose to draw.
    pub fn advance(&mut self, dt: f32, duration: f32) -> Pose {
        if self.completion < 1.0 {
            let step = if duration > 0.0 { dt.max(0.0) / duration } else { 1.0 };
            self.completion = (self.completion + step).min(1.0);
        }
        self.current()
    }

    pub fn current(&self) -> Pose {
        if self.completion >= 1.0 {
            self.target
        } else {
            self.previous.lerp(self.target, self.completion)
        }
    }

    pub fn phase(&self) -> Phase {
        if self.completion >= 1.0 {
            Phase::Idle
        } else {
            Phase::Interpolating
        }
    }

    pub fn completion(&self) -> f32 {
        self.completion
    }

    pub fn previous(&self) -> Pose {
        self.previous
    }

    pub fn target(&self) -> Pose {
        self.target
    }
}
