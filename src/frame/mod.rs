/// Frame lifecycle
///
/// A `GameFrame` is produced on the game thread each tick, frozen at the end
/// of the tick and published once to the render thread through a
/// `RenderContext`.

pub mod game_frame;
pub mod render_context;

pub use game_frame::{FrameCounter, FrameFlags, GameFrame};
pub use render_context::RenderContext;

/// Game-thread side of the frame state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    /// Poses sampled, settings cloned
    FrameStarted,
    /// Out of frame, candidate published
    FrameEndedPendingRender,
}

impl FrameState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameState::Idle => "idle",
            FrameState::FrameStarted => "frame_started",
            FrameState::FrameEndedPendingRender => "frame_ended_pending_render",
        }
    }
}

/// Kind of world ticking the HMD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldKind {
    Game,
    PlayInEditor,
    Editor,
    VrPreview,
    /// No world, or one being torn down
    Inactive,
}

/// World information passed into the frame hooks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldContext {
    pub kind: WorldKind,
    pub world_to_meters: f32,
}

impl WorldContext {
    pub fn game(world_to_meters: f32) -> Self {
        Self {
            kind: WorldKind::Game,
            world_to_meters,
        }
    }

    pub fn inactive() -> Self {
        Self {
            kind: WorldKind::Inactive,
            world_to_meters: crate::constants::settings::DEFAULT_WORLD_TO_METERS,
        }
    }

    /// Editor viewports and VR preview drive the HMD too.
    pub fn is_valid(&self) -> bool {
        !matches!(self.kind, WorldKind::Inactive)
    }
}

impl Default for WorldContext {
    fn default() -> Self {
        Self::game(crate::constants::settings::DEFAULT_WORLD_TO_METERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_validity() {
        assert!(WorldContext::game(100.0).is_valid());
        assert!(WorldContext {
            kind: WorldKind::VrPreview,
            world_to_meters: 100.0
        }
        .is_valid());
        assert!(!WorldContext::inactive().is_valid());
    }
}
