use super::stage::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Quit,
}

const ACTION_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Quit => 4,
        }
    }
}

/// Per-frame view of collected input. Movement actions are level-triggered;
/// clicks are edge-triggered and fire for exactly one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    action_states: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_click_pressed: bool,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub(crate) fn new(
        quit_requested: bool,
        action_states: ActionStates,
        cursor_position_px: Option<Vec2>,
        left_click_pressed: bool,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            action_states,
            cursor_position_px,
            left_click_pressed,
            window_width,
            window_height,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_quit_requested(mut self) -> Self {
        self.quit_requested = true;
        self
    }

    pub fn with_action_down(mut self, action: InputAction) -> Self {
        self.action_states.set(action, true);
        self
    }

    pub fn with_cursor_position_px(mut self, position: Vec2) -> Self {
        self.cursor_position_px = Some(position);
        self
    }

    pub fn with_left_click_pressed(mut self) -> Self {
        self.left_click_pressed = true;
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.action_states.is_down(action)
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_nothing_down() {
        let snapshot = InputSnapshot::empty();
        assert!(!snapshot.quit_requested());
        assert!(!snapshot.left_click_pressed());
        assert!(snapshot.cursor_position_px().is_none());
        assert!(!snapshot.is_down(InputAction::MoveUp));
        assert!(!snapshot.is_down(InputAction::MoveDown));
        assert!(!snapshot.is_down(InputAction::MoveLeft));
        assert!(!snapshot.is_down(InputAction::MoveRight));
    }

    #[test]
    fn builder_methods_set_expected_fields() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveUp)
            .with_cursor_position_px(Vec2 { x: 10.0, y: 20.0 })
            .with_left_click_pressed()
            .with_window_size(576, 448);

        assert!(snapshot.is_down(InputAction::MoveUp));
        assert!(!snapshot.is_down(InputAction::MoveDown));
        assert!(snapshot.left_click_pressed());
        assert_eq!(snapshot.window_size(), (576, 448));
        let cursor = snapshot.cursor_position_px().expect("cursor");
        assert!((cursor.x - 10.0).abs() < 0.0001);
        assert!((cursor.y - 20.0).abs() < 0.0001);
    }

    #[test]
    fn action_states_track_independent_actions() {
        let mut states = ActionStates::default();
        states.set(InputAction::MoveLeft, true);
        states.set(InputAction::MoveRight, true);
        states.set(InputAction::MoveLeft, false);

        assert!(!states.is_down(InputAction::MoveLeft));
        assert!(states.is_down(InputAction::MoveRight));
    }
}
