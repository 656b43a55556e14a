use std::collections::HashSet;

use fractal::NavigationInput;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

/// One-shot commands bound to key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReloadShader,
    ReloadConfiguration,
    SaveConfiguration,
    ExportFrame,
    Quit,
}

/// Held keys, tracked by physical position so layouts do not move WASD.
#[derive(Debug, Default)]
pub struct KeyboardState {
    held: HashSet<KeyCode>,
}

impl KeyboardState {
    /// Records a key transition and returns the action it triggers, if any.
    ///
    /// Actions fire on the initial press only; auto-repeat is ignored.
    pub fn handle(&mut self, code: KeyCode, state: ElementState, repeat: bool) -> Option<Action> {
        match state {
            ElementState::Pressed => {
                self.held.insert(code);
                if repeat {
                    None
                } else {
                    self.action_for(code)
                }
            }
            ElementState::Released => {
                self.held.remove(&code);
                None
            }
        }
    }

    /// Drops all held keys, e.g. after the window lost focus.
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    fn ctrl(&self) -> bool {
        self.held.contains(&KeyCode::ControlLeft) || self.held.contains(&KeyCode::ControlRight)
    }

    fn action_for(&self, code: KeyCode) -> Option<Action> {
        match code {
            KeyCode::F5 => Some(Action::ReloadShader),
            KeyCode::F12 => Some(Action::ExportFrame),
            KeyCode::Escape => Some(Action::Quit),
            KeyCode::KeyS if self.ctrl() => Some(Action::SaveConfiguration),
            KeyCode::KeyR if !self.ctrl() => Some(Action::ReloadConfiguration),
            _ => None,
        }
    }

    /// Navigation keys for this frame. Holding Ctrl for a shortcut does not
    /// pan the view with the shortcut's letter.
    pub fn navigation(&self) -> NavigationInput {
        let held = |code| self.held.contains(&code);
        NavigationInput {
            up: held(KeyCode::KeyW),
            down: held(KeyCode::KeyS) && !self.ctrl(),
            left: held(KeyCode::KeyA),
            right: held(KeyCode::KeyD),
            zoom_in: held(KeyCode::ShiftLeft),
            zoom_out: held(KeyCode::ControlLeft) && !held(KeyCode::KeyS),
            rotate_left: held(KeyCode::KeyQ),
            rotate_right: held(KeyCode::KeyE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(keys: &mut KeyboardState, code: KeyCode) -> Option<Action> {
        keys.handle(code, ElementState::Pressed, false)
    }

    #[test]
    fn held_keys_map_to_navigation() {
        let mut keys = KeyboardState::default();
        press(&mut keys, KeyCode::KeyW);
        press(&mut keys, KeyCode::KeyD);
        press(&mut keys, KeyCode::ShiftLeft);
        press(&mut keys, KeyCode::KeyE);

        let input = keys.navigation();
        assert!(input.up && input.right && input.zoom_in && input.rotate_right);
        assert!(!input.down && !input.left && !input.zoom_out && !input.rotate_left);

        keys.handle(KeyCode::KeyW, ElementState::Released, false);
        assert!(!keys.navigation().up);

        keys.release_all();
        assert!(keys.navigation().is_idle());
    }

    #[test]
    fn left_ctrl_alone_zooms_out() {
        let mut keys = KeyboardState::default();
        press(&mut keys, KeyCode::ControlLeft);
        assert!(keys.navigation().zoom_out);
    }

    #[test]
    fn ctrl_s_saves_without_moving() {
        let mut keys = KeyboardState::default();
        assert_eq!(press(&mut keys, KeyCode::ControlLeft), None);
        assert_eq!(press(&mut keys, KeyCode::KeyS), Some(Action::SaveConfiguration));

        let input = keys.navigation();
        assert!(!input.down);
        assert!(!input.zoom_out);
    }

    #[test]
    fn function_keys_trigger_once_per_press() {
        let mut keys = KeyboardState::default();
        assert_eq!(press(&mut keys, KeyCode::F5), Some(Action::ReloadShader));
        assert_eq!(keys.handle(KeyCode::F5, ElementState::Pressed, true), None);
        assert_eq!(press(&mut keys, KeyCode::F12), Some(Action::ExportFrame));
        assert_eq!(press(&mut keys, KeyCode::KeyR), Some(Action::ReloadConfiguration));
        assert_eq!(press(&mut keys, KeyCode::Escape), Some(Action::Quit));
        assert_eq!(press(&mut keys, KeyCode::KeyS), None);
    }
}
