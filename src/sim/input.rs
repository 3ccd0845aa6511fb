use std::collections::HashSet;

/// Normalized driving intent for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlIntent {
    pub steer_left: bool,
    pub steer_right: bool,
    pub accelerate: bool,
    pub brake: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchButton {
    Left,
    Right,
    Accelerate,
    Brake,
}

impl TouchButton {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(TouchButton::Left),
            "right" => Some(TouchButton::Right),
            "accelerate" => Some(TouchButton::Accelerate),
            "brake" => Some(TouchButton::Brake),
            _ => None,
        }
    }
}

const DRIVING_KEYS: [&str; 8] = ["arrowup", "arrowdown", "arrowleft", "arrowright", "w", "a", "s", "d"];

/// Merges held keyboard keys and on-screen buttons into a `ControlIntent`.
#[derive(Default)]
pub struct InputAggregator {
    keys: HashSet<String>,
    touch: ControlIntent,
}

impl InputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key press. Returns true for driving keys, whose default
    /// browser action should be suppressed.
    pub fn key_down(&mut self, key: &str) -> bool {
        let key = key.to_lowercase();
        let driving = DRIVING_KEYS.contains(&key.as_str());
        self.keys.insert(key);
        driving
    }

    pub fn key_up(&mut self, key: &str) {
        self.keys.remove(&key.to_lowercase());
    }

    pub fn set_touch(&mut self, button: TouchButton, pressed: bool) {
        match button {
            TouchButton::Left => self.touch.steer_left = pressed,
            TouchButton::Right => self.touch.steer_right = pressed,
            TouchButton::Accelerate => self.touch.accelerate = pressed,
            TouchButton::Brake => self.touch.brake = pressed,
        }
    }

    fn held(&self, a: &str, b: &str) -> bool {
        self.keys.contains(a) || self.keys.contains(b)
    }

    pub fn intent(&self) -> ControlIntent {
        ControlIntent {
            steer_left: self.held("arrowleft", "a") || self.touch.steer_left,
            steer_right: self.held("arrowright", "d") || self.touch.steer_right,
            accelerate: self.held("arrowup", "w") || self.touch.accelerate,
            brake: self.held("arrowdown", "s") || self.touch.brake,
        }
    }

    /// Drops every held key and button, e.g. when the page loses focus.
    pub fn release_all(&mut self) {
        self.keys.clear();
        self.touch = ControlIntent::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_and_touch_merge() {
        let mut input = InputAggregator::new();
        assert!(input.key_down("ArrowUp"));
        assert!(!input.key_down("f"));
        input.set_touch(TouchButton::Left, true);

        let intent = input.intent();
        assert!(intent.accelerate);
        assert!(intent.steer_left);
        assert!(!intent.steer_right);
        assert!(!intent.brake);

        input.key_up("ARROWUP");
        input.set_touch(TouchButton::Left, false);
        assert_eq!(input.intent(), ControlIntent::default());
    }

    #[test]
    fn both_directions_can_be_held() {
        let mut input = InputAggregator::new();
        input.key_down("a");
        input.set_touch(TouchButton::Right, true);
        let intent = input.intent();
        assert!(intent.steer_left && intent.steer_right);
    }

    #[test]
    fn button_names() {
        assert_eq!(TouchButton::from_name("brake"), Some(TouchButton::Brake));
        assert_eq!(TouchButton::from_name("horn"), None);
    }
}
