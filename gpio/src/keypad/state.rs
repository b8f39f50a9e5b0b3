/// The state of a single matrix position, packed into one byte.
///
/// `pressed` follows the physical contact, while the two `just_*` flags latch an edge until a
/// consumer clears them. This lets edge-triggered and level-triggered readers share one table.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyState(u8);

impl KeyState {
    pub const PRESSED: u8 = 1 << 1;
    pub const JUST_PRESSED: u8 = 1 << 2;
    pub const JUST_RELEASED: u8 = 1 << 3;

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_pressed(self) -> bool {
        self.0 & Self::PRESSED != 0
    }

    pub fn is_just_pressed(self) -> bool {
        self.0 & Self::JUST_PRESSED != 0
    }

    pub fn is_just_released(self) -> bool {
        self.0 & Self::JUST_RELEASED != 0
    }

    /// Records a falling edge on the row.
    pub fn press(&mut self) {
        self.0 |= Self::PRESSED | Self::JUST_PRESSED;
    }

    /// Records the matching rising edge.
    pub fn release(&mut self) {
        self.0 |= Self::JUST_RELEASED;
        self.0 &= !Self::PRESSED;
    }

    /// Reads the `just_pressed` flag, clearing it if `clear` is set.
    pub fn take_just_pressed(&mut self, clear: bool) -> bool {
        let value = self.is_just_pressed();
        if clear {
            self.0 &= !Self::JUST_PRESSED;
        }
        value
    }

    /// Reads and clears the `just_released` flag.
    pub fn take_just_released(&mut self) -> bool {
        let value = self.is_just_released();
        self.0 &= !Self::JUST_RELEASED;
        value
    }
}

/// One [KeyState] per matrix position, row-major.
#[derive(Clone, Debug)]
pub struct KeyStateTable {
    states: Box<[KeyState]>,
}

impl KeyStateTable {
    pub fn new(len: usize) -> Self {
        KeyStateTable {
            states: vec![KeyState::default(); len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, index: usize) -> KeyState {
        self.states[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut KeyState {
        &mut self.states[index]
    }

    /// Zeroes every state.
    pub fn reset(&mut self) {
        self.states.fill(KeyState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_sets_both_flags() {
        let mut state = KeyState::default();
        state.press();
        assert!(state.is_pressed());
        assert!(state.is_just_pressed());
        assert!(!state.is_just_released());
    }

    #[test]
    fn release_keeps_just_pressed_until_consumed() {
        let mut state = KeyState::default();
        state.press();
        state.release();
        assert!(!state.is_pressed());
        assert!(state.is_just_pressed());
        assert!(state.take_just_released());
        assert!(!state.take_just_released());
    }

    #[test]
    fn just_pressed_clear_is_optional() {
        let mut state = KeyState::default();
        state.press();
        assert!(state.take_just_pressed(false));
        assert!(state.take_just_pressed(true));
        assert!(!state.take_just_pressed(true));
        assert!(state.is_pressed());
    }
}
