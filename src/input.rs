//! Key bindings: arrows and vim-style hjkl.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// (row, col) step.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Self::Up => (-1, 0),
            Self::Down => (1, 0),
            Self::Left => (0, -1),
            Self::Right => (0, 1),
        }
    }
}

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move the cursor, or swap in that direction while a cell is selected.
    Move(Direction),
    /// Select the cell under the cursor, or swap with the selection if adjacent.
    Select,
    /// Drop the current selection.
    Cancel,
    Pause,
    Restart,
    Quit,
    None,
}

/// Map key event to game action. Supports both normal (arrows, space) and vim (hjkl).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('c') if modifiers == KeyModifiers::CONTROL => Action::Quit,
        KeyCode::Char('q') if no_mod => Action::Quit,
        KeyCode::Esc if no_mod => Action::Cancel,
        KeyCode::Char('p') if no_mod => Action::Pause,
        KeyCode::Char('r') if no_mod => Action::Restart,
        KeyCode::Left | KeyCode::Char('h') if no_mod => Action::Move(Direction::Left),
        KeyCode::Right | KeyCode::Char('l') if no_mod => Action::Move(Direction::Right),
        KeyCode::Up | KeyCode::Char('k') if no_mod => Action::Move(Direction::Up),
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::Move(Direction::Down),
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::Select,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_and_vim_keys_agree() {
        assert_eq!(key_to_action(press(KeyCode::Left)), key_to_action(press(KeyCode::Char('h'))));
        assert_eq!(key_to_action(press(KeyCode::Down)), Action::Move(Direction::Down));
        assert_eq!(key_to_action(press(KeyCode::Char('k'))), Action::Move(Direction::Up));
        assert_eq!(key_to_action(press(KeyCode::Char('l'))), Action::Move(Direction::Right));
    }

    #[test]
    fn space_and_enter_select() {
        assert_eq!(key_to_action(press(KeyCode::Char(' '))), Action::Select);
        assert_eq!(key_to_action(press(KeyCode::Enter)), Action::Select);
    }

    #[test]
    fn ctrl_c_quits_but_alt_is_ignored() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(ctrl_c), Action::Quit);
        let alt_h = KeyEvent::new(KeyCode::Char('h'), KeyModifiers::ALT);
        assert_eq!(key_to_action(alt_h), Action::None);
    }
}
