use log::debug;

use crate::gestures::{Direction, Requirement};

type DirectionHandler = Box<dyn FnMut(Direction)>;

/// Embedder callbacks. Every slot is optional; empty slots are skipped.
#[derive(Default)]
pub struct SwipeCallbacks {
    on_swipe: Option<DirectionHandler>,
    on_card_left_screen: Option<DirectionHandler>,
    on_requirement_fulfilled: Option<DirectionHandler>,
    on_requirement_unfulfilled: Option<Box<dyn FnMut()>>,
}

impl SwipeCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_swipe(mut self, f: impl FnMut(Direction) + 'static) -> Self {
        self.on_swipe = Some(Box::new(f));
        self
    }

    pub fn on_card_left_screen(mut self, f: impl FnMut(Direction) + 'static) -> Self {
        self.on_card_left_screen = Some(Box::new(f));
        self
    }

    pub fn on_swipe_requirement_fulfilled(mut self, f: impl FnMut(Direction) + 'static) -> Self {
        self.on_requirement_fulfilled = Some(Box::new(f));
        self
    }

    pub fn on_swipe_requirement_unfulfilled(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_requirement_unfulfilled = Some(Box::new(f));
        self
    }

    /// Whether anyone listens for live requirement changes at all.
    pub fn wants_requirement(&self) -> bool {
        self.on_requirement_fulfilled.is_some() || self.on_requirement_unfulfilled.is_some()
    }

    pub(crate) fn swiped(&mut self, dir: Direction) {
        debug!("callback: swipe {dir}");
        if let Some(f) = self.on_swipe.as_mut() {
            f(dir);
        }
    }

    pub(crate) fn left_screen(&mut self, dir: Direction) {
        debug!("callback: card left screen {dir}");
        if let Some(f) = self.on_card_left_screen.as_mut() {
            f(dir);
        }
    }

    pub(crate) fn requirement(&mut self, change: Requirement) {
        match change {
            Requirement::Fulfilled(dir) => {
                if let Some(f) = self.on_requirement_fulfilled.as_mut() {
                    f(dir);
                }
            }
            Requirement::Unfulfilled => {
                if let Some(f) = self.on_requirement_unfulfilled.as_mut() {
                    f();
                }
            }
        }
    }
}

impl std::fmt::Debug for SwipeCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwipeCallbacks")
            .field("on_swipe", &self.on_swipe.is_some())
            .field("on_card_left_screen", &self.on_card_left_screen.is_some())
            .field("on_requirement_fulfilled", &self.on_requirement_fulfilled.is_some())
            .field("on_requirement_unfulfilled", &self.on_requirement_unfulfilled.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn empty_callbacks_are_skipped() {
        let mut cb = SwipeCallbacks::new();
        cb.swiped(Direction::Left);
        cb.left_screen(Direction::Left);
        cb.requirement(Requirement::Unfulfilled);
        assert!(!cb.wants_requirement());
    }

    #[test]
    fn routes_requirement_changes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());
        let mut cb = SwipeCallbacks::new()
            .on_swipe_requirement_fulfilled(move |d| a.borrow_mut().push(d.to_string()))
            .on_swipe_requirement_unfulfilled(move || b.borrow_mut().push("none".into()));
        cb.requirement(Requirement::Fulfilled(Direction::Up));
        cb.requirement(Requirement::Unfulfilled);
        assert_eq!(*log.borrow(), vec!["up".to_string(), "none".to_string()]);
        assert!(cb.wants_requirement());
    }
}
