//! Pointer events and scoped listener acquisition.

use log::debug;
use std::{cell::RefCell, rc::Rc};

use crate::tracker::Sample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Sample),
    Move(Sample),
    Up(Sample),
    /// Pointer left the element while pressed; handled like a release.
    Leave(Sample),
}

impl PointerEvent {
    pub fn sample(&self) -> Sample {
        match *self {
            PointerEvent::Down(s)
            | PointerEvent::Move(s)
            | PointerEvent::Up(s)
            | PointerEvent::Leave(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Whatever delivers pointer events to a card: a window, a view, a replayed trace.
pub trait InputSource {
    fn listen(&mut self) -> ListenerId;
    fn unlisten(&mut self, id: ListenerId);
}

/// Holds a listener registration for as long as the card is mounted.
/// Dropping it detaches the listener, whichever way the scope is left.
#[derive(Debug)]
pub struct ListenerScope<S: InputSource> {
    source: Rc<RefCell<S>>,
    id: ListenerId,
}

impl<S: InputSource> ListenerScope<S> {
    pub fn acquire(source: Rc<RefCell<S>>) -> Self {
        let id = source.borrow_mut().listen();
        debug!("input: acquired listener {id:?}");
        Self { source, id }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<S: InputSource> Drop for ListenerScope<S> {
    fn drop(&mut self) {
        self.source.borrow_mut().unlisten(self.id);
        debug!("input: released listener {:?}", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSource {
        next: u64,
        live: Vec<ListenerId>,
    }

    impl InputSource for CountingSource {
        fn listen(&mut self) -> ListenerId {
            self.next += 1;
            let id = ListenerId(self.next);
            self.live.push(id);
            id
        }

        fn unlisten(&mut self, id: ListenerId) {
            self.live.retain(|l| *l != id);
        }
    }

    #[test]
    fn scope_releases_on_drop() {
        let src = Rc::new(RefCell::new(CountingSource::default()));
        {
            let a = ListenerScope::acquire(src.clone());
            let _b = ListenerScope::acquire(src.clone());
            assert_eq!(src.borrow().live.len(), 2);
            drop(a);
            assert_eq!(src.borrow().live, vec![ListenerId(2)]);
        }
        assert!(src.borrow().live.is_empty());
    }

    #[test]
    fn scope_releases_on_early_return() {
        fn attach_then_bail(src: Rc<RefCell<CountingSource>>) -> Result<(), &'static str> {
            let _scope = ListenerScope::acquire(src);
            Err("element went away")
        }

        let src = Rc::new(RefCell::new(CountingSource::default()));
        assert!(attach_then_bail(src.clone()).is_err());
        assert!(src.borrow().live.is_empty());
    }
}
