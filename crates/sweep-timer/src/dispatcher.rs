//! Tag-keyed event dispatch with an immediate path and a queued path.

use std::{any::TypeId, collections::VecDeque};

use hashbrown::HashMap;

/// Identifier returned when connecting a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u32);

impl HandlerId {
    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Type-erased handler. Receives the context passed to `TimerPool::update`.
pub(crate) type HandlerFn<Ctx> = Box<dyn FnMut(&mut Ctx)>;

struct Handler<Ctx> {
    id: HandlerId,
    callback: HandlerFn<Ctx>,
}

/// Handlers grouped by tag type, plus a FIFO of tags waiting to be delivered.
pub(crate) struct Dispatcher<Ctx> {
    handlers: HashMap<TypeId, Vec<Handler<Ctx>>>,
    queue: VecDeque<TypeId>,
    next_id: u32,
}

impl<Ctx> Default for Dispatcher<Ctx> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            queue: VecDeque::new(),
            next_id: 0,
        }
    }
}

impl<Ctx> Dispatcher<Ctx> {
    pub(crate) fn connect(&mut self, tag: TypeId, callback: HandlerFn<Ctx>) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(tag)
            .or_default()
            .push(Handler { id, callback });
        id
    }

    pub(crate) fn disconnect(&mut self, id: HandlerId) -> bool {
        for handlers in self.handlers.values_mut() {
            if let Some(index) = handlers.iter().position(|handler| handler.id == id) {
                handlers.remove(index);
                return true;
            }
        }
        false
    }

    /// Run every handler of `tag` now, in connection order.
    pub(crate) fn trigger(&mut self, tag: TypeId, ctx: &mut Ctx) {
        if let Some(handlers) = self.handlers.get_mut(&tag) {
            for handler in handlers {
                (handler.callback)(ctx);
            }
        }
    }

    /// Queue `tag` for the next [`Dispatcher::update`].
    pub(crate) fn enqueue(&mut self, tag: TypeId) {
        self.queue.push_back(tag);
    }

    /// Deliver every queued tag in FIFO order.
    pub(crate) fn update(&mut self, ctx: &mut Ctx) {
        while let Some(tag) = self.queue.pop_front() {
            self.trigger(tag, ctx);
        }
    }

    pub(crate) fn handler_count(&self, tag: TypeId) -> usize {
        self.handlers.get(&tag).map_or(0, Vec::len)
    }

    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn clear_queue(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    struct Pong;

    #[test]
    fn test_trigger_runs_in_connection_order() {
        let mut dispatcher = Dispatcher::<Vec<u32>>::default();
        dispatcher.connect(TypeId::of::<Ping>(), Box::new(|log: &mut Vec<u32>| log.push(1)));
        dispatcher.connect(TypeId::of::<Ping>(), Box::new(|log: &mut Vec<u32>| log.push(2)));
        dispatcher.connect(TypeId::of::<Pong>(), Box::new(|log: &mut Vec<u32>| log.push(9)));

        let mut log = Vec::new();
        dispatcher.trigger(TypeId::of::<Ping>(), &mut log);

        assert_eq!(log, vec![1, 2]);
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut dispatcher = Dispatcher::<Vec<u32>>::default();
        dispatcher.connect(TypeId::of::<Ping>(), Box::new(|log: &mut Vec<u32>| log.push(1)));
        dispatcher.connect(TypeId::of::<Pong>(), Box::new(|log: &mut Vec<u32>| log.push(2)));

        let mut log = Vec::new();
        dispatcher.enqueue(TypeId::of::<Pong>());
        dispatcher.enqueue(TypeId::of::<Ping>());
        assert!(log.is_empty());
        assert_eq!(dispatcher.queued(), 2);

        dispatcher.update(&mut log);
        assert_eq!(log, vec![2, 1]);
        assert_eq!(dispatcher.queued(), 0);
    }

    #[test]
    fn test_disconnect() {
        let mut dispatcher = Dispatcher::<u32>::default();
        let id = dispatcher.connect(TypeId::of::<Ping>(), Box::new(|count: &mut u32| *count += 1));

        assert!(dispatcher.disconnect(id));
        assert!(!dispatcher.disconnect(id));
        assert_eq!(dispatcher.handler_count(TypeId::of::<Ping>()), 0);

        let mut count = 0;
        dispatcher.trigger(TypeId::of::<Ping>(), &mut count);
        assert_eq!(count, 0);
    }
}
