//! One-shot and looping timers.

use std::{any::TypeId, marker::PhantomData, ops::AddAssign};

use tracing::trace;

use crate::dispatcher::{Dispatcher, HandlerId};

/// Time quantity a [`TimerPool`] is advanced by: `f32` seconds, tick counts,
/// `std::time::Duration`, ...
pub trait Delta: Copy + PartialOrd + AddAssign + Default + 'static {}

impl<T: Copy + PartialOrd + AddAssign + Default + 'static> Delta for T {}

#[derive(Debug, Clone, Copy)]
struct Timer<D> {
    elapsed: D,
    period: D,
    tag: TypeId,
    name: &'static str,
}

impl<D: Delta> Timer<D> {
    fn new<Tag: 'static>(period: D) -> Self {
        Self {
            elapsed: D::default(),
            period,
            tag: TypeId::of::<Tag>(),
            name: std::any::type_name::<Tag>(),
        }
    }

    /// Add `dt` and report whether the period has been reached.
    fn advance(&mut self, dt: D) -> bool {
        self.elapsed += dt;
        self.expired()
    }

    fn expired(&self) -> bool {
        self.elapsed >= self.period
    }
}

/// Handle for connecting handlers to the event of one tag type.
pub struct Sink<'a, Tag, Ctx> {
    dispatcher: &'a mut Dispatcher<Ctx>,
    _tag: PhantomData<fn() -> Tag>,
}

impl<Tag: 'static, Ctx> Sink<'_, Tag, Ctx> {
    /// Run `handler` every time a timer tagged `Tag` fires.
    pub fn connect<F>(&mut self, handler: F) -> HandlerId
    where
        F: FnMut(&mut Ctx) + 'static,
    {
        self.dispatcher
            .connect(TypeId::of::<Tag>(), Box::new(handler))
    }
}

/// Timers that fire tag events after an amount of time has passed.
///
/// Time only moves when [`TimerPool::update`] is called. One-shot timers
/// fire their handlers immediately during the update in which they expire
/// and are then dropped. Looping timers restart from zero when they reach
/// their period; their events are queued and delivered at the end of the
/// same update, after every one-shot.
///
/// ```ignore
/// struct Flush;
///
/// let mut timers = TimerPool::<f32, World>::new();
/// timers.looping::<Flush>(1.0).connect(|world| {
///     let _ = world.flush_all();
/// });
///
/// loop {
///     timers.update(0.05, &mut world);
/// }
/// ```
pub struct TimerPool<D, Ctx = ()> {
    once: Vec<Timer<D>>,
    looping: Vec<Timer<D>>,
    dispatcher: Dispatcher<Ctx>,
}

impl<D: Delta, Ctx> Default for TimerPool<D, Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Delta, Ctx> TimerPool<D, Ctx> {
    /// Pool with no timers and no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            once: Vec::new(),
            looping: Vec::new(),
            dispatcher: Dispatcher::default(),
        }
    }

    /// Fire `Tag` once, after `delay`.
    pub fn add<Tag: 'static>(&mut self, delay: D) -> Sink<'_, Tag, Ctx> {
        self.once.push(Timer::new::<Tag>(delay));
        self.sink()
    }

    /// Fire `Tag` every `period`.
    pub fn looping<Tag: 'static>(&mut self, period: D) -> Sink<'_, Tag, Ctx> {
        self.looping.push(Timer::new::<Tag>(period));
        self.sink()
    }

    /// Connect more handlers to `Tag` without adding a timer.
    pub fn sink<Tag: 'static>(&mut self) -> Sink<'_, Tag, Ctx> {
        Sink {
            dispatcher: &mut self.dispatcher,
            _tag: PhantomData,
        }
    }

    /// Remove a handler. Returns `false` if it was not connected.
    pub fn disconnect(&mut self, id: HandlerId) -> bool {
        self.dispatcher.disconnect(id)
    }

    /// Advance every timer by `dt` and run the handlers of those that fired.
    pub fn update(&mut self, dt: D, ctx: &mut Ctx) {
        for timer in &mut self.once {
            timer.advance(dt);
        }
        let (expired, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.once)
            .into_iter()
            .partition(Timer::expired);
        self.once = waiting;

        for timer in expired {
            trace!(tag = timer.name, "one-shot timer fired");
            self.dispatcher.trigger(timer.tag, ctx);
        }

        for timer in &mut self.looping {
            if timer.advance(dt) {
                timer.elapsed = D::default();
                trace!(tag = timer.name, "looping timer fired");
                self.dispatcher.enqueue(timer.tag);
            }
        }

        self.dispatcher.update(ctx);
    }

    /// One-shot timers that have not fired yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.once.len()
    }

    /// Number of looping timers.
    #[must_use]
    pub fn looping_len(&self) -> usize {
        self.looping.len()
    }

    /// Handlers connected to `Tag`.
    #[must_use]
    pub fn handler_count<Tag: 'static>(&self) -> usize {
        self.dispatcher.handler_count(TypeId::of::<Tag>())
    }

    /// Drop every timer. Connected handlers are kept.
    pub fn clear(&mut self) {
        self.once.clear();
        self.looping.clear();
        self.dispatcher.clear_queue();
    }
}

impl<D: std::fmt::Debug, Ctx> std::fmt::Debug for TimerPool<D, Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerPool")
            .field("once", &self.once)
            .field("looping", &self.looping)
            .finish_non_exhaustive()
    }
}
