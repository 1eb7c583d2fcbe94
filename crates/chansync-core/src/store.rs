//! Reducer-backed state stores.

/// Pure-ish state updates. No I/O.
///
/// Reducers receive the stored value by `&mut` and may update it in place;
/// nothing outside the store can hold a reference across the call.
pub trait Reducer<S, E>: Send + Sync {
    fn reduce(&self, state: &mut S, event: &E);
}

impl<S, E, F> Reducer<S, E> for F
where
    F: Fn(&mut S, &E) + Send + Sync,
{
    fn reduce(&self, state: &mut S, event: &E) {
        self(state, event)
    }
}

/// A synchronous fold of events into a single value.
///
/// `state()` always equals the left-fold of every event passed to `process()`
/// since the last `init()`, in call order. A panicking reducer propagates to
/// the caller of `process()` and leaves the value unspecified.
pub trait StateStore<E>: Send {
    type State;

    /// Replace the current value unconditionally.
    fn init(&mut self, seed: Self::State);

    /// Fold one event into the current value.
    fn process(&mut self, event: &E);

    /// Borrow the current value.
    fn state(&self) -> &Self::State;
}

/// The canonical store: an initial value plus a reducer.
pub struct ReducingStore<S, R> {
    state: S,
    reducer: R,
}

impl<S, R> ReducingStore<S, R> {
    pub fn new(initial: S, reducer: R) -> Self {
        Self {
            state: initial,
            reducer,
        }
    }

    pub fn init(&mut self, seed: S) {
        self.state = seed;
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Consume the store, returning its value.
    pub fn into_state(self) -> S {
        self.state
    }
}

impl<S, E, R> StateStore<E> for ReducingStore<S, R>
where
    S: Send,
    R: Reducer<S, E>,
{
    type State = S;

    fn init(&mut self, seed: S) {
        ReducingStore::init(self, seed);
    }

    fn process(&mut self, event: &E) {
        self.reducer.reduce(&mut self.state, event);
    }

    fn state(&self) -> &S {
        ReducingStore::state(self)
    }
}
