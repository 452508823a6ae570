use foundation::time::Millis;

/// A payload stamped with the playback time it was emitted at.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    pub time: Millis,
    pub payload: E,
}

/// Append-only, in-order event log.
///
/// Consumers drain it once per frame; nothing is dropped in between.
#[derive(Debug)]
pub struct EventBus<E> {
    events: Vec<Event<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, time: Millis, payload: E) {
        self.events.push(Event { time, payload });
    }

    pub fn events(&self) -> &[Event<E>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Event<E>> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use foundation::time::Millis;

    #[test]
    fn records_events_in_emit_order() {
        let mut bus = EventBus::new();
        bus.emit(Millis(20.0), "b");
        bus.emit(Millis(10.0), "a");
        let payloads: Vec<_> = bus.events().iter().map(|e| e.payload).collect();
        assert_eq!(payloads, vec!["b", "a"]);
        assert_eq!(bus.events()[0].time, Millis(20.0));
    }

    #[test]
    fn drain_clears_events() {
        let mut bus = EventBus::new();
        bus.emit(Millis::ZERO, 1u32);
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.is_empty());
    }
}
