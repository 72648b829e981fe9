//! Callback registry for room subscriptions
//!
//! Maps each room to the ordered list of consumer callbacks interested
//! in it. Registration order is delivery order; a panicking callback
//! never blocks the callbacks registered after it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use tally_core::{Room, RoomUpdate};

/// Unique identifier for a registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "callback-{}", self.0)
    }
}

/// Callback invoked with every update delivered on a room
pub type RoomCallback = Arc<dyn Fn(&RoomUpdate) + Send + Sync>;

struct Registered {
    id: CallbackId,
    callback: RoomCallback,
}

/// Registry of room callbacks with fan-out in registration order
pub struct CallbackRegistry {
    /// Next callback ID to assign
    next_id: AtomicU64,
    /// Map of room -> callbacks in registration order
    rooms: DashMap<Room, Vec<Registered>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            rooms: DashMap::new(),
        }
    }

    /// Register a callback for a room. Returns the id used to
    /// deregister it; the same closure may be registered twice and gets
    /// a distinct id each time.
    pub fn register(&self, room: Room, callback: RoomCallback) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!("Registered {} for {}", id, room);
        self.rooms
            .entry(room)
            .or_default()
            .push(Registered { id, callback });
        id
    }

    /// Remove a callback by id. A no-op when the room or id is unknown.
    pub fn deregister(&self, room: &Room, id: CallbackId) {
        if let Some(mut callbacks) = self.rooms.get_mut(room) {
            callbacks.retain(|registered| registered.id != id);
        }
        self.rooms.remove_if(room, |_, callbacks| callbacks.is_empty());
        debug!("Deregistered {} from {}", id, room);
    }

    /// Number of callbacks currently registered for a room
    pub fn callback_count(&self, room: &Room) -> usize {
        self.rooms
            .get(room)
            .map(|callbacks| callbacks.len())
            .unwrap_or(0)
    }

    /// Check if any callbacks are registered at all
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Deliver an update to every callback registered for the room, in
    /// registration order. Returns how many callbacks completed.
    ///
    /// The callback list is snapshotted before delivery, so a callback
    /// may register or deregister (even itself) without deadlocking;
    /// such changes take effect from the next delivery. A panic inside
    /// one callback is caught and logged, and delivery continues with
    /// the rest.
    pub fn dispatch(&self, room: &Room, update: &RoomUpdate) -> usize {
        let snapshot: Vec<(CallbackId, RoomCallback)> = match self.rooms.get(room) {
            Some(callbacks) => callbacks
                .iter()
                .map(|registered| (registered.id, Arc::clone(&registered.callback)))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(update))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!("{} for {} panicked, continuing delivery", id, room),
            }
        }
        delivered
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("rooms", &self.rooms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tally_core::{DepthPayload, RoomUpdate};

    fn depth_update() -> RoomUpdate {
        RoomUpdate::Depth(DepthPayload::default())
    }

    fn recording_callback(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> RoomCallback {
        let log = Arc::clone(log);
        Arc::new(move |_| log.lock().unwrap().push(tag))
    }

    #[test]
    fn delivers_in_registration_order() {
        let registry = CallbackRegistry::new();
        let room = Room::depth("ELECTION2028_USDC");
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = registry.register(room.clone(), recording_callback(&log, "a"));
        registry.register(room.clone(), recording_callback(&log, "b"));

        assert_eq!(registry.dispatch(&room, &depth_update()), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);

        registry.deregister(&room, first);
        assert_eq!(registry.dispatch(&room, &depth_update()), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "b"]);
    }

    #[test]
    fn duplicate_registrations_get_distinct_ids() {
        let registry = CallbackRegistry::new();
        let room = Room::ticker("ELECTION2028_USDC");
        let log = Arc::new(Mutex::new(Vec::new()));

        let callback = recording_callback(&log, "dup");
        let first = registry.register(room.clone(), Arc::clone(&callback));
        let second = registry.register(room.clone(), callback);
        assert_ne!(first, second);

        registry.dispatch(&room, &depth_update());
        assert_eq!(log.lock().unwrap().len(), 2);

        registry.deregister(&room, first);
        assert_eq!(registry.callback_count(&room), 1);
    }

    #[test]
    fn deregister_is_idempotent() {
        let registry = CallbackRegistry::new();
        let room = Room::trade("ELECTION2028_USDC");

        let id = registry.register(room.clone(), Arc::new(|_| {}));
        registry.deregister(&room, id);
        registry.deregister(&room, id);
        registry.deregister(&Room::trade("OTHER_USDC"), id);

        assert!(registry.is_empty());
        assert_eq!(registry.dispatch(&room, &depth_update()), 0);
    }

    #[test]
    fn panicking_callback_does_not_block_later_ones() {
        let registry = CallbackRegistry::new();
        let room = Room::depth("NYC_MAYOR_USDC");
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register(room.clone(), Arc::new(|_| panic!("consumer bug")));
        registry.register(room.clone(), recording_callback(&log, "survivor"));

        assert_eq!(registry.dispatch(&room, &depth_update()), 1);
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn callback_may_deregister_itself() {
        let registry = Arc::new(CallbackRegistry::new());
        let room = Room::ticker("NYC_MAYOR_USDC");
        let slot: Arc<Mutex<Option<CallbackId>>> = Arc::new(Mutex::new(None));

        let callback: RoomCallback = {
            let registry = Arc::clone(&registry);
            let room = room.clone();
            let slot = Arc::clone(&slot);
            Arc::new(move |_| {
                if let Some(id) = *slot.lock().unwrap() {
                    registry.deregister(&room, id);
                }
            })
        };
        let id = registry.register(room.clone(), callback);
        *slot.lock().unwrap() = Some(id);

        assert_eq!(registry.dispatch(&room, &depth_update()), 1);
        assert_eq!(registry.callback_count(&room), 0);
        assert_eq!(registry.dispatch(&room, &depth_update()), 0);
    }
}
