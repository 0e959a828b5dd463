use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Shape of a published float frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    /// Floats per sample.
    pub channels: u32,
    /// Pixel format name, e.g. `"PF_FLOAT32_RGB"`.
    pub format: &'static str,
}

impl FrameInfo {
    /// Number of floats a frame with this shape holds.
    #[inline]
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Callback = Box<dyn FnMut(&[f32], &FrameInfo) + Send>;

struct Slot {
    id: u64,
    callback: Callback,
}

type Slots = Mutex<Vec<Slot>>;

/// Subscriber list for float frames.
#[derive(Default)]
pub struct FrameEvent {
    slots: Arc<Slots>,
    next_id: AtomicU64,
}

impl FrameEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `callback`. The subscription ends when the returned
    /// connection is dropped.
    #[must_use = "dropping the connection unsubscribes immediately"]
    pub fn connect<F>(&self, callback: F) -> Connection
    where
        F: FnMut(&[f32], &FrameInfo) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.slots).push(Slot {
            id,
            callback: Box::new(callback),
        });
        Connection {
            id,
            slots: Arc::downgrade(&self.slots),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Calls every subscriber in connection order.
    ///
    /// Subscribers must not connect or disconnect from inside the callback.
    pub fn signal(&self, data: &[f32], info: &FrameInfo) {
        debug_assert!(data.len() >= info.len(), "frame shorter than its shape");
        for slot in lock(&self.slots).iter_mut() {
            (slot.callback)(data, info);
        }
    }
}

impl std::fmt::Debug for FrameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameEvent")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle keeping a [`FrameEvent`] subscription alive.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    slots: Weak<Slots>,
}

impl Connection {
    /// True while the event this connection belongs to still exists.
    pub fn is_connected(&self) -> bool {
        self.slots
            .upgrade()
            .is_some_and(|slots| lock(&slots).iter().any(|s| s.id == self.id))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            lock(&slots).retain(|s| s.id != self.id);
        }
    }
}

// A panicking subscriber must not wedge the sensor.
fn lock(slots: &Slots) -> MutexGuard<'_, Vec<Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn info() -> FrameInfo {
        FrameInfo { width: 2, height: 1, channels: 3, format: "PF_FLOAT32_RGB" }
    }

    #[test]
    fn subscribers_receive_frames() {
        let event = FrameEvent::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _conn = event.connect(move |data, info| {
            sink.lock().unwrap().push((data.to_vec(), info.width));
        });

        event.signal(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &info());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0[3], 4.0);
        assert_eq!(seen[0].1, 2);
    }

    #[test]
    fn dropping_connection_unsubscribes() {
        let event = FrameEvent::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let conn = event.connect(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(conn.is_connected());

        event.signal(&[0.0; 6], &info());
        drop(conn);
        event.signal(&[0.0; 6], &info());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(event.subscriber_count(), 0);
    }

    #[test]
    fn connection_outliving_event_is_harmless() {
        let event = FrameEvent::new();
        let conn = event.connect(|_, _| {});
        drop(event);
        assert!(!conn.is_connected());
        drop(conn);
    }

    #[test]
    fn frame_len_counts_channels() {
        assert_eq!(info().len(), 6);
    }
}
