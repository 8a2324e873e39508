use core::fmt;

/// Fixed-capacity ring of non-negative magnitudes with an O(1) running sum.
///
/// Overwrites the oldest value when full. Used for trailing averages that
/// only admit selected observations (e.g. true ranges of accepted bars).
#[derive(Clone)]
pub struct RunningWindow {
    capacity: usize,
    len: usize,
    head: usize, // next write index
    sum: f64,
    data: Vec<f64>,
}

impl fmt::Debug for RunningWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningWindow")
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("sum", &self.sum)
            .finish_non_exhaustive()
    }
}

impl RunningWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            capacity,
            len: 0,
            head: 0,
            sum: 0.0,
            data: vec![0.0; capacity],
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    #[inline]
    pub fn push(&mut self, v: f64) {
        if self.len == self.capacity {
            self.sum -= self.data[self.head];
        } else {
            self.len += 1;
        }
        self.data[self.head] = v;
        self.sum += v;
        self.head = (self.head + 1) % self.capacity;
    }

    /// Mean of the held values; `None` while empty.
    #[inline]
    pub fn mean(&self) -> Option<f64> {
        if self.len == 0 {
            None
        } else {
            // Re-clamp: repeated add/subtract can leave tiny negative drift.
            Some((self.sum / self.len as f64).max(0.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RunningWindow;

    #[test]
    fn fills_then_overwrites_oldest() {
        let mut w = RunningWindow::new(3);
        w.push(1.0);
        w.push(2.0);
        assert!(!w.is_full());
        w.push(3.0);
        assert!(w.is_full());
        w.push(10.0);
        w.push(20.0);
        // holds 3, 10, 20
        assert!(w.is_full());
        assert_eq!(w.mean(), Some(11.0));
    }

    #[test]
    fn running_mean_tracks_window() {
        let mut w = RunningWindow::new(3);
        assert_eq!(w.mean(), None);
        w.push(1.0);
        w.push(2.0);
        w.push(3.0);
        assert_eq!(w.mean(), Some(2.0));
        w.push(4.0); // drops 1.0
        assert_eq!(w.mean(), Some(3.0));
    }
}
