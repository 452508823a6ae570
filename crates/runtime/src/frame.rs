use foundation::time::Millis;

/// Deterministic frame metadata.
///
/// This is the playback timebase. Shells translate their animation-frame
/// callbacks into `Frame`s; tests build them directly, so a replay is always
/// reproducible.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Fixed delta time.
    pub dt: Millis,
    /// Playback time at the start of the frame.
    pub time: Millis,
}

impl Frame {
    pub fn new(index: u64, dt: Millis) -> Self {
        Self {
            index,
            dt,
            time: Millis(index as f64 * dt.0),
        }
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt)
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Millis;

    #[test]
    fn frame_time_is_deterministic() {
        let a = Frame::new(10, Millis(16.0));
        let b = Frame::new(10, Millis(16.0));
        assert_eq!(a, b);
        assert_eq!(a.time, Millis(160.0));
    }

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::new(0, Millis(50.0));
        let f1 = f0.next();
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Millis(50.0));
    }
}
