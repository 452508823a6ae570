/// Playback-clock time primitives.
///
/// The playback clock runs in milliseconds. Trip metadata is expressed in
/// trip-relative seconds and converted by the playback configuration, never
/// here.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Millis(pub f64);

impl Millis {
    pub const ZERO: Millis = Millis(0.0);

    pub fn as_f64(self) -> f64 {
        self.0
    }

    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 { other } else { self }
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl std::ops::Add for Millis {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Millis(self.0 + other.0)
    }
}

impl std::ops::Sub for Millis {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Millis(self.0 - other.0)
    }
}

impl std::ops::AddAssign for Millis {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl std::fmt::Display for Millis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}ms", self.0)
    }
}

/// Half-open span `[start, end)` on the playback clock.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeSpan {
    pub start: Millis,
    pub end: Millis,
}

impl TimeSpan {
    pub fn starting_at(start: Millis, duration: Millis) -> Self {
        Self {
            start,
            end: start + duration,
        }
    }

    pub fn duration(&self) -> Millis {
        Millis((self.end.0 - self.start.0).max(0.0))
    }

    pub fn contains(&self, t: Millis) -> bool {
        t.0 >= self.start.0 && t.0 < self.end.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Millis, TimeSpan};

    #[test]
    fn millis_arithmetic() {
        let mut t = Millis(250.0) + Millis(750.0);
        assert_eq!(t, Millis(1000.0));
        t += Millis(500.0);
        assert_eq!(t - Millis(1000.0), Millis(500.0));
        assert_eq!(Millis(3.0).max(Millis(7.0)), Millis(7.0));
    }

    #[test]
    fn span_is_half_open() {
        let span = TimeSpan::starting_at(Millis(500.0), Millis(1000.0));
        assert!(!span.contains(Millis(499.0)));
        assert!(span.contains(Millis(500.0)));
        assert!(span.contains(Millis(1499.0)));
        assert!(!span.contains(Millis(1500.0)));
        assert_eq!(span.duration(), Millis(1000.0));
    }

    #[test]
    fn zero_length_span_contains_nothing() {
        let span = TimeSpan::starting_at(Millis(10.0), Millis::ZERO);
        assert_eq!(span.duration(), Millis::ZERO);
        assert!(!span.contains(Millis(10.0)));
    }
}
