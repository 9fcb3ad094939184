use core::fmt;

/// Fixed-capacity FIFO window (append-only, evicts oldest when full).
///
/// `push` hands back the evicted element so running aggregates can
/// subtract it without re-walking the window.
#[derive(Clone)]
pub struct CircularColumn<T: Copy + Default> {
    capacity: usize,
    len: usize,
    head: usize, // next write index
    data: Vec<T>,
}

impl<T: Copy + Default> fmt::Debug for CircularColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularColumn")
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

impl<T: Copy + Default> CircularColumn<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            capacity,
            len: 0,
            head: 0,
            data: vec![T::default(); capacity],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Index (in `data`) of the oldest element.
    #[inline]
    fn start(&self) -> usize {
        (self.head + self.capacity - self.len) % self.capacity
    }

    /// Pushes a new element; returns the one that fell out of the window.
    #[inline]
    pub fn push(&mut self, v: T) -> Option<T> {
        let evicted = self.is_full().then(|| self.data[self.head]);
        self.data[self.head] = v;
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
        evicted
    }

    /// Gets element by index from oldest (0 = oldest).
    #[inline]
    pub fn get(&self, i: usize) -> Option<T> {
        if i >= self.len {
            return None;
        }
        Some(self.data[(self.start() + i) % self.capacity])
    }

    #[inline]
    pub fn front(&self) -> Option<T> {
        self.get(0)
    }

    #[inline]
    pub fn back(&self) -> Option<T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter { col: self, i: 0 }
    }

    pub fn to_vec_ordered(&self) -> Vec<T> {
        self.iter().collect()
    }
}

pub struct Iter<'a, T: Copy + Default> {
    col: &'a CircularColumn<T>,
    i: usize,
}

impl<'a, T: Copy + Default> Iterator for Iter<'a, T> {
    type Item = T;
    fn next(&mut self) -> Option<Self::Item> {
        let v = self.col.get(self.i)?;
        self.i += 1;
        Some(v)
    }
}
