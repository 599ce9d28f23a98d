/// Deterministic set of point indices backed by a bitset.
///
/// Ordering contract:
/// - Iteration yields indices in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    words: Vec<u64>,
    len: usize,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set containing every index in `0..count`.
    pub fn full(count: usize) -> Self {
        let mut s = Self::default();
        if count == 0 {
            return s;
        }
        let full_words = count / 64;
        let rest = count % 64;
        s.words = vec![u64::MAX; full_words];
        if rest > 0 {
            s.words.push((1u64 << rest) - 1);
        }
        s.len = count;
        s
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        let (word, bit) = word_bit(index);
        self.words.get(word).is_some_and(|w| (w & (1u64 << bit)) != 0)
    }

    /// Returns `true` if the set changed.
    pub fn insert(&mut self, index: usize) -> bool {
        self.ensure_capacity(index);
        let (word, bit) = word_bit(index);
        let mask = 1u64 << bit;
        let w = &mut self.words[word];
        if (*w & mask) != 0 {
            return false;
        }
        *w |= mask;
        self.len += 1;
        true
    }

    /// Returns `true` if the set changed.
    pub fn remove(&mut self, index: usize) -> bool {
        let (word, bit) = word_bit(index);
        let Some(w) = self.words.get_mut(word) else {
            return false;
        };
        let mask = 1u64 << bit;
        if (*w & mask) == 0 {
            return false;
        }
        *w &= !mask;
        self.len -= 1;
        true
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.union_in_place(other);
        out
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.intersect_in_place(other);
        out
    }

    /// Set difference: `self \ other`.
    pub fn diff(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.diff_in_place(other);
        out
    }

    pub fn union_in_place(&mut self, other: &Self) {
        let max_words = other.words.len().max(self.words.len());
        self.words.resize(max_words, 0);
        for (idx, ow) in other.words.iter().copied().enumerate() {
            self.words[idx] |= ow;
        }
        self.recount_len();
    }

    pub fn intersect_in_place(&mut self, other: &Self) {
        let min_words = other.words.len().min(self.words.len());
        for idx in 0..min_words {
            self.words[idx] &= other.words[idx];
        }
        for word in self.words.iter_mut().skip(min_words) {
            *word = 0;
        }
        self.recount_len();
    }

    pub fn diff_in_place(&mut self, other: &Self) {
        let min_words = other.words.len().min(self.words.len());
        for idx in 0..min_words {
            self.words[idx] &= !other.words[idx];
        }
        self.recount_len();
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        SelectionIter {
            words: &self.words,
            word_index: 0,
            current_word: 0,
            base_index: 0,
        }
    }

    fn ensure_capacity(&mut self, index: usize) {
        let (word, _bit) = word_bit(index);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
    }

    fn recount_len(&mut self) {
        self.len = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }
}

impl FromIterator<usize> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut s = Self::new();
        for index in iter {
            s.insert(index);
        }
        s
    }
}

fn word_bit(index: usize) -> (usize, u32) {
    (index / 64, (index % 64) as u32)
}

struct SelectionIter<'a> {
    words: &'a [u64],
    word_index: usize,
    current_word: u64,
    base_index: usize,
}

impl Iterator for SelectionIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let tz = self.current_word.trailing_zeros();
                self.current_word &= !(1u64 << tz);
                return Some(self.base_index + tz as usize);
            }

            let w = *self.words.get(self.word_index)?;
            self.current_word = w;
            self.base_index = self.word_index * 64;
            self.word_index += 1;
        }
    }
}

/// Interaction state that refers to point indices.
///
/// Indices are only meaningful for the column ordering they were taken from,
/// so this is cleared whenever columns are replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSelection {
    pub selected: SelectionSet,
    pub visited: SelectionSet,
    /// Point whose details are open.
    pub marked: Option<usize>,
    pub hovered: Option<usize>,
}

impl PointSelection {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
