//! Stack - Thread stack region
//!
//! The lowest word holds a fencepost; a frame that runs off the end of the
//! stack overwrites it first.

/// Guard value at the far end of every thread stack
pub const STACK_FENCEPOST: u32 = 0xdead_beef;

/// Owned stack region of one thread
pub struct ThreadStack {
    words: Box<[u32]>,
}

impl ThreadStack {
    /// Allocate a zeroed stack of `words` 32-bit words
    pub fn allocate(words: usize) -> Self {
        let mut words = vec![0u32; words.max(1)].into_boxed_slice();
        words[0] = STACK_FENCEPOST;
        Self { words }
    }

    pub fn size_words(&self) -> usize {
        self.words.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.words.len() * core::mem::size_of::<u32>()
    }

    /// Fencepost untouched?
    pub fn is_intact(&self) -> bool {
        self.words[0] == STACK_FENCEPOST
    }

    /// Store a word; offset 0 is the far (guard) end
    pub fn write_word(&mut self, offset: usize, value: u32) {
        if let Some(word) = self.words.get_mut(offset) {
            *word = value;
        }
    }
}

impl core::fmt::Debug for ThreadStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadStack")
            .field("words", &self.words.len())
            .field("intact", &self.is_intact())
            .finish()
    }
}
