//! The 32-bit word stream SPIR-V modules are assembled from.

/// A SPIR-V result id or literal word.
pub type Word = u32;

/// An append-only buffer of 32-bit words with instruction framing.
///
/// Each instruction starts with a header word carrying the opcode in the
/// low 16 bits; the word count lands in the high 16 bits when the
/// instruction is closed, after its operands have been written.
#[derive(Clone, Debug, Default)]
pub struct WordStream {
    words: Vec<Word>,
}

impl WordStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of words written so far.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Opens an instruction, returning the index of its header word for
    /// the matching [`end`](Self::end) call.
    pub fn begin(&mut self, opcode: u16) -> usize {
        self.words.push(opcode as Word);
        self.words.len() - 1
    }

    /// Appends one operand word.
    pub fn word(&mut self, word: Word) {
        self.words.push(word);
    }

    /// Appends a NUL-terminated string, packed four bytes per word,
    /// little-endian within each word. A full final word gets an extra
    /// all-zero terminator word.
    pub fn string(&mut self, s: &str) {
        let mut current: Word = 0;
        let mut shift = 0u32;
        for &byte in s.as_bytes().iter().chain(std::iter::once(&0u8)) {
            current |= (byte as Word) << shift;
            shift += 8;
            if shift == 32 {
                self.words.push(current);
                current = 0;
                shift = 0;
            }
        }
        if shift != 0 {
            self.words.push(current);
        }
    }

    /// Closes the instruction opened at `header`, patching its word count.
    pub fn end(&mut self, header: usize) {
        let count = (self.words.len() - header) as Word;
        self.words[header] |= count << 16;
    }

    /// Emits a complete instruction with fixed operands.
    pub fn instruction(&mut self, opcode: u16, operands: &[Word]) {
        let header = self.begin(opcode);
        self.words.extend_from_slice(operands);
        self.end(header);
    }

    /// Appends another stream verbatim.
    pub fn append(&mut self, other: &WordStream) {
        self.words.extend_from_slice(&other.words);
    }

    /// Overwrites a single word; used to patch the header's id bound.
    pub fn patch(&mut self, index: usize, word: Word) {
        self.words[index] = word;
    }

    /// Consumes the stream, yielding the raw words.
    pub fn into_words(self) -> Vec<Word> {
        self.words
    }

    /// The raw words written so far.
    pub fn words(&self) -> &[Word] {
        &self.words
    }
}
