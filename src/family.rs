//! Word stream over a d3plot file family
//!
//! LS-DYNA splits large result databases over several files, `d3plot`,
//! `d3plot01`, `d3plot02`, and so on. The [Family] treats all members as one
//! continuous stream of words, so readers only ever ask to skip words or to
//! buffer a chunk of words.
//!
//! Words are either 4 or 8 bytes wide for the whole family. The width and the
//! byte order are detected once when the family is opened and every decode
//! afterwards uses them.
//!
//! ```rust
//! # use d3parts::family::{Endian, Family, WordKind, WordSize};
//! let bytes: Vec<u8> = [1i32, 2, 3, 4].iter().flat_map(|w| w.to_le_bytes()).collect();
//! let mut family = Family::from_bytes(bytes, WordSize::Four, Endian::Little);
//!
//! family.skip_words(1).unwrap();
//! family.buffer_chunk(WordKind::Int, 2).unwrap();
//! assert_eq!(family.buffer_as::<i32>().unwrap(), vec![2, 3]);
//! ```

// internal modules
use crate::utils::*;

// standard library
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

// external crates
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

/// Position of the version number in the control section, in words
const VERSION_WORD: usize = 14;

/// Width of every word in the family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WordSize {
    /// Single precision, 4-byte words
    #[default]
    Four,
    /// Double precision, 8-byte words
    Eight,
}

impl WordSize {
    /// Number of bytes in a word
    #[inline]
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for WordSize {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            _ => Err(f!("Word size must be 4 or 8 bytes, found {value}")),
        }
    }
}

impl From<WordSize> for u8 {
    fn from(value: WordSize) -> Self {
        value.bytes() as u8
    }
}

impl std::fmt::Display for WordSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}-byte", self.bytes())
    }
}

/// Byte order of the family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// How the words in a chunk are to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Float,
    Int,
}

/// A numeric type that a buffered chunk can be decoded into
pub trait Word: Copy + Debug + Default + 'static {
    /// Width of the word in bytes
    const SIZE: usize;
    /// Interpretation of the word
    const KIND: WordKind;

    /// Decode one word from exactly `SIZE` bytes
    fn decode(bytes: &[u8], endian: Endian) -> Self;

    /// Widen to a double
    fn as_f64(self) -> f64;

    /// Widen to a 64-bit integer, truncating floats
    fn as_i64(self) -> i64;
}

macro_rules! impl_word {
    ($t:ty, $size:expr, $kind:expr) => {
        impl Word for $t {
            const SIZE: usize = $size;
            const KIND: WordKind = $kind;

            #[inline]
            fn decode(bytes: &[u8], endian: Endian) -> Self {
                let raw = <[u8; $size]>::try_from(bytes).unwrap_or_default();
                match endian {
                    Endian::Little => <$t>::from_le_bytes(raw),
                    Endian::Big => <$t>::from_be_bytes(raw),
                }
            }

            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn as_i64(self) -> i64 {
                self as i64
            }
        }
    };
}

impl_word!(f32, 4, WordKind::Float);
impl_word!(f64, 8, WordKind::Float);
impl_word!(i32, 4, WordKind::Int);
impl_word!(i64, 8, WordKind::Int);

/// Anything a family member can be read from
trait Member: Read + Seek + Debug {}

impl<T: Read + Seek + Debug> Member for T {}

/// A set of files read as one continuous word stream
#[derive(Debug)]
pub struct Family {
    /// Readers for every member, in family order
    members: Vec<Box<dyn Member>>,
    /// Number of whole words in each member
    lengths: Vec<u64>,
    /// Width of every word
    word_size: WordSize,
    /// Byte order of every word
    endian: Endian,
    /// Absolute word position in the stream
    position: u64,
    /// Raw bytes of the last buffered chunk
    buffer: Vec<u8>,
    /// Interpretation of the last buffered chunk
    buffered_kind: Option<WordKind>,
}

/// Construction
impl Family {
    /// Open a family, detecting the word size and byte order
    ///
    /// Members are discovered as `path`, `path01`, `path02`, ... until the
    /// next numbered file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut header = vec![0u8; (VERSION_WORD + 1) * WordSize::Eight.bytes()];
        let mut file =
            File::open(path).with_context(|| f!("Could not open {}", path.display()))?;
        let n = read_up_to(&mut file, &mut header)?;
        header.truncate(n);

        let (word_size, endian) = detect_storage(&header).ok_or_else(|| {
            anyhow!(
                "Could not determine the word size of {}, is this a d3plot file?",
                path.display()
            )
        })?;

        debug!("Detected {word_size} {endian:?} endian words");
        Self::open_with(path, word_size, endian)
    }

    /// Open a family with an explicit word size and byte order
    pub fn open_with<P: AsRef<Path>>(path: P, word_size: WordSize, endian: Endian) -> Result<Self> {
        let mut family = Self::empty(word_size, endian);

        for member in Self::member_paths(path.as_ref()) {
            let file =
                File::open(&member).with_context(|| f!("Could not open {}", member.display()))?;
            let bytes = file.metadata()?.len();
            trace!("Family member {} ({bytes} bytes)", member.display());
            family.push_member(Box::new(BufReader::new(file)), bytes);
        }

        if family.members.is_empty() {
            bail!("No family members found at {}", path.as_ref().display());
        }

        debug!(
            "Opened family of {} member(s), {}",
            family.members.len(),
            word_count(family.total_words())
        );
        Ok(family)
    }

    /// Wrap a single in-memory buffer
    pub fn from_bytes(bytes: Vec<u8>, word_size: WordSize, endian: Endian) -> Self {
        Self::from_members(vec![bytes], word_size, endian)
    }

    /// Wrap several in-memory buffers as consecutive family members
    pub fn from_members(members: Vec<Vec<u8>>, word_size: WordSize, endian: Endian) -> Self {
        let mut family = Self::empty(word_size, endian);
        for bytes in members {
            let len = bytes.len() as u64;
            family.push_member(Box::new(Cursor::new(bytes)), len);
        }
        family
    }

    fn empty(word_size: WordSize, endian: Endian) -> Self {
        Self {
            members: Vec::new(),
            lengths: Vec::new(),
            word_size,
            endian,
            position: 0,
            buffer: Vec::new(),
            buffered_kind: None,
        }
    }

    fn push_member(&mut self, member: Box<dyn Member>, bytes: u64) {
        let word = self.word_size.bytes() as u64;
        if bytes % word != 0 {
            warn!(
                "Member {} is not a whole number of words, ignoring {} trailing bytes",
                self.members.len(),
                bytes % word
            );
        }
        self.members.push(member);
        self.lengths.push(bytes / word);
    }

    /// Paths of every existing member, in family order
    fn member_paths(path: &Path) -> Vec<PathBuf> {
        let mut paths = vec![path.to_path_buf()];
        for n in 1.. {
            let mut name = path.as_os_str().to_os_string();
            name.push(f!("{n:02}"));
            let next = PathBuf::from(name);
            if !next.is_file() {
                break;
            }
            paths.push(next);
        }
        paths
    }
}

/// Word stream operations
impl Family {
    /// Width of every word in the family
    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    /// Byte order of every word in the family
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Absolute word position of the next read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of words across all members
    pub fn total_words(&self) -> u64 {
        self.lengths.iter().sum()
    }

    /// Move to an absolute word position
    pub fn seek_word(&mut self, position: u64) -> Result<()> {
        if position > self.total_words() {
            bail!(
                "Cannot seek to word {position}, the family only has {} words",
                self.total_words()
            );
        }
        trace!("Seek to word {position}");
        self.position = position;
        Ok(())
    }

    /// Skip over `n` words without reading them
    pub fn skip_words(&mut self, n: u64) -> Result<()> {
        let target = self.position + n;
        if target > self.total_words() {
            bail!(
                "Cannot skip {n} words from word {}, only {} remain",
                self.position,
                self.total_words() - self.position
            );
        }
        self.position = target;
        Ok(())
    }

    /// Read the next `n` words into the chunk buffer
    ///
    /// Returns the number of words buffered. The previous chunk is replaced.
    pub fn buffer_chunk(&mut self, kind: WordKind, n: usize) -> Result<usize> {
        let remaining = self.total_words() - self.position;
        if n as u64 > remaining {
            bail!(
                "Unexpected end of family: {n} words requested at word {}, {remaining} remain",
                self.position
            );
        }

        let word = self.word_size.bytes();
        self.buffer.clear();
        self.buffer.resize(n * word, 0);

        // fill the buffer member by member, the chunk may straddle files
        let mut filled = 0;
        while filled < self.buffer.len() {
            let (member, local) = self.locate(self.position)?;
            let available = (self.lengths[member] - local) as usize * word;
            let take = available.min(self.buffer.len() - filled);

            let reader = &mut self.members[member];
            reader.seek(SeekFrom::Start(local * word as u64))?;
            reader
                .read_exact(&mut self.buffer[filled..filled + take])
                .with_context(|| f!("Truncated read from family member {member}"))?;

            filled += take;
            self.position += (take / word) as u64;
        }

        self.buffered_kind = Some(kind);
        Ok(n)
    }

    /// Decode the buffered chunk
    ///
    /// The requested type must match both the family word size and the kind
    /// the chunk was buffered as.
    pub fn buffer_as<T: Word>(&self) -> Result<Vec<T>> {
        if T::SIZE != self.word_size.bytes() {
            bail!(
                "Cannot decode {} words as {}-byte values",
                self.word_size,
                T::SIZE
            );
        }

        match self.buffered_kind {
            None => bail!("No chunk has been buffered"),
            Some(kind) if kind != T::KIND => {
                bail!("Chunk was buffered as {kind:?} but decoded as {:?}", T::KIND)
            }
            Some(_) => (),
        }

        Ok(self
            .buffer
            .chunks_exact(T::SIZE)
            .map(|bytes| T::decode(bytes, self.endian))
            .collect())
    }

    /// Release the chunk buffer, which may be very large
    pub fn clear_buffer(&mut self) {
        self.buffer = Vec::new();
        self.buffered_kind = None;
    }

    /// Member index and local word offset of an absolute word position
    fn locate(&self, position: u64) -> Result<(usize, u64)> {
        let mut start = 0;
        for (i, len) in self.lengths.iter().enumerate() {
            if position < start + len {
                return Ok((i, position - start));
            }
            start += len;
        }
        Err(anyhow!("Word {position} is past the end of the family"))
    }
}

/// Sizes of the chunks needed to stream `total` items, at most `per_chunk` at
/// a time
///
/// ```rust
/// # use d3parts::family::chunk_sizes;
/// let sizes: Vec<usize> = chunk_sizes(10, 4).collect();
/// assert_eq!(sizes, vec![4, 4, 2]);
/// assert_eq!(chunk_sizes(0, 4).count(), 0);
/// ```
pub fn chunk_sizes(total: usize, per_chunk: usize) -> impl Iterator<Item = usize> {
    let per_chunk = per_chunk.max(1);
    (0..total)
        .step_by(per_chunk)
        .map(move |start| per_chunk.min(total - start))
}

/// Guess the word size and byte order from the start of the control section
///
/// The 15th word is the version number, stored as a float somewhere between
/// 900 and 1000 for every version of interest.
pub fn detect_storage(header: &[u8]) -> Option<(WordSize, Endian)> {
    let plausible = |version: f64| version > 900.0 && version < 1000.0;

    for endian in [Endian::Little, Endian::Big] {
        let start = VERSION_WORD * 4;
        if let Some(bytes) = header.get(start..start + 4) {
            if plausible(f32::decode(bytes, endian) as f64) {
                return Some((WordSize::Four, endian));
            }
        }
    }

    for endian in [Endian::Little, Endian::Big] {
        let start = VERSION_WORD * 8;
        if let Some(bytes) = header.get(start..start + 8) {
            if plausible(f64::decode(bytes, endian)) {
                return Some((WordSize::Eight, endian));
            }
        }
    }

    None
}

/// Like `read_exact`, but a short file is not an error
fn read_up_to<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_words(words: &[i32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn chunk_straddles_members() {
        let mut family = Family::from_members(
            vec![le_words(&[1, 2, 3]), le_words(&[4, 5])],
            WordSize::Four,
            Endian::Little,
        );
        assert_eq!(family.total_words(), 5);

        family.skip_words(2).unwrap();
        assert_eq!(family.buffer_chunk(WordKind::Int, 3).unwrap(), 3);
        assert_eq!(family.buffer_as::<i32>().unwrap(), vec![3, 4, 5]);
        assert_eq!(family.position(), 5);
    }

    #[test]
    fn truncated_chunk_is_an_error() {
        let mut family = Family::from_bytes(le_words(&[1, 2]), WordSize::Four, Endian::Little);
        assert!(family.buffer_chunk(WordKind::Int, 3).is_err());
        assert!(family.skip_words(3).is_err());
        assert!(family.seek_word(2).is_ok());
        assert!(family.seek_word(3).is_err());
    }

    #[test]
    fn decode_rejects_mismatches() {
        let mut family = Family::from_bytes(le_words(&[1, 2]), WordSize::Four, Endian::Little);
        assert!(family.buffer_as::<i32>().is_err());

        family.buffer_chunk(WordKind::Int, 2).unwrap();
        assert!(family.buffer_as::<f32>().is_err());
        assert!(family.buffer_as::<i64>().is_err());

        family.clear_buffer();
        assert!(family.buffer_as::<i32>().is_err());
    }

    #[test]
    fn big_endian_doubles() {
        let bytes: Vec<u8> = [1.5f64, -2.0].iter().flat_map(|w| w.to_be_bytes()).collect();
        let mut family = Family::from_bytes(bytes, WordSize::Eight, Endian::Big);
        family.buffer_chunk(WordKind::Float, 2).unwrap();
        assert_eq!(family.buffer_as::<f64>().unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn storage_detection() {
        let mut header = vec![0u8; 64 * 4];
        header[56..60].copy_from_slice(&971.0f32.to_be_bytes());
        assert_eq!(
            detect_storage(&header),
            Some((WordSize::Four, Endian::Big))
        );

        let mut header = vec![0u8; 64 * 8];
        header[112..120].copy_from_slice(&960.0f64.to_le_bytes());
        assert_eq!(
            detect_storage(&header),
            Some((WordSize::Eight, Endian::Little))
        );

        assert_eq!(detect_storage(&[0u8; 16]), None);
    }

    #[test]
    fn word_size_serde() {
        let ws: WordSize = serde_json::from_str("8").unwrap();
        assert_eq!(ws, WordSize::Eight);
        assert_eq!(serde_json::to_string(&WordSize::Four).unwrap(), "4");
        assert!(serde_json::from_str::<WordSize>("6").is_err());
    }
}
