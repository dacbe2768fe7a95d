//! Codec registry and format sniffing
//!
//! Codecs register a name, a magic-byte pattern (`?` matches any byte) and
//! the file extensions they claim. A stream is dispatched either by sniffing
//! its leading bytes or by the extension of the file it came from.

mod song;
pub mod decoder;

pub use song::Song;

use crate::error::{Error, Result};
use symphonia::core::io::MediaSource;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Wildcard byte in a magic pattern
pub const MAGIC_WILDCARD: u8 = b'?';

/// Opens a fresh byte stream for a track; called once per (re)open
pub type StreamOpener = Arc<dyn Fn() -> Result<Box<dyn MediaSource>> + Send + Sync>;

/// Turns a stream into the songs it contains
///
/// Receives the opener rather than an open stream: songs open lazily on
/// `init()` and may reopen after a restart.
pub type DecodeFn = fn(StreamOpener, Option<&str>) -> Result<Vec<Box<dyn Song>>>;

struct Codec {
    name: String,
    magic: Vec<u8>,
    decode: DecodeFn,
}

/// Registry of decoders keyed by name, magic bytes and extension
#[derive(Default)]
pub struct CodecRegistry {
    codecs: Vec<Codec>,
    by_extension: HashMap<String, usize>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every symphonia-backed format this build supports
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        decoder::register_all(&mut registry);
        registry
    }

    /// Register a codec
    ///
    /// Sniffing tries codecs in registration order. An extension claimed by
    /// two codecs resolves to the later one.
    pub fn register(&mut self, name: &str, magic: &[u8], extensions: &[&str], decode: DecodeFn) {
        let index = self.codecs.len();
        self.codecs.push(Codec {
            name: name.to_string(),
            magic: magic.to_vec(),
            decode,
        });
        for ext in extensions {
            self.by_extension.insert(normalize_extension(ext), index);
        }
        debug!("Registered codec {} ({} extensions)", name, extensions.len());
    }

    /// Registered codec names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.codecs.iter().map(|c| c.name.as_str()).collect()
    }

    /// Find the first codec whose magic matches the start of `reader`
    ///
    /// A codec whose pattern is longer than the stream is skipped.
    pub fn sniff<R: Read>(&self, reader: &mut PeekReader<R>) -> Option<&str> {
        self.sniff_index(reader).map(|i| self.codecs[i].name.as_str())
    }

    fn sniff_index<R: Read>(&self, reader: &mut PeekReader<R>) -> Option<usize> {
        self.codecs.iter().position(|codec| match reader.peek(codec.magic.len()) {
            Ok(header) => matches_magic(&codec.magic, header),
            Err(_) => false,
        })
    }

    /// Name of the codec claiming the extension of `path`
    pub fn codec_for_path(&self, path: &Path) -> Option<&str> {
        self.index_for_path(path).map(|i| self.codecs[i].name.as_str())
    }

    fn index_for_path(&self, path: &Path) -> Option<usize> {
        let ext = match path.extension() {
            Some(ext) => ext.to_string_lossy().into_owned(),
            None => path.to_string_lossy().into_owned(),
        };
        self.by_extension.get(&normalize_extension(&ext)).copied()
    }

    /// Decode a file chosen by its extension
    ///
    /// Returns no songs, not an error, when no codec claims the extension.
    pub fn decode_by_extension(&self, path: &Path) -> Result<Vec<Box<dyn Song>>> {
        let Some(index) = self.index_for_path(path) else {
            return Ok(Vec::new());
        };
        let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase());
        (self.codecs[index].decode)(file_opener(path), ext.as_deref())
    }

    /// Open, sniff and decode a stream
    ///
    /// Returns the songs and the name of the codec that matched.
    pub fn decode(&self, opener: StreamOpener) -> Result<(Vec<Box<dyn Song>>, String)> {
        let stream = opener()?;
        let mut reader = PeekReader::new(stream);
        let index = self
            .sniff_index(&mut reader)
            .ok_or_else(|| Error::UnrecognizedFormat("no codec matched stream header".to_string()))?;
        drop(reader);

        let codec = &self.codecs[index];
        let songs = (codec.decode)(opener, None)?;
        Ok((songs, codec.name.clone()))
    }
}

/// Process-wide registry with the default codecs
pub fn default_registry() -> &'static CodecRegistry {
    static REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    REGISTRY.get_or_init(CodecRegistry::with_defaults)
}

/// Whether `header` matches `pattern` byte for byte, `?` matching anything
///
/// Slices of different length never match.
pub fn matches_magic(pattern: &[u8], header: &[u8]) -> bool {
    pattern.len() == header.len()
        && pattern
            .iter()
            .zip(header)
            .all(|(p, h)| *p == MAGIC_WILDCARD || p == h)
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// Opener reading a local file
pub fn file_opener(path: &Path) -> StreamOpener {
    let path = path.to_path_buf();
    Arc::new(move || {
        let file = std::fs::File::open(&path)?;
        Ok(Box::new(file) as Box<dyn MediaSource>)
    })
}

/// Reader that can look ahead without consuming
///
/// Peeked bytes are replayed by subsequent reads.
pub struct PeekReader<R> {
    inner: R,
    buffered: Vec<u8>,
    pos: usize,
}

impl<R: Read> PeekReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffered: Vec::new(),
            pos: 0,
        }
    }

    /// Return the next `n` bytes without consuming them
    ///
    /// Fails with `UnexpectedEof` if the stream holds fewer than `n` bytes.
    pub fn peek(&mut self, n: usize) -> std::io::Result<&[u8]> {
        while self.buffered.len() - self.pos < n {
            let mut chunk = [0u8; 512];
            let read = self.inner.read(&mut chunk)?;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("wanted {} bytes, stream ended", n),
                ));
            }
            self.buffered.extend_from_slice(&chunk[..read]);
        }
        Ok(&self.buffered[self.pos..self.pos + n])
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos < self.buffered.len() {
            let n = buf.len().min(self.buffered.len() - self.pos);
            buf[..n].copy_from_slice(&self.buffered[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(buf)
    }
}
