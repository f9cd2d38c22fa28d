//! Codec registry: frozen 4-byte header tags + name lookup.
//!
//! # Identity rules
//! Every codec is identified by a 4-byte tag.  That tag is:
//!   - The first 4 bytes of every compressed file the codec produces.
//!   - The key used for header auto-detection when no codec is chosen.
//!
//! CLI names (`yaz`, `lzo`, `ucl`, `aplib`, `lz4`) are a user-facing alias
//! only.  They are never read from or written to any file.
//!
//! # Resolution policy
//! An explicit codec selection always wins — no header check is performed.
//! Without a selection, the first registered tag matching the leading 4
//! bytes wins.  If neither yields a codec, decoding fails hard with the
//! offending header bytes in the error; there is no fallback codec.

use thiserror::Error;

mod aplib;
mod lz4h;
mod lzo;
mod ucl;
mod yaz0;

pub use aplib::AplibCodec;
pub use lz4h::{decode_block, Lz4hCodec};
pub use lzo::LzoCodec;
pub use ucl::UclCodec;
pub use yaz0::Yaz0Codec;

// ── Frozen header tags ───────────────────────────────────────────────────────
//
// These values are permanent.  They appear as the leading 4 bytes of every
// compressed asset and are the sole basis for auto-detection.

pub const TAG_YAZ0:  [u8; 4] = *b"Yaz0";
pub const TAG_LZO:   [u8; 4] = *b"LZO0";
pub const TAG_UCL:   [u8; 4] = *b"UCL0";
pub const TAG_APLIB: [u8; 4] = *b"APL0";
pub const TAG_LZ4H:  [u8; 4] = *b"LZ4H";

// ── CodecId enum ─────────────────────────────────────────────────────────────

/// Runtime codec discriminant.  The discriminant value doubles as the index
/// into [`Registry`]'s codec table, so the declaration order is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    Yaz0,
    Lzo,
    Ucl,
    Aplib,
    Lz4h,
}

impl CodecId {
    /// Every codec, in registry order.  Auto-detection walks this list and
    /// the first tag match wins.
    pub const ALL: [CodecId; 5] = [
        CodecId::Yaz0,
        CodecId::Lzo,
        CodecId::Ucl,
        CodecId::Aplib,
        CodecId::Lz4h,
    ];

    /// Returns the frozen 4-byte header tag for this codec.
    #[inline]
    pub fn tag(self) -> [u8; 4] {
        match self {
            CodecId::Yaz0  => TAG_YAZ0,
            CodecId::Lzo   => TAG_LZO,
            CodecId::Ucl   => TAG_UCL,
            CodecId::Aplib => TAG_APLIB,
            CodecId::Lz4h  => TAG_LZ4H,
        }
    }

    /// Resolve a header tag to a CodecId.
    /// Returns `None` if the tag is not recognised.
    pub fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        Self::ALL.into_iter().find(|id| &id.tag() == tag)
    }

    /// CLI-facing name (never parsed from file data).
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Yaz0  => "yaz",
            CodecId::Lzo   => "lzo",
            CodecId::Ucl   => "ucl",
            CodecId::Aplib => "aplib",
            CodecId::Lz4h  => "lz4",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yaz"   => Some(CodecId::Yaz0),
            "lzo"   => Some(CodecId::Lzo),
            "ucl"   => Some(CodecId::Ucl),
            "aplib" => Some(CodecId::Aplib),
            "lz4"   => Some(CodecId::Lz4h),
            _       => None,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    /// No registered tag matched the leading bytes of the compressed region.
    /// Decoding MUST NOT continue.
    #[error("unknown encoding (header bytes {header})")]
    UnknownEncoding { header: String },
    /// A CLI codec name did not resolve.
    #[error("unknown codec name '{0}'")]
    UnknownName(String),
    /// The compressed stream ended before the declared data did.
    #[error("compressed stream truncated at input byte {at}")]
    Truncated { at: usize },
    /// A back-reference reached past the start of the current output region.
    #[error("back-reference distance {offset} exceeds {produced} byte(s) of history")]
    BadBackReference { offset: usize, produced: usize },
    /// A container block declared a size past the staging-buffer bound.
    #[error("declared block size {size} exceeds the {max}-byte staging bound")]
    BlockTooLarge { size: usize, max: usize },
    /// Decoded output would not fit the caller's destination region.
    #[error("decoded data would overflow the {capacity}-byte output region")]
    OutputOverflow { capacity: usize },
}

// ── Codec trait ──────────────────────────────────────────────────────────────

/// One decompression capability.
///
/// `decode` reads one whole compressed asset from `src` (header included) and
/// writes the decompressed bytes to the front of `dst`, returning the count
/// produced.  Implementations never write past `dst` and never read past
/// `src`; both conditions surface as [`CodecError`] values.  `&mut self`
/// because a codec may own staging state reused across calls.
pub trait Codec {
    fn id(&self) -> CodecId;
    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError>;
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// The capability set of every supported codec, owned by one decompression
/// operation.  Owning the set (rather than sharing process-wide state) keeps
/// each codec's staging buffers private to that operation, so independent
/// rom reconstructions can run concurrently.
pub struct Registry {
    /// Indexed by `CodecId` discriminant.
    codecs: [Box<dyn Codec>; 5],
}

impl Registry {
    pub fn new() -> Self {
        Self {
            codecs: [
                Box::new(Yaz0Codec),
                Box::new(LzoCodec),
                Box::new(UclCodec),
                Box::new(AplibCodec),
                Box::new(Lz4hCodec::new()),
            ],
        }
    }

    /// Look up a codec by id.  Infallible — every id is registered.
    pub fn get(&mut self, id: CodecId) -> &mut dyn Codec {
        &mut *self.codecs[id as usize]
    }

    /// Match the leading 4 bytes of a compressed region against every
    /// registered tag.  First match wins.
    pub fn detect(src: &[u8]) -> Option<CodecId> {
        let tag: &[u8; 4] = src.get(..4)?.try_into().ok()?;
        CodecId::from_tag(tag)
    }

    /// Resolution policy of the module docs: explicit `choice` wins
    /// unconditionally, then header detection, then a hard failure naming
    /// the unmatched header bytes.
    pub fn resolve(
        &mut self,
        choice: Option<CodecId>,
        src: &[u8],
    ) -> Result<&mut dyn Codec, CodecError> {
        if let Some(id) = choice {
            return Ok(self.get(id));
        }
        match Self::detect(src) {
            Some(id) => Ok(self.get(id)),
            None => Err(CodecError::UnknownEncoding {
                header: hex::encode(src.get(..4).unwrap_or(src)),
            }),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
