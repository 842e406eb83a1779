use crate::error::{EngineError, Result};
use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Declared text encoding of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl Encoding {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decode raw bytes into text. A leading byte-order mark is dropped.
    pub fn decode(self, bytes: &[u8]) -> std::result::Result<String, String> {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).map_err(|e| {
                    format!("invalid utf-8 at byte {}", e.utf8_error().valid_up_to())
                })
            }
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Utf16Le | Self::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(format!("odd byte length {} for utf-16", bytes.len()));
                }
                let units = bytes.chunks_exact(2).map(|pair| {
                    if self == Self::Utf16Le {
                        u16::from_le_bytes([pair[0], pair[1]])
                    } else {
                        u16::from_be_bytes([pair[0], pair[1]])
                    }
                });
                let mut out = String::with_capacity(bytes.len() / 2);
                for (idx, unit) in char::decode_utf16(units).enumerate() {
                    match unit {
                        Ok('\u{FEFF}') if idx == 0 => {}
                        Ok(ch) => out.push(ch),
                        Err(e) => {
                            return Err(format!(
                                "unpaired surrogate {:#06x} at unit {idx}",
                                e.unpaired_surrogate()
                            ))
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}

/// One input file, produced by the upstream scanner and read-only here
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
    pub bytes: Vec<u8>,
    pub encoding: Encoding,
}

impl SourceFile {
    pub fn new(
        path: impl Into<PathBuf>,
        language: Language,
        bytes: impl Into<Vec<u8>>,
        encoding: Encoding,
    ) -> Self {
        Self {
            path: path.into(),
            language,
            bytes: bytes.into(),
            encoding,
        }
    }

    /// UTF-8 text with the language taken from the path
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = path.into();
        let language = Language::from_path(&path);
        Self::new(path, language, text.into().into_bytes(), Encoding::Utf8)
    }

    /// Read a file from disk
    pub fn read(path: impl AsRef<Path>, language: Language, encoding: Encoding) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self::new(path, language, bytes, encoding))
    }

    /// Display form of the path
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Decode the text per the declared encoding
    pub fn decode(&self) -> Result<String> {
        self.encoding
            .decode(&self.bytes)
            .map_err(|reason| EngineError::encoding(self.display_path(), self.encoding.as_str(), reason))
    }
}
