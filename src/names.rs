//! Mapping between raw entry names and filesystem paths.
//!
//! The table codecs treat names as opaque bytes.  Only code that touches the
//! filesystem needs a text encoding: NScripter archives are Shift-JIS with `\`
//! as the directory separator.  Names that would resolve outside the
//! extraction root are rejected.

use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use std::path::{Component, Path, PathBuf};

use crate::error::{lossy, Result, SarError};

pub const NAME_SEPARATOR: char = '\\';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameEncoding {
    #[default]
    ShiftJis,
    Utf8,
}

impl NameEncoding {
    pub fn encoding(self) -> &'static Encoding {
        match self {
            NameEncoding::ShiftJis => SHIFT_JIS,
            NameEncoding::Utf8     => UTF_8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NameEncoding::ShiftJis => "shift_jis",
            NameEncoding::Utf8     => "utf-8",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "shift-jis" | "sjis" | "cp932" => Some(NameEncoding::ShiftJis),
            "utf-8" | "utf8"               => Some(NameEncoding::Utf8),
            _                              => None,
        }
    }
}

/// Decode a name strictly; malformed sequences are an error.
pub fn decode_name(name: &[u8], encoding: NameEncoding) -> Result<String> {
    let (text, had_errors) = encoding.encoding().decode_without_bom_handling(name);
    if had_errors {
        return Err(SarError::NameEncoding { name: lossy(name), encoding: encoding.name() });
    }
    Ok(text.into_owned())
}

/// Decode a name for display, replacing malformed sequences.
pub fn display_name(name: &[u8], encoding: NameEncoding) -> String {
    encoding.encoding().decode_without_bom_handling(name).0.into_owned()
}

/// Relative path an entry extracts to.  Both `\` and `/` separate components.
pub fn name_to_path(name: &[u8], encoding: NameEncoding) -> Result<PathBuf> {
    let text   = decode_name(name, encoding)?;
    let unsafe_path = || SarError::UnsafePath { name: text.clone() };

    if text.starts_with(['\\', '/']) {
        return Err(unsafe_path());
    }

    let mut path = PathBuf::new();
    for part in text.split(['\\', '/']) {
        match part {
            "" | "."                => continue,
            ".."                    => return Err(unsafe_path()),
            p if p.contains(':')    => return Err(unsafe_path()),
            p                       => path.push(p),
        }
    }
    if path.as_os_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(path)
}

/// Entry name for a relative path, components joined with `\`.
pub fn path_to_name(path: &Path, encoding: NameEncoding) -> Result<Vec<u8>> {
    let shown = path.display().to_string();
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(os) => {
                let part = os.to_str().ok_or_else(|| SarError::NameEncoding {
                    name:     shown.clone(),
                    encoding: encoding.name(),
                })?;
                parts.push(part);
            }
            Component::CurDir => continue,
            _ => return Err(SarError::UnsafePath { name: shown }),
        }
    }
    if parts.is_empty() {
        return Err(SarError::UnsafePath { name: shown });
    }

    let joined = parts.join(&NAME_SEPARATOR.to_string());
    let (bytes, _, had_errors) = encoding.encoding().encode(&joined);
    if had_errors {
        return Err(SarError::NameEncoding { name: joined, encoding: encoding.name() });
    }
    Ok(bytes.into_owned())
}
