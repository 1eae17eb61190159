use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::{fs::File, io::Read, path::Path};

const DIGEST_CHUNK_BYTES: usize = 4096;
const SHORT_HASH_LEN: usize = 10;

static BRACKETED_HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]").expect("valid regex"));
static BRACKETED_HASH_WITH_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[.*?\]").expect("valid regex"));
static FILE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^.]*$").expect("valid regex"));

/// Extracts the hash token the host embeds in checkpoint filenames, e.g.
/// `"model [abc1234567].safetensors"` yields `"abc1234567"`. Never touches disk.
pub fn embedded_hash(filename: &str) -> Option<&str> {
    BRACKETED_HASH
        .captures(filename)
        .and_then(|captures| captures.get(1))
        .map(|capture| capture.as_str())
}

/// Strips any bracketed hash (and the whitespace before it) from a model
/// filename, optionally removing the file extension too.
pub fn clean_model_name(filename: &str, strip_extension: bool) -> String {
    let cleaned = BRACKETED_HASH_WITH_SPACE.replace_all(filename, "");
    if strip_extension {
        FILE_EXTENSION.replace(&cleaned, "").into_owned()
    } else {
        cleaned.into_owned()
    }
}

/// Resolves the short stable identifier for a model file: the embedded
/// bracketed token when the filename carries one, otherwise the first
/// [`SHORT_HASH_LEN`] hex characters of the file's SHA-256 digest.
pub fn resolve(filename: &str) -> Result<String> {
    if let Some(hash) = embedded_hash(filename) {
        return Ok(hash.to_string());
    }
    let path = clean_model_name(filename, false);
    file_digest_short(Path::new(path.trim()))
}

fn file_digest_short(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; DIGEST_CHUNK_BYTES];

    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        hasher.update(&chunk[..read]);
    }

    let digest = format!("{:x}", hasher.finalize());
    Ok(digest[..SHORT_HASH_LEN].to_string())
}
