// SPDX-License-Identifier: MIT OR Apache-2.0

//! Global scan defaults: binary extension gates, the binary sniff, and the
//! baseline ignore patterns applied before any profile rules.

use std::fs::File;
use std::io::Read;
use std::path::Path;

const KNOWN_BINARY_EXTS: &[&str] = &[
    ".zip", ".gz", ".bz2", ".xz", ".7z", ".rar", ".tar", ".tgz", ".png", ".jpg", ".jpeg", ".webp",
    ".gif", ".ico", ".bmp", ".tiff", ".psd", ".ai", ".mp4", ".mov", ".mkv", ".webm", ".avi",
    ".mp3", ".wav", ".flac", ".ogg", ".woff", ".woff2", ".ttf", ".otf", ".eot", ".pdf", ".doc",
    ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".wasm", ".exe", ".dll", ".so", ".dylib", ".class",
    ".jar", ".bin", ".dat",
];

const KNOWN_BINARY_SUFFIXES: &[&str] = &[".tar.gz", ".tar.bz2", ".tar.xz"];

/// Returns the default scan ignores applied before profile rules.
pub fn global_scan_ignore(has_package_json: bool) -> Vec<String> {
    let mut patterns = vec![
        "**/*.svg".to_string(),
        ".git/".to_string(),
        ".repodex/".to_string(),
    ];
    if has_package_json {
        patterns.push("package-lock.json".to_string());
    }
    patterns
}

/// Reports whether the lowercased path matches a known binary extension or
/// compound suffix.
pub fn is_known_binary_ext(lower_path: &str) -> bool {
    if KNOWN_BINARY_SUFFIXES
        .iter()
        .any(|suffix| lower_path.ends_with(suffix))
    {
        return true;
    }
    let base = lower_path.rsplit('/').next().unwrap_or(lower_path);
    match base.rfind('.') {
        Some(idx) => KNOWN_BINARY_EXTS.contains(&&base[idx..]),
        None => false,
    }
}

/// Performs a simple binary check over the first `sample_size` bytes:
/// a NUL byte or invalid UTF-8 marks the file binary.
pub fn is_binary_sniff(path: &Path, sample_size: usize) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; sample_size];
    let mut filled = 0;
    while filled < buf.len() {
        let read = file.read(&mut buf[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    buf.truncate(filled);

    if buf.contains(&0) {
        return Ok(true);
    }
    Ok(std::str::from_utf8(&buf).is_err())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_suffixes_and_plain_extensions_match() {
        assert!(is_known_binary_ext("dist/bundle.tar.gz"));
        assert!(is_known_binary_ext("logo.png"));
        assert!(is_known_binary_ext("lib/native.so"));
        assert!(!is_known_binary_ext("src/main.ts"));
        assert!(!is_known_binary_ext("makefile"));
    }

    #[test]
    fn sniff_flags_nul_bytes() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let binary = dir.path().join("blob");
        std::fs::write(&binary, b"abc\0def").expect("write");
        assert!(is_binary_sniff(&binary, 4096).expect("sniff"));

        let text = dir.path().join("text.ts");
        std::fs::write(&text, "const a = 1;\n").expect("write");
        assert!(!is_binary_sniff(&text, 4096).expect("sniff"));
    }

    #[test]
    fn sniff_flags_invalid_utf8() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [0xffu8, 0xfe, 0x41]).expect("write");
        assert!(is_binary_sniff(&path, 4096).expect("sniff"));
    }
}
