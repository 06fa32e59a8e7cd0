//! Effective MIME type resolution.
//!
//! Order of trust: byte signature, then file extension, then (optionally)
//! the client-declared content type. Declared types are attacker-controlled
//! and only consulted when nothing else identifies the file.

use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Coarse class that decides which block variant a file becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Audio,
    Video,
    Document,
    Binary,
}

impl MediaClass {
    pub fn of(mime: &str) -> Self {
        if mime.starts_with("image/") {
            MediaClass::Image
        } else if mime.starts_with("audio/") {
            MediaClass::Audio
        } else if mime.starts_with("video/") {
            MediaClass::Video
        } else if mime.starts_with("text/") || DOCUMENT_TYPES.contains(&mime) {
            MediaClass::Document
        } else {
            MediaClass::Binary
        }
    }
}

const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/rtf",
    "application/json",
    "application/xml",
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("rtf", "application/rtf"),
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("flac", "audio/flac"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("zip", "application/zip"),
];

/// Extensions the extraction collaborator accepts.
const EXTRACTABLE: &[&str] = &[
    "txt", "text", "md", "pdf", "docx", "doc", "rtf", "html", "htm", "csv", "json", "xml",
];

/// Resolve the effective MIME type of an upload.
pub fn detect(filename: &str, bytes: &[u8], declared: Option<&str>) -> String {
    let by_ext = from_extension(filename);

    if let Some(sniffed) = sniff(bytes) {
        // OOXML files are zip archives; the extension says which kind.
        if sniffed == "application/zip" {
            if let Some(ext_mime) = by_ext.filter(|m| m.starts_with("application/vnd.openxml")) {
                return ext_mime.to_owned();
            }
        }
        return sniffed.to_owned();
    }

    if let Some(ext_mime) = by_ext {
        return ext_mime.to_owned();
    }

    declared
        .and_then(normalize_declared)
        .unwrap_or_else(|| OCTET_STREAM.to_owned())
}

/// Identify a file by its leading bytes.
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    let starts = |sig: &[u8]| bytes.starts_with(sig);

    // Unicode BOMs mark text; the extension decides what kind.
    if starts(b"\xEF\xBB\xBF") || starts(b"\xFF\xFE") || starts(b"\xFE\xFF") {
        return None;
    }

    if starts(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if starts(b"\xFF\xD8\xFF") {
        return Some("image/jpeg");
    }
    if starts(b"GIF87a") || starts(b"GIF89a") {
        return Some("image/gif");
    }
    if starts(b"BM") && bytes.len() >= 14 {
        return Some("image/bmp");
    }
    if starts(b"%PDF-") {
        return Some("application/pdf");
    }
    if starts(b"{\\rtf") {
        return Some("application/rtf");
    }
    if starts(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1") {
        return Some("application/msword");
    }
    if starts(b"PK\x03\x04") {
        return Some("application/zip");
    }
    if starts(b"OggS") {
        return Some("audio/ogg");
    }
    if starts(b"fLaC") {
        return Some("audio/flac");
    }
    if starts(b"ID3") || is_mpeg_frame(bytes) {
        return Some("audio/mpeg");
    }
    if starts(b"\x1A\x45\xDF\xA3") {
        return Some("video/webm");
    }
    if bytes.len() >= 12 && starts(b"RIFF") {
        match &bytes[8..12] {
            b"WEBP" => return Some("image/webp"),
            b"WAVE" => return Some("audio/wav"),
            b"AVI " => return Some("video/x-msvideo"),
            _ => {}
        }
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some(match &bytes[8..12] {
            b"qt  " => "video/quicktime",
            b"M4A " => "audio/mp4",
            _ => "video/mp4",
        });
    }
    None
}

/// A plausible MPEG audio frame header: sync bits, then a defined
/// version and layer, a usable bitrate index and a defined sample rate.
fn is_mpeg_frame(bytes: &[u8]) -> bool {
    let [b0, b1, b2, ..] = *bytes else {
        return false;
    };
    let version = (b1 >> 3) & 0b11;
    let layer = (b1 >> 1) & 0b11;
    let bitrate = b2 >> 4;
    let sample_rate = (b2 >> 2) & 0b11;
    b0 == 0xFF
        && b1 & 0xE0 == 0xE0
        && version != 0b01
        && layer != 0b00
        && bitrate != 0b0000
        && bitrate != 0b1111
        && sample_rate != 0b11
}

pub fn from_extension(filename: &str) -> Option<&'static str> {
    let ext = extension(filename)?;
    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Whether the extraction collaborator understands this file.
pub fn is_extractable(filename: &str, mime: &str) -> bool {
    if let Some(ext) = extension(filename) {
        if EXTRACTABLE.contains(&ext.as_str()) {
            return true;
        }
    }
    EXTENSIONS
        .iter()
        .any(|(ext, m)| *m == mime && EXTRACTABLE.contains(ext))
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// `Text/Plain; charset=utf-8` → `text/plain`. Garbage → `None`.
fn normalize_declared(declared: &str) -> Option<String> {
    let essence = declared.split(';').next()?.trim().to_ascii_lowercase();
    let (top, sub) = essence.split_once('/')?;
    let valid = |s: &str| {
        !s.is_empty()
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"+-.".contains(&b))
    };
    (valid(top) && valid(sub)).then_some(essence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_table_covers_common_types() {
        assert_eq!(from_extension("document.pdf"), Some("application/pdf"));
        assert_eq!(from_extension("photo.PNG"), Some("image/png"));
        assert_eq!(from_extension("photo.jpg"), Some("image/jpeg"));
        assert_eq!(from_extension("file.txt"), Some("text/plain"));
        assert_eq!(from_extension("file.md"), Some("text/markdown"));
        assert_eq!(from_extension("noext"), None);
    }

    #[test]
    fn signature_beats_extension_and_declared() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert_eq!(detect("notes.txt", png, Some("text/plain")), "image/png");
    }

    #[test]
    fn extension_beats_declared() {
        assert_eq!(detect("readme.md", b"# hi", Some("image/png")), "text/markdown");
    }

    #[test]
    fn declared_is_last_resort_and_normalized() {
        assert_eq!(
            detect("blob", b"\x00\x01", Some("Application/X-Custom; charset=binary")),
            "application/x-custom"
        );
        assert_eq!(detect("blob", b"\x00\x01", Some("not a mime")), OCTET_STREAM);
        assert_eq!(detect("blob", b"\x00\x01", None), OCTET_STREAM);
    }

    #[test]
    fn ooxml_zip_uses_extension() {
        let zip = b"PK\x03\x04rest-of-archive";
        assert_eq!(
            detect("report.docx", zip, None),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(detect("bundle.zip", zip, None), "application/zip");
    }

    #[test]
    fn byte_order_marks_are_not_audio() {
        let utf16le = b"\xFF\xFEh\0i\0";
        assert_eq!(sniff(utf16le), None);
        assert_eq!(detect("notes.txt", utf16le, Some("text/plain")), "text/plain");
        assert_eq!(MediaClass::of(&detect("notes.txt", utf16le, None)), MediaClass::Document);
        assert_eq!(detect("notes.txt", b"\xFE\xFF\0h\0i", None), "text/plain");
        assert_eq!(detect("notes.md", b"\xEF\xBB\xBF# hi", None), "text/markdown");
    }

    #[test]
    fn mpeg_frames_need_a_valid_header() {
        // MPEG-1 Layer III, 128 kbit/s, 44.1 kHz.
        assert_eq!(sniff(b"\xFF\xFB\x90\x64"), Some("audio/mpeg"));
        assert_eq!(sniff(b"\xFF\xFB\xF0\x64"), None, "bad bitrate index");
        assert_eq!(sniff(b"\xFF\xF9\x90\x64"), None, "reserved layer");
        assert_eq!(sniff(b"\xFF\xEB\x90\x64"), None, "reserved version");
        assert_eq!(sniff(b"\xFF\xFB"), None, "truncated header");
    }

    #[test]
    fn riff_containers_are_told_apart() {
        assert_eq!(sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff(b"RIFF\0\0\0\0WAVEfmt "), Some("audio/wav"));
        assert_eq!(sniff(b"RIFF\0\0\0\0AVI LIST"), Some("video/x-msvideo"));
    }

    #[test]
    fn classes() {
        assert_eq!(MediaClass::of("image/png"), MediaClass::Image);
        assert_eq!(MediaClass::of("audio/mpeg"), MediaClass::Audio);
        assert_eq!(MediaClass::of("video/mp4"), MediaClass::Video);
        assert_eq!(MediaClass::of("application/pdf"), MediaClass::Document);
        assert_eq!(MediaClass::of("application/msword"), MediaClass::Document);
        assert_eq!(MediaClass::of("text/csv"), MediaClass::Document);
        assert_eq!(MediaClass::of("application/zip"), MediaClass::Binary);
        assert_eq!(MediaClass::of(OCTET_STREAM), MediaClass::Binary);
    }

    #[test]
    fn extractable_by_extension_or_mime() {
        assert!(is_extractable("a.pdf", "application/pdf"));
        assert!(is_extractable("scan", "application/pdf"));
        assert!(!is_extractable("sheet.xlsx", "application/vnd.ms-excel"));
    }
}
