#![deny(warnings)]

// Extension-based MIME type lookup

use std::path::Path;

pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Guess a MIME type from the file extension (case-insensitive)
pub fn mimetype(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return mimetype_for_name(path),
    };

    match ext.as_str() {
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" | "cjs" => "application/javascript",
        "ts" => "application/typescript",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        "sh" => "application/x-sh",
        "py" => "text/x-python",
        "rs" => "text/rust",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        _ => DEFAULT_MIME,
    }
}

// Extensionless names that still have a well-known type
fn mimetype_for_name(path: &Path) -> &'static str {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(".gitignore") | Some(".gitattributes") | Some(".editorconfig") => "text/plain",
        Some("Makefile") | Some("Dockerfile") | Some("LICENSE") | Some("README") => "text/plain",
        _ => DEFAULT_MIME,
    }
}
