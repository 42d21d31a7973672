//! Utility functions for naming, format inference and path manipulation
//!
//! Everything here is pure and total: malformed input yields `None` or a
//! fallback, never an error. Nothing touches the filesystem.

use crate::types::ImageCandidate;
use std::path::{Path, PathBuf};

/// Folder name used when a page title sanitizes to nothing
pub const FALLBACK_FOLDER: &str = "download";

/// Format assumed when neither the candidate nor its URL names one
pub const FALLBACK_FORMAT: &str = "jpg";

/// Largest number shown on a tab badge
const BADGE_MAX: usize = 99;

/// Characters that are not allowed in a folder name
fn is_illegal_path_char(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Turn a page title into a folder name that is safe to use as a path segment.
///
/// The title is trimmed, every run of illegal path characters becomes a single
/// `_`, and every run of whitespace becomes a single space. An empty result
/// falls back to `"download"`.
///
/// # Examples
///
/// ```
/// use image_batch_dl::utils::sanitize_folder_name;
///
/// assert_eq!(sanitize_folder_name("  Cats: <best>  of\t2024 "), "Cats_ _best_ of 2024");
/// assert_eq!(sanitize_folder_name("   "), "download");
/// ```
pub fn sanitize_folder_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut chars = name.trim().chars().peekable();

    while let Some(c) = chars.next() {
        if is_illegal_path_char(c) {
            while chars.peek().is_some_and(|&next| is_illegal_path_char(next)) {
                chars.next();
            }
            cleaned.push('_');
        } else if c.is_whitespace() {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            cleaned.push(' ');
        } else {
            cleaned.push(c);
        }
    }

    if cleaned.is_empty() {
        FALLBACK_FOLDER.to_string()
    } else {
        cleaned
    }
}

/// Last path segment of a URL, still percent-encoded
fn last_path_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    Some(segment.to_string())
}

/// Guess an image format from the extension of a URL's path.
///
/// Returns the lowercase extension with `jpeg` normalized to `jpg`, or `None`
/// when the URL does not parse or its last path segment has no extension.
///
/// # Examples
///
/// ```
/// use image_batch_dl::utils::guess_format;
///
/// assert_eq!(guess_format("https://x.com/img.JPEG").as_deref(), Some("jpg"));
/// assert_eq!(guess_format("https://x.com/noext"), None);
/// assert_eq!(guess_format("not a url"), None);
/// ```
pub fn guess_format(url: &str) -> Option<String> {
    let segment = last_path_segment(url)?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    let ext = ext.to_lowercase();
    if ext == "jpeg" {
        Some("jpg".to_string())
    } else {
        Some(ext)
    }
}

/// Extract a percent-decoded filename from a URL.
///
/// Only a last path segment containing a `.` counts as a filename. Segments that
/// do not decode to valid UTF-8 yield `None`.
pub fn extract_file_name(url: &str) -> Option<String> {
    let segment = last_path_segment(url)?;
    if segment.is_empty() || !segment.contains('.') {
        return None;
    }
    urlencoding::decode(&segment)
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Synthesize a fallback filename: `img_<index:04>.<format>`.
///
/// The suffix is omitted when `format` is absent or empty.
pub fn build_indexed_name(index: usize, format: Option<&str>) -> String {
    match format {
        Some(format) if !format.is_empty() => format!("img_{index:04}.{format}"),
        _ => format!("img_{index:04}"),
    }
}

/// Make sure `filename` ends with `.<format>`.
///
/// A filename whose extension already matches case-insensitively is returned
/// unchanged (so `photo.PNG` stays `photo.PNG` for `png`). Otherwise the last
/// extension, if any, is replaced.
pub fn ensure_extension(filename: &str, format: &str) -> String {
    if format.is_empty() {
        return filename.to_string();
    }
    let wanted = format!(".{}", format.to_lowercase());
    if filename.to_lowercase().ends_with(&wanted) {
        return filename.to_string();
    }

    let base = match filename.rfind('.') {
        Some(dot) if !filename[dot + 1..].is_empty() && !filename[dot + 1..].contains('/') => {
            &filename[..dot]
        }
        _ => filename,
    };
    format!("{base}.{format}")
}

/// Resolve the output filename for a task.
///
/// Uses the candidate URL's own filename when it has one (with the extension
/// fixed up for `format`), otherwise the indexed fallback name.
///
/// # Examples
///
/// ```
/// use image_batch_dl::types::{ImageCandidate, SourceType};
/// use image_batch_dl::utils::build_filename;
///
/// let named = ImageCandidate::new(
///     "https://x.com/a/photo.PNG?x=1",
///     "https://x.com/a/photo.PNG?x=1",
///     None,
///     None,
///     SourceType::Img,
/// );
/// assert_eq!(build_filename(&named, 1, "png"), "photo.PNG");
/// assert_eq!(build_filename(&named, 1, "jpg"), "photo.jpg");
///
/// let bare = ImageCandidate::new("https://x.com/", "https://x.com/", None, None, SourceType::Img);
/// assert_eq!(build_filename(&bare, 3, "jpg"), "img_0003.jpg");
/// ```
pub fn build_filename(candidate: &ImageCandidate, index: usize, format: &str) -> String {
    match extract_file_name(&candidate.best_url) {
        Some(name) => ensure_extension(&name, format),
        None => build_indexed_name(index, Some(format)),
    }
}

/// Map a format tag to a MIME content type.
///
/// # Examples
///
/// ```
/// use image_batch_dl::utils::format_to_mime;
///
/// assert_eq!(format_to_mime("jpg"), "image/jpeg");
/// assert_eq!(format_to_mime("bmp"), "application/octet-stream");
/// ```
pub fn format_to_mime(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Tab badge text for a scan result: the count capped at 99, empty for zero.
pub fn badge_text(count: usize) -> String {
    if count == 0 {
        String::new()
    } else {
        count.min(BADGE_MAX).to_string()
    }
}

/// Score of a responsive descriptor: `Nw` scores N, `Nx` scores N×1000.
fn srcset_score(descriptor: &str) -> f64 {
    if let Some(width) = descriptor.strip_suffix('w') {
        width.parse().unwrap_or(0.0)
    } else if let Some(density) = descriptor.strip_suffix('x') {
        density.parse::<f64>().unwrap_or(0.0) * 1000.0
    } else {
        0.0
    }
}

/// Pick the highest-resolution URL from a `srcset` attribute value.
///
/// Ties go to the later entry. Entries without a descriptor score zero.
///
/// # Examples
///
/// ```
/// use image_batch_dl::utils::pick_best_from_srcset;
///
/// let best = pick_best_from_srcset("a.jpg 320w, b.jpg 1280w, c.jpg 640w");
/// assert_eq!(best.as_deref(), Some("b.jpg"));
/// ```
pub fn pick_best_from_srcset(srcset: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    let mut best_score = 0.0;

    for part in srcset.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut fields = part.split_whitespace();
        let Some(url) = fields.next() else {
            continue;
        };
        let score = fields.next().map(srcset_score).unwrap_or(0.0);
        if best.is_none() {
            best = Some(url);
        }
        if score >= best_score {
            best_score = score;
            best = Some(url);
        }
    }

    best.map(str::to_string)
}

/// The `n`-th collision alternative for `path`
///
/// `0` is the path itself; `n > 0` gives `name (n).ext` next to it (or
/// `name (n)` without an extension). Returns `None` when the file name is not
/// valid UTF-8.
///
/// # Examples
///
/// ```
/// use image_batch_dl::utils::numbered_path;
/// use std::path::{Path, PathBuf};
///
/// let path = Path::new("Gallery/a.png");
/// assert_eq!(numbered_path(path, 0), Some(PathBuf::from("Gallery/a.png")));
/// assert_eq!(numbered_path(path, 2), Some(PathBuf::from("Gallery/a (2).png")));
/// ```
pub fn numbered_path(path: &Path, n: u32) -> Option<PathBuf> {
    if n == 0 {
        return Some(path.to_path_buf());
    }

    let stem = path.file_stem()?.to_str()?;
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_str()?),
        None => format!("{} ({})", stem, n),
    };
    Some(path.with_file_name(name))
}
