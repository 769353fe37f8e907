/*!
A case-folded file-extension → MIME type table, used by the web server (G)
to answer `Content-Type` for served documents and virtual-directory
entries. Unknown extensions map to `application/octet-stream`.
*/

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const TABLE: &[(&str, &str)] = &[
    ("aif", "audio/aiff"),
    ("aifc", "audio/aiff"),
    ("aiff", "audio/aiff"),
    ("asf", "video/x-ms-asf"),
    ("asx", "video/x-ms-asf"),
    ("au", "audio/basic"),
    ("avi", "video/msvideo"),
    ("bin", "application/octet-stream"),
    ("bmp", "image/bmp"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("dcr", "application/x-director"),
    ("dib", "image/bmp"),
    ("dir", "application/x-director"),
    ("dxr", "application/x-director"),
    ("flac", "audio/flac"),
    ("gif", "image/gif"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ico", "image/x-icon"),
    ("jfif", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("m3u", "audio/mpegurl"),
    ("m4a", "audio/mp4"),
    ("mid", "audio/midi"),
    ("midi", "audio/midi"),
    ("mov", "video/quicktime"),
    ("mp2", "audio/mpeg"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("mpa", "audio/mpeg"),
    ("mpe", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    ("ogg", "audio/ogg"),
    ("ogv", "video/ogg"),
    ("pdf", "application/pdf"),
    ("pls", "audio/x-scpls"),
    ("png", "image/png"),
    ("pnm", "image/x-portable-anymap"),
    ("qt", "video/quicktime"),
    ("ra", "audio/x-pn-realaudio"),
    ("ram", "audio/x-pn-realaudio"),
    ("rmi", "audio/mid"),
    ("rtf", "application/rtf"),
    ("svg", "image/svg+xml"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("txt", "text/plain"),
    ("wav", "audio/wav"),
    ("wax", "audio/x-ms-wax"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("wm", "video/x-ms-wm"),
    ("wma", "audio/x-ms-wma"),
    ("wmv", "video/x-ms-wmv"),
    ("xbm", "image/x-xbitmap"),
    ("xml", "text/xml"),
    ("xpm", "image/x-xpixmap"),
    ("xwd", "image/x-xwindowdump"),
    ("zip", "application/zip"),
];

/// Look up the MIME type for a file extension (without the leading `.`),
/// case-insensitively.
pub fn for_extension(extension: &str) -> &'static str {
    let lower = extension.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(ext, _)| *ext == lower)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Look up the MIME type for a path by its extension.
pub fn for_path(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some(ext) if ext != path => for_extension(ext),
        _ => DEFAULT_MIME_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extension_case_insensitive() {
        assert_eq!(for_extension("HTML"), "text/html");
        assert_eq!(for_extension("html"), "text/html");
    }

    #[test]
    fn unknown_extension_falls_back() {
        assert_eq!(for_extension("zzz"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn path_extension_lookup() {
        assert_eq!(for_path("/a/b/description.xml"), "text/xml");
        assert_eq!(for_path("/a/b/noext"), DEFAULT_MIME_TYPE);
    }
}
