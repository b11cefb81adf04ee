//! Artist and title from an uploaded file name

/// Artist used when the file name has no `artist - title` separator
pub const UNKNOWN_ARTIST: &str = "unknown";

/// Split `"Artist - Title.mp3"` into `("Artist", "Title")`
///
/// The extension is dropped, the name is split on the first `-` and both
/// halves are trimmed. Without a separator the whole name is the title.
pub fn parse_track_file_name(file_name: &str) -> (String, String) {
    let stem = strip_extension(file_name.trim());

    let (artist, title) = match stem.split_once('-') {
        Some((artist, title)) => (artist.trim(), title.trim()),
        None => ("", stem.trim()),
    };

    let artist = if artist.is_empty() { UNKNOWN_ARTIST } else { artist };
    let title = if title.is_empty() { stem.trim() } else { title };

    (artist.to_string(), title.to_string())
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.bytes().all(|b| b.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => name,
    }
}
