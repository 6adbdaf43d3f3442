/// Returns true if the name only uses characters safe on every filesystem.
pub fn is_safe_stem(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Canonicalize an uploaded file name into a filesystem-safe `stem.ext`.
///
/// Unsafe stems are slugged and suffixed with a short hash so two different
/// originals cannot collapse onto the same name. The extension is lowercased.
pub fn safe_upload_name(name: &str) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext.to_ascii_lowercase())),
        _ => (name, None),
    };

    let stem = if is_safe_stem(stem) {
        stem.to_string()
    } else {
        let mut slug = String::with_capacity(stem.len());
        let mut last_was_underscore = false;
        for ch in stem.chars() {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                last_was_underscore = false;
                slug.push(ch);
            } else if !last_was_underscore {
                last_was_underscore = true;
                slug.push('_');
            }
        }
        let slug = slug.trim_matches('_');
        let slug = if slug.is_empty() { "video" } else { slug };
        let hash = blake3::hash(stem.as_bytes()).to_hex();
        format!("{}_{}", slug, &hash[..8])
    };

    match ext {
        Some(ext) if is_safe_stem(&ext) => format!("{}.{}", stem, ext),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_upload_name_preserves_safe_names() {
        assert_eq!(safe_upload_name("lecture-01.mp4"), "lecture-01.mp4");
    }

    #[test]
    fn safe_upload_name_lowercases_extension() {
        assert_eq!(safe_upload_name("Demo.MP4"), "Demo.mp4");
    }

    #[test]
    fn safe_upload_name_hashes_unsafe_stems() {
        let safe = safe_upload_name("my holiday (final).mp4");
        assert!(safe.starts_with("my_holiday_final_"));
        assert!(safe.ends_with(".mp4"));
        let stem = safe.trim_end_matches(".mp4");
        assert!(is_safe_stem(stem));
    }

    #[test]
    fn safe_upload_name_handles_symbol_only_stem() {
        let safe = safe_upload_name("???.mp4");
        assert!(safe.starts_with("video_"));
    }
}
