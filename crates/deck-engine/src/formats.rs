//! Supported-format capability table.
//!
//! Collaborators (file browsers, the UI) query this list to filter candidate
//! files instead of duplicating it. Membership is an extension filter only;
//! whether the codec actually decodes is decided when the file is probed.

use std::path::Path;

/// Mutable list of supported audio file extensions, matched case-insensitively.
#[derive(Clone, Debug)]
pub struct SupportedFormats {
    extensions: Vec<String>,
}

impl Default for SupportedFormats {
    fn default() -> Self {
        Self {
            extensions: ["mp3", "wav", "m4a", "flac", "wma"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl SupportedFormats {
    /// Current extension list, lowercase and without the leading dot.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether `path` carries a supported extension.
    pub fn supports_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.supports_extension(e))
            .unwrap_or(false)
    }

    /// Whether `ext` (with or without a leading dot, any case) is supported.
    pub fn supports_extension(&self, ext: &str) -> bool {
        let ext = normalize(ext);
        self.extensions.iter().any(|e| *e == ext)
    }

    /// Add an extension to the table; duplicates are ignored.
    pub fn insert(&mut self, ext: &str) {
        let ext = normalize(ext);
        if !ext.is_empty() && !self.extensions.contains(&ext) {
            self.extensions.push(ext);
        }
    }

    /// Remove an extension from the table; returns whether it was present.
    pub fn remove(&mut self, ext: &str) -> bool {
        let ext = normalize(ext);
        let before = self.extensions.len();
        self.extensions.retain(|e| *e != ext);
        self.extensions.len() != before
    }
}

fn normalize(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_table_matches_known_extensions() {
        let formats = SupportedFormats::default();
        for ext in ["mp3", "wav", "m4a", "flac", "wma"] {
            assert!(formats.supports_extension(ext), "{ext} should be supported");
        }
        assert!(!formats.supports_extension("ogg"));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let formats = SupportedFormats::default();
        assert!(formats.supports_path(&PathBuf::from("/music/track.MP3")));
        assert!(formats.supports_path(&PathBuf::from("track.FlAc")));
        assert!(!formats.supports_path(&PathBuf::from("notes.txt")));
        assert!(!formats.supports_path(&PathBuf::from("no-extension")));
    }

    #[test]
    fn supports_extension_accepts_leading_dot() {
        let formats = SupportedFormats::default();
        assert!(formats.supports_extension(".wav"));
    }

    #[test]
    fn insert_and_remove_mutate_the_table() {
        let mut formats = SupportedFormats::default();
        formats.insert(".OGG");
        assert!(formats.supports_extension("ogg"));
        formats.insert("ogg"); // duplicate, ignored
        assert_eq!(
            formats.extensions().iter().filter(|e| *e == "ogg").count(),
            1
        );

        assert!(formats.remove("ogg"));
        assert!(!formats.supports_extension("ogg"));
        assert!(!formats.remove("ogg"));
    }
}
