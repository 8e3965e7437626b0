use std::path::{Path, PathBuf};

/// Output locations derived from a layer's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPaths {
    pub layer_name: String,
    /// Filesystem-safe version of the layer name.
    pub stem: String,
    pub folder: PathBuf,
}

impl LayerPaths {
    pub fn new(folder: &Path, layer_name: &str) -> Self {
        Self {
            layer_name: layer_name.to_string(),
            stem: sanitize_layer_name(layer_name),
            folder: folder.to_path_buf(),
        }
    }

    /// `{folder}/{stem}.dataset`, holding only this layer's converted files.
    pub fn dataset_dir(&self) -> PathBuf {
        self.folder.join(format!("{}.dataset", self.stem))
    }

    /// `{folder}/{stem}.zip`
    pub fn archive(&self) -> PathBuf {
        self.folder.join(format!("{}.zip", self.stem))
    }
}

/// Windows-safe file stem for a layer name.
pub fn sanitize_layer_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    if compacted.is_empty() {
        compacted = "layer".to_string();
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{sanitize_layer_name, LayerPaths};

    #[test]
    fn separators_and_reserved_chars_are_replaced() {
        assert_eq!(sanitize_layer_name("Roads/Major: 2024?"), "Roads_Major_ 2024");
    }

    #[test]
    fn empty_names_fall_back() {
        assert_eq!(sanitize_layer_name(" ./ "), "layer");
    }

    #[test]
    fn reserved_device_names_are_patched() {
        assert_eq!(sanitize_layer_name("aux"), "aux_");
    }

    #[test]
    fn archive_path_uses_stem() {
        let paths = LayerPaths::new(Path::new("output"), "Tax Parcels");
        assert_eq!(paths.archive(), Path::new("output").join("Tax Parcels.zip"));
        assert_eq!(
            paths.dataset_dir(),
            Path::new("output").join("Tax Parcels.dataset")
        );
    }
}
