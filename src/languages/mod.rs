use std::collections::HashMap;
use std::path::Path;

pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// A language id as the analysis protocol names it, with its file extensions.
pub struct LanguageSpec {
    pub id: &'static str,
    pub extensions: &'static [&'static str],
    /// Source languages get navigation annotations when rendered
    pub is_source: bool,
}

const LANGUAGES: &[LanguageSpec] = &[
    LanguageSpec {
        id: "typescript",
        extensions: &["ts", "tsx", "mts", "cts"],
        is_source: true,
    },
    LanguageSpec {
        id: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
        is_source: true,
    },
    LanguageSpec {
        id: "python",
        extensions: &["py", "pyi"],
        is_source: true,
    },
    LanguageSpec {
        id: "rust",
        extensions: &["rs"],
        is_source: true,
    },
    LanguageSpec {
        id: "json",
        extensions: &["json"],
        is_source: false,
    },
    LanguageSpec {
        id: "markdown",
        extensions: &["md"],
        is_source: false,
    },
];

pub struct LanguageRegistry {
    languages: HashMap<&'static str, &'static LanguageSpec>,
    extension_map: HashMap<&'static str, &'static str>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            languages: HashMap::new(),
            extension_map: HashMap::new(),
        };
        for spec in LANGUAGES {
            registry.register(spec);
        }
        registry
    }

    fn register(&mut self, spec: &'static LanguageSpec) {
        for ext in spec.extensions {
            self.extension_map.insert(ext, spec.id);
        }
        self.languages.insert(spec.id, spec);
    }

    /// Language id for a file, `"unknown"` when the extension is not in the table.
    pub fn language_id_for(&self, path: &Path) -> &'static str {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.extension_map.get(ext).copied())
            .unwrap_or(UNKNOWN_LANGUAGE)
    }

    pub fn is_source(&self, language_id: &str) -> bool {
        self.languages
            .get(language_id)
            .map(|spec| spec.is_source)
            .unwrap_or(false)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.language_id_for(Path::new("/p/a.ts")), "typescript");
        assert_eq!(registry.language_id_for(Path::new("/p/a.tsx")), "typescript");
        assert_eq!(registry.language_id_for(Path::new("/p/b.jsx")), "javascript");
        assert_eq!(registry.language_id_for(Path::new("/p/c.py")), "python");
        assert_eq!(registry.language_id_for(Path::new("README.md")), "markdown");
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.language_id_for(Path::new("Makefile")), UNKNOWN_LANGUAGE);
        assert_eq!(registry.language_id_for(Path::new("x.zig")), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn test_source_classification() {
        let registry = LanguageRegistry::new();
        assert!(registry.is_source("typescript"));
        assert!(!registry.is_source("markdown"));
        assert!(!registry.is_source(UNKNOWN_LANGUAGE));
    }
}
