//! Output package formats.

use serde::{Deserialize, Serialize};

/// Archive flavour produced for a chapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    /// Comic book zip: `ComicInfo.xml` plus images at the root.
    #[default]
    Cbz,
    /// EPUB container with OPF manifest, NCX navigation, and an XHTML page.
    Epub,
}

impl PackageFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Cbz => "cbz",
            Self::Epub => "epub",
        }
    }

    /// File name for a package titled `title`, with path separators and
    /// other characters unsafe in file names replaced.
    #[must_use]
    pub fn file_name(self, title: &str) -> String {
        let stem: String = title
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        let stem = if stem.is_empty() { "chapter" } else { stem.as_str() };
        format!("{stem}.{}", self.extension())
    }

    /// Archive path of an image entry.
    #[must_use]
    pub fn image_entry_name(self, name: &str) -> String {
        match self {
            Self::Cbz => name.to_string(),
            Self::Epub => format!("OEBPS/Images/{name}"),
        }
    }
}

impl std::fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
