use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGES_DIR: &str = "pages";
pub const DEFAULT_FRONT_PAGE: &str = "Home";

/// Input configuration describing the wiki being exported.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    /// Page store directory, relative to the config file unless absolute.
    pub pages_dir: Option<String>,
    /// Title of the wiki's home page; backlink placement ignores pages
    /// that are only linked from here.
    pub front_page: Option<String>,
    /// Title of the page defining link aliases, if the wiki has one.
    pub alias_page: Option<String>,
}

impl WikiConfig {
    pub fn front_page(&self) -> &str {
        self.wiki.front_page.as_deref().unwrap_or(DEFAULT_FRONT_PAGE)
    }

    pub fn alias_page(&self) -> Option<&str> {
        self.wiki.alias_page.as_deref()
    }

    /// Page store location resolved against the directory holding the
    /// config file.
    pub fn pages_dir(&self, config_path: &Path) -> PathBuf {
        let pages_dir = self.wiki.pages_dir.as_deref().unwrap_or(DEFAULT_PAGES_DIR);
        let pages_dir = Path::new(pages_dir);
        if pages_dir.is_absolute() {
            pages_dir.to_path_buf()
        } else {
            config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(pages_dir)
        }
    }
}

/// Load and parse a WikiConfig from a TOML file.
pub fn load_config(config_path: &Path) -> Result<WikiConfig> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: WikiConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Where the configured link extension applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionPolicy {
    /// Append to the physical output filename only.
    Output,
    /// Append only when computing cross-page references (the original
    /// exporter's behavior).
    #[default]
    ReferencesOnly,
    /// Append in both places.
    Both,
}

/// Knobs controlling a single conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Nest every raw file under this subdirectory of the output.
    pub file_prefix: Option<String>,
    /// Flatten raw files into a single directory by replacing `/` with `_`.
    pub files_in_one_dir: bool,
    /// Extension appended to markup page paths, e.g. `.md`.
    pub link_extension: Option<String>,
    pub extension_policy: ExtensionPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_config_parses_wiki_section() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("wiki.toml");
        fs::write(
            &config_path,
            r#"
[wiki]
pages_dir = "store/pages"
front_page = "FrontPage"
alias_page = "Alias"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.front_page(), "FrontPage");
        assert_eq!(config.alias_page(), Some("Alias"));
        assert_eq!(
            config.pages_dir(&config_path),
            temp.path().join("store/pages")
        );
    }

    #[test]
    fn load_config_fails_for_missing_file() {
        let error = load_config(Path::new("/nonexistent/wiki.toml")).expect_err("must fail");
        assert!(error.to_string().contains("failed to read"));
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("wiki.toml");
        fs::write(&config_path, "[other]\nkey = 1\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.front_page(), DEFAULT_FRONT_PAGE);
        assert_eq!(config.alias_page(), None);
    }

    #[test]
    fn pages_dir_defaults_relative_to_config() {
        let config = WikiConfig::default();
        assert_eq!(
            config.pages_dir(Path::new("/srv/wiki/wiki.toml")),
            PathBuf::from("/srv/wiki/pages")
        );
    }

    #[test]
    fn absolute_pages_dir_is_kept() {
        let config = WikiConfig {
            wiki: WikiSection {
                pages_dir: Some("/data/pages".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(
            config.pages_dir(Path::new("wiki.toml")),
            PathBuf::from("/data/pages")
        );
    }
}
