//! `template.config.json` loading.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;

/// Name of the workspace configuration file.
pub const CONFIG_FILE: &str = "template.config.json";

const DEFAULT_EXTENSIONS: [&str; 2] = [".tmpl", ".html.tmpl"];

/// Workspace configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateConfig {
    /// File suffixes treated as templates.
    pub extensions: Vec<String>,

    /// Glob patterns excluded from checks, relative to the workspace.
    pub exclude: Vec<String>,

    /// Partial name to template path, relative to the workspace.
    pub partials: IndexMap<String, Utf8PathBuf>,
}

impl TemplateConfig {
    /// Loads `template.config.json` from `root`, falling back to defaults when
    /// it is missing or unreadable.
    pub fn load(root: &Utf8Path) -> Self {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }
        match Self::parse_file(&path) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(%path, %error, "ignoring invalid configuration");
                Self::default()
            }
        }
    }

    fn parse_file(path: &Utf8Path) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::parse(&content)
    }

    /// Parses configuration text; `//` and `/* */` comments are allowed.
    pub fn parse(content: &str) -> Result<Self, String> {
        serde_json::from_str(&strip_comments(content)).map_err(|e| e.to_string())
    }

    /// The template file suffixes, defaulting to `.tmpl`.
    pub fn file_extensions(&self) -> Vec<&str> {
        if self.extensions.is_empty() {
            DEFAULT_EXTENSIONS.to_vec()
        } else {
            self.extensions.iter().map(String::as_str).collect()
        }
    }

    /// The template name for a file: its file name minus the matched suffix.
    pub fn template_name<'a>(&self, path: &'a Utf8Path) -> Option<&'a str> {
        let file_name = path.file_name()?;
        self.file_extensions()
            .into_iter()
            .filter(|ext| file_name.ends_with(ext))
            .max_by_key(|ext| ext.len())
            .map(|ext| &file_name[..file_name.len() - ext.len()])
            .filter(|name| !name.is_empty())
    }
}

/// Drops comments outside string literals.
fn strip_comments(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut chars = json.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '"' => in_string = false,
                '\\' => out.extend(chars.next()),
                _ => {}
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                while chars.peek().is_some_and(|&next| next != '\n') {
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut last = '\0';
                for next in chars.by_ref() {
                    if last == '*' && next == '/' {
                        break;
                    }
                    last = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}
