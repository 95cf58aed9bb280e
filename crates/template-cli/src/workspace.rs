//! Template discovery under a workspace root.

use crate::config::{TemplateConfig, CONFIG_FILE};
use crate::error::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use walkdir::WalkDir;

const DEFAULT_IGNORES: [&str; 3] = ["**/node_modules/**", "**/target/**", "**/.git/**"];

/// A workspace root with its configuration and template files.
#[derive(Debug)]
pub struct Workspace {
    root: Utf8PathBuf,
    config: TemplateConfig,
    ignore: GlobSet,
    files: Vec<Utf8PathBuf>,
}

impl Workspace {
    /// Loads the configuration under `root` and discovers its templates.
    pub fn open(root: &Utf8Path, extra_ignores: &[String]) -> Result<Self, CliError> {
        let config = TemplateConfig::load(root);
        let mut builder = GlobSetBuilder::new();
        let patterns = extra_ignores
            .iter()
            .map(String::as_str)
            .chain(config.exclude.iter().map(String::as_str))
            .chain(DEFAULT_IGNORES);
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| CliError::InvalidGlob(e.to_string()))?;
            builder.add(glob);
        }
        let ignore = builder
            .build()
            .map_err(|e| CliError::InvalidGlob(e.to_string()))?;

        let mut workspace = Self {
            root: root.to_path_buf(),
            config,
            ignore,
            files: Vec::new(),
        };
        workspace.rescan();
        Ok(workspace)
    }

    /// Walks the root again, picking up added and removed files.
    pub fn rescan(&mut self) {
        let mut files: Vec<Utf8PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| Utf8PathBuf::try_from(e.into_path()).ok())
            .filter(|p| self.config.template_name(p).is_some())
            .filter(|p| !self.ignore.is_match(self.relative(p).as_str()))
            .collect();
        files.sort();
        tracing::debug!(root = %self.root, count = files.len(), "discovered templates");
        self.files = files;
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Template files in path order.
    pub fn files(&self) -> &[Utf8PathBuf] {
        &self.files
    }

    /// `path` relative to the root, or unchanged when outside it.
    pub fn relative<'a>(&self, path: &'a Utf8Path) -> &'a Utf8Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Every partial name and the file defining it. Configured partials win
    /// over discovered files of the same name.
    pub fn partials(&self) -> IndexMap<String, Utf8PathBuf> {
        let mut partials: IndexMap<String, Utf8PathBuf> = self
            .config
            .partials
            .iter()
            .map(|(name, path)| (name.clone(), self.root.join(path)))
            .collect();
        for file in &self.files {
            if let Some(name) = self.config.template_name(file) {
                partials
                    .entry(name.to_string())
                    .or_insert_with(|| file.clone());
            }
        }
        partials
    }

    /// Whether a change to `path` can affect a check of this workspace.
    pub fn is_relevant(&self, path: &Utf8Path) -> bool {
        path.file_name() == Some(CONFIG_FILE) || self.config.template_name(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write(root: &Utf8Path, path: &str, content: &str) {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discovery_and_ignores() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        write(&root, "card.tmpl", "<div></div>");
        write(&root, "ui/badge.tmpl", "<span></span>");
        write(&root, "drafts/old.tmpl", "");
        write(&root, "node_modules/pkg/x.tmpl", "");
        write(&root, "notes.txt", "");
        write(
            &root,
            CONFIG_FILE,
            r#"{"exclude": ["drafts/**"], "partials": {"icon": "shared/icon.svg"}}"#,
        );

        let workspace = Workspace::open(&root, &[]).unwrap();
        let relative: Vec<&str> = workspace
            .files()
            .iter()
            .map(|p| workspace.relative(p).as_str())
            .collect();
        assert_eq!(relative, vec!["card.tmpl", "ui/badge.tmpl"]);

        let partials = workspace.partials();
        let names: Vec<&str> = partials.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["icon", "card", "badge"]);
        assert_eq!(partials["icon"], root.join("shared/icon.svg"));

        let narrowed = Workspace::open(&root, &["ui/**".to_string()]).unwrap();
        assert_eq!(narrowed.files().len(), 1);
    }

    #[test]
    fn test_rescan_and_relevance() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let mut workspace = Workspace::open(&root, &[]).unwrap();
        assert!(workspace.files().is_empty());

        write(&root, "page.tmpl", "{title}");
        workspace.rescan();
        assert_eq!(workspace.files(), &[root.join("page.tmpl")]);

        assert!(workspace.is_relevant(&root.join("page.tmpl")));
        assert!(workspace.is_relevant(&root.join(CONFIG_FILE)));
        assert!(!workspace.is_relevant(&root.join("style.css")));
    }

    #[test]
    fn test_invalid_glob() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let error = Workspace::open(&root, &["[".to_string()]).unwrap_err();
        assert!(matches!(error, CliError::InvalidGlob(_)));
    }
}
