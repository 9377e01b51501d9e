//! Regenerates the documentation index

use std::fs;
use std::path::{Path, PathBuf};

use docdelta_config::ResolvedPaths;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::{EngineError, IoOperation, Result};
use crate::models::IndexReport;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];
const SECTION_LABEL: &str = "## Documentation Files";

/// Rebuilds the index document from the current file listing
///
/// Output is a pure function of the markdown files present, so running it
/// twice over an unchanged tree writes identical bytes.
#[derive(Debug, Clone)]
pub struct IndexGenerator {
    docs_root: PathBuf,
    index_file: PathBuf,
    index_html: Option<PathBuf>,
    excluded: Vec<PathBuf>,
}

impl IndexGenerator {
    /// Generator over the resolved docs root
    pub fn new(paths: &ResolvedPaths) -> Self {
        IndexGenerator {
            docs_root: paths.docs_root.clone(),
            index_file: paths.index_file.clone(),
            index_html: paths.index_html.clone(),
            excluded: paths.excluded_dirs().into_iter().map(Path::to_path_buf).collect(),
        }
    }

    /// Markdown files under the docs root, relative and sorted
    pub fn collect_entries(&self) -> Result<Vec<String>> {
        if !self.docs_root.is_dir() {
            return Err(EngineError::DocsRootNotFound(self.docs_root.clone()));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&self.docs_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| self.should_visit(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.docs_root).to_path_buf();
                EngineError::io(path, IoOperation::List, e.into())
            })?;
            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }
            if entry.path() == self.index_file {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.docs_root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                entries.push(parts.join("/"));
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Renders the markdown index for `entries`
    pub fn render(&self, entries: &[String]) -> String {
        let title = self
            .index_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index.md".to_string());
        let mut out = format!("# {}\n\n{}\n", title, SECTION_LABEL);
        for entry in entries {
            out.push_str(&format!("- [{}]({})\n", entry, entry));
        }
        out
    }

    /// Overwrites the index (and its HTML mirror, when enabled)
    pub fn generate(&self) -> Result<IndexReport> {
        let entries = self.collect_entries()?;
        let markdown = self.render(&entries);
        fs::write(&self.index_file, &markdown)
            .map_err(|e| EngineError::io(&self.index_file, IoOperation::Write, e))?;

        if let Some(html_path) = &self.index_html {
            let html = render_html(&markdown);
            fs::write(html_path, html)
                .map_err(|e| EngineError::io(html_path, IoOperation::Write, e))?;
            debug!(path = %html_path.display(), "html index written");
        }

        info!(
            path = %self.index_file.display(),
            entries = entries.len(),
            "index regenerated"
        );
        Ok(IndexReport {
            path: self.index_file.clone(),
            entries,
            html: self.index_html.clone(),
        })
    }

    fn should_visit(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let hidden = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'));
        if hidden {
            return false;
        }
        !(entry.file_type().is_dir() && self.excluded.iter().any(|dir| dir == entry.path()))
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext)))
}

fn render_html(markdown: &str) -> String {
    let parser = pulldown_cmark::Parser::new(markdown);
    let mut body = String::new();
    pulldown_cmark::html::push_html(&mut body, parser);
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Documentation Index</title></head>\n<body>\n{}</body>\n</html>\n",
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdelta_config::EngineConfig;
    use tempfile::TempDir;

    fn setup(html: bool) -> (TempDir, IndexGenerator, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = EngineConfig::for_project(temp_dir.path());
        config.index_html = html;
        let paths = config.resolve();
        fs::create_dir_all(&paths.docs_root).unwrap();
        let docs = paths.docs_root.clone();
        (temp_dir, IndexGenerator::new(&paths), docs)
    }

    #[test]
    fn test_index_lists_sorted_markdown_only() {
        let (_temp, generator, docs) = setup(false);
        fs::write(docs.join("zeta.md"), "").unwrap();
        fs::write(docs.join("alpha.md"), "").unwrap();
        fs::write(docs.join("release.yaml"), "").unwrap();
        fs::create_dir_all(docs.join("guides")).unwrap();
        fs::write(docs.join("guides/setup.md"), "").unwrap();
        fs::create_dir_all(docs.join("yaml-history")).unwrap();
        fs::write(docs.join("yaml-history/old.md"), "").unwrap();
        fs::write(docs.join(".draft.md"), "").unwrap();

        let report = generator.generate().unwrap();
        assert_eq!(report.entries, vec!["alpha.md", "guides/setup.md", "zeta.md"]);
        let content = fs::read_to_string(docs.join("index.md")).unwrap();
        assert_eq!(
            content,
            "# index.md\n\n## Documentation Files\n- [alpha.md](alpha.md)\n- [guides/setup.md](guides/setup.md)\n- [zeta.md](zeta.md)\n"
        );
    }

    #[test]
    fn test_regeneration_is_byte_identical() {
        let (_temp, generator, docs) = setup(false);
        fs::write(docs.join("a.md"), "").unwrap();

        generator.generate().unwrap();
        let first = fs::read(docs.join("index.md")).unwrap();
        generator.generate().unwrap();
        let second = fs::read(docs.join("index.md")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_html_mirror() {
        let (_temp, generator, docs) = setup(true);
        fs::write(docs.join("a.md"), "").unwrap();

        let report = generator.generate().unwrap();
        let html_path = report.html.unwrap();
        let html = fs::read_to_string(html_path).unwrap();
        assert!(html.contains("<a href=\"a.md\">a.md</a>"));
        assert!(html.contains("<h2>Documentation Files</h2>"));
    }

    #[test]
    fn test_missing_docs_root() {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig::for_project(temp_dir.path());
        let generator = IndexGenerator::new(&config.resolve());
        assert!(matches!(
            generator.generate(),
            Err(EngineError::DocsRootNotFound(_))
        ));
    }
}
