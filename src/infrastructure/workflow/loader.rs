//! Workflow definition loading
//!
//! Definitions are YAML, JSON or TOML documents. Directories are scanned one
//! level deep in file name order; files with other extensions are ignored there.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::workflow::WorkflowDefinition;

/// Error type for definition loading
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to parse YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unsupported workflow file {} (expected .yaml, .yml, .json or .toml)", path.display())]
    UnsupportedFormat { path: PathBuf },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Json { path, .. }
            | Self::Toml { path, .. }
            | Self::Yaml { path, .. }
            | Self::UnsupportedFormat { path } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Definitions and per-file failures from one load
#[derive(Debug, Default)]
pub struct LoadedWorkflows {
    pub definitions: Vec<WorkflowDefinition>,
    pub errors: Vec<LoadError>,
}

/// Parse one definition document
pub fn parse_definition(
    content: &str,
    format: DocumentFormat,
    path: &Path,
) -> Result<WorkflowDefinition, LoadError> {
    match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        DocumentFormat::Json => serde_json::from_str(content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        }),
        DocumentFormat::Toml => toml::from_str(content).map_err(|source| LoadError::Toml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load a definition from a YAML, JSON or TOML file
pub fn load_file(path: impl AsRef<Path>) -> Result<WorkflowDefinition, LoadError> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let definition = parse_definition(&content, format, path)?;
    debug!(path = %path.display(), workflow = %definition.name, "Loaded workflow definition");

    Ok(definition)
}

/// Expand directories into their definition files, sorted by name
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let entries = std::fs::read_dir(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|entry| entry.is_file() && DocumentFormat::from_path(entry).is_some())
            .collect();
        found.sort();

        debug!(directory = %path.display(), files = found.len(), "Scanned workflow directory");
        files.extend(found);
    }

    Ok(files)
}

/// Load every definition under `paths`, collecting failures per file
pub fn load_paths(paths: &[PathBuf]) -> LoadedWorkflows {
    let mut loaded = LoadedWorkflows::default();

    let files = match discover(paths) {
        Ok(files) => files,
        Err(e) => {
            loaded.errors.push(e);
            return loaded;
        }
    };

    for file in files {
        match load_file(&file) {
            Ok(definition) => loaded.definitions.push(definition),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Skipping workflow file");
                loaded.errors.push(e);
            }
        }
    }

    info!(
        workflows = loaded.definitions.len(),
        errors = loaded.errors.len(),
        "Loaded workflow definitions"
    );

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{ActionDefinition, ExtractTarget};

    const NEWS_TOML: &str = r#"
        workflow_name = "Daily News"
        version = 1
        start = { url = "https://news.example.com/" }

        [config]
        timeout = 5000
        retries = 2

        [[flow]]
        step = "list"
        next = "articles"

        [[flow.actions]]
        action = "extract"
        target = "links"
        element = { sample = "ul.news li:nth-of-type(1) a" }
        output = "news_items"

        [[flow]]
        step = "articles"
        for_each = "${news_items}"
        next = "finish"

        [[flow.actions]]
        action = "visit"

        [[flow.actions]]
        action = "extract"
        target = "content"
        output = "article"
        elements = { title = { selector = "h1", attribute = "text" } }
    "#;

    const NEWS_YAML: &str = r#"
workflow_name: "News Crawler"
description: "Collect the latest articles"
version: 1.0
config:
  headless: true
  timeout: 30000
  request_delay: 2
start:
  url: "https://news.example.com/"
flow:
  - step: "get_news_list"
    actions:
      - action: "wait"
        timeout: 2000
      - action: "extract"
        target: "links"
        element:
          sample: "/html/body/div[1]/ul/li[1]/a"
          generalize: true
        output: "news_items"
    pagination:
      next_button: "a.next"
      max_pages: 3
    next: "get_news_details"
  - step: "get_news_details"
    for_each: "${news_items}"
    actions:
      - action: "visit"
        url: "${current_item.href}"
      - action: "extract"
        target: "content"
        elements:
          title:
            selector: "h1.title"
          date:
            selector: "span.date"
          content:
            selector: "div.body"
        output: "article_data"
      - action: "save"
        data: "${article_data}"
        format: "json"
        filename: "${article_data.title}.json"
    next: "finish"
"#;

    const SHOP_JSON: &str = r#"{
        "name": "Shop",
        "start": "https://shop.example.com/",
        "steps": [
            {"id": "list", "actions": [{"action": "wait", "timeout_ms": 10}]}
        ]
    }"#;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scrapeflow-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_toml_definition() {
        let definition =
            parse_definition(NEWS_TOML, DocumentFormat::Toml, Path::new("news.toml")).unwrap();

        assert_eq!(definition.name, "Daily News");
        assert_eq!(definition.version.as_deref(), Some("1"));
        assert_eq!(definition.start, "https://news.example.com/");
        assert_eq!(definition.config.timeout_ms, Some(5000));
        assert_eq!(definition.config.retry_count, Some(2));
        assert_eq!(definition.steps.len(), 2);
        assert_eq!(definition.steps[1].next_step(), None);

        match &definition.steps[1].actions[1] {
            ActionDefinition::Extract(extract) => {
                assert_eq!(extract.target, ExtractTarget::Content);
                assert_eq!(extract.elements.len(), 1);
                assert_eq!(extract.elements[0].name.as_deref(), Some("title"));
            }
            other => panic!("unexpected action {:?}", other),
        }

        assert!(definition.validate(&Default::default()).is_ok());
    }

    #[test]
    fn test_parse_yaml_definition() {
        let definition =
            parse_definition(NEWS_YAML, DocumentFormat::Yaml, Path::new("news.yaml")).unwrap();

        assert_eq!(definition.name, "News Crawler");
        assert_eq!(definition.version.as_deref(), Some("1.0"));
        assert_eq!(definition.start, "https://news.example.com/");
        assert_eq!(definition.config.timeout_ms, Some(30000));
        assert_eq!(definition.config.delay_seconds, Some(2.0));
        assert_eq!(definition.slug(), "news_crawler");

        let list = &definition.steps[0];
        assert_eq!(list.id, "get_news_list");
        assert_eq!(list.next_step(), Some("get_news_details"));
        assert_eq!(list.pagination.as_ref().map(|p| p.max_pages), Some(3));

        let details = &definition.steps[1];
        assert_eq!(details.for_each.as_deref(), Some("${news_items}"));
        assert_eq!(details.next_step(), None);

        match &details.actions[1] {
            ActionDefinition::Extract(extract) => {
                let names: Vec<_> = extract
                    .elements
                    .iter()
                    .filter_map(|element| element.name.as_deref())
                    .collect();
                assert_eq!(names, vec!["title", "date", "content"]);
                assert_eq!(extract.output_variable(), Some("article_data"));
            }
            other => panic!("unexpected action {:?}", other),
        }

        assert!(definition.validate(&Default::default()).is_ok());
    }

    #[test]
    fn test_yaml_syntax_error_carries_path() {
        let err = parse_definition("flow: [", DocumentFormat::Yaml, Path::new("bad.yml")).unwrap_err();

        assert!(matches!(err, LoadError::Yaml { .. }));
        assert_eq!(err.path(), Path::new("bad.yml"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path(Path::new("a.toml")), Some(DocumentFormat::Toml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.yaml")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.YML")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.txt")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_load_directory_sorted_with_errors() {
        let dir = temp_dir("loader");
        std::fs::write(dir.join("b_news.toml"), NEWS_TOML).unwrap();
        std::fs::write(dir.join("a_shop.json"), SHOP_JSON).unwrap();
        std::fs::write(dir.join("c_broken.json"), "{ not json").unwrap();
        std::fs::write(dir.join("d_crawler.yml"), NEWS_YAML).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let loaded = load_paths(&[dir.clone()]);

        let names: Vec<&str> = loaded.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Shop", "Daily News", "News Crawler"]);
        assert_eq!(loaded.errors.len(), 1);
        assert!(matches!(loaded.errors[0], LoadError::Json { .. }));
        assert!(loaded.errors[0].path().ends_with("c_broken.json"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_explicit_files() {
        let dir = temp_dir("loader-files");
        let notes = dir.join("notes.txt");
        std::fs::write(&notes, "ignored").unwrap();

        let loaded = load_paths(&[notes, dir.join("missing.json")]);

        assert!(loaded.definitions.is_empty());
        assert!(matches!(loaded.errors[0], LoadError::UnsupportedFormat { .. }));
        assert!(matches!(loaded.errors[1], LoadError::Io { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
