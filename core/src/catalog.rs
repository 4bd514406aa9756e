use crate::manifest::MANIFEST_FILE;
use crate::store::OBJECTS_DIR;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// A backup version found in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRef {
    pub project: String,
    pub name: String,
    pub path: PathBuf,
}

impl VersionRef {
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

/// Rejects project names that would land outside `<backup_root>/<project>`
/// or inside the object store.
pub fn validate_project(project: &str) -> Result<()> {
    if project == OBJECTS_DIR || !is_single_component(project) {
        return Err(Error::InvalidProject {
            project: project.to_string(),
        });
    }
    Ok(())
}

/// Lookup of projects and their versions.
#[async_trait]
pub trait VersionCatalog: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<String>>;

    /// Versions sorted oldest first. `filter` is a substring of the version name.
    async fn list_versions(&self, project: Option<&str>, filter: Option<&str>) -> Result<Vec<VersionRef>>;

    async fn find_manifest(&self, project: &str, version: &str) -> Result<PathBuf>;

    async fn latest(&self, project: Option<&str>, filter: Option<&str>) -> Result<Option<VersionRef>> {
        Ok(self.list_versions(project, filter).await?.pop())
    }
}

/// Catalog read straight from `<backup_root>/<project>/<version>/manifest.json`.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new<P: AsRef<Path>>(backup_root: P) -> Self {
        Self {
            root: backup_root.as_ref().to_path_buf(),
        }
    }

    async fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
        let mut dirs = Vec::new();
        if !fs::try_exists(dir).await? {
            return Ok(dirs);
        }

        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                dirs.push((name.to_string(), entry.path()));
            }
        }
        Ok(dirs)
    }
}

#[async_trait]
impl VersionCatalog for DirectoryCatalog {
    async fn list_projects(&self) -> Result<Vec<String>> {
        let mut projects: Vec<String> = Self::subdirectories(&self.root)
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| name != OBJECTS_DIR)
            .collect();
        projects.sort();
        Ok(projects)
    }

    async fn list_versions(&self, project: Option<&str>, filter: Option<&str>) -> Result<Vec<VersionRef>> {
        let projects = match project {
            Some(project) => {
                validate_project(project)?;
                vec![project.to_string()]
            }
            None => self.list_projects().await?,
        };

        let mut versions = Vec::new();
        for project in projects {
            for (name, path) in Self::subdirectories(&self.root.join(&project)).await? {
                if filter.is_some_and(|hint| !name.contains(hint)) {
                    continue;
                }
                if !fs::try_exists(path.join(MANIFEST_FILE)).await? {
                    continue;
                }
                versions.push(VersionRef {
                    project: project.clone(),
                    name,
                    path,
                });
            }
        }

        versions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.project.cmp(&b.project)));
        Ok(versions)
    }

    async fn find_manifest(&self, project: &str, version: &str) -> Result<PathBuf> {
        validate_project(project)?;
        let path = self.root.join(project).join(version).join(MANIFEST_FILE);
        if is_single_component(version) && fs::try_exists(&path).await? {
            Ok(path)
        } else {
            Err(Error::VersionNotFound {
                project: project.to_string(),
                version: version.to_string(),
            })
        }
    }
}
