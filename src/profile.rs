//! Local profile store: one record per API hostname, persisted as YAML.
//!
//! The file holds the access token and the selected project. On unix it is
//! written with mode 0o600 since it carries a bearer credential.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::Project;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("not logged in to {host}; run `smartloop login` first")]
    NotLoggedIn { host: String },
    #[error("no project selected; run `smartloop projects select` first")]
    NoProjectSelected,
    #[error("failed to access profile store at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("profile store at '{path}' is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to encode profile store for '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Profile {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.is_empty())
    }

    pub fn selected_project(&self) -> Result<&Project, ProfileError> {
        self.project.as_ref().ok_or(ProfileError::NoProjectSelected)
    }
}

pub type Profiles = BTreeMap<String, Profile>;

#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or empty file yields an empty store.
    pub fn load(&self) -> Result<Profiles, ProfileError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Profiles::new()),
            Err(source) => return Err(self.io_error(source)),
        };

        if content.trim().is_empty() {
            return Ok(Profiles::new());
        }

        serde_yaml::from_str(&content).map_err(|source| ProfileError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, profiles: &Profiles) -> Result<(), ProfileError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;
        }

        let yaml = serde_yaml::to_string(profiles).map_err(|source| ProfileError::Encode {
            path: self.path.clone(),
            source,
        })?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;

        // `mode` only applies on creation.
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|source| self.io_error(source))?;

        file.write_all(yaml.as_bytes())
            .map_err(|source| self.io_error(source))?;

        debug!(path = %self.path.display(), hosts = profiles.len(), "saved profile store");
        Ok(())
    }

    /// Profile for `host`; fails unless it carries a token.
    pub fn current(&self, host: &str) -> Result<Profile, ProfileError> {
        self.load()?
            .remove(host)
            .filter(|profile| profile.token().is_some())
            .ok_or_else(|| ProfileError::NotLoggedIn {
                host: host.to_string(),
            })
    }

    /// A fresh login replaces the whole record, dropping any selected project.
    pub fn set_token(&self, host: &str, token: &str) -> Result<(), ProfileError> {
        let mut profiles = self.load()?;
        profiles.insert(host.to_string(), Profile::with_token(token));
        self.save(&profiles)
    }

    pub fn set_project(&self, host: &str, project: Project) -> Result<(), ProfileError> {
        let mut profiles = self.load()?;
        let profile = profiles
            .get_mut(host)
            .filter(|profile| profile.token().is_some())
            .ok_or_else(|| ProfileError::NotLoggedIn {
                host: host.to_string(),
            })?;
        profile.project = Some(project);
        self.save(&profiles)
    }

    /// Forgets the selected project, if any.
    pub fn clear_project(&self, host: &str) -> Result<(), ProfileError> {
        let mut profiles = self.load()?;
        if let Some(profile) = profiles.get_mut(host)
            && profile.project.take().is_some()
        {
            self.save(&profiles)?;
        }
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> ProfileError {
        ProfileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{Profile, ProfileError, ProfileStore};
    use crate::api::Project;

    fn store_in(dir: &tempfile::TempDir) -> ProfileStore {
        ProfileStore::new(dir.path().join("nested").join("config.yaml"))
    }

    fn project(id: &str) -> Project {
        Project {
            id: id.to_string(),
            title: "Docs".to_string(),
            name: "docs".to_string(),
            config: None,
            created_at: None,
        }
    }

    #[test]
    fn load_returns_empty_map_when_file_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn set_token_creates_parent_dir_and_persists_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        store
            .set_token("api.smartloop.ai", "XYZ")
            .expect("set_token");

        let profile = store.current("api.smartloop.ai").expect("current");
        assert_eq!(profile.token(), Some("XYZ"));
        assert!(profile.project.is_none());
    }

    #[test]
    fn set_token_replaces_existing_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.set_token("host", "old").expect("set_token");
        store.set_project("host", project("p1")).expect("set_project");

        store.set_token("host", "new").expect("set_token");

        assert_eq!(store.current("host").expect("current"), Profile::with_token("new"));
    }

    #[test]
    fn profiles_for_other_hosts_are_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.set_token("a.example", "A").expect("set_token");
        store.set_token("b.example", "B").expect("set_token");

        let profiles = store.load().expect("load");
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["a.example"].token(), Some("A"));
    }

    #[test]
    fn current_without_token_is_not_logged_in() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let err = store.current("host").expect_err("should fail");
        assert!(matches!(err, ProfileError::NotLoggedIn { .. }));
    }

    #[test]
    fn set_project_requires_login() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let err = store
            .set_project("host", project("p1"))
            .expect_err("should fail");
        assert!(matches!(err, ProfileError::NotLoggedIn { .. }));
    }

    #[test]
    fn set_project_keeps_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.set_token("host", "T").expect("set_token");
        store.set_project("host", project("p1")).expect("set_project");

        let profile = store.current("host").expect("current");
        assert_eq!(profile.token(), Some("T"));
        assert_eq!(profile.selected_project().expect("project").id, "p1");
    }

    #[test]
    fn clear_project_drops_selection_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.set_token("host", "T").expect("set_token");
        store.set_project("host", project("p1")).expect("set_project");

        store.clear_project("host").expect("clear_project");
        store.clear_project("other-host").expect("clear_project on unknown host");

        let profile = store.current("host").expect("current");
        assert_eq!(profile.token(), Some("T"));
        assert!(matches!(
            profile.selected_project(),
            Err(ProfileError::NoProjectSelected)
        ));
    }

    #[test]
    fn unknown_keys_survive_a_rewrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().expect("parent")).expect("mkdir");
        fs::write(store.path(), "host:\n  token: T\n  theme: dark\n").expect("write");

        store.set_project("host", project("p1")).expect("set_project");

        let content = fs::read_to_string(store.path()).expect("read");
        assert!(content.contains("theme: dark"), "unexpected content:\n{content}");
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ProfileStore::new(dir.path().join("config.yaml"));
        fs::write(store.path(), "host: [unterminated").expect("write");
        assert!(matches!(store.load(), Err(ProfileError::Parse { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.set_token("host", "T").expect("set_token");

        let mode = fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn rewriting_a_readable_file_makes_it_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = ProfileStore::new(dir.path().join("config.yaml"));
        fs::write(store.path(), "").expect("write");
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o644)).expect("chmod");

        store.set_token("host", "T").expect("set_token");

        let mode = fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.current("host").expect("current").token(), Some("T"));
    }
}
