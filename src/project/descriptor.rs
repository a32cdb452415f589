//! Maven `pom.xml` descriptor: read the project model, pin the plugin under
//! test, inject a dependency and write redeployment annotations into the
//! plugin configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::xml::{Element, XmlDocument};
use crate::model::RedeploymentMarker;

/// Group assumed by Maven when a plugin declares none
pub const DEFAULT_PLUGIN_GROUP: &str = "org.apache.maven.plugins";

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse descriptor: {0}")]
    Parse(String),

    #[error("Failed to write descriptor: {0}")]
    Write(String),

    #[error("Root element is <{0}>, expected <project>")]
    NotAProject(String),

    #[error("Descriptor has no <{0}>")]
    MissingElement(&'static str),

    #[error("Plugin '{0}' is not declared in the build or any profile")]
    PluginNotFound(String),

    #[error("No '{0}' profile found in the descriptor")]
    ProfileNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRef {
    /// `groupId:artifactId`
    pub key: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileModel {
    pub id: String,
    pub plugins: Vec<PluginRef>,
}

/// Read-only view of the parts of a descriptor this crate cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectModel {
    pub artifact_id: String,
    pub version: Option<String>,
    pub plugins: Vec<PluginRef>,
    pub profiles: Vec<ProfileModel>,
}

impl ProjectModel {
    /// Version of a plugin from the main build, else from the first profile declaring it
    pub fn plugin_version(&self, key: &str) -> Option<&str> {
        self.plugins
            .iter()
            .chain(self.profiles.iter().flat_map(|p| p.plugins.iter()))
            .find(|plugin| plugin.key == key)
            .and_then(|plugin| plugin.version.as_deref())
    }

    pub fn profile(&self, id: &str) -> Option<&ProfileModel> {
        self.profiles.iter().find(|profile| profile.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Dependency {
    fn to_element(&self) -> Element {
        let mut element = Element::new("dependency")
            .with_child(Element::with_text("groupId", &self.group_id))
            .with_child(Element::with_text("artifactId", &self.artifact_id));
        if let Some(version) = &self.version {
            element.push(Element::with_text("version", version));
        }
        element
    }
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

fn plugin_key(plugin: &Element) -> String {
    let group = plugin
        .child_text("groupId")
        .unwrap_or_else(|| DEFAULT_PLUGIN_GROUP.to_string());
    let artifact = plugin.child_text("artifactId").unwrap_or_default();
    format!("{}:{}", group, artifact)
}

fn plugins_of(build: Option<&Element>) -> Vec<PluginRef> {
    build
        .and_then(|build| build.child("plugins"))
        .map(|plugins| {
            plugins
                .children_named("plugin")
                .map(|plugin| PluginRef {
                    key: plugin_key(plugin),
                    version: plugin.child_text("version"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn find_plugin_mut<'a>(build: Option<&'a mut Element>, key: &str) -> Option<&'a mut Element> {
    build?
        .child_mut("plugins")?
        .children_named_mut("plugin")
        .find(|plugin| plugin_key(plugin) == key)
}

fn property(key: &str, value: &str) -> Element {
    Element::new("property")
        .with_child(Element::with_text("name", key))
        .with_child(Element::with_text("value", value))
}

/// `<annotations>` block putting the marker on every generated resource and
/// on the pod template
pub fn marker_annotations(marker: &RedeploymentMarker) -> Element {
    Element::new("annotations")
        .with_child(Element::new("all").with_child(property(&marker.key, &marker.value)))
        .with_child(Element::new("pod").with_child(property(&marker.key, &marker.value)))
}

// ============================================================================
// Descriptor document (parsing is pure, open/save do the I/O)
// ============================================================================

#[derive(Debug, Clone)]
pub struct Descriptor {
    path: PathBuf,
    document: XmlDocument,
}

impl Descriptor {
    pub fn open(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, DescriptorError> {
        let document = XmlDocument::parse(content)?;
        if document.root.name != "project" {
            return Err(DescriptorError::NotAProject(document.root.name.clone()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> Result<ProjectModel, DescriptorError> {
        let project = &self.document.root;
        let artifact_id = project
            .child_text("artifactId")
            .filter(|id| !id.is_empty())
            .ok_or(DescriptorError::MissingElement("artifactId"))?;
        let version = project.child_text("version").or_else(|| {
            project
                .child("parent")
                .and_then(|parent| parent.child_text("version"))
        });

        let profiles = project
            .child("profiles")
            .map(|profiles| {
                profiles
                    .children_named("profile")
                    .map(|profile| ProfileModel {
                        id: profile.child_text("id").unwrap_or_default(),
                        plugins: plugins_of(profile.child("build")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ProjectModel {
            artifact_id,
            version,
            plugins: plugins_of(project.child("build")),
            profiles,
        })
    }

    /// Set the plugin's version in the main build; when the main build does
    /// not declare it, in every profile that does. Returns how many
    /// declarations were pinned.
    pub fn pin_plugin_version(&mut self, key: &str, version: &str) -> Result<usize, DescriptorError> {
        let project = &mut self.document.root;

        if let Some(plugin) = find_plugin_mut(project.child_mut("build"), key) {
            plugin.set_child_text("version", version);
            info!("Pinned {} to {} in the main build", key, version);
            return Ok(1);
        }

        let mut pinned = 0;
        if let Some(profiles) = project.child_mut("profiles") {
            for profile in profiles.children_named_mut("profile") {
                let id = profile.child_text("id").unwrap_or_default();
                if let Some(plugin) = find_plugin_mut(profile.child_mut("build"), key) {
                    plugin.set_child_text("version", version);
                    info!("Pinned {} to {} in profile '{}'", key, version, id);
                    pinned += 1;
                }
            }
        }

        if pinned == 0 {
            return Err(DescriptorError::PluginNotFound(key.to_string()));
        }
        Ok(pinned)
    }

    pub fn add_dependency(&mut self, dependency: &Dependency) {
        self.document
            .root
            .child_or_insert("dependencies")
            .push(dependency.to_element());
        debug!(
            "Added dependency {}:{}",
            dependency.group_id, dependency.artifact_id
        );
    }

    /// Replace the plugin configuration inside `profile_id` with one that
    /// annotates the generated resources with `marker`
    pub fn set_plugin_annotations(
        &mut self,
        profile_id: &str,
        key: &str,
        marker: &RedeploymentMarker,
    ) -> Result<(), DescriptorError> {
        let profile = self
            .document
            .root
            .child_mut("profiles")
            .and_then(|profiles| {
                profiles
                    .children_named_mut("profile")
                    .find(|profile| profile.child_text("id").as_deref() == Some(profile_id))
            })
            .ok_or_else(|| DescriptorError::ProfileNotFound(profile_id.to_string()))?;

        let plugin = find_plugin_mut(profile.child_mut("build"), key)
            .ok_or_else(|| DescriptorError::PluginNotFound(key.to_string()))?;
        // Only the annotations are ours; generators and other resource
        // settings of the plugin stay as they were
        plugin
            .child_or_insert("configuration")
            .child_or_insert("resources")
            .replace_child(marker_annotations(marker));

        info!(
            "Annotated {} in profile '{}' with {}",
            key, profile_id, marker
        );
        Ok(())
    }

    pub fn to_xml(&self) -> Result<String, DescriptorError> {
        self.document.to_xml()
    }

    pub fn save(&self) -> Result<(), DescriptorError> {
        let content = self.to_xml()?;
        std::fs::write(&self.path, content).map_err(|source| DescriptorError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Version of the plugin under test, taken from a reference descriptor
pub fn plugin_version_from(path: &Path) -> Result<String, DescriptorError> {
    Descriptor::open(path)?
        .model()?
        .version
        .ok_or(DescriptorError::MissingElement("version"))
}
