//! The sample project under test: checkout, descriptor edits and the build
//! that deploys it.

pub mod build;
pub mod descriptor;
pub mod source;
mod xml;

pub use build::{BuildError, BuildTrigger, MavenBuild};
pub use descriptor::{Dependency, Descriptor, DescriptorError, ProjectModel};
pub use source::{GitSource, SourceControl, SourceError, WorkingCopy};
