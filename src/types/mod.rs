// ABOUTME: Validated domain names shared by every component.
// ABOUTME: Uses phantom types to prevent name confusion at compile time.

mod name;

pub use name::{DeploymentName, Name, NameError, RequirementName, ResourceName, TypeName};
