//! On-disk layout of an installed package.

use std::path::{Component, Path, PathBuf};

use feedflow_schema::PackageIdentity;

use crate::error::FlowError;
use crate::options::InstallerOptions;
use crate::pubgrub_adapter::InstallSet;

/// Where one installed package lives inside a target directory.
///
/// Packages install side by side as `<target>/<Name>.<version>/`. Inside,
/// platform content sits under `contentFiles/any/<platform>/` and
/// libraries under `lib/<platform>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDirectory {
    /// `{Name}.{version}`
    pub name: String,
    pub path: PathBuf,
    pub content_path: PathBuf,
    pub lib_path: PathBuf,
}

impl PackageDirectory {
    /// Lay out `identity` under `target`.
    ///
    /// Fails if the package name or the platform would place anything
    /// outside `target`.
    pub fn new(target: &Path, identity: &PackageIdentity, platform: &str) -> Result<Self, FlowError> {
        let name = identity.directory_name();
        if !identity.name.is_path_safe() || !is_single_component(&name) {
            return Err(FlowError::InvalidInput(format!(
                "package name '{}' is not a valid directory name",
                identity.name
            )));
        }
        if !is_single_component(platform) {
            return Err(FlowError::InvalidInput(format!(
                "platform '{platform}' is not a valid directory name"
            )));
        }

        let path = target.join(&name);
        Ok(Self {
            content_path: path.join("contentFiles").join("any").join(platform),
            lib_path: path.join("lib").join(platform),
            name,
            path,
        })
    }
}

/// Directories of the requested packages in `set`, in request order.
///
/// Only top-level requests are listed; their dependencies are installed
/// alongside but are not entry points for the host.
pub fn requested_directories(
    set: &InstallSet,
    options: &InstallerOptions,
) -> Result<Vec<PackageDirectory>, FlowError> {
    options
        .packages
        .iter()
        .filter_map(|requirement| set.get(&requirement.name))
        .map(|package| {
            PackageDirectory::new(&options.package_directory, &package.identity, &options.platform)
        })
        .collect()
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
