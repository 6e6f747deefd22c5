//! Generation of web flasher manifests.
//!
//! The manifest is the JSON document consumed by browser based flashing tools:
//! a list of builds, each naming the image parts to flash and their offsets.

use std::fs;
use std::path::PathBuf;

use log::info;
use serde::Serialize;

use crate::error::Error;
use crate::esp32::{self, ComponentSet};

/// Chip family name carried in every generated manifest
pub const CHIP_FAMILY_ESP32: &str = "ESP32";

/// File name of the generated manifest
pub const MANIFEST_JSON: &str = "manifest.json";

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_install_prompt_erase: Option<bool>,
    pub builds: Vec<Build>,
}

#[derive(Debug, Serialize)]
pub struct Build {
    #[serde(rename = "chipFamily")]
    pub chip_family: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct Part {
    pub path: String,
    pub offset: u32,
}

impl Manifest {
    /// Builds a manifest that flashes the four components at their flash
    /// offsets.
    pub fn for_components(components: &ComponentSet) -> Manifest {
        let parts = vec![
            Part {
                path: esp32::BOOTLOADER_BIN.to_owned(),
                offset: esp32::BOOTLOADER_OFFSET,
            },
            Part {
                path: esp32::PARTITIONS_BIN.to_owned(),
                offset: esp32::PARTITION_TABLE_OFFSET,
            },
            Part {
                path: esp32::BOOT_APP0_BIN.to_owned(),
                offset: esp32::BOOT_APP0_OFFSET,
            },
            Part {
                path: components.app_file_name(),
                offset: esp32::APP_OFFSET,
            },
        ];

        Manifest::new(components.name(), parts)
    }

    /// Builds a manifest that flashes the merged image at offset zero.
    pub fn for_merged(components: &ComponentSet) -> Manifest {
        let parts = vec![Part {
            path: components.merged_file_name(),
            offset: 0,
        }];

        Manifest::new(components.name(), parts)
    }

    fn new(name: &str, parts: Vec<Part>) -> Manifest {
        Manifest {
            name: name.to_owned(),
            version: None,
            new_install_prompt_erase: None,
            builds: vec![Build {
                chip_family: CHIP_FAMILY_ESP32.to_owned(),
                parts,
            }],
        }
    }

    /// Serializes the manifest as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Writes `manifest` into the firmware directory and returns the path it was
/// written to.
pub fn write_manifest(components: &ComponentSet, manifest: &Manifest) -> Result<PathBuf, Error> {
    let path = components.firmware_dir().join(MANIFEST_JSON);
    let mut json = manifest.to_json()?;
    json.push('\n');

    fs::write(&path, json)?;

    info!("Wrote manifest {}", path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use crate::test_util::TempDir;

    use super::*;

    #[test]
    fn it_should_lay_out_the_component_parts() {
        let components = ComponentSet::new("/fw", "demo");
        let manifest = Manifest::for_components(&components);
        let json = manifest.to_json().unwrap();

        assert!(json.contains("\"chipFamily\": \"ESP32\""));
        assert!(json.contains("\"path\": \"bootloader_dio_40m.bin\""));
        assert!(json.contains("\"offset\": 4096"));
        assert!(json.contains("\"path\": \"demo-firmware.bin\""));
        assert!(json.contains("\"offset\": 65536"));
        assert!(!json.contains("\"version\""));
    }

    #[test]
    fn it_should_reference_the_merged_image_at_offset_zero() {
        let components = ComponentSet::new("/fw", "demo");
        let manifest = Manifest::for_merged(&components);
        let json = manifest.to_json().unwrap();

        assert!(json.contains("\"path\": \"demo-merged.bin\""));
        assert!(json.contains("\"offset\": 0"));
        assert_eq!(manifest.builds[0].parts.len(), 1);
    }

    #[test]
    fn it_should_include_the_version_when_set() {
        let components = ComponentSet::new("/fw", "demo");
        let mut manifest = Manifest::for_components(&components);
        manifest.version = Some("1.2.0".to_owned());
        manifest.new_install_prompt_erase = Some(true);

        let json = manifest.to_json().unwrap();

        assert!(json.contains("\"version\": \"1.2.0\""));
        assert!(json.contains("\"new_install_prompt_erase\": true"));
    }

    #[test]
    fn it_should_write_the_manifest_next_to_the_components() {
        let project = TempDir::new("project");
        let components = ComponentSet::for_project(project.path(), Some("demo"));

        fs::create_dir_all(components.firmware_dir()).unwrap();

        let manifest = Manifest::for_components(&components);
        let path = write_manifest(&components, &manifest).unwrap();

        assert_eq!(path, components.firmware_dir().join("manifest.json"));

        let json = fs::read_to_string(path).unwrap();
        assert!(json.ends_with('\n'));
        assert!(json.contains("\"name\": \"demo\""));
    }
}
