//! ESP32 flash layout and fixed flashing artifacts

pub mod image;

use std::path::{Path, PathBuf};

/// Flash offset of the second-stage bootloader
pub const BOOTLOADER_OFFSET: u32 = 0x1000;
/// Flash offset of the partition table
pub const PARTITION_TABLE_OFFSET: u32 = 0x8000;
/// Flash offset of the boot selector block
pub const BOOT_APP0_OFFSET: u32 = 0xe000;
/// Flash offset of the application image
pub const APP_OFFSET: u32 = 0x1_0000;

/// The value of an erased flash byte - gaps in the merged image are filled with it
pub const ERASED_BYTE: u8 = 0xff;

/// The magic value of the first byte of every ESP32 image
pub const IMAGE_MAGIC: u8 = 0xe9;

/// The size of one flash sector - every generated placeholder spans one sector
pub const SECTOR_SIZE: usize = 4096;

/// File name of the application image produced by the build system
pub const BUILD_APP_BIN: &str = "firmware.bin";
/// File name of the bootloader produced by the build system
pub const BUILD_BOOTLOADER_BIN: &str = "bootloader.bin";
/// File name of the partition table produced by the build system
pub const BUILD_PARTITIONS_BIN: &str = "partitions.bin";

/// Output file name of the bootloader component
pub const BOOTLOADER_BIN: &str = "bootloader_dio_40m.bin";
/// Output file name of the partition table component
pub const PARTITIONS_BIN: &str = "partitions.bin";
/// Output file name of the boot selector component
pub const BOOT_APP0_BIN: &str = "boot_app0.bin";

/// Name of the output directory created inside the project directory
pub const FIRMWARE_DIR_NAME: &str = "firmware";

/// Builds the placeholder bootloader used when the build did not produce one.
///
/// The placeholder only carries the image magic so that flashing tools recognize
/// the region as an ESP32 image; it is not bootable.
pub fn placeholder_bootloader() -> Vec<u8> {
    let mut data = vec![0u8; SECTOR_SIZE];

    data[0] = IMAGE_MAGIC;

    data
}

/// Builds the placeholder partition table used when the build did not produce one.
///
/// The stub is a zero-filled sector, not an encoded table; the flashing tool treats
/// the region as opaque bytes.
pub fn placeholder_partition_table() -> Vec<u8> {
    vec![0u8; SECTOR_SIZE]
}

/// Builds the boot selector block.
///
/// The leading 0xf0f0f0f0 marker selects the factory application partition; the
/// rest of the sector is left in the erased state.
pub fn boot_app0() -> Vec<u8> {
    let mut data = vec![ERASED_BYTE; SECTOR_SIZE];

    data[..4].copy_from_slice(&[0xf0, 0xf0, 0xf0, 0xf0]);

    data
}

/// The set of output artifacts produced for one firmware build.
///
/// All artifacts live in a single firmware directory. The application image and
/// the merged image carry the project `name` stem in their file names; the other
/// components have fixed names.
#[derive(Debug, Clone)]
pub struct ComponentSet {
    firmware_dir: PathBuf,
    name: String,
}

impl ComponentSet {
    pub fn new<P: AsRef<Path>, S: Into<String>>(firmware_dir: P, name: S) -> ComponentSet {
        ComponentSet {
            firmware_dir: firmware_dir.as_ref().to_path_buf(),
            name: name.into(),
        }
    }

    /// Builds the component set for `project_dir`, deriving the name stem from the
    /// directory's file name unless an explicit `name` is given.
    pub fn for_project<P: AsRef<Path>>(project_dir: P, name: Option<&str>) -> ComponentSet {
        let project_dir = project_dir.as_ref();
        let name = name
            .map(str::to_owned)
            .or_else(|| {
                project_dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "firmware".to_owned());

        ComponentSet::new(project_dir.join(FIRMWARE_DIR_NAME), name)
    }

    pub fn firmware_dir(&self) -> &Path {
        &self.firmware_dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name of the application image component
    pub fn app_file_name(&self) -> String {
        format!("{}-firmware.bin", self.name)
    }

    /// File name of the merged flash image
    pub fn merged_file_name(&self) -> String {
        format!("{}-merged.bin", self.name)
    }

    pub fn bootloader_path(&self) -> PathBuf {
        self.firmware_dir.join(BOOTLOADER_BIN)
    }

    pub fn partition_table_path(&self) -> PathBuf {
        self.firmware_dir.join(PARTITIONS_BIN)
    }

    pub fn boot_app0_path(&self) -> PathBuf {
        self.firmware_dir.join(BOOT_APP0_BIN)
    }

    pub fn app_path(&self) -> PathBuf {
        self.firmware_dir.join(self.app_file_name())
    }

    pub fn merged_path(&self) -> PathBuf {
        self.firmware_dir.join(self.merged_file_name())
    }

    /// The merge layout: every component path paired with its absolute flash offset,
    /// in ascending offset order
    pub fn regions(&self) -> [(u32, PathBuf); 4] {
        [
            (BOOTLOADER_OFFSET, self.bootloader_path()),
            (PARTITION_TABLE_OFFSET, self.partition_table_path()),
            (BOOT_APP0_OFFSET, self.boot_app0_path()),
            (APP_OFFSET, self.app_path()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use assert_hex::*;
    use hex_literal::hex;

    use super::*;

    #[test]
    fn it_should_build_bootloader_placeholder() {
        let bootloader = placeholder_bootloader();

        assert_eq!(bootloader.len(), 4096);
        assert_eq!(bootloader[0], 0xe9);
        assert!(bootloader[1..].iter().all(|&byte| byte == 0x00));
    }

    #[test]
    fn it_should_build_partition_table_placeholder() {
        let partitions = placeholder_partition_table();

        assert_eq!(partitions.len(), 4096);
        assert!(partitions.iter().all(|&byte| byte == 0x00));
    }

    #[test]
    fn it_should_build_boot_selector() {
        let boot_app0 = boot_app0();

        assert_eq!(boot_app0.len(), 4096);
        assert_eq_hex!(&boot_app0[..4], &hex!("f0 f0 f0 f0"));
        assert!(boot_app0[4..].iter().all(|&byte| byte == 0xff));
    }

    #[test]
    fn it_should_map_component_paths() {
        let components = ComponentSet::new("/build/out/firmware", "redlight");

        assert_eq!(
            components.bootloader_path(),
            Path::new("/build/out/firmware/bootloader_dio_40m.bin")
        );
        assert_eq!(
            components.partition_table_path(),
            Path::new("/build/out/firmware/partitions.bin")
        );
        assert_eq!(
            components.boot_app0_path(),
            Path::new("/build/out/firmware/boot_app0.bin")
        );
        assert_eq!(
            components.app_path(),
            Path::new("/build/out/firmware/redlight-firmware.bin")
        );
        assert_eq!(
            components.merged_path(),
            Path::new("/build/out/firmware/redlight-merged.bin")
        );
    }

    #[test]
    fn it_should_order_regions_by_offset() {
        let components = ComponentSet::new("/fw", "demo");
        let regions = components.regions();

        let offsets: Vec<u32> = regions.iter().map(|(offset, _)| *offset).collect();

        assert_eq!(offsets, vec![0x1000, 0x8000, 0xe000, 0x10000]);
    }

    #[test]
    fn it_should_derive_the_name_from_the_project_dir() {
        let components = ComponentSet::for_project("/home/builder/teams-light", None);

        assert_eq!(components.name(), "teams-light");
        assert_eq!(
            components.firmware_dir(),
            Path::new("/home/builder/teams-light/firmware")
        );
    }

    #[test]
    fn it_should_prefer_an_explicit_name() {
        let components = ComponentSet::for_project("/home/builder/teams-light", Some("demo"));

        assert_eq!(components.name(), "demo");
        assert_eq!(components.app_file_name(), "demo-firmware.bin");
    }
}
