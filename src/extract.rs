//! Extraction of flashing artifacts from a build directory.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::error::Error;
use crate::esp32::{self, ComponentSet};

/// Collects the flashing artifacts for `components` from `build_dir`.
///
/// The application image is copied first: when it is missing the extraction
/// fails before any other component is written, leaving only the output
/// directory behind. A missing bootloader or partition table is substituted
/// with a placeholder, and the boot selector block is always generated.
pub fn extract_components(build_dir: &Path, components: &ComponentSet) -> Result<(), Error> {
    let firmware_dir = components.firmware_dir();

    info!(
        "Extracting firmware components to {}",
        firmware_dir.display()
    );

    fs::create_dir_all(firmware_dir)?;

    let app_bin = build_dir.join(esp32::BUILD_APP_BIN);
    if !app_bin.exists() {
        return Err(Error::AppImageNotFound(app_bin));
    }
    copy_component(&app_bin, &components.app_path(), "application image")?;

    let bootloader_bin = build_dir.join(esp32::BUILD_BOOTLOADER_BIN);
    if bootloader_bin.exists() {
        copy_component(&bootloader_bin, &components.bootloader_path(), "bootloader")?;
    } else {
        warn!("Bootloader not found in build - creating placeholder");
        write_component(
            &components.bootloader_path(),
            &esp32::placeholder_bootloader(),
            "bootloader placeholder",
        )?;
    }

    let partitions_bin = build_dir.join(esp32::BUILD_PARTITIONS_BIN);
    if partitions_bin.exists() {
        copy_component(
            &partitions_bin,
            &components.partition_table_path(),
            "partition table",
        )?;
    } else {
        warn!("Partition table not found in build - creating placeholder");
        write_component(
            &components.partition_table_path(),
            &esp32::placeholder_partition_table(),
            "partition table placeholder",
        )?;
    }

    write_component(
        &components.boot_app0_path(),
        &esp32::boot_app0(),
        "boot selector",
    )?;

    list_components(firmware_dir)?;

    Ok(())
}

fn copy_component(source: &Path, target: &Path, label: &str) -> Result<(), Error> {
    let size = fs::copy(source, target)?;

    info!("Copied {} to {} ({} bytes)", label, target.display(), size);

    Ok(())
}

fn write_component(target: &Path, data: &[u8], label: &str) -> Result<(), Error> {
    fs::write(target, data)?;

    debug!("Wrote {} ({} bytes)", label, data.len());

    Ok(())
}

/// Logs every `.bin` artifact in `firmware_dir` along with its size.
fn list_components(firmware_dir: &Path) -> Result<(), Error> {
    let mut entries = fs::read_dir(firmware_dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    info!("Firmware components:");

    for entry in entries {
        let path = entry.path();

        if path.extension().map_or(false, |extension| extension == "bin") {
            let size = entry.metadata()?.len();

            info!("  {} ({} bytes)", entry.file_name().to_string_lossy(), size);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::test_util::TempDir;

    use super::*;

    fn demo_components(project: &TempDir) -> ComponentSet {
        ComponentSet::for_project(project.path(), Some("demo"))
    }

    #[test]
    fn it_should_copy_all_components_verbatim() {
        let build = TempDir::new("build");
        let project = TempDir::new("project");

        let app = vec![0xe9, 0x01, 0x02, 0x03];
        let bootloader = vec![0xe9; 64];
        let partitions = vec![0xaa; 32];

        fs::write(build.path().join("firmware.bin"), &app).unwrap();
        fs::write(build.path().join("bootloader.bin"), &bootloader).unwrap();
        fs::write(build.path().join("partitions.bin"), &partitions).unwrap();

        let components = demo_components(&project);
        extract_components(build.path(), &components).unwrap();

        assert_eq!(fs::read(components.app_path()).unwrap(), app);
        assert_eq!(fs::read(components.bootloader_path()).unwrap(), bootloader);
        assert_eq!(
            fs::read(components.partition_table_path()).unwrap(),
            partitions
        );
        assert_eq!(
            fs::read(components.boot_app0_path()).unwrap(),
            esp32::boot_app0()
        );
    }

    #[test]
    fn it_should_leave_only_the_directory_without_an_app() {
        let build = TempDir::new("build");
        let project = TempDir::new("project");

        fs::write(build.path().join("bootloader.bin"), &[0xe9; 16]).unwrap();

        let components = demo_components(&project);

        match extract_components(build.path(), &components) {
            Err(Error::AppImageNotFound(path)) => {
                assert_eq!(path, build.path().join("firmware.bin"));
            }
            result => panic!("unexpected result: {:?}", result),
        }

        assert!(components.firmware_dir().exists());

        let entries: Vec<_> = fs::read_dir(components.firmware_dir()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn it_should_substitute_placeholders() {
        let build = TempDir::new("build");
        let project = TempDir::new("project");

        fs::write(build.path().join("firmware.bin"), &[0xe9, 0x00]).unwrap();

        let components = demo_components(&project);
        extract_components(build.path(), &components).unwrap();

        let bootloader = fs::read(components.bootloader_path()).unwrap();
        assert_eq!(bootloader.len(), 4096);
        assert_eq!(bootloader[0], 0xe9);
        assert!(bootloader[1..].iter().all(|&byte| byte == 0x00));

        let partitions = fs::read(components.partition_table_path()).unwrap();
        assert_eq!(partitions.len(), 4096);
        assert!(partitions.iter().all(|&byte| byte == 0x00));
    }
}
