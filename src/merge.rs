//! Merging of flashing artifacts into a single padded flash image.

use std::fs;

use log::info;

use crate::error::Error;
use crate::esp32::{ComponentSet, ERASED_BYTE};

/// Merges `segments` of offset and data pairs into one contiguous image.
///
/// The image spans offset zero up to the highest `offset + len`; bytes not
/// covered by any segment keep the erased flash value. Overlapping segments
/// are not rejected, later segments overwrite earlier ones.
pub fn merge_segments<T: AsRef<[u8]>>(segments: &[(u32, T)]) -> Vec<u8> {
    let size = segments
        .iter()
        .map(|(offset, data)| *offset as usize + data.as_ref().len())
        .max()
        .unwrap_or(0);

    let mut image = vec![ERASED_BYTE; size];

    for (offset, data) in segments {
        let data = data.as_ref();
        let offset = *offset as usize;

        image[offset..offset + data.len()].copy_from_slice(data);
    }

    image
}

/// Merges the components of `components` into a single flash image.
///
/// Every component must exist; the existence check runs over the complete set
/// before any data is read so that a partial set never produces a partial
/// image.
pub fn merge_components(components: &ComponentSet) -> Result<(), Error> {
    info!("Merging firmware components into a single image");

    let regions = components.regions();

    for (_, path) in &regions {
        if !path.exists() {
            return Err(Error::MissingComponent(path.clone()));
        }
    }

    let mut segments = Vec::with_capacity(regions.len());

    for (offset, path) in &regions {
        let data = fs::read(path)?;

        info!(
            "Merging {} at offset {:#x} ({} bytes)",
            path.display(),
            offset,
            data.len()
        );

        segments.push((*offset, data));
    }

    let image = merge_segments(&segments);
    let merged_path = components.merged_path();

    fs::write(&merged_path, &image)?;

    info!(
        "Wrote merged image {} ({} bytes)",
        merged_path.display(),
        image.len()
    );

    Ok(())
}
