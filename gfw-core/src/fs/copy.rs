//! Whole-file copy into a destination tree.

use std::path::Path;

use tokio::fs::{self, File};
use tokio::io::{self, AsyncWriteExt};

use crate::error::{IngestError, Result};

/// Copy the full contents of `src` to `dst`, creating any missing parent
/// directories of `dst`. Returns the number of bytes written.
///
/// A failure leaves the destination in an unknown state: a partially written
/// `dst` is not cleaned up.
pub async fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    let mut input = File::open(src)
        .await
        .map_err(|err| IngestError::from_io(err, src))?;

    if let Some(parent) = dst.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| IngestError::from_io(err, parent))?;
    }

    let mut output = File::create(dst)
        .await
        .map_err(|err| IngestError::from_io(err, dst))?;

    let copied = io::copy(&mut input, &mut output)
        .await
        .map_err(|err| IngestError::from_io(err, dst))?;
    output
        .flush()
        .await
        .map_err(|err| IngestError::from_io(err, dst))?;

    Ok(copied)
}
