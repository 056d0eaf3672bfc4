//! Image loader

use std::fs;
use std::io;
use std::path::Path;

use evm2_spec::{ImageError, ImageHeader, Program};
use tracing::debug;

/// Read and validate the image at `path`
pub fn load(path: &Path) -> evm2_spec::Result<Program> {
    let metadata = fs::metadata(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ImageError::MissingFile(path.to_path_buf()),
        _ => ImageError::Io(err),
    })?;

    if metadata.len() < ImageHeader::SIZE as u64 {
        return Err(ImageError::TooShort {
            expected: ImageHeader::SIZE,
            found: metadata.len() as usize,
        });
    }

    let program = Program::from_bytes(&fs::read(path)?)?;
    debug!(
        path = %path.display(),
        code_size = program.header.code_size,
        data_size = program.header.data_size,
        "image loaded"
    );
    Ok(program)
}
