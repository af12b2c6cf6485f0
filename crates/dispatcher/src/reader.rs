use std::io;
use std::path::Path;

use bytes::Bytes;

/// Read a whole file into memory.
pub async fn read_as_byte_array(path: impl AsRef<Path>) -> io::Result<Bytes> {
    let data = tokio::fs::read(path.as_ref()).await?;
    Ok(Bytes::from(data))
}

/// Job name for a file: its final component, or the whole path when it
/// has none.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
