//! Filesystem-backed storage: blobs for offloaded execution history and
//! artifact bytes.

pub mod artifact;
pub mod blob;

pub use artifact::FilesystemArtifactStore;
pub use blob::FilesystemBlobStore;
