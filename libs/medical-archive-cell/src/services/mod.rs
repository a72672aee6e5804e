pub mod archive;
pub mod attachment;

pub use archive::ArchiveService;
pub use attachment::AttachmentStore;
