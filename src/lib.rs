pub mod file_bridge;

pub use file_bridge::{
    build_directory_plan, parse_listing, BridgeConfig, BridgeError, ByteStream, ExecOutput,
    ExecRunner, FileBridge, FileEntry, FileKind, UploadItem, UploadSummary, ZipDownload,
};
