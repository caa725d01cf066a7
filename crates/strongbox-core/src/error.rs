use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrongboxError {
    #[error("Entry not found")]
    NotFound,

    #[error("Entry already exists")]
    AlreadyExists,

    #[error("Illegal filename")]
    IllegalFilename,

    #[error("Folder not empty")]
    FolderNotEmpty,

    #[error("Handle is not readable")]
    NotReadable,

    #[error("Handle is not writable")]
    NotWritable,

    #[error("Out of space: no free blocks available")]
    NoSpace,

    #[error("Corrupt image: {0}")]
    CorruptImage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StrongboxError>;
