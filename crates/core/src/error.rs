use stubscope_api::ApiError;
use stubscope_plugin::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StubIndexError {
    #[error("No serializer registered for stub: id={id}, name={name:?}")]
    SerializerNotFound { id: u32, name: Option<String> },
    #[error("Stub type {0:?} has no registered serializer")]
    UnregisteredStubType(String),
    #[error("Stub codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Collaborator error: {0}")]
    Api(#[from] ApiError),
    #[error("Forward index encoding error: {0}")]
    IndexEncode(#[from] rmp_serde::encode::Error),
    #[error("Forward index decoding error: {0}")]
    IndexDecode(#[from] rmp_serde::decode::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization unavailable: name dictionary is corrupted")]
    SerializationUnavailable,
    #[error("Name dictionary repair failed: {0}")]
    Repair(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StubIndexError>;
