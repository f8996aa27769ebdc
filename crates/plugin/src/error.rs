use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of stub stream")]
    UnexpectedEof,
    #[error("varint overflow")]
    VarintOverflow,
    #[error("invalid utf-8 in stub stream")]
    InvalidUtf8,
    #[error("malformed stub stream: {0}")]
    Malformed(String),
    #[error("name id {0} is not in the dictionary")]
    UnknownName(u32),
    #[error("name dictionary failure: {0}")]
    Names(#[source] std::io::Error),
}
