use thiserror::Error;

/// All errors generated in `hyperterm`.
///
/// Workers never surface these to the UI thread: transport errors are
/// retried, decode errors dropped. The variants exist for the binary's
/// startup/teardown paths and the UI-initiated action calls.
#[derive(Debug, Error)]
pub enum Error {
    #[error("stdin and stdout must both be interactive terminals")]
    NotATerminal,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket transport error: {0}")]
    Ws(#[from] Box<tungstenite::Error>),

    #[error("action rejected: {0}")]
    ActionRejected(String),
}

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        Error::Ws(Box::new(err))
    }
}
