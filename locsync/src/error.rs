use std::{io, str::Utf8Error};
use strum_macros::Display;
use thiserror::Error;

#[derive(Debug, Error, Display)]
pub enum Error {
    MissingRemote(String),
    PathCastingError(String),
    UnexpectedError(String),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::UnexpectedError(format!("{:?}", error))
    }
}

impl From<std::path::StripPrefixError> for Error {
    fn from(error: std::path::StripPrefixError) -> Self {
        Error::UnexpectedError(format!("Unable to strip prefix {:?}", error))
    }
}

impl From<Utf8Error> for Error {
    fn from(error: Utf8Error) -> Self {
        Error::UnexpectedError(format!("utf8 error {:?}", error))
    }
}
