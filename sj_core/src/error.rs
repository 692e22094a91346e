/*
This file is part of the Building Aggregration Tool
Copyright (C) 2022 Novel-T

The Building Aggregration Tool is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/
use std::fmt;

/// Error taxonomy for the join engine. `ParseError` and `InvalidGeometry` are
/// recoverable (the offending input line is skipped); every other kind is
/// fatal because downstream output correctness can no longer be guaranteed.
#[derive(Debug)]
pub enum SjError {
    ParseError(String),
    CacheIO(String),
    EventIO(String),
    WriteFailed(String),
    NotFlushed,
    InvalidGeometry(String),
}

impl SjError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SjError::ParseError(_) | SjError::InvalidGeometry(_))
    }
}

impl fmt::Display for SjError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SjError::ParseError(s) => write!(f, "parse error: {}", s),
            SjError::CacheIO(s) => write!(f, "cache io error: {}", s),
            SjError::EventIO(s) => write!(f, "event store io error: {}", s),
            SjError::WriteFailed(s) => write!(f, "output write failed: {}", s),
            SjError::NotFlushed => write!(f, "sweep() called before flush()"),
            SjError::InvalidGeometry(s) => write!(f, "invalid geometry: {}", s),
        }
    }
}

impl std::error::Error for SjError {}

impl From<std::io::Error> for SjError {
    fn from(e: std::io::Error) -> Self {
        SjError::CacheIO(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SjError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds() {
        assert!(SjError::ParseError("x".into()).is_recoverable());
        assert!(SjError::InvalidGeometry("x".into()).is_recoverable());
        assert!(!SjError::CacheIO("x".into()).is_recoverable());
        assert!(!SjError::NotFlushed.is_recoverable());
    }
}
