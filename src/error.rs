use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::session::SessionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Construct a 404 error with a helpful message.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found."))
    }
}

impl From<SessionError> for Error {
    /// Map a rejected ballot session operation onto a stable status code.
    fn from(err: SessionError) -> Self {
        let status = match err {
            SessionError::SessionOver
            | SessionError::SubmissionInProgress
            | SessionError::EmptyBallot => Status::Conflict,
            SessionError::PositionNotCurrent | SessionError::CandidateNotInPosition => {
                Status::UnprocessableEntity
            }
            SessionError::NoSelection
            | SessionError::NotAtFinalStep
            | SessionError::IncompleteBallot => Status::BadRequest,
        };
        Self::Status(status, err.to_string())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = match &self {
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Status(status, _) => *status,
        };
        if status.code >= 500 {
            error!("{status}: {self}");
        } else {
            warn!("{status}: {self}");
        }
        Err(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_stable_statuses() {
        let conflict: Error = SessionError::SessionOver.into();
        let bad_request: Error = SessionError::NoSelection.into();
        let unprocessable: Error = SessionError::CandidateNotInPosition.into();

        assert!(matches!(conflict, Error::Status(Status::Conflict, _)));
        assert!(matches!(bad_request, Error::Status(Status::BadRequest, _)));
        assert!(matches!(
            unprocessable,
            Error::Status(Status::UnprocessableEntity, _)
        ));
    }
}
