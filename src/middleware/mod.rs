/// Middleware module
///
/// Bearer-token gate and the subject checks it can be configured with.

mod jwt_middleware;
mod subject_check;

pub use jwt_middleware::{bearer_token, AuthenticatedSubject, BearerAuth, BearerToken};
pub use subject_check::{LocalSubjectCheck, RemoteSubjectCheck, SubjectCheck};
