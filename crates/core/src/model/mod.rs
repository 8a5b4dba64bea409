mod answers;
mod cursor;
mod ids;
mod question;
mod subject;

pub use answers::AnswerSheet;
pub use cursor::Cursor;
pub use ids::{QuestionId, StudentId, SubjectId, SubmissionId};
pub use question::{Question, QuestionError};
pub use subject::{Subject, SubjectBlock};
