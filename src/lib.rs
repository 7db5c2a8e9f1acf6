// Typed client for the IS MUNI notepad export API

pub mod client;
pub mod document;
pub mod entities;
pub mod mapping;
pub mod params;
pub mod query;
pub mod resource;

#[cfg(test)]
mod samples;

// Re-export key types for convenience
pub use client::{
    ApiError, ClientConfig, ClientError, HttpTransport, IsApiClient, NewNotepad, NotepadUpdate,
    RawResponse, StudentFilter, Transport,
};
pub use document::{Document, DocumentError};
pub use entities::{
    CourseInfo, CourseStudents, Exams, NotepadContent, NotesList, Person, SeminarStudents,
    SeminarTeachers, WriteResult,
};
pub use params::Params;
pub use query::{Query, QueryError};
pub use resource::{Entity, FieldError, Resource};
