// Path-scoped, read-only views over a shared `Document`
//
// A `Resource` is a shared document plus a base path. Every read joins the
// base path with a relative path and runs the resulting `Query` against the
// whole document; nothing is copied or converted up front. Child views only
// ever extend the base path, so a view never reads outside its own subtree.

use crate::document::{Document, NodeId};
use crate::query::{Match, Query, QueryError};
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Format of every timestamp in the export API (`20160111104208`).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Missing required field: {path}")]
    Missing { path: String },

    #[error("Field {path} is not an integer: {value:?}")]
    NotAnInteger { path: String, value: String },

    #[error("Field {path} is not a timestamp: {value:?}")]
    InvalidTimestamp { path: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Resource {
    document: Arc<Document>,
    base_path: String,
}

impl Resource {
    pub fn new(document: Arc<Document>, base_path: impl Into<String>) -> Self {
        Self {
            document,
            base_path: base_path.into(),
        }
    }

    /// A resource scoped to the document root.
    pub fn root(document: Arc<Document>) -> Self {
        Self::new(document, "/")
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `true` when the underlying document has no content at all, as after a
    /// suppressed server failure.
    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// Absolute path of `relative` inside this scope.
    pub fn path(&self, relative: &str) -> String {
        format!("{}{}", self.base_path, relative)
    }

    /// Text of `relative`, or `None` when it matches nothing. Text of several
    /// matches is joined in document order.
    ///
    /// # Panics
    ///
    /// Panics if the joined path is not a valid query, which is a bug in the
    /// caller. Use [`Resource::try_text`] for paths built at runtime.
    pub fn text(&self, relative: &str) -> Option<String> {
        self.try_text(relative).unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn text_or(&self, relative: &str, default: &str) -> String {
        self.text(relative).unwrap_or_else(|| default.to_string())
    }

    pub fn try_text(&self, relative: &str) -> Result<Option<String>, QueryError> {
        let query = Query::parse(&text_path(&self.path(relative)))?;
        let matches = query.evaluate(&self.document);
        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            matches
                .iter()
                .map(|m| m.string_value(&self.document))
                .collect(),
        ))
    }

    /// Value of attribute `name` on the element at `relative`.
    pub fn attribute(&self, relative: &str, name: &str) -> Option<String> {
        let path = format!("{}/@{}", self.path(relative).trim_end_matches('/'), name);
        let query = Query::parse(&path).unwrap_or_else(|e| panic!("{}", e));
        query
            .evaluate(&self.document)
            .into_iter()
            .find_map(|m| match m {
                Match::Attribute { value, .. } => Some(value.to_string()),
                Match::Node(_) => None,
            })
    }

    /// Element matches of `relative` in document order.
    pub fn nodes(&self, relative: &str) -> Vec<NodeId> {
        self.try_nodes(relative).unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn try_nodes(&self, relative: &str) -> Result<Vec<NodeId>, QueryError> {
        let query = Query::parse(&self.path(relative))?;
        Ok(query.select_nodes(&self.document))
    }

    pub fn count(&self, relative: &str) -> usize {
        self.nodes(relative).len()
    }

    /// Required integer field. Both absence and non-numeric text are errors:
    /// either one means the response does not have the expected shape.
    pub fn int(&self, relative: &str) -> Result<i64, FieldError> {
        self.int_opt(relative)?.ok_or_else(|| FieldError::Missing {
            path: self.path(relative),
        })
    }

    pub fn int_opt(&self, relative: &str) -> Result<Option<i64>, FieldError> {
        match self.text(relative) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| FieldError::NotAnInteger {
                    path: self.path(relative),
                    value,
                }),
        }
    }

    /// `true` only if the field is present and equal to `sentinel`.
    pub fn flag(&self, relative: &str, sentinel: &str) -> bool {
        self.text(relative).as_deref() == Some(sentinel)
    }

    pub fn timestamp(&self, relative: &str) -> Result<Option<NaiveDateTime>, FieldError> {
        match self.text(relative) {
            None => Ok(None),
            Some(value) => NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
                .map(Some)
                .map_err(|_| FieldError::InvalidTimestamp {
                    path: self.path(relative),
                    value,
                }),
        }
    }

    /// A view of another entity type over this same scope.
    pub fn child<T: Entity>(&self) -> T {
        T::from_resource(self.clone())
    }

    /// A view scoped to the single element at `relative`.
    pub fn scoped<T: Entity>(&self, relative: &str) -> T {
        T::from_resource(Resource::new(
            Arc::clone(&self.document),
            format!("{}/", self.path(relative).trim_end_matches('/')),
        ))
    }

    /// One view per repetition of `relative`, each anchored to its own element
    /// with a 1-based position.
    pub fn collection<T: Entity>(&self, relative: &str) -> Vec<T> {
        let relative = relative.trim_end_matches('/');
        (1..=self.count(relative))
            .map(|position| self.scoped(&format!("{}[{}]", relative, position)))
            .collect()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.document.as_ref(), f)
    }
}

fn text_path(path: &str) -> String {
    if path.ends_with('/') {
        format!("{}text()", path)
    } else {
        format!("{}/text()", path)
    }
}

/// A typed view over a [`Resource`].
pub trait Entity: Sized {
    /// Base path used when the entity is built straight from a response.
    const ANCHOR: &'static str = "/";

    fn from_resource(resource: Resource) -> Self;

    fn resource(&self) -> &Resource;

    fn from_document(document: Arc<Document>) -> Self {
        Self::from_resource(Resource::new(document, Self::ANCHOR))
    }
}

impl Entity for Resource {
    fn from_resource(resource: Resource) -> Self {
        resource
    }

    fn resource(&self) -> &Resource {
        self
    }
}

/// Declares a newtype entity over [`Resource`].
macro_rules! entity {
    ($(#[$meta:meta])* $name:ident => $anchor:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name($crate::resource::Resource);

        impl $crate::resource::Entity for $name {
            const ANCHOR: &'static str = $anchor;

            fn from_resource(resource: $crate::resource::Resource) -> Self {
                Self(resource)
            }

            fn resource(&self) -> &$crate::resource::Resource {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
    ($(#[$meta:meta])* $name:ident) => {
        entity!($(#[$meta])* $name => "/");
    };
}

pub(crate) use entity;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const COURSE: &str = r#"
<PREDMET_INFO>
  <PREDMET_ID>123456</PREDMET_ID>
  <KOD_PREDMETU> PB161 </KOD_PREDMETU>
  <NAZEV>Programování</NAZEV>
  <STAV>a</STAV>
  <ZMENENO>20160111104208</ZMENENO>
  <SEMINARE>
    <SEMINAR><OZNACENI>01</OZNACENI><MAX>15</MAX></SEMINAR>
    <SEMINAR><OZNACENI>02</OZNACENI><MAX>x</MAX><POZNAMKA>late</POZNAMKA></SEMINAR>
    <SEMINAR><OZNACENI>03</OZNACENI></SEMINAR>
  </SEMINARE>
</PREDMET_INFO>
"#;

    entity!(Course => "/PREDMET_INFO/");
    entity!(Group);

    fn course() -> Course {
        Course::from_document(Arc::new(Document::parse(COURSE).unwrap()))
    }

    #[test]
    fn test_text_reads_relative_to_base() {
        let course = course();
        assert_eq!(course.resource().base_path(), "/PREDMET_INFO/");
        assert_eq!(course.resource().text("NAZEV").as_deref(), Some("Programování"));
        assert_eq!(course.resource().text("KOD_PREDMETU").as_deref(), Some(" PB161 "));
    }

    #[test_case("POZNAMKA", "n/a", "n/a"; "absent uses default")]
    #[test_case("POZNAMKA", "", ""; "absent uses empty default")]
    #[test_case("SEMINARE/CVICENI", "none", "none"; "absent nested path")]
    #[test_case("NAZEV", "n/a", "Programování"; "present ignores default")]
    fn test_text_or(path: &str, default: &str, expected: &str) {
        assert_eq!(course().resource().text_or(path, default), expected);
    }

    #[test]
    fn test_absent_text_is_none() {
        let course = course();
        assert_eq!(course.resource().text("POZNAMKA"), None);
        assert_eq!(course.resource().try_text("POZNAMKA"), Ok(None));
    }

    #[test]
    fn test_whitespace_only_text_is_literal() {
        let doc = Document::parse(
            "<BLOKY_OBSAH>\n  <STUDENT>\n    <OBSAH>   </OBSAH>\n  </STUDENT>\n</BLOKY_OBSAH>",
        )
        .unwrap();
        let resource = Resource::new(Arc::new(doc), "/BLOKY_OBSAH/STUDENT[1]/");
        assert_eq!(resource.text("OBSAH").as_deref(), Some("   "));
    }

    #[test]
    fn test_int_parses_and_rejects() {
        let course = course();
        let resource = course.resource();
        assert_eq!(resource.int("PREDMET_ID"), Ok(123456));
        assert_eq!(
            resource.int("NAZEV"),
            Err(FieldError::NotAnInteger {
                path: "/PREDMET_INFO/NAZEV".to_string(),
                value: "Programování".to_string(),
            })
        );
        assert_eq!(
            resource.int("MISSING"),
            Err(FieldError::Missing {
                path: "/PREDMET_INFO/MISSING".to_string()
            })
        );
        assert_eq!(resource.int_opt("MISSING"), Ok(None));
    }

    #[test_case("STAV", "a", true; "sentinel matches")]
    #[test_case("STAV", "n", false; "other value")]
    #[test_case("MISSING", "a", false; "absent")]
    fn test_flag(path: &str, sentinel: &str, expected: bool) {
        assert_eq!(course().resource().flag(path, sentinel), expected);
    }

    #[test]
    fn test_timestamp() {
        let course = course();
        let parsed = course.resource().timestamp("ZMENENO").unwrap().unwrap();
        assert_eq!(parsed.to_string(), "2016-01-11 10:42:08");
        assert_eq!(course.resource().timestamp("MISSING"), Ok(None));
        assert!(course.resource().timestamp("NAZEV").is_err());
    }

    #[test]
    fn test_collection_length_matches_repetitions() {
        let course = course();
        let groups: Vec<Group> = course.resource().collection("SEMINARE/SEMINAR");
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].resource().base_path(), "/PREDMET_INFO/SEMINARE/SEMINAR[2]/");

        let none: Vec<Group> = course.resource().collection("SEMINARE/CVICENI");
        assert!(none.is_empty());
    }

    #[test]
    fn test_collection_elements_are_independent() {
        let course = course();
        let groups: Vec<Group> = course.resource().collection("SEMINARE/SEMINAR");
        let labels: Vec<_> = groups
            .iter()
            .map(|g| g.resource().text("OZNACENI").unwrap())
            .collect();
        assert_eq!(labels, vec!["01", "02", "03"]);

        // a sibling's field never leaks into another element
        assert_eq!(groups[0].resource().text("POZNAMKA"), None);
        assert_eq!(groups[1].resource().text("POZNAMKA").as_deref(), Some("late"));
        assert_eq!(groups[2].resource().int_opt("MAX"), Ok(None));
        assert!(groups[1].resource().int("MAX").is_err());
    }

    #[test]
    fn test_child_shares_scope_and_document() {
        let course = course();
        let same: Group = course.resource().child();
        assert_eq!(same.resource().base_path(), course.resource().base_path());
        assert!(Arc::ptr_eq(
            same.resource().document(),
            course.resource().document()
        ));
    }

    #[test]
    fn test_attribute() {
        let doc = Arc::new(Document::parse(r#"<A><B code="x"/></A>"#).unwrap());
        let resource = Resource::new(doc, "/A/");
        assert_eq!(resource.attribute("B", "code").as_deref(), Some("x"));
        assert_eq!(resource.attribute("B", "name"), None);
    }

    #[test]
    fn test_malformed_relative_path_is_reported() {
        let course = course();
        assert!(course.resource().try_text("SEMINAR[0]").is_err());
        assert!(course.resource().try_nodes("SEMINAR[").is_err());
    }

    #[test]
    #[should_panic]
    fn test_malformed_path_panics() {
        course().resource().text("SEMINAR[0]");
    }

    #[test]
    fn test_display_writes_document() {
        let course = course();
        let xml = course.to_string();
        assert!(xml.starts_with("<PREDMET_INFO><PREDMET_ID>123456</PREDMET_ID>"));
    }
}
