// Typed views over the export API responses
//
// Every entity is a thin wrapper around a `Resource`; fields are read lazily
// from the shared response document each time they are called.

use crate::resource::{entity, Entity, FieldError};
use chrono::NaiveDateTime;

/// Sentinel of `STUDENT_NEMA_SEMINAR` for a student without a seminar group.
pub const NO_SEMINAR: &str = "1";

/// The API's "yes" for notepad switches.
pub const YES: &str = "a";

// Common fields of everybody with a university id
pub trait Person: Entity {
    fn first_name(&self) -> Option<String> {
        self.resource().text("JMENO")
    }

    fn last_name(&self) -> Option<String> {
        self.resource().text("PRIJMENI")
    }

    /// Name including academic titles.
    fn full_name(&self) -> Option<String> {
        self.resource().text("CELE_JMENO")
    }

    fn uco(&self) -> Result<i64, FieldError> {
        self.resource().int("UCO")
    }
}

entity!(
    /// Who last changed a record, and when.
    Changed
);

impl Changed {
    pub fn person(&self) -> Option<String> {
        self.0.text("ZMENIL")
    }

    /// `ZMENIL` read as a UCO. The API sends the numeric id there; any other
    /// value is reported as `FieldError::NotAnInteger`, use [`Changed::person`]
    /// for the raw text.
    pub fn person_uco(&self) -> Result<Option<i64>, FieldError> {
        self.0.int_opt("ZMENIL")
    }

    /// Raw `YYYYMMDDHHMMSS` value.
    pub fn date(&self) -> Option<String> {
        self.0.text("ZMENENO")
    }

    pub fn date_time(&self) -> Result<Option<NaiveDateTime>, FieldError> {
        self.0.timestamp("ZMENENO")
    }
}

// ---------------------------------------------------------------------------
// predmet-info
// ---------------------------------------------------------------------------

entity!(
    /// Response of `predmet-info`.
    CourseInfo => "/PREDMET_INFO/"
);

impl CourseInfo {
    pub fn course(&self) -> CourseSub {
        self.0.child()
    }

    pub fn faculty(&self) -> FacultySub {
        self.0.child()
    }

    pub fn seminars(&self) -> Vec<Seminar> {
        self.0.collection("SEMINARE/SEMINAR")
    }

    pub fn teachers(&self) -> Vec<Teacher> {
        self.0.collection("VYUCUJICI_SEZNAM/VYUCUJICI")
    }
}

entity!(CourseSub);

impl CourseSub {
    pub fn id(&self) -> Result<i64, FieldError> {
        self.0.int("PREDMET_ID")
    }

    pub fn name(&self) -> Option<String> {
        self.0.text("NAZEV_PREDMETU")
    }

    pub fn name_eng(&self) -> Option<String> {
        self.0.text("NAZEV_PREDMETU_ANGL")
    }

    pub fn code(&self) -> Option<String> {
        self.0.text("KOD_PREDMETU")
    }

    pub fn number_of_students(&self) -> Result<i64, FieldError> {
        self.0.int("POCET_ZAPSANYCH_STUDENTU")
    }

    pub fn number_of_registered_students(&self) -> Result<i64, FieldError> {
        self.0.int("POCET_ZAREG_STUDENTU")
    }
}

entity!(FacultySub);

impl FacultySub {
    pub fn id(&self) -> Result<i64, FieldError> {
        self.0.int("FAKULTA_ID")
    }

    pub fn shortcut(&self) -> Option<String> {
        self.0.text("FAKULTA_ZKRATKA_DOM")
    }
}

entity!(
    /// One seminar group of a course.
    Seminar
);

impl Seminar {
    pub fn id(&self) -> Result<i64, FieldError> {
        self.0.int("SEMINAR_ID")
    }

    pub fn label(&self) -> Option<String> {
        self.0.text("OZNACENI")
    }

    pub fn note(&self) -> Option<String> {
        self.0.text("POZNAMKA")
    }

    pub fn changed(&self) -> Changed {
        self.0.child()
    }

    pub fn dates(&self) -> SeminarDates {
        self.0.child()
    }

    pub fn students(&self) -> SeminarCapacity {
        self.0.child()
    }
}

entity!(SeminarCapacity);

impl SeminarCapacity {
    pub fn max(&self) -> Result<i64, FieldError> {
        self.0.int("MAX_STUDENTU")
    }

    pub fn count(&self) -> Result<i64, FieldError> {
        self.0.int("POCET_STUDENTU_VE_SKUPINE")
    }
}

entity!(
    /// Sign-in window of a seminar.
    SeminarDates
);

impl SeminarDates {
    pub fn signin_from(&self) -> Option<String> {
        self.0.text("PRIHLASIT_OD")
    }

    pub fn signin_to(&self) -> Option<String> {
        self.0.text("PRIHLASIT_DO")
    }

    pub fn signout_to(&self) -> Option<String> {
        self.0.text("ODHLASIT_DO")
    }

    pub fn signin_from_at(&self) -> Result<Option<NaiveDateTime>, FieldError> {
        self.0.timestamp("PRIHLASIT_OD")
    }

    pub fn signin_to_at(&self) -> Result<Option<NaiveDateTime>, FieldError> {
        self.0.timestamp("PRIHLASIT_DO")
    }

    pub fn signout_to_at(&self) -> Result<Option<NaiveDateTime>, FieldError> {
        self.0.timestamp("ODHLASIT_DO")
    }
}

entity!(Teacher);

impl Person for Teacher {}

impl Teacher {
    pub fn role(&self) -> Option<String> {
        self.0.text("ROLE")
    }
}

// ---------------------------------------------------------------------------
// predmet-seznam, seminar-seznam, seminar-cvicici-seznam
// ---------------------------------------------------------------------------

entity!(
    /// Response of `predmet-seznam`.
    CourseStudents => "/PREDMET_STUDENTI_INFO/"
);

impl CourseStudents {
    pub fn students(&self) -> Vec<Student> {
        self.0.collection("STUDENT")
    }
}

entity!(
    /// Response of `seminar-seznam`, grouped by seminar.
    SeminarStudents => "/SEMINAR_STUDENTI_INFO/"
);

impl SeminarStudents {
    pub fn seminars(&self) -> Vec<SeminarRoster> {
        self.0.collection("SEMINAR")
    }
}

entity!(SeminarRoster);

impl SeminarRoster {
    pub fn id(&self) -> Result<i64, FieldError> {
        self.0.int("SEMINAR_ID")
    }

    pub fn label(&self) -> Option<String> {
        self.0.text("OZNACENI")
    }

    pub fn students(&self) -> Vec<Student> {
        self.0.collection("STUDENT")
    }
}

entity!(Student);

impl Person for Student {}

impl Student {
    pub fn study_status(&self) -> Option<String> {
        self.0.text("STAV_STUDIA")
    }

    pub fn registration_status(&self) -> Option<String> {
        self.0.text("STAV_ZAPISU")
    }

    /// Completion code of the course (`z`, `k`, ...).
    pub fn course_termination(&self) -> Option<String> {
        self.0.text("UKONCENI")
    }

    pub fn has_no_seminar(&self) -> bool {
        self.0.flag("STUDENT_NEMA_SEMINAR", NO_SEMINAR)
    }

    pub fn has_seminar(&self) -> bool {
        !self.has_no_seminar()
    }
}

entity!(
    /// Response of `seminar-cvicici-seznam`.
    SeminarTeachers => "/SEMINAR_CVICICI_INFO/"
);

impl SeminarTeachers {
    pub fn seminars(&self) -> Vec<SeminarTeacherList> {
        self.0.collection("SEMINAR")
    }
}

entity!(SeminarTeacherList);

impl SeminarTeacherList {
    pub fn id(&self) -> Result<i64, FieldError> {
        self.0.int("SEMINAR_ID")
    }

    pub fn label(&self) -> Option<String> {
        self.0.text("OZNACENI")
    }

    pub fn teachers(&self) -> Vec<Teacher> {
        self.0.collection("CVICICI")
    }
}

// ---------------------------------------------------------------------------
// Notepads
// ---------------------------------------------------------------------------

entity!(
    /// Response of `blok-dej-obsah`: one entry per student.
    NotepadContent => "/BLOKY_OBSAH/"
);

impl NotepadContent {
    pub fn students(&self) -> Vec<NotepadEntry> {
        self.0.collection("STUDENT")
    }

    pub fn find(&self, uco: i64) -> Option<NotepadEntry> {
        self.students()
            .into_iter()
            .find(|entry| entry.uco().ok() == Some(uco))
    }
}

entity!(NotepadEntry);

impl NotepadEntry {
    pub fn uco(&self) -> Result<i64, FieldError> {
        self.0.int("UCO")
    }

    pub fn content(&self) -> Option<String> {
        self.0.text("OBSAH")
    }

    pub fn changed(&self) -> Changed {
        self.0.child()
    }
}

entity!(
    /// Response of `bloky-seznam`.
    NotesList => "/POZN_BLOKY_INFO/"
);

impl NotesList {
    pub fn notes(&self) -> Vec<NoteInfo> {
        self.0.collection("POZN_BLOK")
    }

    pub fn by_shortcut(&self, shortcut: &str) -> Option<NoteInfo> {
        self.notes()
            .into_iter()
            .find(|note| note.shortcut().as_deref() == Some(shortcut))
    }
}

entity!(NoteInfo);

impl NoteInfo {
    pub fn id(&self) -> Result<i64, FieldError> {
        self.0.int("BLOK_ID")
    }

    pub fn name(&self) -> Option<String> {
        self.0.text("JMENO")
    }

    pub fn shortcut(&self) -> Option<String> {
        self.0.text("ZKRATKA")
    }

    pub fn type_id(&self) -> Result<Option<i64>, FieldError> {
        self.0.int_opt("TYP_ID")
    }

    pub fn type_name(&self) -> Option<String> {
        self.0.text("TYP_NAZEV")
    }

    pub fn show_statistic(&self) -> bool {
        self.0.flag("STUDENTOVI_ZOBRAZIT_STATISTIKU", YES)
    }

    pub fn visible_to_student(&self) -> bool {
        self.0.flag("STUDENT_NAHLIZI", YES)
    }

    pub fn changed(&self) -> Changed {
        self.0.child()
    }
}

// ---------------------------------------------------------------------------
// terminy-seznam
// ---------------------------------------------------------------------------

entity!(
    /// Response of `terminy-seznam`.
    Exams => "/TERMINY_INFO/"
);

impl Exams {
    pub fn series(&self) -> Vec<ExamSeries> {
        self.0.collection("SERIE")
    }
}

entity!(ExamSeries);

impl ExamSeries {
    pub fn id(&self) -> Result<i64, FieldError> {
        self.0.int("SERIE_ID")
    }

    pub fn name(&self) -> Option<String> {
        self.0.text("NAZEV")
    }

    pub fn terms(&self) -> Vec<ExamTerm> {
        self.0.collection("TERMIN")
    }
}

entity!(ExamTerm);

impl ExamTerm {
    pub fn id(&self) -> Result<i64, FieldError> {
        self.0.int("TERMIN_ID")
    }

    pub fn starts(&self) -> Option<String> {
        self.0.text("DATUM_OD")
    }

    pub fn starts_at(&self) -> Result<Option<NaiveDateTime>, FieldError> {
        self.0.timestamp("DATUM_OD")
    }

    pub fn room(&self) -> Option<String> {
        self.0.text("MISTNOST")
    }

    pub fn capacity(&self) -> Result<Option<i64>, FieldError> {
        self.0.int_opt("MAX_STUDENTU")
    }

    pub fn signed_in(&self) -> Result<Option<i64>, FieldError> {
        self.0.int_opt("POCET_PRIHLASENYCH")
    }

    pub fn students(&self) -> Vec<ExamStudent> {
        self.0.collection("STUDENT")
    }
}

entity!(ExamStudent);

impl Person for ExamStudent {}

// ---------------------------------------------------------------------------
// Write operations
// ---------------------------------------------------------------------------

entity!(
    /// Acknowledgement of `blok-novy` and `blok-pis-student-obsah`.
    WriteResult
);

impl WriteResult {
    pub fn is_ok(&self) -> bool {
        self.0.flag("ZAPIS", "OK")
    }

    pub fn message(&self) -> Option<String> {
        self.0.text("*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::samples;
    use std::sync::Arc;

    fn load<T: Entity>(xml: &str) -> T {
        T::from_document(Arc::new(Document::parse(xml).unwrap()))
    }

    #[test]
    fn test_course_info() {
        let info: CourseInfo = load(samples::PREDMET_INFO);

        assert_eq!(info.faculty().id(), Ok(101));
        assert_eq!(info.faculty().shortcut().as_deref(), Some("fi"));

        let course = info.course();
        assert_eq!(course.name().as_deref(), Some("Programování v jazyce C++"));
        assert_eq!(course.name_eng().as_deref(), Some("C++ Programming"));
        assert_eq!(course.code().as_deref(), Some("PB161"));
        assert_eq!(course.number_of_registered_students(), Ok(120));
        assert_eq!(course.number_of_students(), Ok(110));
        assert_eq!(course.id(), Ok(123456));
    }

    #[test]
    fn test_course_info_seminar() {
        let info: CourseInfo = load(samples::PREDMET_INFO);
        let seminars = info.seminars();
        assert_eq!(seminars.len(), 1);

        let seminar = &seminars[0];
        assert_eq!(seminar.id(), Ok(12364));
        assert_eq!(seminar.label().as_deref(), Some("01"));
        assert_eq!(seminar.students().count(), Ok(15));
        assert_eq!(seminar.students().max(), Ok(15));
        assert_eq!(seminar.note(), None);
        assert_eq!(seminar.dates().signin_from().as_deref(), Some("20150901180000"));
        assert_eq!(seminar.dates().signin_to().as_deref(), Some("20151004000000"));
        assert_eq!(
            seminar.dates().signin_from_at().unwrap().unwrap().to_string(),
            "2015-09-01 18:00:00"
        );
        assert_eq!(seminar.changed().person_uco(), Ok(Some(1234)));
    }

    #[test]
    fn test_course_info_teachers() {
        let info: CourseInfo = load(samples::PREDMET_INFO);
        let teachers = info.teachers();
        assert_eq!(teachers.len(), 2);
        assert_eq!(teachers[0].uco(), Ok(1234));
        assert_eq!(teachers[0].last_name().as_deref(), Some("Novák"));
        assert_eq!(teachers[1].role().as_deref(), Some("cvičící"));
        assert_eq!(teachers[1].full_name().as_deref(), Some("Bc. Eva Malá"));
    }

    #[test]
    fn test_notepad_content() {
        let content: NotepadContent = load(samples::BLOK_DEJ_OBSAH);
        let students = content.students();
        assert_eq!(students.len(), 2);

        assert_eq!(students[0].uco(), Ok(444111000));
        assert_eq!(students[0].changed().date().as_deref(), Some("20160111104208"));
        assert_eq!(students[0].content().as_deref(), Some("25 bodů"));

        assert_eq!(students[1].uco(), Ok(444111001));
        assert_eq!(
            students[1].content().as_deref(),
            Some("*12 bodů – opraveno, žluťoučký kůň")
        );
        assert_eq!(
            content.find(444111001).and_then(|e| e.changed().person()),
            Some("5678".to_string())
        );
        assert!(content.find(1).is_none());
    }

    #[test]
    fn test_course_students() {
        let list: CourseStudents = load(samples::PREDMET_SEZNAM);
        let students = list.students();
        assert_eq!(students.len(), 2);

        let student = &students[0];
        assert_eq!(student.uco(), Ok(444555666));
        assert_eq!(student.course_termination().as_deref(), Some("z"));
        assert_eq!(student.first_name().as_deref(), Some("Jan"));
        assert_eq!(student.last_name().as_deref(), Some("Hruska"));
        assert_eq!(student.full_name().as_deref(), Some("Mgr. Jan Hruska"));
        assert_eq!(student.study_status().as_deref(), Some("aktivní"));
        assert_eq!(student.registration_status().as_deref(), Some("zapsáno"));
        assert!(!student.has_seminar());

        // no STUDENT_NEMA_SEMINAR element at all
        assert!(students[1].has_seminar());
        assert!(!students[1].has_no_seminar());
    }

    #[test]
    fn test_seminar_students_are_grouped() {
        let list: SeminarStudents = load(samples::SEMINAR_SEZNAM);
        let seminars = list.seminars();
        assert_eq!(seminars.len(), 2);
        assert_eq!(seminars[0].label().as_deref(), Some("01"));
        assert_eq!(seminars[0].students().len(), 2);
        assert_eq!(seminars[1].id(), Ok(12365));

        let only = seminars[1].students();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].uco(), Ok(444555668));
        assert_eq!(only[0].course_termination(), None);
    }

    #[test]
    fn test_seminar_teachers() {
        let list: SeminarTeachers = load(samples::SEMINAR_CVICICI_SEZNAM);
        let seminars = list.seminars();
        assert_eq!(seminars.len(), 2);
        assert_eq!(seminars[0].teachers().len(), 1);
        assert_eq!(seminars[0].teachers()[0].uco(), Ok(5678));
        assert_eq!(seminars[0].teachers()[0].role(), None);
        assert!(seminars[1].teachers().is_empty());
    }

    #[test]
    fn test_notes_list() {
        let list: NotesList = load(samples::BLOKY_SEZNAM);
        let notes = list.notes();
        assert_eq!(notes.len(), 2);

        assert_eq!(notes[0].id(), Ok(370001));
        assert_eq!(notes[0].name().as_deref(), Some("Domácí úkol 1"));
        assert_eq!(notes[0].type_id(), Ok(Some(1)));
        assert!(notes[0].visible_to_student());
        assert!(!notes[0].show_statistic());
        assert_eq!(notes[0].changed().person().as_deref(), Some("1234"));

        let total = list.by_shortcut("total").unwrap();
        assert_eq!(total.type_id(), Ok(None));
        assert!(total.show_statistic());
        assert_eq!(total.changed().date(), None);
    }

    #[test]
    fn test_exams() {
        let exams: Exams = load(samples::TERMINY_SEZNAM);
        let series = exams.series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].name().as_deref(), Some("Zkouška"));

        let terms = series[0].terms();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].id(), Ok(77001));
        assert_eq!(terms[0].capacity(), Ok(Some(60)));
        assert_eq!(terms[0].students().len(), 2);
        assert_eq!(terms[0].students()[1].uco(), Ok(444555667));
        assert_eq!(terms[1].room().as_deref(), Some("D3"));
        assert_eq!(terms[1].signed_in(), Ok(None));
        assert!(terms[1].students().is_empty());
        assert_eq!(
            terms[1].starts_at().unwrap().unwrap().to_string(),
            "2016-01-25 09:00:00"
        );
    }

    #[test]
    fn test_write_result() {
        let ok: WriteResult = load(samples::ZAPIS_OK);
        assert!(ok.is_ok());
        assert_eq!(ok.message().as_deref(), Some("OK"));

        let failed: WriteResult = load(samples::CHYBA);
        assert!(!failed.is_ok());
    }

    #[test]
    fn test_changed_by_name_is_not_a_uco() {
        let entry: NotepadContent = load(
            "<BLOKY_OBSAH><STUDENT><UCO>1</UCO><ZMENIL>Novák</ZMENIL></STUDENT></BLOKY_OBSAH>",
        );
        let changed = entry.students()[0].changed();
        assert_eq!(changed.person().as_deref(), Some("Novák"));
        assert!(matches!(
            changed.person_uco(),
            Err(FieldError::NotAnInteger { .. })
        ));
        assert_eq!(changed.date_time(), Ok(None));
    }

    #[test]
    fn test_empty_document_reads_as_absent() {
        let info = CourseInfo::from_document(Arc::new(Document::empty()));
        assert!(info.resource().is_empty());
        assert!(info.seminars().is_empty());
        assert_eq!(info.course().name(), None);
        assert!(matches!(info.course().id(), Err(FieldError::Missing { .. })));
    }
}
