use chrono::{DateTime, TimeZone, Utc};
use octofhir_cda::*;
use std::sync::Once;

pub const LOINC: &str = "2.16.840.1.113883.6.1";
pub const US_REALM_HEADER: &str = "2.16.840.1.113883.10.20.22.1.1";
pub const CCD: &str = "2.16.840.1.113883.10.20.22.1.2";
pub const PROGRESS_NOTE: &str = "2.16.840.1.113883.10.20.22.1.9";

static TRACING: Once = Once::new();

/// Install a test subscriber once; filter with `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[allow(dead_code)]
pub fn timestamp(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn loinc(code: &str) -> CodedValue {
    CodedValue::new(code, LOINC)
}

#[allow(dead_code)]
pub fn observation(code: &str) -> Entry {
    Entry::Observation(ClinicalStatement::new(loinc(code)))
}

#[allow(dead_code)]
pub fn coded_section(code: &str, entries: &[&str]) -> Section {
    entries
        .iter()
        .fold(Section::new().with_code(loinc(code)), |section, entry| {
            section.with_entry(observation(entry))
        })
}

#[allow(dead_code)]
pub fn create_test_document(id: &str) -> ClinicalDocument {
    ClinicalDocument::new(InstanceIdentifier::new(id), timestamp(1))
        .with_template_id(InstanceIdentifier::new(US_REALM_HEADER))
        .with_code(loinc("34133-9"))
        .with_title("Summary of Care")
        .with_record_target(Participant::named("Jane Doe"))
        .with_author(Author::new(Participant::named("Dr. Adams")))
        .with_section(coded_section("48765-2", &["Z88.0"]))
        .with_section(coded_section("10160-0", &["197361"]))
}

/// Header template, a section-bearing CCD on top of it, and a progress note sharing the header.
#[allow(dead_code)]
pub fn create_test_catalog_json() -> &'static str {
    r#"{
        "name": "test C-CDA",
        "templates": [
            {
                "templateId": "2.16.840.1.113883.10.20.22.1.1",
                "name": "US Realm Header",
                "requiredElements": ["id", "effectiveTime"],
                "constraints": [
                    {"elementPath": "recordTarget", "cardinality": {"min": 1}},
                    {"elementPath": "author", "cardinality": {"min": 1}},
                    {"elementPath": "languageCode", "cardinality": {"min": 0, "max": 1}}
                ],
                "status": "active",
                "author": "HL7 Structured Documents",
                "publicationDate": "2015-08-01"
            },
            {
                "templateId": "2.16.840.1.113883.10.20.22.1.2",
                "name": "Continuity of Care Document",
                "parentTemplateIds": ["2.16.840.1.113883.10.20.22.1.1"],
                "constraints": [
                    {"elementPath": "code/@code", "valueConstraint": "34133-9"},
                    {"elementPath": "component/structuredBody/section", "cardinality": {"min": 2}}
                ],
                "valueSetBindings": {"code": "2.16.840.1.113883.1.11.20.22"},
                "status": "active",
                "author": "HL7 Structured Documents",
                "tags": ["CCD"]
            },
            {
                "templateId": "2.16.840.1.113883.10.20.22.1.9",
                "name": "Progress Note",
                "parentTemplateIds": ["2.16.840.1.113883.10.20.22.1.1"],
                "constraints": [
                    {"elementPath": "code/@code", "valueConstraint": "11506-3"}
                ],
                "status": "draft",
                "tags": ["progress-note"]
            }
        ]
    }"#
}

#[allow(dead_code)]
pub async fn create_test_engine() -> TemplateEngine {
    init_tracing();
    let engine = TemplateEngine::new(EngineConfig::default()).unwrap();
    engine
        .load_catalog_str(create_test_catalog_json())
        .await
        .unwrap();
    engine
}
