//! Read-only view of a parsed CDA document tree.
//!
//! Field names serialize to their CDA element names (`author`, `setId`, `templateId`, ...) so
//! template element paths such as `code/@code` or `component/structuredBody/section/title`
//! resolve against the serialized form without a separate mapping table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CDA `II` data type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceIdentifier {
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl InstanceIdentifier {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: None,
        }
    }

    pub fn with_extension(root: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: Some(extension.into()),
        }
    }

    /// A fresh identifier with a random UUID root.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for InstanceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extension {
            Some(extension) => write!(f, "{}^{}", self.root, extension),
            None => write!(f, "{}", self.root),
        }
    }
}

/// CDA `CD`/`CE` data type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CodedValue {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_system_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CodedValue {
    pub fn new(code: impl Into<String>, code_system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            code_system: Some(code_system.into()),
            code_system_name: None,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Two codes denote the same concept when code and code system agree.
    pub fn same_concept(&self, other: &CodedValue) -> bool {
        self.code == other.code && self.code_system == other.code_system
    }
}

impl fmt::Display for CodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code_system {
            Some(system) => write!(f, "{}|{}", system, self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// A measured value with an optional UCUM unit.
///
/// Equality is structural over the canonical value: every NaN equals every other NaN and
/// `-0.0` equals `0.0`. Serialization writes the same canonical zero, so equal quantities
/// serialize identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalQuantity {
    #[serde(serialize_with = "serialize_canonical")]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl PhysicalQuantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: Some(unit.into()),
        }
    }
}

impl PartialEq for PhysicalQuantity {
    fn eq(&self, other: &Self) -> bool {
        canonical_bits(self.value) == canonical_bits(other.value) && self.unit == other.unit
    }
}

fn canonical(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

fn canonical_bits(value: f64) -> u64 {
    canonical(value).to_bits()
}

fn serialize_canonical<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(canonical(*value))
}

/// Typed entry value, tagged the way CDA tags `xsi:type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "xsiType")]
pub enum EntryValue {
    #[serde(rename = "CD")]
    Coded(CodedValue),
    #[serde(rename = "PQ")]
    PhysicalQuantity(PhysicalQuantity),
    #[serde(rename = "ST")]
    Text { value: String },
    #[serde(rename = "INT")]
    Integer { value: i64 },
    #[serde(rename = "BL")]
    Boolean { value: bool },
    #[serde(rename = "TS")]
    Timestamp { value: DateTime<Utc> },
}

/// Fields shared by every clinical statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<InstanceIdentifier>,
    pub code: CodedValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<EntryValue>,
}

impl ClinicalStatement {
    pub fn new(code: CodedValue) -> Self {
        Self {
            id: None,
            code,
            status_code: None,
            effective_time: None,
            value: None,
        }
    }

    pub fn with_id(mut self, id: InstanceIdentifier) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_status(mut self, status_code: impl Into<String>) -> Self {
        self.status_code = Some(status_code.into());
        self
    }

    pub fn with_effective_time(mut self, effective_time: DateTime<Utc>) -> Self {
        self.effective_time = Some(effective_time);
        self
    }

    pub fn with_value(mut self, value: EntryValue) -> Self {
        self.value = Some(value);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubstanceAdministration {
    #[serde(flatten)]
    pub statement: ClinicalStatement,
    pub consumable: CodedValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_quantity: Option<PhysicalQuantity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supply {
    #[serde(flatten)]
    pub statement: ClinicalStatement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<PhysicalQuantity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organizer {
    #[serde(flatten)]
    pub statement: ClinicalStatement,
    #[serde(rename = "component", default)]
    pub components: Vec<ClinicalStatement>,
}

/// Closed set of CDA clinical entry kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Entry {
    Observation(ClinicalStatement),
    Procedure(ClinicalStatement),
    Encounter(ClinicalStatement),
    Act(ClinicalStatement),
    SubstanceAdministration(SubstanceAdministration),
    Supply(Supply),
    Organizer(Organizer),
}

impl Entry {
    pub fn kind(&self) -> &'static str {
        match self {
            Entry::Observation(_) => "observation",
            Entry::Procedure(_) => "procedure",
            Entry::Encounter(_) => "encounter",
            Entry::Act(_) => "act",
            Entry::SubstanceAdministration(_) => "substanceAdministration",
            Entry::Supply(_) => "supply",
            Entry::Organizer(_) => "organizer",
        }
    }

    pub fn statement(&self) -> &ClinicalStatement {
        match self {
            Entry::Observation(statement)
            | Entry::Procedure(statement)
            | Entry::Encounter(statement)
            | Entry::Act(statement) => statement,
            Entry::SubstanceAdministration(administration) => &administration.statement,
            Entry::Supply(supply) => &supply.statement,
            Entry::Organizer(organizer) => &organizer.statement,
        }
    }

    pub fn code(&self) -> &CodedValue {
        &self.statement().code
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Narrative block, flattened to text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "templateId", default, skip_serializing_if = "Vec::is_empty")]
    pub template_ids: Vec<InstanceIdentifier>,
    #[serde(rename = "entry", default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<Entry>,
    #[serde(rename = "section", default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<Section>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(mut self, code: CodedValue) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_template_id(mut self, template_id: InstanceIdentifier) -> Self {
        self.template_ids.push(template_id);
        self
    }

    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_subsection(mut self, section: Section) -> Self {
        self.subsections.push(section);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StructuredBody {
    #[serde(rename = "section", default)]
    pub sections: Vec<Section>,
}

/// Opaque media body (`nonXMLBody`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NonXmlBody {
    pub media_type: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DocumentBody {
    #[serde(rename = "structuredBody")]
    Structured(StructuredBody),
    #[serde(rename = "nonXmlBody")]
    NonXml(NonXmlBody),
}

impl DocumentBody {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentBody::Structured(_) => "structuredBody",
            DocumentBody::NonXml(_) => "nonXmlBody",
        }
    }

    pub fn sections(&self) -> &[Section] {
        match self {
            DocumentBody::Structured(body) => &body.sections,
            DocumentBody::NonXml(_) => &[],
        }
    }
}

impl Default for DocumentBody {
    fn default() -> Self {
        DocumentBody::Structured(StructuredBody::default())
    }
}

/// Relationship between a document and the parent it was derived from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum RelationshipType {
    #[default]
    #[serde(rename = "RPLC")]
    Replace,
    #[serde(rename = "APND")]
    Append,
    #[serde(rename = "XFRM")]
    Transform,
}

impl RelationshipType {
    pub fn type_code(&self) -> &'static str {
        match self {
            RelationshipType::Replace => "RPLC",
            RelationshipType::Append => "APND",
            RelationshipType::Transform => "XFRM",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParentDocument {
    pub id: InstanceIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_id: Option<InstanceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelatedDocument {
    pub type_code: RelationshipType,
    pub parent_document: ParentDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Participant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<InstanceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Participant {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn with_id(mut self, id: InstanceIdentifier) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    pub assigned_author: Participant,
}

impl Author {
    pub fn new(assigned_author: Participant) -> Self {
        Self {
            time: None,
            assigned_author,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHeader {
    pub id: InstanceIdentifier,
    #[serde(rename = "templateId", default, skip_serializing_if = "Vec::is_empty")]
    pub template_ids: Vec<InstanceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub effective_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidentiality_code: Option<CodedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_id: Option<InstanceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_number: Option<u32>,
    #[serde(rename = "recordTarget", default, skip_serializing_if = "Vec::is_empty")]
    pub record_targets: Vec<Participant>,
    #[serde(rename = "author", default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custodian: Option<Participant>,
    #[serde(rename = "relatedDocument", default, skip_serializing_if = "Vec::is_empty")]
    pub related_documents: Vec<RelatedDocument>,
}

impl DocumentHeader {
    pub fn new(id: InstanceIdentifier, effective_time: DateTime<Utc>) -> Self {
        Self {
            id,
            template_ids: Vec::new(),
            code: None,
            title: None,
            effective_time,
            confidentiality_code: None,
            language_code: None,
            set_id: None,
            version_number: None,
            record_targets: Vec::new(),
            authors: Vec::new(),
            custodian: None,
            related_documents: Vec::new(),
        }
    }
}

/// A CDA document: header plus structured or non-XML body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalDocument {
    #[serde(flatten)]
    pub header: DocumentHeader,
    #[serde(rename = "component")]
    pub body: DocumentBody,
}

impl ClinicalDocument {
    pub fn new(id: InstanceIdentifier, effective_time: DateTime<Utc>) -> Self {
        Self {
            header: DocumentHeader::new(id, effective_time),
            body: DocumentBody::default(),
        }
    }

    pub fn id(&self) -> &InstanceIdentifier {
        &self.header.id
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.header.title = Some(title.into());
        self
    }

    pub fn with_code(mut self, code: CodedValue) -> Self {
        self.header.code = Some(code);
        self
    }

    pub fn with_template_id(mut self, template_id: InstanceIdentifier) -> Self {
        self.header.template_ids.push(template_id);
        self
    }

    pub fn with_set_id(mut self, set_id: InstanceIdentifier) -> Self {
        self.header.set_id = Some(set_id);
        self
    }

    pub fn with_version_number(mut self, version_number: u32) -> Self {
        self.header.version_number = Some(version_number);
        self
    }

    pub fn with_author(mut self, author: Author) -> Self {
        self.header.authors.push(author);
        self
    }

    pub fn with_record_target(mut self, patient: Participant) -> Self {
        self.header.record_targets.push(patient);
        self
    }

    pub fn with_section(mut self, section: Section) -> Self {
        match &mut self.body {
            DocumentBody::Structured(body) => body.sections.push(section),
            DocumentBody::NonXml(_) => {
                self.body = DocumentBody::Structured(StructuredBody {
                    sections: vec![section],
                });
            }
        }
        self
    }

    pub fn with_body(mut self, body: DocumentBody) -> Self {
        self.body = body;
        self
    }
}
