use chrono::NaiveDate;

use super::tree::{optional, required, Node};
use crate::record::{present, MetadataRecord, ResponsibleParty};

const CODELIST_BASE: &str = "http://standards.iso.org/iso/19139/resources/gmxCodelists.xml";
const LANGUAGE_CODELIST: &str = "http://www.loc.gov/standards/iso639-2/";

/// ルート要素直下に出力するブロック
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    FileIdentifier,
    Language,
    CharacterSet,
    ParentIdentifier,
    HierarchyLevel,
    HierarchyLevelName,
    Contact,
    MetadataContact,
    DateStamp,
    MetadataStandardName,
    MetadataStandardVersion,
    NationalCompliance,
    ReferenceSystem,
    Identification,
    Distribution,
    DataQuality,
    LegalConstraints,
}

/// 出力方言の定義。名前空間と出力順だけが異なる
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    pub root: &'static str,
    pub namespaces: &'static [(&'static str, &'static str)],
    pub sections: &'static [Section],
}

const ISO_NAMESPACES: &[(&str, &str)] = &[
    ("xmlns:gmd", "http://www.isotc211.org/2005/gmd"),
    ("xmlns:gco", "http://www.isotc211.org/2005/gco"),
    ("xmlns:gml", "http://www.opengis.net/gml"),
    ("xmlns:xlink", "http://www.w3.org/1999/xlink"),
    ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    (
        "xsi:schemaLocation",
        "http://www.isotc211.org/2005/gmd http://schemas.opengis.net/iso/19139/20070417/gmd/gmd.xsd",
    ),
];

const SNI_NAMESPACES: &[(&str, &str)] = &[
    ("xmlns:gmd", "http://www.isotc211.org/2005/gmd"),
    ("xmlns:gco", "http://www.isotc211.org/2005/gco"),
    ("xmlns:gml", "http://www.opengis.net/gml"),
    ("xmlns:xlink", "http://www.w3.org/1999/xlink"),
    ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    ("xmlns:sni", "http://www.bsn.go.id/sni/19115"),
    (
        "xsi:schemaLocation",
        "http://www.isotc211.org/2005/gmd http://schemas.opengis.net/iso/19139/20070417/gmd/gmd.xsd",
    ),
];

pub const ISO19139: Dialect = Dialect {
    root: "gmd:MD_Metadata",
    namespaces: ISO_NAMESPACES,
    sections: &[
        Section::FileIdentifier,
        Section::Language,
        Section::CharacterSet,
        Section::ParentIdentifier,
        Section::HierarchyLevel,
        Section::HierarchyLevelName,
        Section::Contact,
        Section::DateStamp,
        Section::MetadataStandardName,
        Section::MetadataStandardVersion,
        Section::ReferenceSystem,
        Section::Identification,
        Section::Distribution,
        Section::DataQuality,
    ],
};

/// ISO の構造に国内プロファイルの要素を差し込んだもの
pub const SNI_XML: Dialect = Dialect {
    root: "gmd:MD_Metadata",
    namespaces: SNI_NAMESPACES,
    sections: &[
        Section::FileIdentifier,
        Section::Language,
        Section::CharacterSet,
        Section::ParentIdentifier,
        Section::HierarchyLevel,
        Section::HierarchyLevelName,
        Section::Contact,
        Section::MetadataContact,
        Section::DateStamp,
        Section::MetadataStandardName,
        Section::MetadataStandardVersion,
        Section::NationalCompliance,
        Section::ReferenceSystem,
        Section::Identification,
        Section::Distribution,
        Section::DataQuality,
        Section::LegalConstraints,
    ],
};

pub fn build(record: &MetadataRecord, dialect: &Dialect) -> Node {
    let root = dialect
        .namespaces
        .iter()
        .fold(Node::new(dialect.root), |node, (key, value)| {
            node.attr(*key, *value)
        });
    dialect
        .sections
        .iter()
        .filter_map(|section| build_section(record, *section))
        .fold(root, Node::child)
}

fn build_section(record: &MetadataRecord, section: Section) -> Option<Node> {
    match section {
        Section::FileIdentifier => Some(mandatory_string(
            "gmd:fileIdentifier",
            Some(record.file_identifier.as_str()),
        )),
        Section::Language => Some(language("gmd:language", &record.language)),
        Section::CharacterSet => Some(code(
            "gmd:characterSet",
            "MD_CharacterSetCode",
            or_default(&record.character_set, "utf8"),
        )),
        Section::ParentIdentifier => {
            string("gmd:parentIdentifier", present(&record.parent_identifier))
        }
        Section::HierarchyLevel => Some(code(
            "gmd:hierarchyLevel",
            "MD_ScopeCode",
            or_default(&record.hierarchy_level, "dataset"),
        )),
        Section::HierarchyLevelName => string(
            "gmd:hierarchyLevelName",
            present(&record.hierarchy_level_name),
        ),
        Section::Contact => responsible_party("gmd:contact", &record.contact, "pointOfContact"),
        Section::MetadataContact => {
            responsible_party("sni:metadataContact", &record.metadata_contact, "author")
        }
        Section::DateStamp => Some(match record.date_stamp {
            Some(date) => required("gmd:dateStamp", [Some(gco_date(date))]),
            None => nil("gmd:dateStamp"),
        }),
        Section::MetadataStandardName => Some(mandatory_string(
            "gmd:metadataStandardName",
            Some(record.metadata_standard_name.as_str()),
        )),
        Section::MetadataStandardVersion => Some(mandatory_string(
            "gmd:metadataStandardVersion",
            Some(record.metadata_standard_version.as_str()),
        )),
        Section::NationalCompliance => Some(national_compliance(record)),
        Section::ReferenceSystem => reference_system(&record.spatial.coordinate_system),
        Section::Identification => Some(identification(record)),
        Section::Distribution => distribution(record),
        Section::DataQuality => data_quality(record),
        Section::LegalConstraints => legal_constraints(record),
    }
}

fn identification(record: &MetadataRecord) -> Node {
    let ident = &record.identification;
    let bbox = &record.spatial.bounding_box;

    let citation = required(
        "gmd:citation",
        [Some(required(
            "gmd:CI_Citation",
            [
                Some(mandatory_string("gmd:title", Some(ident.title.as_str()))),
                string("gmd:alternateTitle", present(&ident.alternate_title)),
                Some(citation_date(ident.citation_date.or(record.date_stamp))),
            ],
        ))],
    );

    let keywords = optional(
        "gmd:descriptiveKeywords",
        [optional(
            "gmd:MD_Keywords",
            ident
                .keywords
                .iter()
                .filter(|k| !k.trim().is_empty())
                .map(|k| string("gmd:keyword", Some(k.as_str()))),
        )],
    );

    let resolution = present(&ident.spatial_resolution)
        .and_then(scale_denominator)
        .map(|denominator| {
            required(
                "gmd:spatialResolution",
                [Some(required(
                    "gmd:MD_Resolution",
                    [Some(required(
                        "gmd:equivalentScale",
                        [Some(required(
                            "gmd:MD_RepresentativeFraction",
                            [Some(required(
                                "gmd:denominator",
                                [Some(Node::value("gco:Integer", denominator.to_string()))],
                            ))],
                        ))],
                    ))],
                ))],
            )
        });

    let geographic = (!bbox.is_empty()).then(|| {
        required(
            "gmd:extent",
            [Some(required(
                "gmd:EX_Extent",
                [Some(required(
                    "gmd:geographicElement",
                    [Some(required(
                        "gmd:EX_GeographicBoundingBox",
                        [
                            Some(decimal("gmd:westBoundLongitude", bbox.min_x)),
                            Some(decimal("gmd:eastBoundLongitude", bbox.max_x)),
                            Some(decimal("gmd:southBoundLatitude", bbox.min_y)),
                            Some(decimal("gmd:northBoundLatitude", bbox.max_y)),
                        ],
                    ))],
                ))],
            ))],
        )
    });

    required(
        "gmd:identificationInfo",
        [Some(required(
            "gmd:MD_DataIdentification",
            [
                Some(citation),
                Some(mandatory_string(
                    "gmd:abstract",
                    Some(ident.abstract_text.as_str()),
                )),
                string("gmd:purpose", present(&ident.purpose)),
                present(&ident.status).map(|s| code("gmd:status", "MD_ProgressCode", s)),
                keywords,
                present(&ident.topic_category).map(|c| {
                    required(
                        "gmd:topicCategory",
                        [Some(Node::value("gmd:MD_TopicCategoryCode", c))],
                    )
                }),
                resolution,
                Some(language("gmd:language", &record.language)),
                Some(code(
                    "gmd:characterSet",
                    "MD_CharacterSetCode",
                    or_default(&record.character_set, "utf8"),
                )),
                geographic,
                temporal_extent(record.temporal.start, record.temporal.end),
            ],
        ))],
    )
}

fn temporal_extent(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Node> {
    let position = |name: &str, date: Option<NaiveDate>, missing: &str| match date {
        Some(d) => Node::value(name, d.format("%Y-%m-%d").to_string()),
        None => Node::new(name).attr("indeterminatePosition", missing),
    };

    optional(
        "gmd:extent",
        [optional(
            "gmd:EX_Extent",
            [optional(
                "gmd:temporalElement",
                [optional(
                    "gmd:EX_TemporalExtent",
                    [optional(
                        "gmd:extent",
                        [optional(
                            "gml:TimePeriod",
                            [
                                Some(position("gml:beginPosition", start, "unknown")),
                                Some(position("gml:endPosition", end, "now")),
                            ],
                        )
                        .map(|n| n.attr("gml:id", "T1"))],
                    )],
                )],
            )],
        )],
    )
}

fn distribution(record: &MetadataRecord) -> Option<Node> {
    let dist = &record.distribution;

    let format = present(&dist.format).map(|name| {
        required(
            "gmd:distributionFormat",
            [Some(required(
                "gmd:MD_Format",
                [
                    string("gmd:name", Some(name)),
                    Some(
                        string("gmd:version", present(&dist.format_version))
                            .unwrap_or_else(|| nil_with("gmd:version", "unknown")),
                    ),
                ],
            ))],
        )
    });

    let transfer = optional(
        "gmd:transferOptions",
        [optional(
            "gmd:MD_DigitalTransferOptions",
            [
                string("gmd:unitsOfDistribution", present(&dist.transfer_options)),
                dist.transfer_size.filter(|s| *s > 0).map(|bytes| {
                    required(
                        "gmd:transferSize",
                        [Some(Node::value(
                            "gco:Real",
                            format!("{:.3}", bytes as f64 / (1024.0 * 1024.0)),
                        ))],
                    )
                }),
                present(&dist.online_resource).map(|url| {
                    required(
                        "gmd:onLine",
                        [Some(required(
                            "gmd:CI_OnlineResource",
                            [Some(required(
                                "gmd:linkage",
                                [Some(Node::value("gmd:URL", url))],
                            ))],
                        ))],
                    )
                }),
            ],
        )],
    );

    optional(
        "gmd:distributionInfo",
        [optional("gmd:MD_Distribution", [format, transfer])],
    )
}

fn data_quality(record: &MetadataRecord) -> Option<Node> {
    let quality = &record.quality;
    let report = |element: &str, text: Option<&str>| {
        text.map(|t| {
            required(
                "gmd:report",
                [Some(required(
                    element,
                    [string("gmd:evaluationMethodDescription", Some(t))],
                ))],
            )
        })
    };

    optional(
        "gmd:dataQualityInfo",
        [optional(
            "gmd:DQ_DataQuality",
            [
                Some(Node::new("gmd:scope").child(Node::new("gmd:DQ_Scope").child(
                    Node::new("gmd:level").child(code_node(
                        "MD_ScopeCode",
                        or_default(&record.hierarchy_level, "dataset"),
                    )),
                ))),
                report(
                    "gmd:DQ_AbsoluteExternalPositionalAccuracy",
                    present(&quality.positional_accuracy),
                ),
                report("gmd:DQ_CompletenessOmission", present(&quality.completeness)),
                report(
                    "gmd:DQ_ConceptualConsistency",
                    present(&quality.logical_consistency),
                ),
                present(&quality.lineage).map(|statement| {
                    required(
                        "gmd:lineage",
                        [Some(required(
                            "gmd:LI_Lineage",
                            [string("gmd:statement", Some(statement))],
                        ))],
                    )
                }),
            ],
        )],
    )
}

fn legal_constraints(record: &MetadataRecord) -> Option<Node> {
    let constraints = &record.constraints;
    optional(
        "gmd:metadataConstraints",
        [optional(
            "gmd:MD_LegalConstraints",
            [
                string("gmd:useLimitation", present(&constraints.use_limitation)),
                present(&constraints.access_constraints)
                    .map(|c| code("gmd:accessConstraints", "MD_RestrictionCode", c)),
                string(
                    "gmd:otherConstraints",
                    present(&constraints.other_constraints),
                ),
            ],
        )],
    )
}

fn national_compliance(record: &MetadataRecord) -> Node {
    let profile = &record.national_profile;
    required(
        "sni:nationalProfile",
        [
            Some(required(
                "sni:compliance",
                [Some(Node::value(
                    "gco:Boolean",
                    profile.compliant.to_string(),
                ))],
            )),
            Some(mandatory_string(
                "sni:standardName",
                Some(profile.standard_name.as_str()),
            )),
            Some(mandatory_string(
                "sni:standardVersion",
                Some(profile.standard_version.as_str()),
            )),
            Some(mandatory_string(
                "sni:languageCode",
                Some(profile.language_code.as_str()),
            )),
        ],
    )
}

fn reference_system(crs: &str) -> Option<Node> {
    let crs = crs.trim();
    if crs.is_empty() {
        return None;
    }
    let (space, code) = match crs.split_once(':') {
        Some((space, code)) => (Some(space), code),
        None => (None, crs),
    };
    optional(
        "gmd:referenceSystemInfo",
        [optional(
            "gmd:MD_ReferenceSystem",
            [optional(
                "gmd:referenceSystemIdentifier",
                [optional(
                    "gmd:RS_Identifier",
                    [string("gmd:code", Some(code)), string("gmd:codeSpace", space)],
                )],
            )],
        )],
    )
}

fn responsible_party(element: &str, party: &ResponsibleParty, default_role: &str) -> Option<Node> {
    if party.is_empty() {
        return None;
    }

    let phone = present(&party.phone).map(|voice| {
        required(
            "gmd:phone",
            [Some(required(
                "gmd:CI_Telephone",
                [string("gmd:voice", Some(voice))],
            ))],
        )
    });
    let address = optional(
        "gmd:address",
        [optional(
            "gmd:CI_Address",
            [
                string("gmd:deliveryPoint", present(&party.address)),
                string("gmd:electronicMailAddress", present(&party.email)),
            ],
        )],
    );
    let contact_info = optional(
        "gmd:contactInfo",
        [optional("gmd:CI_Contact", [phone, address])],
    );

    let role = present(&party.role).unwrap_or(default_role);
    optional(
        element,
        [optional(
            "gmd:CI_ResponsibleParty",
            [
                string("gmd:individualName", present(&party.name)),
                string("gmd:organisationName", present(&party.organization)),
                string("gmd:positionName", present(&party.position)),
                contact_info,
                Some(Node::new("gmd:role").child(code_node("CI_RoleCode", role))),
            ],
        )],
    )
}

fn citation_date(date: Option<NaiveDate>) -> Node {
    required(
        "gmd:date",
        [Some(required(
            "gmd:CI_Date",
            [
                Some(match date {
                    Some(d) => required("gmd:date", [Some(gco_date(d))]),
                    None => nil("gmd:date"),
                }),
                Some(
                    Node::new("gmd:dateType").child(code_node("CI_DateTypeCode", "creation")),
                ),
            ],
        ))],
    )
}

/// "1:25000" のような縮尺表記から分母を取り出す
pub fn scale_denominator(text: &str) -> Option<u64> {
    let digits: String = text
        .rsplit(':')
        .next()?
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|d| *d > 0)
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

fn string(name: &str, value: Option<&str>) -> Option<Node> {
    value.map(|v| required(name, [Some(Node::value("gco:CharacterString", v))]))
}

/// 必須の文字列要素。値がなければ nilReason を付ける
fn mandatory_string(name: &str, value: Option<&str>) -> Node {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => required(name, [Some(Node::value("gco:CharacterString", v))]),
        None => nil(name),
    }
}

fn nil(name: &str) -> Node {
    nil_with(name, "missing")
}

fn nil_with(name: &str, reason: &str) -> Node {
    Node::new(name).attr("gco:nilReason", reason)
}

fn gco_date(date: NaiveDate) -> Node {
    Node::value("gco:Date", date.format("%Y-%m-%d").to_string())
}

fn decimal(name: &str, value: f64) -> Node {
    required(name, [Some(Node::value("gco:Decimal", value.to_string()))])
}

fn code_node(list: &str, value: &str) -> Node {
    Node::fixed(format!("gmd:{}", list), value)
        .attr("codeList", format!("{}#{}", CODELIST_BASE, list))
        .attr("codeListValue", value)
}

fn code(name: &str, list: &str, value: &str) -> Node {
    required(name, [Some(code_node(list, value))])
}

fn language(name: &str, value: &str) -> Node {
    let value = or_default(value, "ind");
    required(
        name,
        [Some(
            Node::fixed("gmd:LanguageCode", value)
                .attr("codeList", LANGUAGE_CODELIST)
                .attr("codeListValue", value),
        )],
    )
}
