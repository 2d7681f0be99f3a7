use anyhow::anyhow;
use log::{debug, warn};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::text_manipulators::TextNormaliser;

const ENTRY_SELECTOR: &str = ".institution-members-list .nova-legacy-v-person-list-item";
const NAME_SELECTOR: &str = ".nova-legacy-v-person-list-item__title a";
const INFO_SECTION_SELECTOR: &str = ".nova-legacy-v-person-list-item__info-section";
const INFO_SECTION_TITLE_SELECTOR: &str = ".nova-legacy-v-person-list-item__info-section-title";

const DEPARTMENT_LABEL: &str = "Department";
const DISCIPLINES_LABEL: &str = "Disciplines";

/// One person from a member listing. `name` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub name: String,
    pub department: Option<String>,
    pub discipline: Option<String>,
}

/// Outcome of looking up one optional field inside an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLookup {
    Found(String),
    /// No info section carried the field's label.
    NoSection,
    /// The labelled section exists but lacks the element holding the value.
    NoValue,
}

impl FieldLookup {
    pub fn into_option(self) -> Option<String> {
        match self {
            FieldLookup::Found(value) => Some(value),
            FieldLookup::NoSection | FieldLookup::NoValue => None,
        }
    }

    // Later sections override earlier ones, but a found value is never
    // replaced by a miss.
    fn merge(self, next: FieldLookup) -> FieldLookup {
        match (self, next) {
            (_, found @ FieldLookup::Found(_)) => found,
            (found @ FieldLookup::Found(_), _) => found,
            (_, FieldLookup::NoValue) => FieldLookup::NoValue,
            (current, FieldLookup::NoSection) => current,
        }
    }
}

/// Records from one page plus the entries that had to be skipped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    pub records: Vec<MemberRecord>,
    /// Entry blocks without a resolvable name.
    pub nameless_entries: usize,
}

impl ParsedPage {
    pub fn entry_count(&self) -> usize {
        self.records.len() + self.nameless_entries
    }
}

pub struct ListingParser {
    entry_selector: Selector,
    name_selector: Selector,
    info_section_selector: Selector,
    info_section_title_selector: Selector,
    span_selector: Selector,
    list_selector: Selector,
    list_item_selector: Selector,
    normaliser: TextNormaliser,
}

fn parse_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector `{css}`: {e:?}"))
}

impl ListingParser {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            entry_selector: parse_selector(ENTRY_SELECTOR)?,
            name_selector: parse_selector(NAME_SELECTOR)?,
            info_section_selector: parse_selector(INFO_SECTION_SELECTOR)?,
            info_section_title_selector: parse_selector(INFO_SECTION_TITLE_SELECTOR)?,
            span_selector: parse_selector("span")?,
            list_selector: parse_selector("ul")?,
            list_item_selector: parse_selector("li")?,
            normaliser: TextNormaliser::new()?,
        })
    }

    /// Member records on one listing page, in document order.
    ///
    /// An empty result means the page had no member entries at all, which is
    /// what ends pagination.
    pub fn extract(&self, markup: &str) -> Vec<MemberRecord> {
        self.parse_page(markup).records
    }

    pub fn parse_page(&self, markup: &str) -> ParsedPage {
        let document = Html::parse_document(markup);
        let mut page = ParsedPage::default();

        for entry in document.select(&self.entry_selector) {
            match self.parse_entry(entry) {
                Some(record) => {
                    debug!(
                        "Extracted: {}, {:?}, {:?}",
                        record.name, record.department, record.discipline
                    );
                    page.records.push(record);
                }
                None => {
                    warn!("Skipping member entry without a name");
                    page.nameless_entries += 1;
                }
            }
        }

        page
    }

    fn parse_entry(&self, entry: ElementRef) -> Option<MemberRecord> {
        let name = entry
            .select(&self.name_selector)
            .next()
            .map(|anchor| self.normaliser.element_text(anchor))
            .filter(|name| !name.is_empty())?;

        let mut department = FieldLookup::NoSection;
        let mut discipline = FieldLookup::NoSection;

        for section in entry.select(&self.info_section_selector) {
            let Some(title) = section.select(&self.info_section_title_selector).next() else {
                continue;
            };
            match self.normaliser.element_text(title).as_str() {
                DEPARTMENT_LABEL => {
                    department = department.merge(self.department_value(section, title));
                }
                DISCIPLINES_LABEL => {
                    discipline = discipline.merge(self.disciplines_value(section));
                }
                _ => {}
            }
        }

        Some(MemberRecord {
            name,
            department: department.into_option(),
            discipline: discipline.into_option(),
        })
    }

    /// First `span` in the section that is not the label itself.
    fn department_value(&self, section: ElementRef, title: ElementRef) -> FieldLookup {
        section
            .select(&self.span_selector)
            .find(|span| *span != title && !is_descendant_of(*span, title))
            .map(|span| FieldLookup::Found(self.normaliser.element_text(span)))
            .unwrap_or(FieldLookup::NoValue)
    }

    fn disciplines_value(&self, section: ElementRef) -> FieldLookup {
        let Some(list) = section.select(&self.list_selector).next() else {
            return FieldLookup::NoValue;
        };
        let disciplines: Vec<String> = list
            .select(&self.list_item_selector)
            .map(|item| self.normaliser.element_text(item))
            .collect();
        FieldLookup::Found(disciplines.join(", "))
    }
}

fn is_descendant_of(node: ElementRef, ancestor: ElementRef) -> bool {
    node.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|parent| parent == ancestor)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn entry(
        name: Option<&str>,
        department: Option<&str>,
        disciplines: Option<&[&str]>,
    ) -> String {
        let mut html = String::from(r#"<div class="nova-legacy-v-person-list-item">"#);
        if let Some(name) = name {
            html.push_str(&format!(
                r#"<div class="nova-legacy-v-person-list-item__title"><a href="/profile/x">{name}</a></div>"#
            ));
        }
        if let Some(department) = department {
            html.push_str(&format!(
                r#"<div class="nova-legacy-v-person-list-item__info-section">
                     <div class="nova-legacy-v-person-list-item__info-section-title">Department</div>
                     <span>{department}</span>
                   </div>"#
            ));
        }
        if let Some(disciplines) = disciplines {
            let items: String = disciplines
                .iter()
                .map(|d| format!("<li>{d}</li>"))
                .collect();
            html.push_str(&format!(
                r#"<div class="nova-legacy-v-person-list-item__info-section">
                     <div class="nova-legacy-v-person-list-item__info-section-title">Disciplines</div>
                     <ul>{items}</ul>
                   </div>"#
            ));
        }
        html.push_str("</div>");
        html
    }

    pub(crate) fn listing_page(entries: &[String]) -> String {
        format!(
            r#"<html><body><div class="institution-members-list">{}</div></body></html>"#,
            entries.concat()
        )
    }

    #[test]
    fn full_entry_is_extracted() {
        let parser = ListingParser::new().unwrap();
        let page = listing_page(&[entry(
            Some("Jane Doe"),
            Some("Biology"),
            Some(&["Genetics", "Ecology"]),
        )]);

        assert_eq!(
            parser.extract(&page),
            vec![MemberRecord {
                name: "Jane Doe".to_string(),
                department: Some("Biology".to_string()),
                discipline: Some("Genetics, Ecology".to_string()),
            }]
        );
    }

    #[test]
    fn nameless_entries_are_skipped_and_counted() {
        let parser = ListingParser::new().unwrap();
        let page = listing_page(&[
            entry(Some("A"), None, None),
            entry(None, Some("Physics"), None),
            entry(Some("   "), None, None),
            entry(Some("B"), None, None),
        ]);

        let parsed = parser.parse_page(&page);
        let names: Vec<_> = parsed.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(parsed.nameless_entries, 2);
        assert_eq!(parsed.entry_count(), 4);
    }

    #[test]
    fn absent_sections_leave_fields_null() {
        let parser = ListingParser::new().unwrap();
        let page = listing_page(&[
            entry(Some("Only Name"), None, None),
            entry(Some("Dept Only"), Some("Chemistry"), None),
            entry(Some("Disc Only"), None, Some(&["Optics"])),
        ]);

        let records = parser.extract(&page);
        assert_eq!(records[0].department, None);
        assert_eq!(records[0].discipline, None);
        assert_eq!(records[1].department.as_deref(), Some("Chemistry"));
        assert_eq!(records[1].discipline, None);
        assert_eq!(records[2].department, None);
        assert_eq!(records[2].discipline.as_deref(), Some("Optics"));
    }

    #[test]
    fn labelled_sections_without_values_stay_null() {
        let parser = ListingParser::new().unwrap();
        let page = listing_page(&[r#"
            <div class="nova-legacy-v-person-list-item">
              <div class="nova-legacy-v-person-list-item__title"><a>Ana</a></div>
              <div class="nova-legacy-v-person-list-item__info-section">
                <span class="nova-legacy-v-person-list-item__info-section-title">Department</span>
              </div>
              <div class="nova-legacy-v-person-list-item__info-section">
                <div class="nova-legacy-v-person-list-item__info-section-title">Disciplines</div>
                <p>no list here</p>
              </div>
              <div class="nova-legacy-v-person-list-item__info-section">
                <span>Untitled section</span>
              </div>
            </div>"#
            .to_string()]);

        let records = parser.extract(&page);
        assert_eq!(
            records,
            vec![MemberRecord {
                name: "Ana".to_string(),
                department: None,
                discipline: None,
            }]
        );
    }

    #[test]
    fn unknown_labels_are_ignored() {
        let parser = ListingParser::new().unwrap();
        let page = listing_page(&[r#"
            <div class="nova-legacy-v-person-list-item">
              <div class="nova-legacy-v-person-list-item__title"><a>Luis</a></div>
              <div class="nova-legacy-v-person-list-item__info-section">
                <div class="nova-legacy-v-person-list-item__info-section-title">Skills and Expertise</div>
                <span>Rust</span>
              </div>
            </div>"#
            .to_string()]);

        assert_eq!(parser.extract(&page)[0].department, None);
    }

    #[test]
    fn markup_without_entries_yields_nothing() {
        let parser = ListingParser::new().unwrap();
        assert!(parser.extract("<html><body><p>No results</p></body></html>").is_empty());
        assert!(parser.extract("").is_empty());
        // Entries outside the members list do not count.
        let stray = format!("<div>{}</div>", entry(Some("Stray"), None, None));
        assert!(parser.extract(&stray).is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let parser = ListingParser::new().unwrap();
        let page = listing_page(&[
            entry(Some("X"), Some("Math"), Some(&["Algebra"])),
            entry(Some("Y"), None, Some(&["Topology", "Geometry"])),
        ]);
        assert_eq!(parser.extract(&page), parser.extract(&page));
    }

    #[test]
    fn field_lookup_merge_prefers_found_values() {
        let found = FieldLookup::Found("v".to_string());
        assert_eq!(
            FieldLookup::NoSection.merge(found.clone()),
            found.clone()
        );
        assert_eq!(found.clone().merge(FieldLookup::NoValue), found);
        assert_eq!(
            FieldLookup::NoSection.merge(FieldLookup::NoValue),
            FieldLookup::NoValue
        );
    }
}
