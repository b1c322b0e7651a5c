//! Tag policy: how cloud resource tags become labels, owners and relations.
//!
//! Every function here is pure and drop-not-fail: a tag that cannot be
//! represented is left out of the entity rather than failing the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entity::Relationships;

/// Optional hook rewriting tag values before they are validated as labels.
///
/// Injected per provider; the default is to take values as-is.
pub type LabelValueMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A key/value tag attached to a cloud resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

impl ResourceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Owner assigned when no tag resolves to a known group.
pub const UNKNOWN_OWNER: &str = "unknown";

const MAX_LABEL_LEN: usize = 63;

fn is_valid_label_part(part: &str) -> bool {
    if part.is_empty() || part.len() > MAX_LABEL_LEN {
        return false;
    }
    regex::Regex::new(r"^[a-zA-Z0-9]([-_.a-zA-Z0-9]*[a-zA-Z0-9])?$")
        .unwrap()
        .is_match(part)
}

/// Convert tags into entity labels.
///
/// The mapper, when present, rewrites values before validation. Tags whose
/// key or (mapped) value does not satisfy label syntax are dropped; AWS
/// system tags (`aws:*`) fall out naturally because of the colon.
pub fn labels_from_tags(
    tags: &[ResourceTag],
    mapper: Option<&LabelValueMapper>,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for tag in tags {
        let value = match mapper {
            Some(map) => map(&tag.value),
            None => tag.value.clone(),
        };
        if is_valid_label_part(&tag.key) && is_valid_label_part(&value) {
            labels.insert(tag.key.clone(), value);
        }
    }
    labels
}

/// Resolve the owner of a resource from its tags.
///
/// The tag named `owner_tag` supplies the candidate; its normalized value is
/// kept when the group set is empty (membership checking disabled) or when it
/// matches a known group case-insensitively. Everything else resolves to
/// [`UNKNOWN_OWNER`]; owner resolution never fails a run.
pub fn owner_from_tags(tags: &[ResourceTag], owner_tag: &str, groups: &[String]) -> String {
    let candidate = tags
        .iter()
        .find(|tag| tag.key == owner_tag)
        .map(|tag| normalize_owner(&tag.value));

    match candidate {
        Some(owner) if !owner.is_empty() => {
            if groups.is_empty() || groups.iter().any(|g| g.eq_ignore_ascii_case(&owner)) {
                owner
            } else {
                UNKNOWN_OWNER.to_string()
            }
        }
        _ => UNKNOWN_OWNER.to_string(),
    }
}

fn normalize_owner(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(' ', "-")
}

/// Derive entity relations from well-known tag keys.
///
/// Recognized keys (in any casing, with or without separators) are
/// `dependsOn`, `dependencyOf`, `partOf` and `subcomponentOf`; values are
/// comma-separated entity references. Unrecognized keys are ignored.
pub fn relationships_from_tags(tags: &[ResourceTag]) -> Relationships {
    let mut relationships = Relationships::default();
    for tag in tags {
        let key = tag
            .key
            .to_ascii_lowercase()
            .replace(['-', '_'], "");
        let refs = split_refs(&tag.value);
        if refs.is_empty() {
            continue;
        }
        match key.as_str() {
            "dependson" => merge(&mut relationships.depends_on, refs),
            "dependencyof" => merge(&mut relationships.dependency_of, refs),
            "partof" => merge(&mut relationships.part_of, refs),
            "subcomponentof" => merge(&mut relationships.subcomponent_of, refs),
            _ => {}
        }
    }
    relationships
}

fn split_refs(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn merge(slot: &mut Option<Vec<String>>, mut refs: Vec<String>) {
    match slot {
        Some(existing) => existing.append(&mut refs),
        None => *slot = Some(refs),
    }
}
