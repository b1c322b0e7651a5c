//! ARN parsing, entity name derivation and console link construction.
//!
//! All helpers here are pure string work; console links are derived from the
//! ARN alone, without any network lookup.

/// Longest generated entity name the catalog accepts.
pub const MAX_GENERATED_NAME_LEN: usize = 62;

/// A parsed Amazon Resource Name.
///
/// The resource segment keeps everything after the fifth colon, so
/// service-specific separators (`db:mydb`, `cluster/my-cluster`) survive
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    /// Parse an ARN of the form `arn:partition:service:region:account:resource`.
    ///
    /// Returns `None` for anything that does not carry all six segments.
    pub fn parse(arn: &str) -> Option<Arn> {
        let mut parts = arn.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let partition = parts.next()?;
        let service = parts.next()?;
        let region = parts.next()?;
        let account_id = parts.next()?;
        let resource = parts.next()?;
        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return None;
        }
        Some(Arn {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }
}

/// Derive a catalog entity name from a cloud-native identifier.
///
/// Colons and slashes become hyphens and the result is truncated to
/// [`MAX_GENERATED_NAME_LEN`] characters. The same identifier always yields
/// the same name; distinct identifiers sharing a long prefix can collide
/// after truncation, which callers detect and log per run.
pub fn arn_to_name(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c == ':' || c == '/' { '-' } else { c })
        .take(MAX_GENERATED_NAME_LEN)
        .collect()
}

/// Build the management console URL for a resource, when the service has a
/// well-known console location.
pub fn console_link(arn: &str) -> Option<String> {
    let parsed = Arn::parse(arn)?;
    match parsed.service.as_str() {
        "s3" => Some(format!(
            "https://s3.console.aws.amazon.com/s3/buckets/{}",
            parsed.resource
        )),
        "rds" => {
            let id = parsed.resource.strip_prefix("db:")?;
            Some(format!(
                "https://{region}.console.aws.amazon.com/rds/home?region={region}#database:id={id};is-cluster=false",
                region = parsed.region,
                id = id
            ))
        }
        _ => None,
    }
}
