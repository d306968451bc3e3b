/// Builds the sorted tag set of a vendor-agent record.
///
/// The result contains `device=<device>` if a device is given, `host=<host>` if a host is given,
/// and one entry per raw tag. Raw tags use `:` as separator and are converted as follows:
///
///  - `key:value` becomes `key=value` (split at the first colon),
///  - `key:` becomes the bare tag `key`,
///  - tags without a colon are kept verbatim.
///
/// The output is sorted lexicographically, which makes the identity of the resulting records
/// independent of the order in which the agent reported the tags.
///
/// # Example
///
/// ```
/// let tags = metricgate_metrics::build_tag_set("h1", "d1", ["env:prod", "standalone", "empty:"]);
/// assert_eq!(tags, ["device=d1", "empty", "env=prod", "host=h1", "standalone"]);
/// ```
pub fn build_tag_set<I>(host: &str, device: &str, raw_tags: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut tags = Vec::new();
    build_tag_set_into(&mut tags, host, device, raw_tags);
    tags
}

/// Like [`build_tag_set`], but appends to an existing vector and sorts it afterwards.
///
/// This allows reusing the allocation of a pooled record.
pub fn build_tag_set_into<I>(tags: &mut Vec<String>, host: &str, device: &str, raw_tags: I)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if !device.is_empty() {
        tags.push(format!("device={device}"));
    }
    if !host.is_empty() {
        tags.push(format!("host={host}"));
    }

    for raw in raw_tags {
        let raw = raw.as_ref();
        let tag = match raw.split_once(':') {
            Some((key, "")) => key.to_owned(),
            Some((key, value)) => format!("{key}={value}"),
            None => raw.to_owned(),
        };
        tags.push(tag);
    }

    tags.sort_unstable();
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_device_host_and_raw_tags() {
        let tags = build_tag_set("h1", "d1", ["env:prod", "standalone", "empty:"]);
        assert_eq!(
            tags,
            ["device=d1", "empty", "env=prod", "host=h1", "standalone"]
        );
    }

    #[test]
    fn test_without_device() {
        let tags = build_tag_set("web-1", "", ["role:db"]);
        assert_eq!(tags, ["host=web-1", "role=db"]);
    }

    #[test]
    fn test_empty_host_omitted() {
        let tags = build_tag_set("", "", ["env:prod"]);
        assert_eq!(tags, ["env=prod"]);
        assert!(tags.iter().all(|tag| crate::is_valid_tag(tag)));
    }

    #[test]
    fn test_splits_on_first_colon() {
        let tags = build_tag_set("h", "", ["url:http://example.com:80"]);
        assert_eq!(tags, ["host=h", "url=http://example.com:80"]);
    }

    #[test]
    fn test_output_sorted_and_order_independent() {
        let a = build_tag_set("h", "sda", ["z:1", "a:2", "m", "b:"]);
        let b = build_tag_set("h", "sda", ["b:", "m", "a:2", "z:1"]);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(a, sorted);
    }

    #[test]
    fn test_into_appends_to_existing() {
        let mut tags = Vec::with_capacity(8);
        build_tag_set_into(&mut tags, "h", "", ["x:y"]);
        assert_eq!(tags, ["host=h", "x=y"]);
    }
}
