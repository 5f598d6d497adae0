//! Identifier and timestamp helpers shared by the ledger and workflow.

/// Generate a fresh record id with the given prefix, e.g. `gen-3f9a…`.
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}-{:016x}", rand::random::<u64>())
}

/// Current UTC time as an RFC 3339 string, the format stored records use.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix_and_are_distinct() {
        let a = new_id("gen");
        let b = new_id("gen");
        assert!(a.starts_with("gen-"));
        assert_ne!(a, b);
    }

    #[test]
    fn timestamps_parse_back() {
        let ts = now_rfc3339();
        assert!(time::OffsetDateTime::parse(
            &ts,
            &time::format_description::well_known::Rfc3339
        )
        .is_ok());
    }
}
