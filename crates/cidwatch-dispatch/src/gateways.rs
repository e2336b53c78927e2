//! Gateway URL templates.

use cidwatch_core::Identifier;

/// Placeholder replaced by the identifier.
pub const CID_PLACEHOLDER: &str = "{cid}";

/// Substitute `cid` into one template.
///
/// A template without the placeholder is treated as a base URL and the
/// identifier is appended as the last path segment.
pub fn gateway_url(template: &str, cid: &Identifier) -> String {
    if template.contains(CID_PLACEHOLDER) {
        template.replace(CID_PLACEHOLDER, cid.as_str())
    } else {
        format!("{}/{}", template.trim_end_matches('/'), cid)
    }
}

/// Substitute `cid` into every non-blank template, preserving order.
pub fn gateway_urls(templates: &[String], cid: &Identifier) -> Vec<String> {
    templates
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| gateway_url(t, cid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_substituted() {
        let cid = Identifier::new("Qm1");
        assert_eq!(gateway_url("https://ipfs.io/ipfs/{cid}", &cid), "https://ipfs.io/ipfs/Qm1");
        assert_eq!(
            gateway_url("https://{cid}.ipfs.dweb.link/", &cid),
            "https://Qm1.ipfs.dweb.link/"
        );
    }

    #[test]
    fn base_url_gets_cid_appended() {
        let cid = Identifier::new("Qm1");
        assert_eq!(gateway_url("http://localhost:8080/ipfs/", &cid), "http://localhost:8080/ipfs/Qm1");
    }

    #[test]
    fn blank_templates_skipped() {
        let templates = vec!["https://a/{cid}".to_string(), "  ".to_string(), " https://b/{cid} ".to_string()];
        assert_eq!(
            gateway_urls(&templates, &"Qm1".into()),
            vec!["https://a/Qm1", "https://b/Qm1"]
        );
    }
}
