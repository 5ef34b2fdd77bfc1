//! Shareable links: `{app_base}/shared/{shareType}/{contentId}`.

use url::Url;

use lunara_core::defaults::SHARE_LINK_SEGMENT;
use lunara_core::{Error, Result, ShareType};

/// The parts a shareable link carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub content_id: String,
    pub share_type: ShareType,
}

/// RFC 3986 unreserved characters only. `.` and `..` are excluded because URL
/// parsing collapses them as dot segments.
fn is_url_safe(content_id: &str) -> bool {
    !matches!(content_id, "" | "." | "..")
        && content_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'))
}

/// Build the link a recipient opens to view a share.
pub fn build_shareable_link(app_base: &Url, content_id: &str, share_type: ShareType) -> Result<String> {
    if !is_url_safe(content_id) {
        return Err(Error::InvalidInput(format!(
            "content id is not URL-safe: {:?}",
            content_id
        )));
    }
    let base = app_base.as_str().trim_end_matches('/');
    Ok(format!(
        "{}/{}/{}/{}",
        base, SHARE_LINK_SEGMENT, share_type, content_id
    ))
}

/// Recover the content id and share type from a shareable link.
///
/// Only the last three path segments are inspected, so apps mounted under a
/// sub-path parse the same way.
pub fn parse_shareable_link(link: &str) -> Result<ShareLink> {
    let url = Url::parse(link)
        .map_err(|e| Error::InvalidInput(format!("invalid share link {:?}: {}", link, e)))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [.., marker, share_type, content_id] if *marker == SHARE_LINK_SEGMENT => {
            if !is_url_safe(content_id) {
                return Err(Error::InvalidInput(format!(
                    "share link carries an invalid content id: {:?}",
                    content_id
                )));
            }
            Ok(ShareLink {
                content_id: (*content_id).to_string(),
                share_type: share_type.parse()?,
            })
        }
        _ => Err(Error::InvalidInput(format!(
            "not a share link: {}",
            link
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://app.example.com").unwrap()
    }

    #[test]
    fn test_build_link() {
        let link = build_shareable_link(&base(), "bafybeigdyr", ShareType::Partner).unwrap();
        assert_eq!(link, "https://app.example.com/shared/partner/bafybeigdyr");
    }

    #[test]
    fn test_build_then_parse() {
        for share_type in ShareType::ALL {
            for content_id in ["QmXoypiz", "Qm~abc", "a.b-c_d", "..."] {
                let link = build_shareable_link(&base(), content_id, share_type).unwrap();
                let parsed = parse_shareable_link(&link).unwrap();
                assert_eq!(parsed.content_id, content_id);
                assert_eq!(parsed.share_type, share_type);
            }
        }
    }

    #[test]
    fn test_dot_segments_rejected() {
        for content_id in [".", ".."] {
            assert!(build_shareable_link(&base(), content_id, ShareType::Partner).is_err());
        }
        assert!(parse_shareable_link("https://app.example.com/shared/partner/..").is_err());
    }

    #[test]
    fn test_sub_path_base() {
        let base = Url::parse("https://example.com/app/").unwrap();
        let link = build_shareable_link(&base, "cid1", ShareType::Doctor).unwrap();
        assert_eq!(link, "https://example.com/app/shared/doctor/cid1");
        assert_eq!(parse_shareable_link(&link).unwrap().content_id, "cid1");
    }

    #[test]
    fn test_rejects_unsafe_content_id() {
        assert!(build_shareable_link(&base(), "a/b", ShareType::Partner).is_err());
        assert!(build_shareable_link(&base(), "", ShareType::Partner).is_err());
    }

    #[test]
    fn test_parse_rejects_foreign_links() {
        assert!(parse_shareable_link("https://app.example.com/records/partner/cid").is_err());
        assert!(parse_shareable_link("https://app.example.com/shared/cousin/cid").is_err());
        assert!(parse_shareable_link("not a url").is_err());
    }
}
