//! DIDL-Lite rendering for Browse/Search results.

use bobine_core::models::{LibraryItem, MediaLibrary};

pub const DIDL_HEADER: &str = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#;

/// Escape text for inclusion in XML content or attribute values.
#[must_use]
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Seconds to the `HH:MM:SS` form DIDL duration attributes use.
#[must_use]
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Libraries as browseable DIDL-Lite containers (children of the root).
#[must_use]
pub fn render_containers(libraries: &[MediaLibrary]) -> String {
    let mut out = String::from(DIDL_HEADER);
    for library in libraries {
        out.push_str(&format!(
            r#"<container id="{}" parentID="0" restricted="1" childCount="{}"><dc:title>{}</dc:title><upnp:class>object.container.storageFolder</upnp:class></container>"#,
            escape_xml(&library.id),
            library.item_count,
            escape_xml(&library.title),
        ));
    }
    out.push_str("</DIDL-Lite>");
    out
}

/// Library items as DIDL-Lite `<item>` elements with a `<res>` the
/// renderer can fetch.
#[must_use]
pub fn render_items(library_id: &str, items: &[LibraryItem], base_url: &str) -> String {
    let mut out = String::from(DIDL_HEADER);
    for item in items {
        let stream_url = format!("{base_url}/api/stream/{}/direct", item.asset_id);
        out.push_str(&format!(
            r#"<item id="{id}" parentID="{parent}" restricted="1"><dc:title>{title}</dc:title><upnp:class>object.item.videoItem.movie</upnp:class><res protocolInfo="http-get:*:{mime}:DLNA.ORG_OP=01;DLNA.ORG_CI=0" duration="{duration}" resolution="{width}x{height}" size="{size}">{url}</res></item>"#,
            id = escape_xml(item.asset_id.as_str()),
            parent = escape_xml(library_id),
            title = escape_xml(&item.title),
            mime = escape_xml(&item.mime_type),
            duration = format_duration(item.duration_secs),
            width = item.width,
            height = item.height,
            size = item.size_bytes,
            url = escape_xml(&stream_url),
        ));
    }
    out.push_str("</DIDL-Lite>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bobine_core::models::AssetId;

    #[test]
    fn escapes_the_five_xml_metacharacters() {
        assert_eq!(
            escape_xml(r#"Fast & "Furious" <9> it's"#),
            "Fast &amp; &quot;Furious&quot; &lt;9&gt; it&apos;s"
        );
    }

    #[test]
    fn duration_is_colon_separated() {
        assert_eq!(format_duration(0.0), "00:00:00");
        assert_eq!(format_duration(61.4), "00:01:01");
        assert_eq!(format_duration(7384.0), "02:03:04");
    }

    #[test]
    fn containers_carry_title_and_class() {
        let didl = render_containers(&[MediaLibrary {
            id: "lib-movies".to_string(),
            title: "Movies & More".to_string(),
            item_count: 42,
        }]);

        assert!(didl.starts_with("<DIDL-Lite"));
        assert!(didl.contains(r#"<container id="lib-movies" parentID="0""#));
        assert!(didl.contains("<dc:title>Movies &amp; More</dc:title>"));
        assert!(didl.contains("object.container.storageFolder"));
        assert!(didl.ends_with("</DIDL-Lite>"));
    }

    #[test]
    fn items_carry_res_attributes_and_stream_url() {
        let didl = render_items(
            "lib-movies",
            &[LibraryItem {
                asset_id: AssetId::from("asset-000001"),
                library_id: "lib-movies".to_string(),
                title: "A Movie".to_string(),
                mime_type: "video/x-matroska".to_string(),
                duration_secs: 5400.0,
                width: 1920,
                height: 1080,
                size_bytes: 4_000_000_000,
            }],
            "http://192.168.1.10:8080",
        );

        assert!(didl.contains(
            r#"protocolInfo="http-get:*:video/x-matroska:DLNA.ORG_OP=01;DLNA.ORG_CI=0""#
        ));
        assert!(didl.contains(r#"duration="01:30:00""#));
        assert!(didl.contains(r#"resolution="1920x1080""#));
        assert!(didl.contains(r#"size="4000000000""#));
        assert!(didl.contains("http://192.168.1.10:8080/api/stream/asset-000001/direct"));
    }
}
