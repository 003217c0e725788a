//! UPnP SOAP control endpoints: ContentDirectory:1 and ConnectionManager:1.
//!
//! Arguments are recovered with a real XML parser; the envelopes from
//! known clients are small and well-formed, but string scanning is not a
//! parser.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::sync::Arc;
use tracing::{debug, warn};

use bobine_core::repository::MediaDirectory;

use crate::description;
use crate::didl::{self, escape_xml};
use crate::ssdp::SsdpDevice;

const CONTENT_DIRECTORY: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";
const CONNECTION_MANAGER: &str = "urn:schemas-upnp-org:service:ConnectionManager:1";

#[derive(Clone)]
pub struct DlnaState {
    pub directory: Arc<dyn MediaDirectory>,
    pub device: Arc<SsdpDevice>,
    /// `http://host:port` prefix LAN clients use for stream URLs.
    pub base_url: String,
    pub friendly_name: String,
}

/// DLNA routes, mounted by the server under `/dlna`.
pub fn router(state: DlnaState) -> Router {
    Router::new()
        .route("/device.xml", get(device_xml))
        .route("/cds.xml", get(cds_scpd))
        .route("/cms.xml", get(cms_scpd))
        .route("/control/ContentDirectory", post(content_directory))
        .route("/control/ConnectionManager", post(connection_manager))
        .with_state(state)
}

/// Recover the text content of the first `<name>` element in a SOAP body.
#[must_use]
pub fn extract_soap_arg(body: &str, name: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    let mut inside = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == name.as_bytes() => {
                inside = true;
            }
            Ok(Event::Text(t)) if inside => {
                return t.unescape().ok().map(|s| s.into_owned());
            }
            Ok(Event::End(e)) if inside && e.local_name().as_ref() == name.as_bytes() => {
                // Element was present but empty.
                return Some(String::new());
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == name.as_bytes() => {
                return Some(String::new());
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

/// Action name from a `SOAPACTION: "urn:...#Action"` header.
#[must_use]
pub fn soap_action(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("soapaction")?.to_str().ok()?;
    let trimmed = raw.trim().trim_matches('"');
    Some(trimmed.rsplit_once('#')?.1.to_string())
}

fn xml_response(status: StatusCode, body: String) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, r#"text/xml; charset="utf-8""#)
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn soap_response(service: &str, action: &str, args: &str) -> Response {
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action}Response xmlns:u="{service}">{args}</u:{action}Response></s:Body></s:Envelope>"#
    );
    xml_response(StatusCode::OK, body)
}

fn soap_fault(code: u32, description: &str) -> Response {
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>{code}</errorCode><errorDescription>{}</errorDescription></UPnPError></detail></s:Fault></s:Body></s:Envelope>"#,
        escape_xml(description)
    );
    xml_response(StatusCode::INTERNAL_SERVER_ERROR, body)
}

async fn device_xml(State(state): State<DlnaState>) -> Response {
    let xml = description::device_description(
        state.device.udn(),
        &state.friendly_name,
        &state.base_url,
    );
    xml_response(StatusCode::OK, xml)
}

async fn cds_scpd() -> Response {
    xml_response(StatusCode::OK, description::content_directory_scpd().to_string())
}

async fn cms_scpd() -> Response {
    xml_response(StatusCode::OK, description::connection_manager_scpd().to_string())
}

async fn content_directory(
    State(state): State<DlnaState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(action) = soap_action(&headers) else {
        return soap_fault(401, "missing SOAPACTION header");
    };
    debug!(action = %action, "ContentDirectory control request");

    match action.as_str() {
        "Browse" => {
            let object_id = extract_soap_arg(&body, "ObjectID").unwrap_or_default();
            browse(&state, &object_id).await
        }
        "Search" => {
            let container_id = extract_soap_arg(&body, "ContainerID").unwrap_or_default();
            browse(&state, &container_id).await
        }
        "GetSystemUpdateID" => soap_response(CONTENT_DIRECTORY, &action, "<Id>1</Id>"),
        other => soap_fault(401, &format!("unknown action {other}")),
    }
}

/// `ObjectID = 0` is the root: the set of libraries as containers. Any
/// other ObjectID is treated as a library whose items are returned.
async fn browse(state: &DlnaState, object_id: &str) -> Response {
    let (didl, count) = if object_id.is_empty() || object_id == "0" {
        match state.directory.get_libraries().await {
            Ok(libraries) => (didl::render_containers(&libraries), libraries.len()),
            Err(e) => {
                warn!("library listing failed: {}", e);
                return soap_fault(501, "library listing failed");
            }
        }
    } else {
        match state.directory.get_library_items(object_id).await {
            Ok(items) => (
                didl::render_items(object_id, &items, &state.base_url),
                items.len(),
            ),
            Err(e) => {
                warn!(library = %object_id, "item listing failed: {}", e);
                return soap_fault(501, "item listing failed");
            }
        }
    };

    let args = format!(
        "<Result>{}</Result><NumberReturned>{count}</NumberReturned><TotalMatches>{count}</TotalMatches><UpdateID>1</UpdateID>",
        escape_xml(&didl)
    );
    soap_response(CONTENT_DIRECTORY, "Browse", &args)
}

async fn connection_manager(headers: HeaderMap, _body: String) -> Response {
    let Some(action) = soap_action(&headers) else {
        return soap_fault(401, "missing SOAPACTION header");
    };

    match action.as_str() {
        "GetProtocolInfo" => {
            let source = [
                "http-get:*:video/mp4:*",
                "http-get:*:video/x-matroska:*",
                "http-get:*:video/mp2t:*",
                "http-get:*:video/webm:*",
                "http-get:*:application/vnd.apple.mpegurl:*",
            ]
            .join(",");
            soap_response(
                CONNECTION_MANAGER,
                &action,
                &format!("<Source>{source}</Source><Sink></Sink>"),
            )
        }
        "GetCurrentConnectionIDs" => soap_response(
            CONNECTION_MANAGER,
            &action,
            "<ConnectionIDs>0</ConnectionIDs>",
        ),
        "GetCurrentConnectionInfo" => soap_response(
            CONNECTION_MANAGER,
            &action,
            "<RcsID>-1</RcsID><AVTransportID>-1</AVTransportID><ProtocolInfo></ProtocolInfo><PeerConnectionManager></PeerConnectionManager><PeerConnectionID>-1</PeerConnectionID><Direction>Output</Direction><Status>OK</Status>",
        ),
        other => soap_fault(401, &format!("unknown action {other}")),
    }
}
