//! ONVIF SOAP request bodies and response scanning.
//!
//! Only the handful of elements the session needs are read. Elements are
//! matched by local name, so namespace prefixes (`tt:`, `trt:`, `tptz:`) vary
//! freely between vendors without breaking the scan.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::camera::port::{AbsoluteMove, CameraError};
use crate::models::orientation::NormalizedOrientation;

pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

const ENVELOPE_OPEN: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope""#,
    r#" xmlns:tds="http://www.onvif.org/ver10/device/wsdl""#,
    r#" xmlns:trt="http://www.onvif.org/ver10/media/wsdl""#,
    r#" xmlns:tptz="http://www.onvif.org/ver20/ptz/wsdl""#,
    r#" xmlns:tt="http://www.onvif.org/ver10/schema">"#,
);
const ENVELOPE_CLOSE: &str = "</s:Body></s:Envelope>";

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const BASE64_ENCODING_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// One SOAP operation: its action name (for errors and logs) and body XML.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapRequest {
    pub action: &'static str,
    pub body: String,
}

impl SoapRequest {
    pub fn envelope(&self) -> String {
        self.envelope_with(None)
    }

    /// Envelope carrying `security` in its `s:Header` when present.
    pub fn envelope_with(&self, security: Option<&UsernameToken>) -> String {
        let header = security
            .map(|token| format!("<s:Header>{}</s:Header>", token.to_xml()))
            .unwrap_or_default();
        format!("{ENVELOPE_OPEN}{header}<s:Body>{}{ENVELOPE_CLOSE}", self.body)
    }
}

/// WS-Security `UsernameToken` using the `PasswordDigest` profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameToken {
    pub username: String,
    /// `base64(sha1(nonce + created + password))`
    pub password_digest: String,
    pub nonce: String,
    pub created: String,
}

impl UsernameToken {
    /// Token with a fresh random nonce, created now.
    pub fn generate(username: &str, password: &str) -> Self {
        let nonce = Uuid::new_v4();
        Self::with_nonce(username, password, nonce.as_bytes(), Utc::now())
    }

    pub fn with_nonce(
        username: &str,
        password: &str,
        nonce: &[u8],
        created: DateTime<Utc>,
    ) -> Self {
        let created = created.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(created.as_bytes());
        hasher.update(password.as_bytes());
        Self {
            username: username.to_string(),
            password_digest: general_purpose::STANDARD.encode(hasher.finalize()),
            nonce: general_purpose::STANDARD.encode(nonce),
            created,
        }
    }

    fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<wsse:Security s:mustUnderstand="1" xmlns:wsse="{wsse}" xmlns:wsu="{wsu}">"#,
                "<wsse:UsernameToken>",
                "<wsse:Username>{username}</wsse:Username>",
                r#"<wsse:Password Type="{password_type}">{digest}</wsse:Password>"#,
                r#"<wsse:Nonce EncodingType="{encoding}">{nonce}</wsse:Nonce>"#,
                "<wsu:Created>{created}</wsu:Created>",
                "</wsse:UsernameToken>",
                "</wsse:Security>"
            ),
            wsse = WSSE_NS,
            wsu = WSU_NS,
            username = escape_xml(&self.username),
            password_type = PASSWORD_DIGEST_TYPE,
            digest = self.password_digest,
            encoding = BASE64_ENCODING_TYPE,
            nonce = self.nonce,
            created = self.created,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddresses {
    pub media: String,
    pub ptz: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaProfile {
    pub token: String,
    pub name: String,
}

pub fn get_capabilities() -> SoapRequest {
    SoapRequest {
        action: "GetCapabilities",
        body: "<tds:GetCapabilities><tds:Category>All</tds:Category></tds:GetCapabilities>"
            .to_string(),
    }
}

pub fn get_profiles() -> SoapRequest {
    SoapRequest {
        action: "GetProfiles",
        body: "<trt:GetProfiles/>".to_string(),
    }
}

pub fn get_snapshot_uri(profile_token: &str) -> SoapRequest {
    SoapRequest {
        action: "GetSnapshotUri",
        body: format!(
            "<trt:GetSnapshotUri><trt:ProfileToken>{}</trt:ProfileToken></trt:GetSnapshotUri>",
            escape_xml(profile_token)
        ),
    }
}

pub fn get_status(profile_token: &str) -> SoapRequest {
    SoapRequest {
        action: "GetStatus",
        body: format!(
            "<tptz:GetStatus><tptz:ProfileToken>{}</tptz:ProfileToken></tptz:GetStatus>",
            escape_xml(profile_token)
        ),
    }
}

pub fn absolute_move(profile_token: &str, command: &AbsoluteMove) -> SoapRequest {
    let zoom_position = command
        .zoom
        .map(|zoom| format!(r#"<tt:Zoom x="{zoom}"/>"#))
        .unwrap_or_default();
    let speed = command.speed;
    SoapRequest {
        action: "AbsoluteMove",
        body: format!(
            concat!(
                "<tptz:AbsoluteMove>",
                "<tptz:ProfileToken>{token}</tptz:ProfileToken>",
                "<tptz:Position>",
                r#"<tt:PanTilt x="{pan}" y="{tilt}"/>"#,
                "{zoom_position}",
                "</tptz:Position>",
                "<tptz:Speed>",
                r#"<tt:PanTilt x="{speed_pan}" y="{speed_tilt}"/>"#,
                r#"<tt:Zoom x="{speed_zoom}"/>"#,
                "</tptz:Speed>",
                "</tptz:AbsoluteMove>"
            ),
            token = escape_xml(profile_token),
            pan = command.pan,
            tilt = command.tilt,
            zoom_position = zoom_position,
            speed_pan = speed.pan,
            speed_tilt = speed.tilt,
            speed_zoom = speed.zoom,
        ),
    }
}

pub fn parse_capabilities(xml: &str) -> Result<ServiceAddresses, CameraError> {
    let media = find_element(xml, "Media")
        .and_then(|media| child_text(media.inner, "XAddr"))
        .ok_or_else(|| malformed("GetCapabilities", "missing Media XAddr"))?;
    let ptz = find_element(xml, "PTZ").and_then(|ptz| child_text(ptz.inner, "XAddr"));
    Ok(ServiceAddresses { media, ptz })
}

pub fn parse_profiles(xml: &str) -> Result<Vec<MediaProfile>, CameraError> {
    let mut profiles = Vec::new();
    let mut rest = xml;
    while let Some(element) = find_element(rest, "Profiles") {
        let token = attribute(element.open_tag, "token")
            .ok_or_else(|| malformed("GetProfiles", "profile without token attribute"))?;
        let name = child_text(element.inner, "Name").unwrap_or_else(|| token.clone());
        profiles.push(MediaProfile { token, name });
        rest = &rest[element.end..];
    }
    Ok(profiles)
}

pub fn parse_snapshot_uri(xml: &str) -> Result<String, CameraError> {
    child_text(xml, "Uri").ok_or_else(|| malformed("GetSnapshotUri", "missing Uri"))
}

/// Reads `PanTilt x/y` and the optional `Zoom x` from a `GetStatus` response.
pub fn parse_status(xml: &str) -> Result<NormalizedOrientation, CameraError> {
    let position = find_element(xml, "Position")
        .ok_or_else(|| malformed("GetStatus", "missing Position"))?;
    let pan_tilt = find_element(position.inner, "PanTilt")
        .ok_or_else(|| malformed("GetStatus", "missing PanTilt"))?;
    let pan = number_attribute(pan_tilt.open_tag, "x", "GetStatus")?;
    let tilt = number_attribute(pan_tilt.open_tag, "y", "GetStatus")?;
    let zoom = match find_element(position.inner, "Zoom") {
        Some(zoom) => Some(number_attribute(zoom.open_tag, "x", "GetStatus")?),
        None => None,
    };
    Ok(NormalizedOrientation { pan, tilt, zoom })
}

/// Human-readable reason from a SOAP fault body, or the raw body when none.
pub fn fault_reason(xml: &str) -> String {
    child_text(xml, "Text")
        .or_else(|| child_text(xml, "Reason"))
        .or_else(|| child_text(xml, "faultstring"))
        .unwrap_or_else(|| xml.trim().chars().take(200).collect())
}

fn malformed(action: &'static str, detail: &str) -> CameraError {
    CameraError::MalformedResponse {
        action,
        detail: detail.to_string(),
    }
}

fn number_attribute(tag: &str, name: &str, action: &'static str) -> Result<f64, CameraError> {
    let raw = attribute(tag, name)
        .ok_or_else(|| malformed(action, &format!("missing attribute {name}")))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| malformed(action, &format!("attribute {name}={raw:?}: {e}")))
}

/// One element located in a document slice.
#[derive(Debug, Clone, Copy)]
struct Element<'a> {
    /// `<prefix:Name attr="...">` including the angle brackets.
    open_tag: &'a str,
    /// Content between the opening and closing tags; empty when self-closing.
    inner: &'a str,
    /// Byte offset just past the element in the scanned slice.
    end: usize,
}

fn find_element<'a>(xml: &'a str, local_name: &str) -> Option<Element<'a>> {
    let mut cursor = 0;
    while let Some(found) = xml[cursor..].find('<') {
        let start = cursor + found;
        let tag_end = start + xml[start..].find('>')?;
        let open_tag = &xml[start..=tag_end];
        cursor = tag_end + 1;

        let Some(qualified) = tag_name(open_tag) else {
            continue;
        };
        if local(qualified) != local_name {
            continue;
        }

        if open_tag.ends_with("/>") {
            return Some(Element {
                open_tag,
                inner: "",
                end: cursor,
            });
        }

        let close = format!("</{qualified}>");
        let close_at = cursor + xml[cursor..].find(&close)?;
        return Some(Element {
            open_tag,
            inner: &xml[cursor..close_at],
            end: close_at + close.len(),
        });
    }
    None
}

/// Name of an opening tag; `None` for closing tags, comments and declarations.
fn tag_name(open_tag: &str) -> Option<&str> {
    let body = open_tag.strip_prefix('<')?;
    if body.starts_with(['/', '?', '!']) {
        return None;
    }
    let end = body
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(body.len());
    Some(&body[..end])
}

fn local(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

fn child_text(xml: &str, local_name: &str) -> Option<String> {
    let element = find_element(xml, local_name)?;
    let text = unescape_xml(element.inner.trim());
    (!text.is_empty()).then_some(text)
}

fn attribute(open_tag: &str, name: &str) -> Option<String> {
    let mut rest = open_tag;
    while let Some(at) = rest.find(name) {
        let before = rest[..at].chars().last();
        let after = &rest[at + name.len()..];
        rest = after;
        if !matches!(before, Some(c) if c.is_whitespace()) {
            continue;
        }
        let Some(after_eq) = after.trim_start().strip_prefix('=') else {
            continue;
        };
        let after_eq = after_eq.trim_start();
        let quote = after_eq.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value = &after_eq[1..];
        let close = value.find(quote)?;
        return Some(unescape_xml(&value[..close]));
    }
    None
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
