//! ONVIF camera session with an explicit connect/disconnect lifecycle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use digest_auth::AuthContext;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Method, StatusCode};

use crate::camera::onvif::{self, MediaProfile, ServiceAddresses, SoapRequest, UsernameToken};
use crate::camera::port::{AbsoluteMove, CameraError, CameraPort};
use crate::models::config::CameraConfig;
use crate::models::orientation::NormalizedOrientation;

/// Services and profiles learned during `connect`.
struct Connection {
    services: ServiceAddresses,
    profiles: Vec<MediaProfile>,
    active_profile: Option<usize>,
}

pub struct CameraSession {
    config: CameraConfig,
    http: reqwest::Client,
    connection: Option<Connection>,
}

impl CameraSession {
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            config,
            http,
            connection: None,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Discovers the media/PTZ services, loads the profiles and activates the
    /// first one. Reconnecting replaces any previous connection.
    pub async fn connect(&mut self) -> Result<(), CameraError> {
        let device_url = self.config.device_service_url();
        log::info!("connect: device={device_url}");

        let capabilities = self.call(&device_url, onvif::get_capabilities()).await?;
        let services = onvif::parse_capabilities(&capabilities)?;
        if services.ptz.is_none() {
            log::warn!("connect: camera does not advertise a PTZ service");
        }

        let profiles_xml = self.call(&services.media, onvif::get_profiles()).await?;
        let profiles = onvif::parse_profiles(&profiles_xml)?;
        let active_profile = if profiles.is_empty() { None } else { Some(0) };

        log::info!(
            "connect: media={} ptz={} profiles={}",
            services.media,
            services.ptz.as_deref().unwrap_or("-"),
            profiles.len()
        );

        self.connection = Some(Connection {
            services,
            profiles,
            active_profile,
        });
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            log::info!("disconnect: host={}", self.config.host);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn profiles(&self) -> &[MediaProfile] {
        self.connection
            .as_ref()
            .map(|connection| connection.profiles.as_slice())
            .unwrap_or_default()
    }

    pub fn active_profile(&self) -> Option<&MediaProfile> {
        let connection = self.connection.as_ref()?;
        connection
            .active_profile
            .and_then(|index| connection.profiles.get(index))
    }

    pub fn select_profile(&mut self, token: &str) -> Result<(), CameraError> {
        let connection = self.connection.as_mut().ok_or(CameraError::NotConnected)?;
        let index = connection
            .profiles
            .iter()
            .position(|profile| profile.token == token)
            .ok_or_else(|| CameraError::UnknownProfile(token.to_string()))?;
        connection.active_profile = Some(index);
        log::info!("select_profile: token={token}");
        Ok(())
    }

    pub async fn snapshot_uri(&self) -> Result<String, CameraError> {
        let (connection, profile) = self.require_profile()?;
        let xml = self
            .call(
                &connection.services.media,
                onvif::get_snapshot_uri(&profile.token),
            )
            .await?;
        onvif::parse_snapshot_uri(&xml)
    }

    /// Downloads the current snapshot into `path`, creating parent directories.
    pub async fn save_snapshot(&self, path: &Path) -> Result<PathBuf, CameraError> {
        let bytes = self.fetch_snapshot().await?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        log::info!(
            "save_snapshot: path={} bytes={}",
            path.display(),
            bytes.len()
        );
        Ok(path.to_path_buf())
    }

    /// Current snapshot as a `data:` URL for display surfaces.
    pub async fn snapshot_data_url(&self) -> Result<String, CameraError> {
        let bytes = self.fetch_snapshot().await?;
        Ok(jpeg_data_url(&bytes))
    }

    async fn fetch_snapshot(&self) -> Result<Vec<u8>, CameraError> {
        let uri = self.snapshot_uri().await?;
        let response = self
            .send_authorized(Method::GET, None, || self.http.get(&uri))
            .await?;
        let response = response.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    fn require_connection(&self) -> Result<&Connection, CameraError> {
        self.connection.as_ref().ok_or(CameraError::NotConnected)
    }

    fn require_profile(&self) -> Result<(&Connection, &MediaProfile), CameraError> {
        let connection = self.require_connection()?;
        let profile = connection
            .active_profile
            .and_then(|index| connection.profiles.get(index))
            .ok_or(CameraError::NoActiveProfile)?;
        Ok((connection, profile))
    }

    fn ptz_address(connection: &Connection) -> Result<&str, CameraError> {
        connection
            .services
            .ptz
            .as_deref()
            .ok_or(CameraError::NotConnected)
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.config.username.as_deref()?;
        Some((username, self.config.password.as_deref().unwrap_or_default()))
    }

    /// Sends the request built by `build`; a 401 is answered once with the
    /// credentials the `WWW-Authenticate` challenge asks for.
    async fn send_authorized<F>(
        &self,
        method: Method,
        body: Option<&[u8]>,
        build: F,
    ) -> Result<reqwest::Response, CameraError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let response = build().send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some((username, password)) = self.credentials() else {
            return Ok(response);
        };

        let retry = match digest_challenge(&response) {
            Some(challenge) => {
                let uri = request_uri(response.url());
                log::debug!("http: digest challenge for {uri}");
                let authorization =
                    digest_authorization(&challenge, username, password, &uri, &method, body)?;
                build().header(AUTHORIZATION, authorization)
            }
            None => build().basic_auth(username, Some(password)),
        };
        Ok(retry.send().await?)
    }

    async fn call(&self, url: &str, request: SoapRequest) -> Result<String, CameraError> {
        log::debug!("soap: action={} url={url}", request.action);
        let security = self
            .credentials()
            .map(|(username, password)| UsernameToken::generate(username, password));
        let envelope = request.envelope_with(security.as_ref());
        let response = self
            .send_authorized(Method::POST, Some(envelope.as_bytes()), || {
                self.http
                    .post(url)
                    .header(CONTENT_TYPE, onvif::SOAP_CONTENT_TYPE)
                    .body(envelope.clone())
            })
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CameraError::Soap {
                action: request.action,
                status: status.as_u16(),
                fault: onvif::fault_reason(&body),
            });
        }
        Ok(body)
    }
}

impl CameraPort for CameraSession {
    async fn current_orientation(&self) -> Result<NormalizedOrientation, CameraError> {
        let (connection, profile) = self.require_profile()?;
        let ptz = Self::ptz_address(connection)?;
        let xml = self.call(ptz, onvif::get_status(&profile.token)).await?;
        onvif::parse_status(&xml)
    }

    async fn move_absolute(&self, command: AbsoluteMove) -> Result<(), CameraError> {
        let (connection, profile) = self.require_profile()?;
        let ptz = Self::ptz_address(connection)?;
        self.call(ptz, onvif::absolute_move(&profile.token, &command))
            .await?;
        log::debug!(
            "move_absolute: pan={:.4} tilt={:.4} zoom={:?}",
            command.pan,
            command.tilt,
            command.zoom
        );
        Ok(())
    }
}

/// First `Digest` challenge among the response's `WWW-Authenticate` headers.
fn digest_challenge(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| {
            value
                .trim_start()
                .get(..6)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        })
        .map(str::to_string)
}

/// Path and query as they appear in the digest `uri` field.
fn request_uri(url: &reqwest::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

fn digest_authorization(
    challenge: &str,
    username: &str,
    password: &str,
    uri: &str,
    method: &Method,
    body: Option<&[u8]>,
) -> Result<String, CameraError> {
    let mut prompt = digest_auth::parse(challenge)?;
    let context = if *method == Method::POST {
        AuthContext::new_post(username, password, uri, body)
    } else {
        AuthContext::new(username, password, uri)
    };
    Ok(prompt.respond(&context)?.to_header_string())
}

fn jpeg_data_url(bytes: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CameraSession {
        CameraSession::new(CameraConfig::default()).expect("client")
    }

    fn connected(profiles: &[&str]) -> CameraSession {
        let mut session = session();
        session.connection = Some(Connection {
            services: ServiceAddresses {
                media: "http://cam/onvif/media_service".to_string(),
                ptz: Some("http://cam/onvif/ptz_service".to_string()),
            },
            profiles: profiles
                .iter()
                .map(|token| MediaProfile {
                    token: token.to_string(),
                    name: token.to_string(),
                })
                .collect(),
            active_profile: if profiles.is_empty() { None } else { Some(0) },
        });
        session
    }

    #[tokio::test]
    async fn operations_before_connect_fail_with_not_connected() {
        let session = session();
        assert!(!session.is_connected());
        assert!(session.profiles().is_empty());
        assert!(matches!(
            session.current_orientation().await,
            Err(CameraError::NotConnected)
        ));
        let command = AbsoluteMove {
            pan: 0.0,
            tilt: 0.0,
            zoom: None,
            speed: Default::default(),
        };
        assert!(matches!(
            session.move_absolute(command).await,
            Err(CameraError::NotConnected)
        ));
        assert!(matches!(
            session.snapshot_uri().await,
            Err(CameraError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn connected_without_profiles_reports_no_active_profile() {
        let session = connected(&[]);
        assert!(session.is_connected());
        assert!(session.active_profile().is_none());
        assert!(matches!(
            session.current_orientation().await,
            Err(CameraError::NoActiveProfile)
        ));
    }

    #[test]
    fn select_profile_switches_active_profile() {
        let mut session = connected(&["main", "sub"]);
        assert_eq!(session.active_profile().map(|p| p.token.as_str()), Some("main"));
        session.select_profile("sub").expect("known token");
        assert_eq!(session.active_profile().map(|p| p.token.as_str()), Some("sub"));
        assert!(matches!(
            session.select_profile("missing"),
            Err(CameraError::UnknownProfile(token)) if token == "missing"
        ));
    }

    #[test]
    fn disconnect_clears_profiles() {
        let mut session = connected(&["main"]);
        session.disconnect();
        assert!(!session.is_connected());
        assert!(session.active_profile().is_none());
        assert!(matches!(
            session.select_profile("main"),
            Err(CameraError::NotConnected)
        ));
    }

    #[test]
    fn digest_response_names_user_and_uri() {
        let challenge = r#"Digest realm="IP Camera", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", qop="auth""#;
        let header = digest_authorization(
            challenge,
            "admin",
            "secret",
            "/cgi-bin/snapshot.cgi?channel=1",
            &Method::GET,
            None,
        )
        .expect("digest header");
        assert!(header.starts_with("Digest "));
        assert!(header.contains(r#"username="admin""#));
        assert!(header.contains(r#"realm="IP Camera""#));
        assert!(header.contains(r#"uri="/cgi-bin/snapshot.cgi?channel=1""#));
        assert!(header.contains("response="));
        assert!(!header.contains("secret"));
    }

    #[test]
    fn malformed_digest_challenge_is_an_error() {
        assert!(matches!(
            digest_authorization(
                r#"Digest realm="cam""#,
                "admin",
                "secret",
                "/",
                &Method::GET,
                None
            ),
            Err(CameraError::Digest(_))
        ));
    }

    #[test]
    fn digest_uri_keeps_query() {
        let url = reqwest::Url::parse("http://cam:8080/snap.jpg?size=large").expect("url");
        assert_eq!(request_uri(&url), "/snap.jpg?size=large");
        let url = reqwest::Url::parse("http://cam/onvif/media_service").expect("url");
        assert_eq!(request_uri(&url), "/onvif/media_service");
    }

    #[test]
    fn credentials_default_missing_password_to_empty() {
        assert!(session().credentials().is_none());
        let session = CameraSession::new(CameraConfig {
            username: Some("admin".to_string()),
            ..CameraConfig::default()
        })
        .expect("client");
        assert_eq!(session.credentials(), Some(("admin", "")));
    }

    #[test]
    fn data_url_wraps_base64_payload() {
        assert_eq!(jpeg_data_url(b"abc"), "data:image/jpeg;base64,YWJj");
    }
}
