//! Fire-and-forget command datagrams to the UIS
//!
//! Commands are wrapped in the control interface's SOAP envelope and handed
//! to the network stack as a single UDP datagram. The UIS never replies;
//! "success" means the send call returned, nothing more. The endpoint port
//! is resolved lazily on the first send and memoized for the process
//! lifetime.

use crate::discovery::UisDiscovery;
use crate::error::{RelayError, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::debug;

/// SOAP envelope for a `serviceEventRequest` against the control interface.
/// Namespace soup preserved verbatim from the control server's WSDL.
const ENVELOPE_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope" xmlns:SOAP-ENC="http://www.w3.org/2003/05/soap-encoding" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:wsdl="http://tempuri.org/wsdl.xsd" xmlns:md="urn:rpm-metadatainterface" xmlns:ctl="urn:rpm-controlinterface" xmlns:rdm="urn:rpm-rdminterface" xmlns:rpm="urn:rpm-common" xmlns:sm="urn:rpm-stateManagementInterface" xmlns:smrdm="urn:sm-rdminterface" xmlns:snsr="urn:rpm-userSNSRInterface" xmlns:sync="urn:rpm-syncinterface"><SOAP-ENV:Body><ctl:serviceEventRequest>"#;

const ENVELOPE_TAIL: &str = "</ctl:serviceEventRequest></SOAP-ENV:Body></SOAP-ENV:Envelope>";

/// A service event request as received over the JSON API
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub zone: String,
    pub component: String,
    #[serde(rename = "logicalComponent")]
    pub logical_component: String,
    pub service: String,
    #[serde(rename = "serviceVariantID", default = "default_variant")]
    pub service_variant_id: String,
    pub command: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, Value>,
}

fn default_variant() -> String {
    "1".to_string()
}

impl CommandRequest {
    /// Reject requests with empty required fields before anything is sent
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("zone", &self.zone),
            ("component", &self.component),
            ("logicalComponent", &self.logical_component),
            ("service", &self.service),
            ("command", &self.command),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(RelayError::bad_request(format!("missing field '{field}'")));
            }
        }
        Ok(())
    }
}

/// Sender of one-shot command datagrams to the UIS
pub struct CommandSender {
    host: String,
    discovery: UisDiscovery,
    port: OnceCell<u16>,
}

impl CommandSender {
    /// Sender that resolves its port via discovery on first use
    pub fn new(host: String, discovery: UisDiscovery) -> Self {
        Self {
            host,
            discovery,
            port: OnceCell::new(),
        }
    }

    /// Sender with a known port; discovery is skipped entirely
    pub fn with_endpoint(host: String, port: u16, discovery: UisDiscovery) -> Self {
        Self {
            host,
            discovery,
            port: OnceCell::new_with(Some(port)),
        }
    }

    /// The memoized UIS port, if a send has resolved it already
    pub fn resolved_port(&self) -> Option<u16> {
        self.port.get().copied()
    }

    /// Build the envelope and hand it to the network stack.
    ///
    /// No response is awaited and nothing is retried; a transport error
    /// means the datagram never left this host, not that the command
    /// failed remotely.
    pub async fn send(&self, request: &CommandRequest) -> Result<()> {
        if self.host.is_empty() {
            return Err(RelayError::endpoint_unresolved(
                "control host is not configured",
            ));
        }
        let port = *self.port.get_or_init(|| self.discovery.resolve()).await;
        let envelope = build_envelope(request);

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| RelayError::transport(format!("socket: {e}")))?;
        socket
            .send_to(envelope.as_bytes(), (self.host.as_str(), port))
            .await
            .map_err(|e| RelayError::transport(format!("sendto {}:{port}: {e}", self.host)))?;

        debug!(
            zone = %request.zone,
            service = %request.service,
            command = %request.command,
            "command sent to {}:{port}",
            self.host
        );
        Ok(())
    }
}

/// Assemble the full serviceEventRequest envelope for one command
fn build_envelope(request: &CommandRequest) -> String {
    let mut body = String::with_capacity(ENVELOPE_HEAD.len() + ENVELOPE_TAIL.len() + 256);
    body.push_str(ENVELOPE_HEAD);
    push_tag(&mut body, "zoneString", &request.zone);
    push_tag(&mut body, "componentString", &request.component);
    push_tag(&mut body, "logicalComponentString", &request.logical_component);
    push_tag(&mut body, "serviceString", &request.service);
    push_tag(&mut body, "serviceVariantIDString", &request.service_variant_id);
    push_tag(&mut body, "commandString", &request.command);
    for (name, value) in &request.arguments {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        body.push_str(&format!(
            r#"<arg name="{}" value="{}"/>"#,
            xml_escape(name),
            xml_escape(&value)
        ));
    }
    body.push_str(ENVELOPE_TAIL);
    body
}

fn push_tag(out: &mut String, tag: &str, value: &str) {
    out.push_str(&format!("<{tag}>{}</{tag}>", xml_escape(value)));
}

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
