/*!
SOAP transport: the outbound `sendAction` HTTP call and the inbound
request/response shaping used by the dispatcher (component H) when it
routes a POST/M-POST to this module.

Grounded on the teacher's blocking `reqwest` usage pattern elsewhere in
the stack (the teacher's own `soap` module never issued HTTP itself;
the request-building style follows `ssdp/search.rs`'s header
construction).
*/
use crate::description::TypeID;
use crate::error::Error;
use crate::service_table::ServiceEntry;
use crate::soap::{
    build_action_envelope, build_fault_envelope, build_response_envelope, parse_action_envelope,
    parse_response_envelope, parse_soap_action_header, soap_action_header, ActionEnvelope,
    Arguments, ResponseEnvelope,
};
use crate::syntax::*;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Outcome of `sendAction`, distinguishing a UPnPError fault (positive
/// code, carried in the response body) from a transport-level failure.
#[derive(Debug)]
pub enum ActionOutcome {
    Result(Arguments),
    Fault { error_code: u32, error_description: String },
}

/// The fully resolved inbound request, handed to the device callback as
/// an `ActionRequest` event.
#[derive(Debug)]
pub struct InboundAction {
    pub action_name: String,
    pub service_type: TypeID,
    pub args: Arguments,
    pub raw_envelope: String,
}

// ------------------------------------------------------------------------------------------------
// Public Functions — Outbound
// ------------------------------------------------------------------------------------------------

/// Issue the outbound action call described in §4.4.
pub fn send_action(
    control_url: &str,
    service_type: &TypeID,
    action_name: &str,
    args: &[(String, String)],
) -> Result<ActionOutcome, Error> {
    let envelope = build_action_envelope(service_type, action_name, args)?;

    let client = Client::builder()
        .timeout(Duration::from_secs(DEFAULT_SOAP_TIMEOUT_SECS))
        .build()?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(SOAP_CONTENT_TYPE));
    headers.insert(
        HEAD_SOAPACTION,
        HeaderValue::from_str(&soap_action_header(service_type, action_name))
            .map_err(|e| Error::BadRequest(e.to_string()))?,
    );

    let response = client.post(control_url).headers(headers).body(envelope).send()?;
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !content_type.contains("text/xml") {
        return Err(Error::BadResponse(format!(
            "unexpected content-type `{}`",
            content_type
        )));
    }
    if status.as_u16() != 200 && status.as_u16() != 500 {
        return Err(Error::BadResponse(format!("unexpected status {}", status)));
    }

    let body = response.text().map_err(Error::from)?;
    match parse_response_envelope(&body, action_name)? {
        ResponseEnvelope::Result(args) => Ok(ActionOutcome::Result(args)),
        ResponseEnvelope::Fault(fault) => Ok(ActionOutcome::Fault {
            error_code: fault.error_code,
            error_description: fault.error_description,
        }),
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions — Inbound
// ------------------------------------------------------------------------------------------------

/// Validate and parse an inbound SOAP request, per §4.4. `entry` is the
/// service resolved by control-URL path; `soap_action_header` and
/// `content_type` come from the HTTP request headers.
pub fn parse_inbound_request(
    entry: &ServiceEntry,
    content_type: &str,
    soap_action: &str,
    body: &str,
) -> Result<InboundAction, Error> {
    if !content_type.contains("text/xml") {
        return Err(Error::BadRequest(format!(
            "unexpected content-type `{}`",
            content_type
        )));
    }

    let (service_type_str, action_name) = parse_soap_action_header(soap_action)?;
    let requested = crate::description::parse_type_id(&service_type_str)?;
    if !requested.matches_modulo_version(&entry.service_type) {
        return Err(Error::InvalidAction(format!(
            "SOAPACTION serviceType `{}` does not match `{}`",
            service_type_str, entry.service_type
        )));
    }

    if service_type_str.starts_with(QUERY_STATE_VARIABLE_NS)
        && action_name == QUERY_STATE_VARIABLE_ACTION
    {
        warn!("parse_inbound_request - rejecting deprecated QueryStateVariable");
        return Err(Error::BadRequest(
            "QueryStateVariable is deprecated".to_string(),
        ));
    }

    let ActionEnvelope {
        action_name,
        service_type,
        args,
    } = parse_action_envelope(body)?;

    debug!(
        "parse_inbound_request - action `{}` on service `{}`",
        action_name, entry.service_id
    );

    Ok(InboundAction {
        action_name,
        service_type,
        args,
        raw_envelope: body.to_string(),
    })
}

/// Build the HTTP response body (and implied status) for an inbound
/// action result: 500 + UPnPError fault if `error_code != 0`, else 200
/// with the wrapped result list.
pub fn build_inbound_response(
    service_type: &TypeID,
    action_name: &str,
    error_code: u32,
    error_description: &str,
    result: &[(String, String)],
) -> Result<(u16, String), Error> {
    if error_code != 0 {
        Ok((500, build_fault_envelope(error_code, error_description)?))
    } else {
        Ok((200, build_response_envelope(service_type, action_name, result)?))
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::TypeID;

    fn entry() -> ServiceEntry {
        ServiceEntry {
            udn: "uuid:1-2-3".to_string(),
            service_type: TypeID::new_service("RenderingControl".to_string(), "1".to_string()),
            service_id: "urn:upnp-org:serviceId:RenderingControl".to_string(),
            scpd_url: "http://h/scpd.xml".to_string(),
            control_url: "http://h/control".to_string(),
            event_sub_url: "http://h/event".to_string(),
            active: true,
            subscriptions: vec![],
        }
    }

    #[test]
    fn parses_inbound_request_matching_modulo_version() {
        let service = TypeID::new_service("RenderingControl".to_string(), "2".to_string());
        let body = build_action_envelope(
            &service,
            "GetVolume",
            &[("InstanceID".to_string(), "0".to_string())],
        )
        .unwrap();
        let header = soap_action_header(&service, "GetVolume");
        let parsed = parse_inbound_request(&entry(), SOAP_CONTENT_TYPE, &header, &body).unwrap();
        assert_eq!(parsed.action_name, "GetVolume");
    }

    #[test]
    fn rejects_query_state_variable() {
        let header = format!(
            "\"{}#{}\"",
            QUERY_STATE_VARIABLE_NS, QUERY_STATE_VARIABLE_ACTION
        );
        let result = parse_inbound_request(&entry(), SOAP_CONTENT_TYPE, &header, "<x/>");
        assert!(result.is_err());
    }

    #[test]
    fn inbound_response_wraps_fault_on_error_code() {
        let service = entry().service_type;
        let (status, body) =
            build_inbound_response(&service, "GetVolume", 718, "ConflictInMpdState", &[]).unwrap();
        assert_eq!(status, 500);
        assert!(body.contains("718"));
    }
}
