/*!
Wire-level string constants shared by every component: HTTP/SSDP header
names, GENA and SOAP header names, XML namespaces and element names, and
the handful of fixed strings the UPnP Device Architecture pins to exact
values (`"ssdp:alive"`, the SOAP envelope namespace, and so on).
*/

// ------------------------------------------------------------------------------------------------
// Network
// ------------------------------------------------------------------------------------------------

pub const SSDP_MULTICAST_ADDR_V4: &str = "239.255.255.250:1900";
pub const SSDP_MULTICAST_ADDR_V6: &str = "[ff02::c]:1900";
pub const SSDP_PORT: u16 = 1900;

pub const EPHEMERAL_PORT_BASE: u16 = 49152;

// ------------------------------------------------------------------------------------------------
// HTTP / SSDP headers
// ------------------------------------------------------------------------------------------------

pub const HTTP_PROTOCOL_NAME: &str = "HTTP";
pub const HTTP_PROTOCOL_VERSION: &str = "1.1";
pub const HTTP_MATCH_ANY_RESOURCE: &str = "*";

pub const HTTP_HEADER_SEP: &str = ":";
pub const HTTP_LINE_SEP: &str = "\r\n";

pub const HTTP_EXTENSION: &str = "\"ssdp:discover\"";

pub const METHOD_NOTIFY: &str = "NOTIFY";
pub const METHOD_SEARCH: &str = "M-SEARCH";
pub const METHOD_SUBSCRIBE: &str = "SUBSCRIBE";
pub const METHOD_UNSUBSCRIBE: &str = "UNSUBSCRIBE";
pub const METHOD_MPOST: &str = "M-POST";

pub const HEAD_BOOTID: &str = "BOOTID.UPNP.ORG";
pub const HEAD_CONFIGID: &str = "CONFIGID.UPNP.ORG";
pub const HEAD_NEXT_BOOTID: &str = "NEXTBOOTID.UPNP.ORG";
pub const HEAD_CACHE_CONTROL: &str = "CACHE-CONTROL";
pub const HEAD_DATE: &str = "DATE";
pub const HEAD_EXT: &str = "EXT";
pub const HEAD_HOST: &str = "HOST";
pub const HEAD_LOCATION: &str = "LOCATION";
pub const HEAD_MAN: &str = "MAN";
pub const HEAD_MX: &str = "MX";
pub const HEAD_NT: &str = "NT";
pub const HEAD_NTS: &str = "NTS";
pub const HEAD_SERVER: &str = "SERVER";
pub const HEAD_ST: &str = "ST";
pub const HEAD_USER_AGENT: &str = "USER-AGENT";
pub const HEAD_USN: &str = "USN";

pub const NTS_ALIVE: &str = "ssdp:alive";
pub const NTS_BYEBYE: &str = "ssdp:byebye";
pub const NTS_UPDATE: &str = "ssdp:update";

// -- GENA -------------------------------------------------------------------------------------

pub const HEAD_CALLBACK: &str = "CALLBACK";
pub const HEAD_SID: &str = "SID";
pub const HEAD_TIMEOUT: &str = "TIMEOUT";
pub const HEAD_SEQ: &str = "SEQ";
pub const HEAD_ACCEPTED_STATEVAR: &str = "ACCEPTED-STATEVAR";

pub const NT_EVENT: &str = "upnp:event";
pub const NTS_PROPCHANGE: &str = "upnp:propchange";

pub const TIMEOUT_INFINITE: &str = "infinite";
pub const TIMEOUT_SECOND_PREFIX: &str = "Second-";

pub const DEFAULT_SUBSCRIPTION_TIMEOUT: u64 = 1801;

// -- SOAP -------------------------------------------------------------------------------------

pub const HEAD_SOAPACTION: &str = "SOAPACTION";
pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=\"utf-8\"";

pub const SOAP_NS_ENVELOPE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_NS_ENCODING: &str = "http://schemas.xmlsoap.org/soap/encoding/";

pub const QUERY_STATE_VARIABLE_NS: &str = "urn:schemas-upnp-org:control-1-0";
pub const QUERY_STATE_VARIABLE_ACTION: &str = "QueryStateVariable";

// -- XML --------------------------------------------------------------------------------------

pub const XML_NS_DEVICE: &str = "urn:schemas-upnp-org:device-1-0";
pub const XML_NS_SERVICE: &str = "urn:schemas-upnp-org:service-1-0";
pub const XML_NS_EVENT: &str = "urn:schemas-upnp-org:event-1-0";

pub const UPNP_DOMAIN: &str = "schemas-upnp-org";
pub const UPNP_STRING: &str = "UPnP";

pub const XML_ATTR_SEND_EVENTS: &str = "sendEvents";

pub const XML_ELEM_ACTION: &str = "action";
pub const XML_ELEM_ACTION_LIST: &str = "actionList";
pub const XML_ELEM_ARGUMENT: &str = "argument";
pub const XML_ELEM_ARGUMENT_LIST: &str = "argumentList";
pub const XML_ELEM_ALLOWED_LIST: &str = "allowedValueList";
pub const XML_ELEM_ALLOWED_RANGE: &str = "allowedValueRange";
pub const XML_ELEM_ALLOWED_VALUE: &str = "allowedValue";
pub const XML_ELEM_DATA_TYPE: &str = "dataType";
pub const XML_ELEM_DEFAULT_VALUE: &str = "defaultValue";
pub const XML_ELEM_DEVICE: &str = "device";
pub const XML_ELEM_DEVICE_LIST: &str = "deviceList";
pub const XML_ELEM_DEVICE_TYPE: &str = "deviceType";
pub const XML_ELEM_DIRECTION: &str = "direction";
pub const XML_ELEM_FRIENDLY_NAME: &str = "friendlyName";
pub const XML_ELEM_ICON: &str = "icon";
pub const XML_ELEM_ICON_DEPTH: &str = "depth";
pub const XML_ELEM_ICON_HEIGHT: &str = "height";
pub const XML_ELEM_ICON_LIST: &str = "iconList";
pub const XML_ELEM_ICON_MIME_TYPE: &str = "mimetype";
pub const XML_ELEM_ICON_URL: &str = "url";
pub const XML_ELEM_ICON_WIDTH: &str = "width";
pub const XML_ELEM_MANUFACTURER: &str = "manufacturer";
pub const XML_ELEM_MANUFACTURER_URL: &str = "manufacturerURL";
pub const XML_ELEM_MAJOR: &str = "major";
pub const XML_ELEM_MAXIMUM: &str = "maximum";
pub const XML_ELEM_MINIMUM: &str = "minimum";
pub const XML_ELEM_MINOR: &str = "minor";
pub const XML_ELEM_MODEL_DESCR: &str = "modelDescription";
pub const XML_ELEM_MODEL_NAME: &str = "modelName";
pub const XML_ELEM_MODEL_NUMBER: &str = "modelNumber";
pub const XML_ELEM_MODEL_URL: &str = "modelURL";
pub const XML_ELEM_NAME: &str = "name";
pub const XML_ELEM_PRESENTATION_URL: &str = "presentationURL";
pub const XML_ELEM_RETVAL: &str = "retval";
pub const XML_ELEM_ROOT: &str = "root";
pub const XML_ELEM_SERIAL_NUMBER: &str = "serialNumber";
pub const XML_ELEM_SERVICE: &str = "service";
pub const XML_ELEM_SERVICE_CONTROL_URL: &str = "controlURL";
pub const XML_ELEM_SERVICE_EVENT_URL: &str = "eventSubURL";
pub const XML_ELEM_SERVICE_ID: &str = "serviceId";
pub const XML_ELEM_SERVICE_LIST: &str = "serviceList";
pub const XML_ELEM_SERVICE_SCPD_URL: &str = "SCPDURL";
pub const XML_ELEM_SERVICE_TYPE: &str = "serviceType";
pub const XML_ELEM_REL_STATE_VARIABLE: &str = "relatedStateVariable";
pub const XML_ELEM_SCPD: &str = "scpd";
pub const XML_ELEM_SPEC_VERSION: &str = "specVersion";
pub const XML_ELEM_STATE_TABLE: &str = "serviceStateTable";
pub const XML_ELEM_STATE_VARIABLE: &str = "stateVariable";
pub const XML_ELEM_STEP: &str = "step";
pub const XML_ELEM_UDN: &str = "UDN";
pub const XML_ELEM_UPC: &str = "UPC";
pub const XML_ELEM_URL_BASE: &str = "URLBase";

// -- GENA propertyset ---------------------------------------------------------------------------

pub const XML_ELEM_PROPERTYSET: &str = "propertyset";
pub const XML_ELEM_PROPERTY: &str = "property";

// ------------------------------------------------------------------------------------------------
// Defaults (§6 Configuration)
// ------------------------------------------------------------------------------------------------

pub const DEFAULT_EVENT_QUEUE_MAX_LEN: usize = 10;
pub const DEFAULT_EVENT_QUEUE_MAX_AGE_SECS: u64 = 10;
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 16 * 1024;
pub const DEFAULT_NETWORK_WAIT_SECS: u64 = 60;
pub const DEFAULT_SOAP_TIMEOUT_SECS: u64 = 30;
pub const AUTO_RENEW_MARGIN_SECS: u64 = 10;

pub const MIN_SEARCH_TIME_SECS: u8 = 1;
pub const MAX_SEARCH_TIME_SECS: u8 = 120;
