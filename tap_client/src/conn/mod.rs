//! HTTP connection layer: service URLs, transports, request encoding.

pub mod endpoints;
pub mod handler;
pub mod mock;
pub mod multipart;
pub mod reqwest_transport;
pub mod transport;

pub use endpoints::{parse_tap_url, Endpoints, ParsedTapUrl, ServiceContexts};
pub use handler::{
    check_response_status, dump_to_file, error_message, find_session_cookie, suitable_extension,
    url_encode, ConnSettings, TapConn, CONTENT_TYPE_FORM,
};
pub use mock::MockTransport;
pub use multipart::{encode_multipart, MultipartFile};
pub use reqwest_transport::ReqwestTransport;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method};
