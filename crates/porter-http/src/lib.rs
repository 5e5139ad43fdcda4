mod compose;
mod config;
mod export;
mod handlers;
mod record;
mod request;
mod response;
mod timezone;
mod translate;

pub use compose::{build_filter, build_paginated};
pub use config::GatewayConfig;
pub use export::{EXPORT_CHUNK_SIZE, PageFetcher, generate, render_rows};
pub use handlers::{CallerIdentity, GatewayHttp, GatewayState, finish};
pub use record::{ResolvedLink, build_record, link_one_to_one};
pub use request::RequestSnapshot;
pub use response::{
    GatewayResponse, ResponseBody, attachment, error_response, json_ok, json_response,
    stream_response,
};
pub use timezone::{IanaTimezones, NoTimezoneSupport, TimezoneError, TimezoneSupport};
pub use translate::RequestQueryTranslator;
