use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, Result as AnyhowResult};
use http::{HeaderMap, StatusCode as RawStatusCode};

pub use http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
pub use http::Method;
pub type StatusCode = RawStatusCode;
pub type HttpHeadersMap = HeaderMap<HeaderValue>;

pub const APPLICATION_JSON: &str = "application/json";

pub trait ToHeadersMap {
  fn to_headers_map(&self) -> AnyhowResult<HttpHeadersMap>;
}

fn insert_header(headers_map: &mut HttpHeadersMap, key: &str, value: &str) -> AnyhowResult<()> {
  let header_name = HeaderName::from_str(key)
    .map_err(|e| anyhow!("Couldn't parse key into a header name: {}", e))?;
  let header_value = HeaderValue::from_str(value)
    .map_err(|e| anyhow!("Couldn't parse value into a header value: {}", e))?;

  headers_map.insert(header_name, header_value);

  Ok(())
}

impl ToHeadersMap for HashMap<String, String> {
  fn to_headers_map(&self) -> AnyhowResult<HttpHeadersMap> {
    let mut headers_map = HeaderMap::new();

    for (key, value) in self {
      insert_header(&mut headers_map, key, value)?;
    }

    Ok(headers_map)
  }
}
