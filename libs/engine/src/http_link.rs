use bytes::Bytes;
use courier_common::{
  graphql::GraphQLResponse,
  http::{HttpHeadersMap, Method, ACCEPT, APPLICATION_JSON, CONTENT_TYPE},
  link::{LinkError, LinkResult, LinkStream, Operation, RequestSerializationError, TerminatingLink},
};
use futures::{stream, StreamExt};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::{debug, debug_span, warn, Instrument};

/// Sends operations to a GraphQL server over HTTP.
///
/// Requests are sent as `POST` with a JSON body, unless the operation carries a `GET` override,
/// in which case the request fields are encoded in the URL query string.
#[derive(Debug, Clone)]
pub struct HttpLink {
  fetcher: ClientWithMiddleware,
  endpoint: String,
  headers: HttpHeadersMap,
}

impl HttpLink {
  pub fn new(endpoint: impl Into<String>, headers: HttpHeadersMap) -> Self {
    Self::new_with_client(
      ClientBuilder::new(reqwest::Client::new()).build(),
      endpoint,
      headers,
    )
  }

  pub fn new_with_client(
    fetcher: ClientWithMiddleware,
    endpoint: impl Into<String>,
    headers: HttpHeadersMap,
  ) -> Self {
    Self {
      fetcher,
      endpoint: endpoint.into(),
      headers,
    }
  }

  async fn send(self, operation: Operation) -> LinkResult {
    let method = operation.http_method();
    let graphql_request = operation.to_graphql_request()?;

    let upstream_req = match method {
      Method::GET => {
        let params = graphql_request
          .to_query_params()
          .map_err(RequestSerializationError::Extensions)?;

        self.fetcher.get(&self.endpoint).query(&params)
      }
      method => self
        .fetcher
        .request(method, &self.endpoint)
        .header(CONTENT_TYPE, APPLICATION_JSON)
        .body(Bytes::from(&graphql_request)),
    };

    debug!(
      "going to send upstream request from the following input: {}",
      graphql_request
    );

    let upstream_response = upstream_req
      .headers(self.headers.clone())
      .header(ACCEPT, APPLICATION_JSON)
      .send()
      .await
      .map_err(LinkError::Network)?;

    let status = upstream_response.status();
    let body = upstream_response
      .bytes()
      .await
      .map_err(|e| LinkError::Network(e.into()))?;
    let parsed = serde_json::from_slice::<GraphQLResponse>(&body);

    match (status.is_success(), parsed) {
      (true, Ok(response)) => Ok(response),
      (true, Err(e)) => {
        warn!("upstream returned an invalid GraphQL response: {}", e);

        Err(LinkError::Server {
          status,
          response: None,
        })
      }
      (false, parsed) => {
        debug!("upstream returned an unexpected HTTP status: {}", status);

        Err(LinkError::Server {
          status,
          response: parsed.ok(),
        })
      }
    }
  }
}

impl TerminatingLink for HttpLink {
  fn execute(&self, operation: Operation) -> LinkStream {
    let span = debug_span!(
      "HttpLink::execute",
      method = %operation.http_method(),
      endpoint = %self.endpoint
    );

    stream::once(self.clone().send(operation).instrument(span)).boxed()
  }
}
