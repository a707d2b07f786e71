//! Canned-response client for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Request, Response, Url};

use super::client::HttpClient;

/// Answers by the value of the `query` parameter; unknown queries get a 404.
#[derive(Default)]
pub(crate) struct FakeClient {
    responses: HashMap<String, (u16, String)>,
    calls: Mutex<Vec<Url>>,
}

impl FakeClient {
    pub(crate) fn with(mut self, query: &str, status: u16, body: &str) -> Self {
        self.responses
            .insert(query.to_string(), (status, body.to_string()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for FakeClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        let url = req.url().clone();
        self.calls.lock().unwrap().push(url.clone());

        let query = url
            .query_pairs()
            .find(|(k, _)| k == "query")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        let (status, body) = self
            .responses
            .get(&query)
            .cloned()
            .unwrap_or((404, String::new()));

        let resp = http::Response::builder().status(status).body(body).unwrap();
        Ok(Response::from(resp))
    }
}
