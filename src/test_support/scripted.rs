//! In-memory [`HttpTransport`] that replays canned replies and records requests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::transport::{
    HttpResponse, HttpTransport, NetworkError, NetworkErrorKind, ResponseBody, TransportRequest,
};

/// One canned transport outcome.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// The transport produced no response at all.
    NoResponse,
    /// The transport failed with this kind of error.
    Fail(NetworkErrorKind),
    Respond {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: String,
    },
}

impl ScriptedReply {
    /// A response carrying `X-OpenRosa-Version: 1.0`.
    pub fn open_rosa(status: u16, body: &str) -> Self {
        Self::Respond {
            status,
            headers: vec![("X-OpenRosa-Version", "1.0")],
            body: body.to_string(),
        }
    }

    /// A response without OpenRosa headers.
    pub fn plain(status: u16, body: &str) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }
}

/// Replays replies in order; once the script runs out the last reply repeats.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    last: Mutex<Option<ScriptedReply>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request executed so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Some(reply)
            }
            None => last.clone(),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<Option<HttpResponse>, NetworkError> {
        request.validate()?;
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        match self.next_reply() {
            None | Some(ScriptedReply::NoResponse) => Ok(None),
            Some(ScriptedReply::Fail(NetworkErrorKind::Timeout)) => Err(NetworkError::timeout(url)),
            Some(ScriptedReply::Fail(kind)) => Err(NetworkError::new(url, kind, "scripted failure")),
            Some(ScriptedReply::Respond {
                status,
                headers,
                body,
            }) => {
                let mut map = HeaderMap::new();
                for (name, value) in headers {
                    if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                        map.insert(name, HeaderValue::from_static(value));
                    }
                }
                Ok(Some(HttpResponse::new(
                    status,
                    map,
                    Some(ResponseBody::from_bytes(body)),
                )))
            }
        }
    }
}
