// Turbine Rust Library for Amazon S3 Compatible Cloud Storage
// Copyright 2024 MinIO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The client's process-work loop
//!
//! One cooperative task per client drives every meta-request through
//! `update → prepare → send → finish`. The state in [`ThreadedData`] is
//! owned exclusively by this task and needs no synchronization; everything
//! shared sits behind the client lock and is drained at the top of each
//! pass. Preparation runs on a single sequential worker so body streams
//! are read strictly in part order while still overlapping network I/O.

use crate::s3::client::{ClientInner, PreparedOutcome};
use crate::s3::connection::{Connection, ConnectionFinishCode};
use crate::s3::error::Error;
use crate::s3::meta_request::{classify_response, MetaRequest, UpdateResult};
use crate::s3::request::{Request, ResponseData};
use crate::s3::retry::RetryDecision;
use crate::s3::types::UpdateFlags;
use http::HeaderMap;
use log::{debug, error};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

/// State owned by the work loop alone.
struct ThreadedData {
    meta_requests: Vec<Arc<dyn MetaRequest>>,
    request_queue: VecDeque<Box<Request>>,
    num_requests_being_prepared: u32,
    prepare_tx: mpsc::UnboundedSender<Box<Request>>,
}

pub(crate) async fn run_work_loop(client: Arc<ClientInner>) {
    let (prepare_tx, prepare_rx) = mpsc::unbounded_channel();
    tokio::spawn(prepare_worker(client.clone(), prepare_rx));

    let mut threaded = ThreadedData {
        meta_requests: Vec::new(),
        request_queue: VecDeque::new(),
        num_requests_being_prepared: 0,
        prepare_tx,
    };

    loop {
        process_work(&client, &mut threaded);

        if shutdown_complete(&client, &threaded) {
            break;
        }

        client.work_notify.notified().await;
    }

    debug!("client work loop exiting");
    let callback = client.lock_synced().shutdown_callback.take();
    if let Some(callback) = callback {
        callback();
    }
    let _ = client.shutdown_tx.send(true);
}

/// One pass: drain shared lists, poll the meta-requests for new work, and
/// match queued requests to connections.
fn process_work(client: &Arc<ClientInner>, threaded: &mut ThreadedData) {
    let (pending, prepared, retries) = {
        let mut synced = client.lock_synced();
        synced.process_work_scheduled = false;
        (
            std::mem::take(&mut synced.pending_meta_request_work),
            std::mem::take(&mut synced.prepared_requests),
            std::mem::take(&mut synced.retry_requests),
        )
    };

    for outcome in prepared {
        threaded.num_requests_being_prepared -= 1;
        match outcome {
            PreparedOutcome::Ready(request) => {
                // Retried requests jump the queue; they already consumed
                // admission once and the state machine is waiting on them.
                if request.num_times_prepared > 1 {
                    threaded.request_queue.push_front(request);
                } else {
                    threaded.request_queue.push_back(request);
                }
            }
            PreparedOutcome::Failed => {}
        }
    }

    for meta_request in pending {
        if !threaded
            .meta_requests
            .iter()
            .any(|m| Arc::ptr_eq(m, &meta_request))
        {
            threaded.meta_requests.push(meta_request);
        }
    }

    for request in retries {
        queue_prepare(threaded, request);
    }

    update_meta_requests(client, threaded);
    update_connections(client, threaded);
}

/// Round-robin the ongoing meta-requests, asking each for its next
/// request, until the preparation budget is consumed or a full cycle
/// produced nothing.
fn update_meta_requests(client: &Arc<ClientInner>, threaded: &mut ThreadedData) {
    let max_requests_prepare = client.get_max_requests_prepare();
    let max_requests_in_flight = client.get_max_requests_in_flight();

    let mut index = 0;
    let mut passes_without_work = 0;

    while !threaded.meta_requests.is_empty()
        && passes_without_work < threaded.meta_requests.len()
        && (threaded.num_requests_being_prepared + threaded.request_queue.len() as u32)
            < max_requests_prepare
    {
        if index >= threaded.meta_requests.len() {
            index = 0;
        }

        let queued = threaded.num_requests_being_prepared
            + threaded.request_queue.len() as u32
            + client.stats.num_requests_network_io.load(Ordering::Acquire);
        let flags = UpdateFlags {
            conservative: queued >= max_requests_in_flight,
        };

        match threaded.meta_requests[index].clone().update(flags) {
            UpdateResult::Work(request) => {
                passes_without_work = 0;
                queue_prepare(threaded, request);
                index += 1;
            }
            UpdateResult::Waiting => {
                passes_without_work += 1;
                index += 1;
            }
            UpdateResult::Done => {
                threaded.meta_requests.remove(index);
                passes_without_work = 0;
            }
        }
    }
}

fn queue_prepare(threaded: &mut ThreadedData, request: Box<Request>) {
    threaded.num_requests_being_prepared += 1;
    // The worker holds the receiving end for the client's lifetime; a send
    // only fails after shutdown, when the request is moot anyway.
    let _ = threaded.prepare_tx.send(request);
}

/// Sequential preparation: requests are prepared in the order the state
/// machines emitted them, which is what keeps body-stream reads serial.
async fn prepare_worker(
    client: Arc<ClientInner>,
    mut prepare_rx: mpsc::UnboundedReceiver<Box<Request>>,
) {
    while let Some(mut request) = prepare_rx.recv().await {
        let meta_request = request.meta_request.clone();

        match meta_request.prepare_request(&mut request).await {
            Ok(()) => {
                client
                    .lock_synced()
                    .prepared_requests
                    .push(PreparedOutcome::Ready(request));
            }
            Err(prepare_error) => {
                error!(
                    "failed to prepare {} request: {}",
                    request.tag, prepare_error
                );
                {
                    let mut synced = client.lock_synced();
                    synced.num_failed_prepare_requests += 1;
                    synced.prepared_requests.push(PreparedOutcome::Failed);
                }
                meta_request.finished_request(request, Err(prepare_error));
            }
        }

        client.schedule_process_work();
    }
}

/// Match queued requests to connections while admission allows.
fn update_connections(client: &Arc<ClientInner>, threaded: &mut ThreadedData) {
    while let Some(front) = threaded.request_queue.front() {
        let mr_type = front.meta_request.meta_request_type();
        let max_active_connections = client.get_max_active_connections(Some(mr_type));
        if client.stats.num_requests_network_io.load(Ordering::Acquire) >= max_active_connections {
            break;
        }

        let mut request = match threaded.request_queue.pop_front() {
            Some(request) => request,
            None => break,
        };
        let meta_request = request.meta_request.clone();

        // A meta-request that already has its finish result only gets to
        // send requests flagged always-send (the abort).
        if meta_request.has_finish_result() && !request.flags.always_send {
            meta_request.finished_request(request, Err(Error::Canceled));
            continue;
        }

        let host_name = match request.message.as_ref() {
            Some(message) => message.url.host_header_value(),
            None => {
                meta_request.finished_request(
                    request,
                    Err(Error::Internal("request was never prepared".to_string())),
                );
                continue;
            }
        };

        let endpoint = match client.endpoint_ops.acquire(client, &host_name) {
            Ok(endpoint) => endpoint,
            Err(acquire_error) => {
                meta_request.finished_request(request, Err(acquire_error));
                continue;
            }
        };

        client
            .stats
            .num_requests_network_io
            .fetch_add(1, Ordering::AcqRel);

        let retry_token = request.retry_token.take();
        let connection = Connection {
            endpoint,
            request: Some(request),
            retry_token,
        };
        tokio::spawn(send_request_task(client.clone(), connection));
    }
}

/// Drive one request attempt on one connection, then classify the outcome
/// through the retry strategy.
async fn send_request_task(client: Arc<ClientInner>, mut connection: Connection) {
    let mut request = match connection.request.take() {
        Some(request) => request,
        None => return,
    };

    let send_result: Result<ResponseData, Error> = async {
        let mut http_connection = connection
            .endpoint
            .connection_manager
            .acquire_connection()
            .await?;
        let message = request
            .message
            .as_ref()
            .ok_or_else(|| Error::Internal("request was never prepared".to_string()))?;
        let result = http_connection.send(message, &request.body).await;
        connection
            .endpoint
            .connection_manager
            .release_connection(http_connection, result.is_err());
        result
    }
    .await;

    let result = match send_result {
        Ok(response) => {
            let classified = classify_response(&response);
            request.response = ResponseData {
                status: response.status,
                headers: if request.flags.record_response_headers {
                    response.headers
                } else {
                    HeaderMap::new()
                },
                body: response.body,
            };
            classified
        }
        Err(send_error) => Err(send_error),
    };

    let finish_code = match &result {
        Ok(()) => {
            if let Some(token) = connection.retry_token.as_mut() {
                client.retry_strategy.on_request_succeeded(token);
            }
            ConnectionFinishCode::Success
        }
        Err(request_error) => {
            let mut token = connection
                .retry_token
                .take()
                .unwrap_or_else(|| client.retry_strategy.acquire_token());

            match client.retry_strategy.on_request_failed(&mut token, request_error) {
                RetryDecision::Retry(delay) => {
                    debug!(
                        "retrying {} request (attempt {}) after {:?}: {}",
                        request.tag, token.attempt, delay, request_error
                    );
                    tokio::time::sleep(delay).await;
                    connection.retry_token = Some(token);
                    ConnectionFinishCode::Retry
                }
                RetryDecision::Fail => ConnectionFinishCode::Failed,
            }
        }
    };

    connection.request = Some(request);
    notify_connection_finished(&client, connection, result, finish_code);
}

/// Progress signal from the HTTP layer: unwinds the connection, routes the
/// request onward, and re-pokes the work loop.
pub(crate) fn notify_connection_finished(
    client: &Arc<ClientInner>,
    mut connection: Connection,
    result: Result<(), Error>,
    finish_code: ConnectionFinishCode,
) {
    client
        .stats
        .num_requests_network_io
        .fetch_sub(1, Ordering::AcqRel);

    if let Some(mut request) = connection.request.take() {
        let meta_request = request.meta_request.clone();
        match finish_code {
            ConnectionFinishCode::Retry => {
                // Back through preparation with the body already in hand;
                // num_times_prepared routes around the stream reads.
                request.retry_token = connection.retry_token.take();
                client.lock_synced().retry_requests.push(request);
            }
            ConnectionFinishCode::Success | ConnectionFinishCode::Failed => {
                meta_request.finished_request(request, result);
            }
        }
    }

    // Endpoint release takes the client lock internally; holding it here
    // would deadlock against the manager teardown.
    client.endpoint_ops.release(client, connection.endpoint);

    client.schedule_process_work();
}

fn shutdown_complete(client: &Arc<ClientInner>, threaded: &ThreadedData) -> bool {
    let synced = client.lock_synced();
    !synced.active
        && threaded.meta_requests.is_empty()
        && threaded.request_queue.is_empty()
        && threaded.num_requests_being_prepared == 0
        && client.stats.num_requests_network_io.load(Ordering::Acquire) == 0
        && synced.endpoints.is_empty()
        && synced.pending_meta_request_work.is_empty()
        && synced.prepared_requests.is_empty()
        && synced.retry_requests.is_empty()
}
