use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::{CloseCode, CloseReason, Message, MessageStream, Session};
use futures_util::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::sync::Pipeline;

/// Live merged-attendance feed
///
/// Sends the full current table as CSV on connect, then every table the
/// watcher publishes. Client messages other than ping and close are ignored.
#[utoipa::path(
    get,
    path = "/api/ws/merged-attendance",
    responses(
        (status = 101, description = "Switching to websocket; text frames carry the merged table as CSV"),
        (status = 400, description = "Not a websocket upgrade request")
    ),
    tag = "Attendance"
)]
pub async fn subscribe(
    req: HttpRequest,
    body: web::Payload,
    pipeline: web::Data<Pipeline>,
) -> actix_web::Result<HttpResponse> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;
    actix_web::rt::spawn(forward(pipeline.into_inner(), session, stream));
    Ok(response)
}

/// Fresh merge for one newly connected subscriber. Does not touch the cache.
pub async fn initial_payload(pipeline: &Pipeline) -> SyncResult<Option<String>> {
    match pipeline.recompute().await? {
        Some(table) => Ok(Some(table.to_csv()?)),
        None => Ok(None),
    }
}

async fn forward(pipeline: Arc<Pipeline>, mut session: Session, mut stream: MessageStream) {
    let subscriber_id = Uuid::new_v4();
    // subscribe before the initial merge so no publish falls in between
    let mut updates = pipeline.subscribe();
    info!(%subscriber_id, subscribers = pipeline.subscriber_count(), "Subscriber connected");

    match initial_payload(&pipeline).await {
        Ok(Some(csv)) => {
            if session.text(csv).await.is_err() {
                debug!(%subscriber_id, "Subscriber gone before initial publish");
                return;
            }
        }
        Ok(None) => debug!(%subscriber_id, "Nothing to send on connect, a source collection is empty"),
        Err(e) => {
            warn!(%subscriber_id, error = %e, "Initial publish failed, closing connection");
            let _ = session.close(Some(CloseCode::Error.into())).await;
            return;
        }
    }

    let reason: Option<CloseReason> = loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    if session.text(snapshot.csv.clone()).await.is_err() {
                        debug!(%subscriber_id, "Send failed");
                        break None;
                    }
                    debug!(%subscriber_id, generation = snapshot.generation, "Snapshot forwarded");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%subscriber_id, skipped, "Subscriber lagging, skipped to latest");
                }
                Err(RecvError::Closed) => break Some(CloseCode::Away.into()),
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break None;
                    }
                }
                Some(Ok(Message::Close(reason))) => break reason,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%subscriber_id, error = %e, "Protocol error");
                    break None;
                }
                None => break None,
            },
        }
    };

    drop(updates);
    let _ = session.close(reason).await;
    info!(%subscriber_id, subscribers = pipeline.subscriber_count(), "Subscriber disconnected");
}
