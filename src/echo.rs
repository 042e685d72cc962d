use crate::dispatcher::Endpoint;
use crate::server::{Request, Response, Session};
use serde_json::json;

/// Echoes back what routing resolved for the request.
pub fn echo_handler(request: Request) -> anyhow::Result<Response> {
    let scope = request.scope();
    let body = json!({
        "handler": scope.endpoint.as_ref().map(Endpoint::name),
        "method": request.method().map(|m| m.as_str()),
        "path": request.path(),
        "root_path": request.root_path(),
        "params": request.path_params(),
        "query": request.query_params(),
        "request_id": scope.request_id,
    });
    Ok(Response::json(200, &body))
}

/// Accepts the session and echoes every text frame until the peer disconnects.
pub fn echo_session(mut session: Session<'_>) -> anyhow::Result<()> {
    session.accept()?;
    while let Some(text) = session.receive_text()? {
        session.send_text(&text)?;
    }
    Ok(())
}
