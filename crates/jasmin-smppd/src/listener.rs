//! The accept loop (§4.8): pulls fresh [`ServerLink`]s off a
//! [`ServerTransport`] and spawns one session task per ESME, the same
//! "one task per connection" shape the rest of the gateway uses for
//! connectors and throwers (§5).

use tracing::error;

use crate::context::SmppdContext;
use crate::link::ServerTransport;
use crate::session;

pub async fn run(mut transport: Box<dyn ServerTransport>, ctx: SmppdContext) {
    loop {
        match transport.accept().await {
            Ok(link) => {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(err) = session::run(link, ctx).await {
                        error!(error = %err, "ESME session ended with an error");
                    }
                });
            }
            Err(err) => {
                error!(error = %err, "failed to accept ESME connection, stopping listener");
                return;
            }
        }
    }
}
