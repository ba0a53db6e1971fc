use super::open_hub;
use std::path::Path;
use std::sync::Arc;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    // The collaborator's blocking HTTP client must be built outside the runtime.
    let hub = Arc::new(open_hub(root)?);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let actual = listener.local_addr()?.port();
        println!("intent API at http://127.0.0.1:{actual}/api");

        tokio::select! {
            result = intent_server::serve_on(hub, listener) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
