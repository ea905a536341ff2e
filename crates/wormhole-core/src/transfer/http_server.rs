use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use log::info;
use std::future::Future;
use tokio::net::TcpListener;

use super::{AppState, download, listing, manage, upload};

/// 构建全部 HTTP 路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload::handle_upload))
        .route("/download", get(download::handle_download))
        .route("/delete", post(manage::handle_delete))
        .route("/update_file", post(manage::handle_update))
        .route("/list_files", get(listing::handle_list))
        // 上传大小不设上限
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// 在已绑定的监听器上提供服务，直到 `shutdown` 完成
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        "HTTP Server listening on {} (root: {})",
        addr,
        state.root.get().display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP Server stopped");
    Ok(())
}
