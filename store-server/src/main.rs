use store_server::{Config, Server, ServerState, print_banner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 环境与日志
    dotenv::dotenv().ok();
    let config = Config::from_env();
    let log_dir = format!("{}/logs", config.work_dir);
    store_server::init_logger_with_file(Some(&config.log_level), Some(&log_dir));

    print_banner();
    tracing::info!("Store server starting...");

    // 2. 初始化共享状态 (数据库迁移在此执行)
    let state = ServerState::initialize(&config).await;

    // 3. 启动 HTTP 服务器
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
