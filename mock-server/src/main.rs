use tokio::net::TcpListener;

/// Serves the users/echo API used by the client integration tests.
/// Bind address comes from `MOCK_SERVER_ADDR` (default `127.0.0.1:3000`).
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let addr = std::env::var("MOCK_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    println!("mock server listening on http://{}", listener.local_addr()?);
    mock_server::run(listener).await
}
