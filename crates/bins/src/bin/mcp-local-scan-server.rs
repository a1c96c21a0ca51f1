mod mcp_local_scan_server;

#[rocket::main]
async fn main() {
    mcp_local_scan_server::start().await;
}
