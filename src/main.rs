use userkit::{app, logging, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let app_state = AppState::init().await?;
    let addr = app_state.config.bind_addr();

    let app = app::build_app(app_state);
    app::serve(app, &addr).await
}
