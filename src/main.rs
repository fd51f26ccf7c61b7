mod api;
mod app;
mod application;
mod config;
mod domain;
mod ui;
mod utils;

fn main() -> iced::Result {
    env_logger::init();

    iced::application(app::FetcherApp::default, app::update, app::view)
        .title("Model Fetcher")
        .run()
}
